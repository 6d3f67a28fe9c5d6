//! Pure filter, sort and paginate pipeline over a [`Collection`].

use std::collections::{BTreeMap, BTreeSet};

use strum::{Display, EnumIter, IntoEnumIterator};

use crate::model::{locale_cmp, Entity, SelectorSource, SelectorSpec};
use crate::store::{Collection, Row};

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const ALL: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn flip(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    pub fn arrow(self) -> &'static str {
        match self {
            SortDirection::Ascending => "▲",
            SortDirection::Descending => "▼",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortState {
    pub field: String,
    pub direction: SortDirection,
}

/// Dashboard shortcuts. Only inventory rows interpret anything but `All`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumIter)]
pub enum QuickFilter {
    #[default]
    #[strum(serialize = "all")]
    All,
    #[strum(serialize = "low stock")]
    LowStock,
    #[strum(serialize = "empty")]
    EmptyStock,
    #[strum(serialize = "with parts")]
    WithChildren,
}

impl QuickFilter {
    pub fn next(self) -> Self {
        let all: Vec<_> = QuickFilter::iter().collect();
        let index = all.iter().position(|item| *item == self).unwrap_or(0);
        all[(index + 1) % all.len()]
    }
}

/// Everything the user has chosen about what a table shows.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterState {
    pub search: String,
    pub selectors: BTreeMap<String, String>,
    pub quick: QuickFilter,
    pub sort: Option<SortState>,
    /// Zero-based.
    pub page: usize,
    pub page_size: usize,
}

impl Default for FilterState {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl FilterState {
    pub fn new(page_size: usize) -> Self {
        Self {
            search: String::new(),
            selectors: BTreeMap::new(),
            quick: QuickFilter::All,
            sort: None,
            page: 0,
            page_size: page_size.max(1),
        }
    }

    pub fn set_search(&mut self, text: impl Into<String>) {
        self.search = text.into();
        self.page = 0;
    }

    /// Empty or `all` removes the selector.
    pub fn set_selector(&mut self, field: &str, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() || value.eq_ignore_ascii_case(ALL) {
            self.selectors.remove(field);
        } else {
            self.selectors.insert(field.to_string(), value);
        }
        self.page = 0;
    }

    pub fn selector(&self, field: &str) -> Option<&str> {
        self.selectors.get(field).map(String::as_str)
    }

    /// Steps a selector through `all` followed by each option.
    pub fn cycle_selector(&mut self, field: &str, options: &[String], forward: bool) {
        let current = self
            .selector(field)
            .and_then(|value| options.iter().position(|option| option == value));
        let slots = options.len() + 1;
        let slot = current.map(|index| index + 1).unwrap_or(0);
        let next = if forward {
            (slot + 1) % slots
        } else {
            (slot + slots - 1) % slots
        };
        match next {
            0 => self.set_selector(field, ""),
            index => self.set_selector(field, options[index - 1].clone()),
        }
    }

    pub fn set_quick(&mut self, quick: QuickFilter) {
        self.quick = quick;
        self.page = 0;
    }

    /// Same column flips direction, a new column starts ascending.
    pub fn toggle_sort(&mut self, field: &str) {
        self.sort = match self.sort.take() {
            Some(sort) if sort.field == field => Some(SortState {
                field: sort.field,
                direction: sort.direction.flip(),
            }),
            _ => Some(SortState {
                field: field.to_string(),
                direction: SortDirection::Ascending,
            }),
        };
    }

    /// Paging starts from the page actually shown, so a stale page left
    /// behind by a shrinking table is pulled back first.
    pub fn next_page(&mut self, page_count: usize) {
        self.clamp_page(page_count);
        if self.page + 1 < page_count {
            self.page += 1;
        }
    }

    pub fn prev_page(&mut self, page_count: usize) {
        self.clamp_page(page_count);
        self.page = self.page.saturating_sub(1);
    }

    fn clamp_page(&mut self, page_count: usize) {
        self.page = self.page.min(page_count.saturating_sub(1));
    }

    pub fn clear(&mut self) {
        *self = Self::new(self.page_size);
    }

    pub fn is_filtered(&self) -> bool {
        !self.search.trim().is_empty() || !self.selectors.is_empty() || self.quick != QuickFilter::All
    }
}

/// One page of the derived view.
#[derive(Debug)]
pub struct Page<'a, E> {
    pub rows: Vec<&'a Row<E>>,
    /// Zero-based, already clamped.
    pub page: usize,
    pub page_count: usize,
    /// Rows matching the filters across all pages.
    pub total: usize,
}

impl<E> Page<'_, E> {
    pub fn has_prev(&self) -> bool {
        self.page > 0
    }

    pub fn has_next(&self) -> bool {
        self.page + 1 < self.page_count
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub fn matches<E: Entity>(entity: &E, state: &FilterState) -> bool {
    if !entity.is_top_level() || !entity.quick_filter(state.quick) {
        return false;
    }
    let needle = state.search.trim().to_lowercase();
    if !needle.is_empty()
        && !E::schema()
            .searchable
            .iter()
            .any(|field| entity.field(field).contains_lowercase(&needle))
    {
        return false;
    }
    state.selectors.iter().all(|(field, selected)| {
        selected.is_empty()
            || selected.eq_ignore_ascii_case(ALL)
            || entity.field(field).matches_selector(selected)
    })
}

pub fn filter_rows<'a, E: Entity>(collection: &'a Collection<E>, state: &FilterState) -> Vec<&'a Row<E>> {
    collection
        .iter()
        .filter(|row| matches(&row.entity, state))
        .collect()
}

/// Stable; ties keep collection order in both directions.
pub fn sort_rows<E: Entity>(rows: &mut [&Row<E>], sort: Option<&SortState>) {
    let Some(sort) = sort else {
        return;
    };
    rows.sort_by(|a, b| {
        let ordering = a
            .entity
            .field(&sort.field)
            .sort_cmp(&b.entity.field(&sort.field));
        match sort.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    });
}

pub fn page_count(total: usize, page_size: usize) -> usize {
    let size = page_size.max(1);
    total.div_ceil(size).max(1)
}

pub fn compute_view<'a, E: Entity>(collection: &'a Collection<E>, state: &FilterState) -> Page<'a, E> {
    let mut rows = filter_rows(collection, state);
    sort_rows(&mut rows, state.sort.as_ref());

    let size = state.page_size.max(1);
    let total = rows.len();
    let page_count = page_count(total, size);
    let page = state.page.min(page_count - 1);
    let start = page * size;
    let rows = rows.into_iter().skip(start).take(size).collect();

    Page {
        rows,
        page,
        page_count,
        total,
    }
}

/// Choices offered for a selector, without the leading `all`.
pub fn selector_options<E: Entity>(collection: &Collection<E>, spec: &SelectorSpec) -> Vec<String> {
    match spec.source {
        SelectorSource::Fixed(values) => values.iter().map(|value| value.to_string()).collect(),
        SelectorSource::Distinct => {
            let distinct: BTreeSet<String> = collection
                .entities()
                .map(|entity| entity.field(spec.field).to_string())
                .filter(|value| !value.is_empty())
                .collect();
            let mut values: Vec<_> = distinct.into_iter().collect();
            values.sort_by(|a, b| locale_cmp(a, b));
            values
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::item::sample;
    use crate::model::{car, user, Car, InventoryItem, User};

    fn names(page: &Page<'_, InventoryItem>) -> Vec<String> {
        page.rows.iter().map(|row| row.entity.name.clone()).collect()
    }

    fn inventory(items: Vec<InventoryItem>) -> Collection<InventoryItem> {
        let mut collection = Collection::new();
        collection.load(items);
        collection
    }

    #[test]
    fn sort_toggles_between_directions() {
        let collection = inventory(vec![
            sample(1, "Bolt", 1, 0),
            sample(2, "Axle", 1, 0),
            sample(3, "Cam", 1, 0),
        ]);
        let mut state = FilterState::default();
        state.toggle_sort("name");
        assert_eq!(names(&compute_view(&collection, &state)), ["Axle", "Bolt", "Cam"]);
        state.toggle_sort("name");
        assert_eq!(names(&compute_view(&collection, &state)), ["Cam", "Bolt", "Axle"]);
        state.toggle_sort("quantity");
        assert_eq!(state.sort.as_ref().unwrap().direction, SortDirection::Ascending);
    }

    #[test]
    fn ties_keep_collection_order() {
        let collection = inventory(vec![
            sample(1, "b", 2, 0),
            sample(2, "a", 1, 0),
            sample(3, "c", 2, 0),
        ]);
        let mut state = FilterState::default();
        state.toggle_sort("quantity");
        assert_eq!(names(&compute_view(&collection, &state)), ["a", "b", "c"]);
        state.toggle_sort("quantity");
        assert_eq!(names(&compute_view(&collection, &state)), ["b", "c", "a"]);
    }

    #[test]
    fn compute_view_is_deterministic() {
        let collection = inventory((1..=25).map(|id| sample(id, &format!("Part {id}"), id % 4, 2)).collect());
        let mut state = FilterState::default();
        state.set_search("part 1");
        state.toggle_sort("quantity");
        let first = compute_view(&collection, &state);
        let second = compute_view(&collection, &state);
        assert_eq!(names(&first), names(&second));
        assert_eq!(first.total, second.total);
    }

    #[test]
    fn paginates_and_clamps_out_of_range_pages() {
        let collection = inventory((1..=23).map(|id| sample(id, &format!("P{id:02}"), 1, 0)).collect());
        let mut state = FilterState::default();
        let first = compute_view(&collection, &state);
        assert_eq!(first.rows.len(), 10);
        assert_eq!(first.page_count, 3);
        assert!(!first.has_prev());
        assert!(first.has_next());

        state.page = 99;
        let last = compute_view(&collection, &state);
        assert_eq!(last.page, 2);
        assert_eq!(last.rows.len(), 3);
        assert!(last.has_prev());
        assert!(!last.has_next());

        let none = Collection::<InventoryItem>::new();
        let empty = compute_view(&none, &state);
        assert_eq!(empty.page, 0);
        assert_eq!(empty.page_count, 1);
        assert!(empty.is_empty());
    }

    #[test]
    fn paging_steps_from_the_clamped_page() {
        let collection = inventory((1..=23).map(|id| sample(id, &format!("P{id:02}"), 1, 0)).collect());
        let mut state = FilterState::default();
        state.page = 7;
        let count = compute_view(&collection, &state).page_count;

        state.prev_page(count);
        assert_eq!(state.page, 1);
        assert_eq!(compute_view(&collection, &state).page, 1);

        state.page = 7;
        state.next_page(count);
        assert_eq!(state.page, 2);
    }

    #[test]
    fn search_is_case_insensitive_over_searchable_fields_only() {
        let mut bolt = sample(1, "Hex Bolt", 1, 0);
        bolt.barcode = "XYZ-77".into();
        bolt.category = "Office".into();
        let collection = inventory(vec![bolt, sample(2, "Axle", 1, 0)]);
        let mut state = FilterState::default();

        state.set_search("hEx");
        assert_eq!(names(&compute_view(&collection, &state)), ["Hex Bolt"]);
        state.set_search("xyz");
        assert_eq!(names(&compute_view(&collection, &state)), ["Hex Bolt"]);
        state.set_search("office");
        assert!(compute_view(&collection, &state).is_empty());
    }

    #[test]
    fn selectors_and_quick_filters_combine() {
        let mut office = sample(1, "Stapler", 0, 3);
        office.category = "Office".into();
        let collection = inventory(vec![office, sample(2, "Bolt", 0, 3), sample(3, "Nut", 9, 3)]);
        let mut state = FilterState::default();

        state.set_quick(QuickFilter::LowStock);
        assert_eq!(names(&compute_view(&collection, &state)), ["Stapler", "Bolt"]);
        state.set_selector("category", "Production");
        assert_eq!(names(&compute_view(&collection, &state)), ["Bolt"]);
        state.set_selector("category", "all");
        assert!(state.selector("category").is_none());
    }

    #[test]
    fn child_parts_are_hidden_from_top_level() {
        let mut parent = sample(1, "Door", 1, 1);
        let mut hinge = sample(2, "Hinge", 1, 1);
        hinge.parent = Some(1);
        parent.children.push(hinge);
        let collection = inventory(vec![parent]);
        assert_eq!(collection.len(), 2);
        assert_eq!(names(&compute_view(&collection, &FilterState::default())), ["Door"]);
    }

    #[test]
    fn user_status_selector_uses_status_word() {
        let mut collection: Collection<User> = Collection::new();
        collection.load(vec![
            user::sample(1, "ana", "admin", true),
            user::sample(2, "bo", "worker", false),
        ]);
        let mut state = FilterState::default();
        state.set_selector("status", "inactive");
        let page = compute_view(&collection, &state);
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.rows[0].entity.username, "bo");

        state.set_selector("status", "");
        state.set_search("ACTIVE");
        assert_eq!(compute_view(&collection, &state).total, 2);
    }

    #[test]
    fn distinct_selector_options_are_sorted() {
        let mut collection: Collection<Car> = Collection::new();
        collection.load(vec![
            car::sample("1", "polo", "pending"),
            car::sample("2", "Golf", "pending"),
            car::sample("3", "polo", "completed"),
        ]);
        let spec = Car::schema().selector("model").unwrap();
        assert_eq!(selector_options(&collection, spec), ["Golf", "polo"]);

        let mut state = FilterState::default();
        let options = selector_options(&collection, spec);
        state.cycle_selector("model", &options, true);
        assert_eq!(state.selector("model"), Some("Golf"));
        state.cycle_selector("model", &options, false);
        assert_eq!(state.selector("model"), None);
        state.cycle_selector("model", &options, false);
        assert_eq!(state.selector("model"), Some("polo"));
    }

    #[test]
    fn missing_values_sort_first_ascending() {
        let mut collection: Collection<Car> = Collection::new();
        let mut dated = car::sample("A", "Golf", "pending");
        dated.order_date = Some("2024-01-02".into());
        collection.load(vec![dated, car::sample("B", "Golf", "pending")]);
        let mut state = FilterState::default();
        state.toggle_sort("order_date");
        let vins: Vec<_> = compute_view(&collection, &state)
            .rows
            .iter()
            .map(|row| row.entity.vin.clone())
            .collect();
        assert_eq!(vins, ["B", "A"]);
    }
}
