use std::str::FromStr;

use strum::IntoEnumIterator;
use unicode_segmentation::UnicodeSegmentation;

use crate::api::{Carried, Completion, Operation, Payload, Ticket};
use crate::app::actions::Dispatcher;
use crate::app::table::{TableModel, TableSnapshot};
use crate::checkout::{CheckoutDraft, CheckoutReceipt};
use crate::error::{Error, Result};
use crate::model::{
    Car, CarDraft, Category, ChildPartDraft, InventoryItem, InventoryStats, ItemDraft, LogEntry,
    ResourceKind, Role, User, UserDraft,
};
use crate::store::{EntityKey, ResourceView};

/// One mirrored table per API resource.
#[derive(Debug)]
pub struct Views {
    pub inventory: ResourceView<InventoryItem>,
    pub users: ResourceView<User>,
    pub cars: ResourceView<Car>,
    pub logs: ResourceView<LogEntry>,
}

impl Views {
    pub fn new(page_size: usize) -> Self {
        Self {
            inventory: ResourceView::new(page_size),
            users: ResourceView::new(page_size),
            cars: ResourceView::new(page_size),
            logs: ResourceView::new(page_size),
        }
    }

    pub fn table(&self, kind: ResourceKind) -> &dyn TableModel {
        match kind {
            ResourceKind::Inventory => &self.inventory,
            ResourceKind::Users => &self.users,
            ResourceKind::Cars => &self.cars,
            ResourceKind::Logs => &self.logs,
        }
    }

    pub fn table_mut(&mut self, kind: ResourceKind) -> &mut dyn TableModel {
        match kind {
            ResourceKind::Inventory => &mut self.inventory,
            ResourceKind::Users => &mut self.users,
            ResourceKind::Cars => &mut self.cars,
            ResourceKind::Logs => &mut self.logs,
        }
    }
}

/// Entities that own a tab, so typed code can find their view.
pub trait Tabbed: Carried {
    fn view(views: &Views) -> &ResourceView<Self>;
    fn view_mut(views: &mut Views) -> &mut ResourceView<Self>;
}

macro_rules! tabbed {
    ($entity:ty, $field:ident) => {
        impl Tabbed for $entity {
            fn view(views: &Views) -> &ResourceView<Self> {
                &views.$field
            }

            fn view_mut(views: &mut Views) -> &mut ResourceView<Self> {
                &mut views.$field
            }
        }
    };
}

tabbed!(InventoryItem, inventory);
tabbed!(User, users);
tabbed!(Car, cars);
tabbed!(LogEntry, logs);

/// Calls a generic method with the entity type that backs `kind`.
macro_rules! with_entity {
    ($kind:expr, $this:ident . $method:ident ( $($arg:expr),* )) => {
        match $kind {
            ResourceKind::Inventory => $this.$method::<InventoryItem>($($arg),*),
            ResourceKind::Users => $this.$method::<User>($($arg),*),
            ResourceKind::Cars => $this.$method::<Car>($($arg),*),
            ResourceKind::Logs => $this.$method::<LogEntry>($($arg),*),
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub text: String,
    pub level: StatusLevel,
}

#[derive(Debug, Clone, Default)]
pub struct SearchState {
    pub active: bool,
    pub query: String,
    /// Query to restore when the prompt is cancelled.
    pub previous: String,
}

#[derive(Debug, Clone)]
pub struct EditFieldOverlay {
    pub key: EntityKey,
    pub field: &'static str,
    pub label: &'static str,
    pub title: String,
    pub input: String,
    pub choices: &'static [&'static str],
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DeleteOverlay {
    pub kind: ResourceKind,
    pub key: EntityKey,
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct FormField {
    pub name: &'static str,
    pub label: &'static str,
    pub value: String,
    pub hint: &'static str,
    pub secret: bool,
}

impl FormField {
    fn new(name: &'static str, label: &'static str) -> Self {
        Self {
            name,
            label,
            value: String::new(),
            hint: "",
            secret: false,
        }
    }

    fn hint(mut self, hint: &'static str) -> Self {
        self.hint = hint;
        self
    }

    fn value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    fn secret(mut self) -> Self {
        self.secret = true;
        self
    }
}

/// A create form for one resource.
#[derive(Debug, Clone)]
pub struct FormOverlay {
    pub kind: ResourceKind,
    pub fields: Vec<FormField>,
    pub focus: usize,
    pub error: Option<String>,
}

impl FormOverlay {
    pub fn for_kind(kind: ResourceKind) -> Option<Self> {
        let fields = match kind {
            ResourceKind::Inventory => vec![
                FormField::new("name", "Name"),
                FormField::new("sku", "SKU"),
                FormField::new("barcode", "Barcode").hint("blank to generate"),
                FormField::new("category", "Category")
                    .value(Category::default().to_string())
                    .hint("Production, Office, Car Wash, Paint/Damage"),
                FormField::new("quantity", "Quantity").value("0"),
                FormField::new("threshold", "Min. stock").value("0"),
                FormField::new("parts", "Child parts").hint("comma separated names"),
            ],
            ResourceKind::Users => vec![
                FormField::new("username", "Username"),
                FormField::new("role", "Role")
                    .value(Role::default().to_string())
                    .hint("admin, supervisor, worker"),
                FormField::new("password", "Password").secret(),
            ],
            ResourceKind::Cars => vec![
                FormField::new("vin", "VIN"),
                FormField::new("model", "Model"),
                FormField::new("adaptation", "Adaptation"),
                FormField::new("location", "Location"),
                FormField::new("client_name", "Client"),
                FormField::new("scheduled_date", "Scheduled").hint("YYYY-MM-DD"),
                FormField::new("order_date", "Ordered").hint("YYYY-MM-DD"),
                FormField::new("status", "Status").hint("not started yet, pending, completed"),
                FormField::new("dealers_comments", "Comments"),
            ],
            ResourceKind::Logs => return None,
        };
        Some(Self {
            kind,
            fields,
            focus: 0,
            error: None,
        })
    }

    pub fn focus_next(&mut self) {
        self.focus = (self.focus + 1) % self.fields.len();
    }

    pub fn focus_prev(&mut self) {
        self.focus = (self.focus + self.fields.len() - 1) % self.fields.len();
    }

    pub fn input_mut(&mut self) -> &mut String {
        &mut self.fields[self.focus].value
    }

    fn get(&self, name: &str) -> &str {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.value.trim())
            .unwrap_or("")
    }

    fn optional(&self, name: &str) -> Option<String> {
        Some(self.get(name).to_string()).filter(|value| !value.is_empty())
    }

    fn number(&self, name: &str, label: &str) -> Result<i64> {
        match self.get(name) {
            "" => Ok(0),
            raw => raw
                .parse()
                .map_err(|_| Error::validation(format!("{label} must be a whole number"))),
        }
    }

    pub fn item_draft(&self) -> Result<ItemDraft> {
        let category = match self.get("category") {
            "" => Category::default(),
            raw => Category::from_str(raw)
                .map_err(|_| Error::validation(format!("unknown category '{raw}'")))?,
        };
        let child_parts = self
            .get("parts")
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .enumerate()
            .map(|(index, name)| ChildPartDraft {
                name: name.to_string(),
                ..ChildPartDraft::numbered(index)
            })
            .collect();
        ItemDraft {
            name: self.get("name").to_string(),
            sku: self.get("sku").to_string(),
            barcode: self.get("barcode").to_string(),
            quantity: self.number("quantity", "quantity")?,
            threshold: self.number("threshold", "minimum stock")?,
            category,
            child_parts,
        }
        .finalize()
    }

    pub fn user_draft(&self) -> Result<UserDraft> {
        let role = match self.get("role") {
            "" => Role::default(),
            raw => Role::from_str(&raw.to_lowercase())
                .map_err(|_| Error::validation(format!("unknown role '{raw}'")))?,
        };
        let draft = UserDraft {
            username: self.get("username").to_string(),
            role,
            password: self
                .fields
                .iter()
                .find(|field| field.name == "password")
                .map(|field| field.value.clone())
                .unwrap_or_default(),
        };
        draft.validate()?;
        Ok(draft)
    }

    pub fn car_draft(&self) -> Result<CarDraft> {
        CarDraft {
            vin: self.get("vin").to_string(),
            model: self.get("model").to_string(),
            adaptation: self.optional("adaptation"),
            scheduled_date: self.optional("scheduled_date"),
            order_date: self.optional("order_date"),
            location: self.optional("location"),
            client_name: self.optional("client_name"),
            dealers_comments: self.optional("dealers_comments"),
            status: self.optional("status"),
        }
        .finalize()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutField {
    User,
    Vin,
    Order,
    Part(usize),
}

#[derive(Debug, Clone, Default)]
pub struct CheckoutOverlay {
    pub draft: CheckoutDraft,
    pub focus: Option<CheckoutField>,
    pub error: Option<String>,
}

impl CheckoutOverlay {
    pub fn focused(&self) -> CheckoutField {
        self.focus.unwrap_or(CheckoutField::User)
    }

    pub fn focus_next(&mut self) {
        let last = self.draft.parts.len().saturating_sub(1);
        self.focus = Some(match self.focused() {
            CheckoutField::User => CheckoutField::Vin,
            CheckoutField::Vin => CheckoutField::Order,
            CheckoutField::Order => CheckoutField::Part(0),
            CheckoutField::Part(index) if index < last => CheckoutField::Part(index + 1),
            CheckoutField::Part(_) => CheckoutField::User,
        });
    }

    pub fn focus_prev(&mut self) {
        let last = self.draft.parts.len().saturating_sub(1);
        self.focus = Some(match self.focused() {
            CheckoutField::User => CheckoutField::Part(last),
            CheckoutField::Vin => CheckoutField::User,
            CheckoutField::Order => CheckoutField::Vin,
            CheckoutField::Part(0) => CheckoutField::Order,
            CheckoutField::Part(index) => CheckoutField::Part(index - 1),
        });
    }

    pub fn input_mut(&mut self) -> &mut String {
        match self.focused() {
            CheckoutField::User => &mut self.draft.user_code,
            CheckoutField::Vin => &mut self.draft.vin,
            CheckoutField::Order => &mut self.draft.order_number,
            CheckoutField::Part(index) => {
                let index = index.min(self.draft.parts.len() - 1);
                &mut self.draft.parts[index].value
            }
        }
    }

    pub fn add_part(&mut self) {
        self.draft.add_part();
        self.focus = Some(CheckoutField::Part(self.draft.parts.len() - 1));
    }

    pub fn remove_part(&mut self) {
        if let CheckoutField::Part(index) = self.focused() {
            self.draft.remove_part(index);
            let last = self.draft.parts.len() - 1;
            self.focus = Some(CheckoutField::Part(index.min(last)));
        }
    }

    pub fn toggle_damaged(&mut self) {
        if let CheckoutField::Part(index) = self.focused() {
            if let Some(part) = self.draft.parts.get_mut(index) {
                part.damaged = !part.damaged;
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum OverlayState {
    EditField(EditFieldOverlay),
    ConfirmDelete(DeleteOverlay),
    Create(FormOverlay),
    Checkout(CheckoutOverlay),
    Help,
}

pub struct AppState {
    pub views: Views,
    tab: ResourceKind,
    pub selected: usize,
    pub column: usize,
    selector_focus: usize,
    search: SearchState,
    overlay: Option<OverlayState>,
    status_message: Option<StatusMessage>,
    last_receipt: Option<CheckoutReceipt>,
}

impl AppState {
    pub fn new(page_size: usize, tab: ResourceKind) -> Self {
        Self {
            views: Views::new(page_size),
            tab,
            selected: 0,
            column: 0,
            selector_focus: 0,
            search: SearchState::default(),
            overlay: None,
            status_message: None,
            last_receipt: None,
        }
    }

    pub fn tab(&self) -> ResourceKind {
        self.tab
    }

    pub fn table(&self) -> &dyn TableModel {
        self.views.table(self.tab)
    }

    pub fn table_mut(&mut self) -> &mut dyn TableModel {
        self.views.table_mut(self.tab)
    }

    pub fn snapshot(&self) -> TableSnapshot {
        self.table().snapshot()
    }

    pub fn inventory_stats(&self) -> InventoryStats {
        InventoryStats::collect(self.views.inventory.collection().entities())
    }

    pub fn last_receipt(&self) -> Option<&CheckoutReceipt> {
        self.last_receipt.as_ref()
    }

    pub fn set_tab(&mut self, tab: ResourceKind) {
        if self.tab != tab {
            self.tab = tab;
            self.selected = 0;
            self.column = 0;
            self.selector_focus = 0;
            self.search = SearchState {
                query: self.table().filter().search.clone(),
                ..SearchState::default()
            };
        }
    }

    pub fn cycle_tab(&mut self, forward: bool) {
        let tabs: Vec<ResourceKind> = ResourceKind::iter().collect();
        let index = tabs.iter().position(|kind| *kind == self.tab).unwrap_or(0);
        let next = if forward {
            (index + 1) % tabs.len()
        } else {
            (index + tabs.len() - 1) % tabs.len()
        };
        self.set_tab(tabs[next]);
    }

    pub fn set_status_message<S: Into<String>>(&mut self, message: Option<S>) {
        self.status_message = message.map(|text| StatusMessage {
            text: text.into(),
            level: StatusLevel::Info,
        });
    }

    pub fn set_success<S: Into<String>>(&mut self, message: S) {
        self.status_message = Some(StatusMessage {
            text: message.into(),
            level: StatusLevel::Success,
        });
    }

    pub fn set_error(&mut self, err: &Error) {
        self.status_message = Some(StatusMessage {
            text: err.summary(),
            level: StatusLevel::Error,
        });
    }

    pub fn status_message(&self) -> Option<&StatusMessage> {
        self.status_message.as_ref()
    }

    pub fn overlay(&self) -> Option<&OverlayState> {
        self.overlay.as_ref()
    }

    pub fn overlay_mut(&mut self) -> Option<&mut OverlayState> {
        self.overlay.as_mut()
    }

    pub fn close_overlay(&mut self) {
        self.overlay = None;
    }

    pub fn show_help(&mut self) {
        self.overlay = Some(OverlayState::Help);
    }

    // Selection and paging

    pub fn selected_key(&self) -> Option<EntityKey> {
        self.table().page_keys().get(self.selected).copied()
    }

    pub fn move_selection(&mut self, delta: isize) {
        let len = self.table().page_keys().len();
        if len == 0 {
            self.selected = 0;
            return;
        }
        let next = self.selected as isize + delta;
        self.selected = next.clamp(0, len as isize - 1) as usize;
    }

    pub fn move_column(&mut self, delta: isize) {
        let len = self.table().schema().columns().count();
        if len == 0 {
            return;
        }
        let next = self.column as isize + delta;
        self.column = next.clamp(0, len as isize - 1) as usize;
    }

    pub fn next_page(&mut self) {
        let count = self.snapshot().page_count;
        self.table_mut().filter_mut().next_page(count);
        self.selected = 0;
    }

    pub fn prev_page(&mut self) {
        let count = self.snapshot().page_count;
        self.table_mut().filter_mut().prev_page(count);
        self.selected = 0;
    }

    fn clamp_selection(&mut self) {
        let len = self.table().page_keys().len();
        self.selected = self.selected.min(len.saturating_sub(1));
    }

    // Filtering

    pub fn is_search_active(&self) -> bool {
        self.search.active
    }

    pub fn search_query(&self) -> &str {
        &self.table().filter().search
    }

    pub fn search_input(&self) -> &str {
        &self.search.query
    }

    pub fn begin_search(&mut self) {
        let current = self.table().filter().search.clone();
        self.search = SearchState {
            active: true,
            query: current.clone(),
            previous: current,
        };
    }

    pub fn push_search_char(&mut self, ch: char) {
        self.search.query.push(ch);
        self.apply_search();
    }

    pub fn pop_search_char(&mut self) {
        pop_grapheme(&mut self.search.query);
        self.apply_search();
    }

    pub fn finish_search(&mut self) {
        self.search.active = false;
    }

    pub fn cancel_search(&mut self) {
        self.search.query = std::mem::take(&mut self.search.previous);
        self.apply_search();
        self.search.active = false;
    }

    fn apply_search(&mut self) {
        let query = self.search.query.clone();
        self.table_mut().filter_mut().set_search(query);
        self.selected = 0;
    }

    /// Label of the selector `f` currently cycles.
    pub fn focused_selector(&self) -> Option<&'static str> {
        let selectors = self.table().schema().selectors;
        selectors
            .get(self.selector_focus % selectors.len().max(1))
            .map(|spec| spec.field)
    }

    pub fn cycle_selector(&mut self, forward: bool) {
        let Some(field) = self.focused_selector() else {
            self.set_status_message(Some("This table has no selectors"));
            return;
        };
        let options = self.table().selector_options(field);
        self.table_mut()
            .filter_mut()
            .cycle_selector(field, &options, forward);
        self.selected = 0;
    }

    pub fn focus_next_selector(&mut self) {
        let count = self.table().schema().selectors.len();
        if count > 0 {
            self.selector_focus = (self.selector_focus + 1) % count;
        }
    }

    pub fn cycle_quick_filter(&mut self) {
        if self.tab != ResourceKind::Inventory {
            self.set_status_message(Some("Stock filters apply to inventory only"));
            return;
        }
        let next = self.table().filter().quick.next();
        self.table_mut().filter_mut().set_quick(next);
        self.selected = 0;
    }

    pub fn sort_by_selected_column(&mut self) {
        let Some(field) = self.table().schema().columns().nth(self.column).map(|spec| spec.name)
        else {
            return;
        };
        self.table_mut().filter_mut().toggle_sort(field);
        self.selected = 0;
    }

    pub fn clear_filters(&mut self) {
        self.table_mut().filter_mut().clear();
        self.search = SearchState::default();
        self.selected = 0;
    }

    // Editing

    pub fn open_edit(&mut self) {
        let Some(key) = self.selected_key() else {
            return;
        };
        let Some(spec) = self.table().schema().columns().nth(self.column) else {
            return;
        };
        if !spec.editable {
            self.set_status_message(Some(format!("{} is read-only", spec.label)));
            return;
        }
        let input = self.table().edit_text(&key, spec.name).unwrap_or_default();
        let title = self.table().title_of(&key).unwrap_or_default();
        self.overlay = Some(OverlayState::EditField(EditFieldOverlay {
            key,
            field: spec.name,
            label: spec.label,
            title,
            input,
            choices: spec.choices,
            error: None,
        }));
    }

    /// Buffers the edit prompt's value. The prompt stays open on a parse error.
    pub fn submit_edit(&mut self) {
        let Some(OverlayState::EditField(edit)) = self.overlay.as_ref() else {
            return;
        };
        let (key, field, label, input) = (edit.key, edit.field, edit.label, edit.input.clone());
        match self.table_mut().edit(key, field, &input) {
            Ok(()) => {
                self.overlay = None;
                self.set_status_message(Some(format!("{label} changed; press s to save")));
            }
            Err(err) => {
                let summary = err.summary();
                if let Some(OverlayState::EditField(edit)) = self.overlay.as_mut() {
                    edit.error = Some(summary);
                }
            }
        }
    }

    pub fn discard_selected(&mut self) {
        let Some(key) = self.selected_key() else {
            return;
        };
        match self.table_mut().discard(&key) {
            Ok(()) => self.set_status_message(Some("Changes discarded")),
            Err(err) => self.set_error(&err),
        }
    }

    // Requests

    pub fn refresh_all(&mut self, dispatcher: &mut Dispatcher) {
        dispatcher.refresh::<InventoryItem>();
        dispatcher.refresh::<User>();
        dispatcher.refresh::<Car>();
        dispatcher.refresh::<LogEntry>();
        self.set_status_message(Some("Loading..."));
    }

    pub fn refresh(&mut self, dispatcher: &mut Dispatcher) {
        let this = dispatcher;
        with_entity!(self.tab, this.refresh());
        self.set_status_message(Some(format!("Refreshing {}...", self.tab)));
    }

    pub fn save_selected(&mut self, dispatcher: &mut Dispatcher) {
        let Some(key) = self.selected_key() else {
            return;
        };
        let this = self;
        with_entity!(this.tab, this.start_save(dispatcher, key));
    }

    /// Queues one partial update per dirty, idle row of the current tab.
    pub fn save_all(&mut self, dispatcher: &mut Dispatcher) {
        let keys = self.table().dirty_keys();
        if keys.is_empty() {
            self.set_status_message(Some("Nothing to save"));
            return;
        }
        let mut queued = 0;
        for key in keys {
            if self.table().phase_of(&key).is_busy() {
                continue;
            }
            let this = &mut *self;
            if with_entity!(this.tab, this.start_save(dispatcher, key)) {
                queued += 1;
            }
        }
        if queued > 0 {
            self.set_status_message(Some(format!("Saving {queued} row(s)...")));
        }
    }

    fn start_save<E: Tabbed>(&mut self, dispatcher: &mut Dispatcher, key: EntityKey) -> bool {
        match E::view_mut(&mut self.views).begin_save(key) {
            Ok(request) => {
                dispatcher.save::<E>(request);
                self.set_status_message(Some(format!("Saving {key}...")));
                true
            }
            Err(err) => {
                E::view_mut(&mut self.views).take_error();
                self.set_error(&err);
                false
            }
        }
    }

    pub fn request_delete(&mut self) {
        let Some(key) = self.selected_key() else {
            return;
        };
        if self.tab == ResourceKind::Logs {
            self.set_status_message(Some("Log entries cannot be deleted"));
            return;
        }
        let title = self.table().title_of(&key).unwrap_or_default();
        self.overlay = Some(OverlayState::ConfirmDelete(DeleteOverlay {
            kind: self.tab,
            key,
            title,
        }));
    }

    pub fn confirm_delete(&mut self, dispatcher: &mut Dispatcher) {
        let target = match self.overlay.take() {
            Some(OverlayState::ConfirmDelete(target)) => target,
            other => {
                self.overlay = other;
                return;
            }
        };
        let this = self;
        with_entity!(target.kind, this.start_delete(dispatcher, target.key));
    }

    fn start_delete<E: Tabbed>(&mut self, dispatcher: &mut Dispatcher, key: EntityKey) {
        match E::view_mut(&mut self.views).begin_delete(key) {
            Ok(id) => {
                dispatcher.delete::<E>(key, id);
                self.set_status_message(Some(format!("Deleting {key}...")));
            }
            Err(err) => {
                E::view_mut(&mut self.views).take_error();
                self.set_error(&err);
            }
        }
    }

    pub fn open_create(&mut self) {
        match FormOverlay::for_kind(self.tab) {
            Some(form) => self.overlay = Some(OverlayState::Create(form)),
            None => self.set_status_message(Some(format!("{} are read-only", self.tab))),
        }
    }

    /// Validates the create form and queues it. Invalid input keeps the form open.
    pub fn submit_form(&mut self, dispatcher: &mut Dispatcher) {
        let Some(OverlayState::Create(form)) = self.overlay.as_mut() else {
            return;
        };
        let queued = match form.kind {
            ResourceKind::Inventory => form.item_draft().map(|draft| {
                dispatcher.create_item(draft);
            }),
            ResourceKind::Users => form.user_draft().map(|draft| {
                dispatcher.create_user(draft);
            }),
            ResourceKind::Cars => form.car_draft().map(|draft| {
                dispatcher.add_cars(vec![draft]);
            }),
            ResourceKind::Logs => Err(Error::validation("log entries are read-only")),
        };
        match queued {
            Ok(()) => {
                let kind = form.kind;
                self.overlay = None;
                self.set_status_message(Some(format!("Creating {}...", kind.noun())));
            }
            Err(err) => form.error = Some(err.summary()),
        }
    }

    pub fn open_checkout(&mut self) {
        self.overlay = Some(OverlayState::Checkout(CheckoutOverlay::default()));
    }

    /// Resolves every part locally before anything is sent.
    pub fn submit_checkout(&mut self, dispatcher: &mut Dispatcher) {
        let Some(OverlayState::Checkout(checkout)) = self.overlay.as_mut() else {
            return;
        };
        match checkout.draft.resolve(
            self.views.users.collection(),
            self.views.inventory.collection(),
        ) {
            Ok(order) => {
                let parts = order.parts.len();
                dispatcher.checkout(order);
                self.overlay = None;
                self.set_status_message(Some(format!("Checking out {parts} part(s)...")));
            }
            Err(err) => checkout.error = Some(err.summary()),
        }
    }

    // Completions

    pub fn apply_completion(&mut self, completion: Completion, dispatcher: &mut Dispatcher) {
        let Completion { ticket, result } = completion;
        if ticket.op == Operation::Checkout {
            self.finish_checkout(result, dispatcher);
        } else {
            let this = &mut *self;
            with_entity!(ticket.kind, this.route(ticket, result));
        }
        self.clamp_selection();
    }

    fn finish_checkout(&mut self, result: Result<Payload>, dispatcher: &mut Dispatcher) {
        match result {
            Ok(Payload::Receipt(receipt)) => {
                self.set_success(format!(
                    "Checkout #{} recorded for {} with {} part(s)",
                    receipt.id,
                    receipt.vin,
                    receipt.parts.len()
                ));
                self.last_receipt = Some(receipt);
                // Stock levels changed on the server.
                dispatcher.refresh::<InventoryItem>();
            }
            Ok(other) => self.set_error(&Error::InvalidResponse(format!(
                "expected a checkout receipt, got {other:?}"
            ))),
            Err(err) => {
                tracing::warn!(error = %err, "checkout failed");
                self.set_error(&err);
            }
        }
    }

    fn route<E: Tabbed>(&mut self, ticket: Ticket, result: Result<Payload>) {
        // Deletes answer with no body; only the other operations carry rows.
        if let (Operation::Delete, Some(key)) = (ticket.op, ticket.key) {
            let outcome = result.map(|_| ());
            match &outcome {
                Ok(()) => self.set_success(format!("Deleted {key}")),
                Err(err) => self.set_error(err),
            }
            E::view_mut(&mut self.views).complete_delete(key, outcome);
            return;
        }
        let rows = result.and_then(E::from_payload);
        match (ticket.op, ticket.key) {
            (Operation::Refresh, _) => match rows {
                Ok(rows) => {
                    let view = E::view_mut(&mut self.views);
                    view.load(rows);
                    let count = view.collection().len();
                    if ticket.kind == self.tab {
                        self.set_status_message(Some(format!("Loaded {count} {}", E::KIND)));
                    }
                }
                Err(err) => {
                    E::view_mut(&mut self.views).fail(err.clone());
                    self.set_error(&err);
                }
            },
            (Operation::Save, Some(key)) => {
                let outcome = rows.and_then(|rows| {
                    rows.into_iter()
                        .next()
                        .ok_or_else(|| Error::InvalidResponse("empty save response".to_string()))
                });
                match &outcome {
                    Ok(entity) => self.set_success(format!("Saved {}", entity.title())),
                    Err(err) => self.set_error(err),
                }
                E::view_mut(&mut self.views).complete_save(key, outcome);
            }
            (Operation::Create, _) => match rows {
                Ok(rows) => {
                    let titles: Vec<String> = rows.iter().map(|row| row.title()).collect();
                    E::view_mut(&mut self.views).apply_created(rows);
                    self.set_success(format!("Created {}", titles.join(", ")));
                }
                Err(err) => self.set_error(&err),
            },
            (op, key) => tracing::debug!(?op, ?key, "dropping unroutable completion"),
        }
    }
}

/// Removes the last grapheme so combined characters go in one keystroke.
pub fn pop_grapheme(text: &mut String) {
    if let Some((index, _)) = text.grapheme_indices(true).next_back() {
        text.truncate(index);
    }
}
