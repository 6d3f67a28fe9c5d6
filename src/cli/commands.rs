use std::fmt::Write as _;
use std::io::{self, Read};

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use unicode_width::UnicodeWidthStr;

use crate::api::ApiClient;
use crate::app::table::{truncate, TableModel};
use crate::checkout::{self, CheckoutDraft, PartEntry};
use crate::model::{
    Car, CarDraft, Category, ChildPartDraft, Entity, InventoryItem, InventoryStats, ItemDraft,
    LogEntry, Role, User, UserDraft,
};
use crate::store::{Collection, EntityKey, ResourceView};
use crate::view::{FilterState, QuickFilter, SortDirection, SortState};

/// Search, sort and paging flags shared by every listing.
#[derive(Args, Debug, Clone, Default)]
pub struct ViewArgs {
    /// Case-insensitive text to look for in the searchable columns
    #[arg(long)]
    pub search: Option<String>,
    /// Field to sort by (e.g. name, quantity, username, scheduled_date)
    #[arg(long)]
    pub sort: Option<String>,
    /// Sort descending instead of ascending
    #[arg(long, requires = "sort")]
    pub desc: bool,
    /// Page to print, starting at 1
    #[arg(long, default_value_t = 1)]
    pub page: usize,
    /// Rows per page (defaults to view.page_size from the config)
    #[arg(long)]
    pub page_size: Option<usize>,
}

impl ViewArgs {
    fn filter(&self, default_page_size: usize) -> FilterState {
        let mut filter = FilterState::new(self.page_size.unwrap_or(default_page_size));
        if let Some(search) = &self.search {
            filter.set_search(search.clone());
        }
        filter.sort = self.sort.as_ref().map(|field| SortState {
            field: field.clone(),
            direction: if self.desc {
                SortDirection::Descending
            } else {
                SortDirection::Ascending
            },
        });
        filter.page = self.page.saturating_sub(1);
        filter
    }
}

#[derive(Args, Debug, Clone)]
pub struct SetArgs {
    /// Server id of the row
    pub id: i64,
    /// One or more field=value assignments
    #[arg(required = true)]
    pub assignments: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    /// Server id of the row
    pub id: i64,
}

#[derive(Args, Debug, Clone)]
pub struct ItemsArgs {
    #[command(subcommand)]
    pub command: ItemsCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ItemsCommand {
    /// List inventory items
    List(ItemListArgs),
    /// Create an item, optionally with child parts
    Add(ItemAddArgs),
    /// Update fields of an item
    Set(SetArgs),
    /// Delete an item
    Delete(DeleteArgs),
    /// Print the stock counters
    Stats,
}

#[derive(Args, Debug, Clone)]
pub struct ItemListArgs {
    #[command(flatten)]
    pub view: ViewArgs,
    /// Only items in this category
    #[arg(long)]
    pub category: Option<String>,
    /// Only items below their minimum stock
    #[arg(long, conflicts_with_all = ["empty", "with_parts"])]
    pub low_stock: bool,
    /// Only items with zero quantity
    #[arg(long, conflicts_with = "with_parts")]
    pub empty: bool,
    /// Only items that have child parts
    #[arg(long)]
    pub with_parts: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ItemAddArgs {
    /// Item name
    pub name: String,
    #[arg(long)]
    pub sku: String,
    /// Generated when omitted
    #[arg(long)]
    pub barcode: Option<String>,
    #[arg(long, default_value = "Production")]
    pub category: String,
    #[arg(long, default_value_t = 0)]
    pub quantity: i64,
    /// Minimum stock before the item counts as low
    #[arg(long, default_value_t = 0)]
    pub threshold: i64,
    /// Child part name; repeat for several parts
    #[arg(long = "part")]
    pub parts: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct UsersArgs {
    #[command(subcommand)]
    pub command: UsersCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum UsersCommand {
    /// List users
    List(UserListArgs),
    /// Create a user
    Add(UserAddArgs),
    /// Update fields of a user
    Set(SetArgs),
    /// Delete a user
    Delete(DeleteArgs),
}

#[derive(Args, Debug, Clone)]
pub struct UserListArgs {
    #[command(flatten)]
    pub view: ViewArgs,
    /// admin, supervisor or worker
    #[arg(long)]
    pub role: Option<String>,
    /// active or inactive
    #[arg(long)]
    pub status: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct UserAddArgs {
    pub username: String,
    #[arg(long, default_value = "worker")]
    pub role: String,
    /// Read from stdin when omitted
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct CarsArgs {
    #[command(subcommand)]
    pub command: CarsCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CarsCommand {
    /// List cars
    List(CarListArgs),
    /// Add one car from flags, or a batch from a JSON array on stdin
    Add(CarAddArgs),
    /// Update fields of a car, found by VIN
    Set(CarSetArgs),
    /// Delete a car, found by VIN
    Delete(CarDeleteArgs),
}

#[derive(Args, Debug, Clone)]
pub struct CarListArgs {
    #[command(flatten)]
    pub view: ViewArgs,
    /// not started yet, pending or completed
    #[arg(long)]
    pub status: Option<String>,
    #[arg(long)]
    pub model: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct CarAddArgs {
    /// Read a JSON array of cars from stdin
    #[arg(long, conflicts_with_all = ["vin", "model"])]
    pub stdin: bool,
    #[arg(long, required_unless_present = "stdin")]
    pub vin: Option<String>,
    #[arg(long, required_unless_present = "stdin")]
    pub model: Option<String>,
    #[arg(long)]
    pub adaptation: Option<String>,
    #[arg(long)]
    pub location: Option<String>,
    #[arg(long)]
    pub client: Option<String>,
    /// YYYY-MM-DD
    #[arg(long)]
    pub scheduled: Option<String>,
    /// YYYY-MM-DD
    #[arg(long)]
    pub ordered: Option<String>,
    #[arg(long)]
    pub status: Option<String>,
    #[arg(long)]
    pub comments: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct CarSetArgs {
    pub vin: String,
    #[arg(required = true)]
    pub assignments: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct CarDeleteArgs {
    pub vin: String,
}

#[derive(Args, Debug, Clone)]
pub struct LogsArgs {
    #[command(flatten)]
    pub view: ViewArgs,
    /// Only entries with this action
    #[arg(long)]
    pub action: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct CheckoutArgs {
    /// Badge code of the user taking the parts
    #[arg(long)]
    pub user: String,
    #[arg(long)]
    pub vin: String,
    #[arg(long = "order")]
    pub order_number: String,
    /// Barcode, name or SKU of a part; repeat for several parts
    #[arg(long = "part", required = true)]
    pub parts: Vec<String>,
    /// Parts (as given to --part) that were damaged
    #[arg(long)]
    pub damaged: Vec<String>,
    /// Reason recorded against damaged parts
    #[arg(long, default_value = "")]
    pub reason: String,
}

pub fn run_items(client: &ApiClient, page_size: usize, command: ItemsCommand) -> Result<String> {
    match command {
        ItemsCommand::List(args) => {
            let mut filter = args.view.filter(page_size);
            if let Some(category) = &args.category {
                filter.set_selector("category", category.clone());
            }
            filter.quick = if args.low_stock {
                QuickFilter::LowStock
            } else if args.empty {
                QuickFilter::EmptyStock
            } else if args.with_parts {
                QuickFilter::WithChildren
            } else {
                QuickFilter::All
            };
            list::<InventoryItem>(client, filter)
        }
        ItemsCommand::Add(args) => {
            let category: Category = args
                .category
                .parse()
                .map_err(|_| anyhow::anyhow!("unknown category '{}'", args.category))?;
            let draft = ItemDraft {
                name: args.name,
                sku: args.sku,
                barcode: args.barcode.unwrap_or_default(),
                quantity: args.quantity,
                threshold: args.threshold,
                category,
                child_parts: args
                    .parts
                    .into_iter()
                    .enumerate()
                    .map(|(index, name)| ChildPartDraft {
                        name,
                        ..ChildPartDraft::numbered(index)
                    })
                    .collect(),
            }
            .finalize()?;
            let item = client.create_item(&draft).context("creating item")?;
            let mut out = format!("Created item #{} {} ({})\n", item.id, item.name, item.barcode);
            for child in &item.children {
                let _ = writeln!(out, "  part #{} {} ({})", child.id, child.name, child.barcode);
            }
            Ok(out)
        }
        ItemsCommand::Set(args) => set(client, by_id::<InventoryItem>(args.id), &args.assignments),
        ItemsCommand::Delete(args) => delete(client, by_id::<InventoryItem>(args.id)),
        ItemsCommand::Stats => {
            let mut view = ResourceView::<InventoryItem>::new(page_size);
            view.refresh(client).context("loading inventory")?;
            let stats = InventoryStats::collect(view.collection().entities());
            Ok(format!(
                "Items:      {}\nLow stock:  {}\nWith parts: {}\nEmpty:      {}\n",
                stats.total, stats.low_stock, stats.with_children, stats.empty_stock
            ))
        }
    }
}

pub fn run_users(client: &ApiClient, page_size: usize, command: UsersCommand) -> Result<String> {
    match command {
        UsersCommand::List(args) => {
            let mut filter = args.view.filter(page_size);
            if let Some(role) = &args.role {
                filter.set_selector("role", role.to_lowercase());
            }
            if let Some(status) = &args.status {
                filter.set_selector("status", status.to_lowercase());
            }
            list::<User>(client, filter)
        }
        UsersCommand::Add(args) => {
            let role: Role = args
                .role
                .to_lowercase()
                .parse()
                .map_err(|_| anyhow::anyhow!("unknown role '{}'", args.role))?;
            let password = match args.password {
                Some(password) => password,
                None => read_stdin()?
                    .map(|text| text.trim_end_matches(['\r', '\n']).to_string())
                    .unwrap_or_default(),
            };
            let draft = UserDraft {
                username: args.username,
                role,
                password,
            };
            let user = client.create_user(&draft).context("creating user")?;
            Ok(format!("Created user #{} {} ({})\n", user.id, user.username, user.role))
        }
        UsersCommand::Set(args) => set(client, by_id::<User>(args.id), &args.assignments),
        UsersCommand::Delete(args) => delete(client, by_id::<User>(args.id)),
    }
}

pub fn run_cars(client: &ApiClient, page_size: usize, command: CarsCommand) -> Result<String> {
    match command {
        CarsCommand::List(args) => {
            let mut filter = args.view.filter(page_size);
            if let Some(status) = &args.status {
                filter.set_selector("status", status.clone());
            }
            if let Some(model) = &args.model {
                filter.set_selector("model", model.clone());
            }
            list::<Car>(client, filter)
        }
        CarsCommand::Add(args) => {
            let drafts = if args.stdin {
                let Some(raw) = read_stdin()? else {
                    bail!("--stdin expects a JSON array piped in");
                };
                parse_car_batch(&raw)?
            } else {
                vec![car_from_flags(args)?]
            };
            let cars = client.add_cars(&drafts).context("adding cars")?;
            let mut out = format!("Added {} car(s)\n", cars.len());
            for car in &cars {
                let _ = writeln!(out, "  {} {} [{}]", car.vin, car.model, car.status);
            }
            Ok(out)
        }
        CarsCommand::Set(args) => set(client, by_vin(&args.vin), &args.assignments),
        CarsCommand::Delete(args) => delete(client, by_vin(&args.vin)),
    }
}

pub fn run_logs(client: &ApiClient, page_size: usize, args: LogsArgs) -> Result<String> {
    let mut filter = args.view.filter(page_size);
    if let Some(action) = &args.action {
        filter.set_selector("action", action.clone());
    }
    list::<LogEntry>(client, filter)
}

pub fn run_checkout(client: &ApiClient, args: CheckoutArgs) -> Result<String> {
    let mut users = Collection::new();
    users.load(client.list::<User>().context("loading users")?);
    let mut inventory = Collection::new();
    inventory.load(client.list::<InventoryItem>().context("loading inventory")?);

    let draft = CheckoutDraft {
        user_code: args.user,
        vin: args.vin,
        order_number: args.order_number,
        parts: args
            .parts
            .iter()
            .map(|value| {
                let damaged = args.damaged.iter().any(|damaged| damaged == value);
                PartEntry {
                    value: value.clone(),
                    damaged,
                    edit_reason: if damaged { args.reason.clone() } else { String::new() },
                }
            })
            .collect(),
    };
    let receipt = checkout::submit(client, &draft, &users, &inventory)?;
    let mut out = format!(
        "Checkout #{} for {} (order {})\n",
        receipt.id, receipt.vin, receipt.order_number
    );
    for line in &receipt.parts {
        let damaged = if line.damaged { "  [damaged]" } else { "" };
        let _ = writeln!(out, "  {} {}{damaged}", line.part_barcode, line.part_name);
    }
    Ok(out)
}

fn list<E: Entity>(client: &ApiClient, filter: FilterState) -> Result<String> {
    let mut view = ResourceView::<E>::new(filter.page_size);
    view.refresh(client)
        .with_context(|| format!("loading {}", E::KIND))?;
    view.filter = filter;
    Ok(format_table(&view))
}

fn set<E: Entity>(
    client: &ApiClient,
    locate: impl Fn(&Collection<E>) -> Result<EntityKey>,
    assignments: &[String],
) -> Result<String> {
    let mut view = ResourceView::<E>::new(1);
    view.refresh(client)
        .with_context(|| format!("loading {}", E::KIND))?;
    let key = locate(view.collection())?;
    for assignment in assignments {
        let Some((field, value)) = assignment.split_once('=') else {
            bail!("expected field=value, got '{assignment}'");
        };
        view.edit(key, field.trim(), value)?;
    }
    view.save(client, key)?;
    let title = view
        .collection()
        .get(&key)
        .map(|entity| entity.title())
        .unwrap_or_default();
    Ok(format!("Saved {} {key} {title}\n", E::KIND.noun()))
}

fn delete<E: Entity>(
    client: &ApiClient,
    locate: impl Fn(&Collection<E>) -> Result<EntityKey>,
) -> Result<String> {
    let mut view = ResourceView::<E>::new(1);
    view.refresh(client)
        .with_context(|| format!("loading {}", E::KIND))?;
    let key = locate(view.collection())?;
    let title = view
        .collection()
        .get(&key)
        .map(|entity| entity.title())
        .unwrap_or_default();
    view.delete(client, key)?;
    Ok(format!("Deleted {} {key} {title}\n", E::KIND.noun()))
}

fn by_id<E: Entity>(id: i64) -> impl Fn(&Collection<E>) -> Result<EntityKey> {
    move |collection| {
        let key = EntityKey::Server(id);
        if !collection.contains(&key) {
            bail!("no {} with id {id}", E::KIND.noun());
        }
        Ok(key)
    }
}

fn by_vin(vin: &str) -> impl Fn(&Collection<Car>) -> Result<EntityKey> + '_ {
    move |cars| match cars.find(|car| car.vin.eq_ignore_ascii_case(vin)) {
        Some(row) => Ok(row.key),
        None => bail!("no car with VIN '{vin}'"),
    }
}

fn car_from_flags(args: CarAddArgs) -> Result<CarDraft> {
    let draft = CarDraft {
        vin: args.vin.unwrap_or_default(),
        model: args.model.unwrap_or_default(),
        adaptation: args.adaptation,
        scheduled_date: args.scheduled,
        order_date: args.ordered,
        location: args.location,
        client_name: args.client,
        dealers_comments: args.comments,
        status: args.status,
    };
    Ok(draft.finalize()?)
}

fn parse_car_batch(raw: &str) -> Result<Vec<CarDraft>> {
    let drafts: Vec<CarDraft> =
        serde_json::from_str(raw).context("parsing car batch (expected a JSON array)")?;
    if drafts.is_empty() {
        bail!("car batch is empty");
    }
    drafts
        .into_iter()
        .enumerate()
        .map(|(index, draft)| {
            draft
                .finalize()
                .with_context(|| format!("car #{} in batch", index + 1))
        })
        .collect()
}

/// Plain-text rendering of the current page; write-only columns are left out.
pub fn format_table(table: &dyn TableModel) -> String {
    let snapshot = table.snapshot();
    if snapshot.rows.is_empty() {
        return format!("No matching rows ({} loaded).\n", snapshot.loaded);
    }
    let visible: Vec<usize> = snapshot
        .columns
        .iter()
        .enumerate()
        .filter(|(_, spec)| !spec.secret)
        .map(|(index, _)| index)
        .collect();

    let mut out = String::new();
    let header: Vec<String> = visible
        .iter()
        .map(|&index| {
            let spec = snapshot.columns[index];
            pad(spec.label, spec.width as usize)
        })
        .collect();
    let _ = writeln!(out, "{}", header.join("  ").trim_end());
    for row in &snapshot.rows {
        let cells: Vec<String> = visible
            .iter()
            .map(|&index| {
                let width = snapshot.columns[index].width as usize;
                pad(&truncate(&row.cells[index], width), width)
            })
            .collect();
        let _ = writeln!(out, "{}", cells.join("  ").trim_end());
    }
    let _ = writeln!(
        out,
        "-- page {}/{} · {} of {} rows",
        snapshot.page + 1,
        snapshot.page_count,
        snapshot.total,
        snapshot.loaded
    );
    out
}

fn pad(text: &str, width: usize) -> String {
    let fill = width.saturating_sub(text.width());
    format!("{text}{}", " ".repeat(fill))
}

fn read_stdin() -> Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .context("reading stdin")?;
    Ok(Some(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::ScriptedTransport;
    use crate::api::HttpMethod;
    use crate::error::Error;
    use crate::model::{car, item, user};
    use assert_matches::assert_matches;
    use serde_json::json;

    fn users_json() -> serde_json::Value {
        json!([user::sample(1, "ana", "worker", true), user::sample(2, "bo", "admin", false)])
    }

    fn view(search: Option<&str>) -> ViewArgs {
        ViewArgs {
            search: search.map(str::to_string),
            page: 1,
            ..ViewArgs::default()
        }
    }

    #[test]
    fn users_list_renders_filtered_table() {
        let transport = ScriptedTransport::new();
        transport.push_ok(users_json());
        let output = run_users(
            &transport.client(),
            10,
            UsersCommand::List(UserListArgs {
                view: view(None),
                role: Some("Worker".into()),
                status: None,
            }),
        )
        .unwrap();
        insta::assert_snapshot!(output, @r"
        ID     Username            Full name             Role         Badge     Active
        1      ana                                       worker       U00001    yes
        -- page 1/1 · 1 of 2 rows
        ");
    }

    #[test]
    fn items_list_applies_quick_filter_and_sort() {
        let transport = ScriptedTransport::new();
        transport.push_ok(json!([
            item::sample(1, "Bolt", 5, 10),
            item::sample(2, "Axle", 1, 4),
            item::sample(3, "Cam", 9, 1)
        ]));
        let mut args = view(None);
        args.sort = Some("name".into());
        args.desc = true;
        let output = run_items(
            &transport.client(),
            10,
            ItemsCommand::List(ItemListArgs {
                view: args,
                category: None,
                low_stock: true,
                empty: false,
                with_parts: false,
            }),
        )
        .unwrap();
        let names: Vec<&str> = output
            .lines()
            .skip(1)
            .filter_map(|line| line.split_whitespace().nth(1))
            .collect();
        assert_eq!(names, vec!["Bolt", "Axle", "page"]);
        assert!(output.ends_with("-- page 1/1 · 2 of 3 rows\n"));
    }

    #[test]
    fn set_sends_partial_update() {
        let transport = ScriptedTransport::new();
        transport.push_ok(json!([item::sample(1, "Bolt", 5, 10)]));
        transport.push_ok(serde_json::to_value(item::sample(1, "Bolt", 15, 10)).unwrap());
        let output = run_items(
            &transport.client(),
            10,
            ItemsCommand::Set(SetArgs {
                id: 1,
                assignments: vec!["quantity=15".into()],
            }),
        )
        .unwrap();
        assert_eq!(output, "Saved item #1 Bolt\n");

        let requests = transport.requests();
        assert_eq!(requests[1].method, HttpMethod::Put);
        assert_eq!(requests[1].body, Some(json!({"quantity": 15})));
    }

    #[test]
    fn set_rejects_malformed_assignment_before_sending() {
        let transport = ScriptedTransport::new();
        transport.push_ok(json!([item::sample(1, "Bolt", 5, 10)]));
        let result = run_items(
            &transport.client(),
            10,
            ItemsCommand::Set(SetArgs {
                id: 1,
                assignments: vec!["quantity".into()],
            }),
        );
        assert!(result.is_err());
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn failed_delete_surfaces_server_message() {
        let transport = ScriptedTransport::new();
        transport.push_ok(users_json());
        transport.push_err(Error::Rejected {
            status: 403,
            message: "cannot delete yourself".into(),
        });
        let err = run_users(&transport.client(), 10, UsersCommand::Delete(DeleteArgs { id: 2 }))
            .unwrap_err();
        assert_matches!(err.downcast_ref::<Error>(), Some(Error::Rejected { status: 403, .. }));
    }

    #[test]
    fn checkout_marks_damaged_parts() {
        let transport = ScriptedTransport::new();
        transport.push_ok(users_json());
        transport.push_ok(json!([item::sample(1, "Bolt", 5, 10)]));
        transport.push_ok(json!({
            "id": 9, "vin": "WVW1", "order_number": "A-1",
            "parts": [{"part_name": "Bolt", "part_barcode": "BC1", "damaged": true}]
        }));
        let output = run_checkout(
            &transport.client(),
            CheckoutArgs {
                user: "U00001".into(),
                vin: "WVW1".into(),
                order_number: "A-1".into(),
                parts: vec!["bolt".into()],
                damaged: vec!["bolt".into()],
                reason: "dropped".into(),
            },
        )
        .unwrap();
        assert_eq!(output, "Checkout #9 for WVW1 (order A-1)\n  BC1 Bolt  [damaged]\n");
        let body = transport.requests()[2].body.clone().unwrap();
        assert_eq!(body["parts"][0], json!({"part": "BC1", "damaged": true, "edit_reason": "dropped"}));
    }

    #[test]
    fn cars_without_server_id_cannot_be_deleted() {
        let transport = ScriptedTransport::new();
        transport.push_ok(json!([car::sample("WVW1", "Golf", "pending")]));
        let err = run_cars(
            &transport.client(),
            10,
            CarsCommand::Delete(CarDeleteArgs { vin: "wvw1".into() }),
        )
        .unwrap_err();
        assert_matches!(err.downcast_ref::<Error>(), Some(Error::Validation(_)));
        assert_eq!(transport.requests().len(), 1);

        transport.push_ok(json!([]));
        let err = run_cars(
            &transport.client(),
            10,
            CarsCommand::Delete(CarDeleteArgs { vin: "WVW1".into() }),
        )
        .unwrap_err();
        assert!(err.to_string().contains("no car with VIN"));
    }

    #[test]
    fn car_batch_must_be_a_valid_array() {
        assert!(parse_car_batch("{}").is_err());
        assert!(parse_car_batch("[]").is_err());
        assert!(parse_car_batch(r#"[{"vin": "", "model": "Golf"}]"#).is_err());
        let drafts = parse_car_batch(r#"[{"vin": "WVW1", "model": "Golf", "location": ""}]"#).unwrap();
        assert_eq!(drafts[0].location, None);
    }
}
