//! Parts checkout against a car order. Every part is resolved against the
//! local inventory before anything is sent.

use serde::{Deserialize, Serialize};

use crate::api::ApiClient;
use crate::error::{Error, Result};
use crate::model::{InventoryItem, User};
use crate::store::Collection;

/// One scanned or typed part line on the checkout form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartEntry {
    /// Barcode, part name (any case) or SKU.
    pub value: String,
    pub damaged: bool,
    pub edit_reason: String,
}

impl PartEntry {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutDraft {
    pub user_code: String,
    pub vin: String,
    pub order_number: String,
    pub parts: Vec<PartEntry>,
}

impl Default for CheckoutDraft {
    fn default() -> Self {
        Self {
            user_code: String::new(),
            vin: String::new(),
            order_number: String::new(),
            parts: vec![PartEntry::default()],
        }
    }
}

/// Body for `POST /api/checkout/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutOrder {
    /// The user's badge code, not their numeric id.
    pub user: String,
    pub vin: String,
    pub order_number: String,
    pub parts: Vec<CheckoutLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutLine {
    /// Barcode of the resolved inventory item.
    pub part: String,
    pub damaged: bool,
    pub edit_reason: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CheckoutReceipt {
    pub id: i64,
    #[serde(default)]
    pub user_unique_id: String,
    #[serde(default)]
    pub vin: String,
    #[serde(default)]
    pub order_number: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub parts: Vec<ReceiptLine>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReceiptLine {
    #[serde(default)]
    pub part_name: String,
    #[serde(default)]
    pub part_barcode: String,
    #[serde(default)]
    pub damaged: bool,
}

impl CheckoutDraft {
    pub fn add_part(&mut self) {
        self.parts.push(PartEntry::default());
    }

    /// Removes a part line, always leaving one empty line to type into.
    pub fn remove_part(&mut self, index: usize) {
        if index < self.parts.len() {
            self.parts.remove(index);
        }
        if self.parts.is_empty() {
            self.parts.push(PartEntry::default());
        }
    }

    /// Turns the form into a request body or explains why it cannot be sent.
    pub fn resolve(
        &self,
        users: &Collection<User>,
        inventory: &Collection<InventoryItem>,
    ) -> Result<CheckoutOrder> {
        let code = self.user_code.trim();
        let user = users
            .find(|user| !user.unique_id.is_empty() && user.unique_id.eq_ignore_ascii_case(code))
            .ok_or_else(|| Error::validation(format!("invalid user code '{code}'")))?;
        if self.vin.trim().is_empty() {
            return Err(Error::validation("VIN is required"));
        }
        if self.order_number.trim().is_empty() {
            return Err(Error::validation("order number is required"));
        }

        let mut lines = Vec::new();
        for entry in &self.parts {
            let value = entry.value.trim();
            if value.is_empty() {
                continue;
            }
            let item = find_part(inventory, value)
                .ok_or_else(|| Error::validation(format!("part '{value}' not found")))?;
            lines.push(CheckoutLine {
                part: item.barcode.clone(),
                damaged: entry.damaged,
                edit_reason: entry.edit_reason.trim().to_string(),
            });
        }
        if lines.is_empty() {
            return Err(Error::validation("add at least one part"));
        }

        Ok(CheckoutOrder {
            user: user.entity.unique_id.clone(),
            vin: self.vin.trim().to_string(),
            order_number: self.order_number.trim().to_string(),
            parts: lines,
        })
    }
}

/// First item whose barcode, case-folded name or SKU equals `value`.
pub fn find_part<'a>(inventory: &'a Collection<InventoryItem>, value: &str) -> Option<&'a InventoryItem> {
    let lowered = value.to_lowercase();
    inventory
        .find(|item| item.barcode == value || item.name.to_lowercase() == lowered || item.sku == value)
        .map(|row| &row.entity)
}

/// Resolves and sends a checkout. Nothing is sent when resolution fails.
pub fn submit(
    client: &ApiClient,
    draft: &CheckoutDraft,
    users: &Collection<User>,
    inventory: &Collection<InventoryItem>,
) -> Result<CheckoutReceipt> {
    let order = draft.resolve(users, inventory)?;
    tracing::info!(vin = %order.vin, parts = order.parts.len(), "submitting checkout");
    client.checkout(&order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::ScriptedTransport;
    use crate::api::HttpMethod;
    use crate::model::{item, user};
    use assert_matches::assert_matches;
    use serde_json::json;

    fn fixtures() -> (Collection<User>, Collection<InventoryItem>) {
        let mut users = Collection::new();
        users.load(vec![user::sample(1, "ana", "worker", true)]);
        let mut inventory = Collection::new();
        let mut bolt = item::sample(10, "Hex Bolt", 4, 1);
        bolt.barcode = "BAR100".into();
        bolt.sku = "HB-1".into();
        inventory.load(vec![bolt, item::sample(11, "Nut", 9, 1)]);
        (users, inventory)
    }

    fn draft(parts: &[&str]) -> CheckoutDraft {
        CheckoutDraft {
            user_code: "u00001".into(),
            vin: " WVW1 ".into(),
            order_number: "ORD-9".into(),
            parts: parts.iter().map(|value| PartEntry::new(*value)).collect(),
        }
    }

    #[test]
    fn resolves_parts_by_barcode_name_or_sku() {
        let (users, inventory) = fixtures();
        let mut form = draft(&["BAR100", "hex bolt", "", "HB-1"]);
        form.parts[1].damaged = true;
        let order = form.resolve(&users, &inventory).unwrap();

        assert_eq!(order.user, "U00001");
        assert_eq!(order.vin, "WVW1");
        assert_eq!(order.parts.len(), 3);
        assert!(order.parts.iter().all(|line| line.part == "BAR100"));
        assert!(order.parts[1].damaged);
        assert_eq!(
            serde_json::to_value(&order.parts[0]).unwrap(),
            json!({"part": "BAR100", "damaged": false, "edit_reason": ""})
        );
    }

    #[test]
    fn unknown_part_aborts_without_request() {
        let (users, inventory) = fixtures();
        let transport = ScriptedTransport::new();
        let client = transport.client();

        let result = submit(&client, &draft(&["BAR100", "Flux capacitor"]), &users, &inventory);
        assert_matches!(result, Err(Error::Validation(message)) if message.contains("Flux capacitor"));
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn unknown_user_and_blank_fields_abort() {
        let (users, inventory) = fixtures();
        let mut form = draft(&["Nut"]);
        form.user_code = "NOPE".into();
        assert_matches!(form.resolve(&users, &inventory), Err(Error::Validation(_)));

        let mut form = draft(&["Nut"]);
        form.order_number = "  ".into();
        assert_matches!(form.resolve(&users, &inventory), Err(Error::Validation(_)));

        assert_matches!(draft(&["", " "]).resolve(&users, &inventory), Err(Error::Validation(_)));
    }

    #[test]
    fn submit_posts_order_and_decodes_receipt() {
        let (users, inventory) = fixtures();
        let transport = ScriptedTransport::new();
        transport.push_ok(json!({
            "id": 5, "user": 1, "user_unique_id": "U00001", "vin": "WVW1",
            "order_number": "ORD-9", "created_at": "2024-05-01T10:00:00Z",
            "parts": [{"id": 1, "part": 10, "part_name": "Hex Bolt",
                       "part_barcode": "BAR100", "damaged": false, "edit_reason": "", "edited_by": null}]
        }));
        let client = transport.client();

        let receipt = submit(&client, &draft(&["BAR100"]), &users, &inventory).unwrap();
        assert_eq!(receipt.id, 5);
        assert_eq!(receipt.parts[0].part_name, "Hex Bolt");

        let requests = transport.requests();
        assert_eq!(requests[0].method, HttpMethod::Post);
        assert_eq!(requests[0].path, "/api/checkout/");
        assert_eq!(requests[0].body.as_ref().unwrap()["user"], "U00001");
    }

    #[test]
    fn remove_part_keeps_one_line() {
        let mut form = CheckoutDraft::default();
        form.add_part();
        form.remove_part(0);
        form.remove_part(0);
        assert_eq!(form.parts, vec![PartEntry::default()]);
    }
}
