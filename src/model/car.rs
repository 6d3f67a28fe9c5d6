use serde::{Deserialize, Serialize};
use serde_with::{serde_as, NoneAsEmptyString};

use crate::error::{Error, Result};
use crate::model::schema::{FieldSpec, Schema, SelectorSource, SelectorSpec};
use crate::model::value::{FieldKind, FieldValue};
use crate::model::{Entity, ResourceKind};

pub const CAR_STATUSES: &[&str] = &["not started yet", "pending", "completed"];

static FIELDS: &[FieldSpec] = &[
    FieldSpec::column("vin", "VIN", FieldKind::Text, 18),
    FieldSpec::column("model", "Model", FieldKind::Text, 14),
    FieldSpec::column("adaptation", "Adaptation", FieldKind::Text, 14),
    FieldSpec::column("location", "Location", FieldKind::Text, 12),
    FieldSpec::column("client_name", "Client", FieldKind::Text, 14),
    FieldSpec::column("scheduled_date", "Scheduled", FieldKind::Date, 10),
    FieldSpec::column("order_date", "Ordered", FieldKind::Date, 10),
    FieldSpec::column("status", "Status", FieldKind::Text, 15).with_choices(CAR_STATUSES),
    FieldSpec::column("dealers_comments", "Comments", FieldKind::Text, 20),
];

static SCHEMA: Schema = Schema {
    fields: FIELDS,
    searchable: &["vin", "model", "client_name", "location"],
    selectors: &[
        SelectorSpec {
            field: "status",
            label: "Status",
            source: SelectorSource::Fixed(CAR_STATUSES),
        },
        SelectorSpec {
            field: "model",
            label: "Model",
            source: SelectorSource::Distinct,
        },
    ],
};

fn default_status() -> String {
    CAR_STATUSES[0].to_string()
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Car {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub vin: String,
    #[serde(default)]
    pub model: String,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub adaptation: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub scheduled_date: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub order_date: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub location: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub dealers_comments: Option<String>,
    #[serde(default = "default_status")]
    pub status: String,
}

impl Entity for Car {
    const KIND: ResourceKind = ResourceKind::Cars;

    fn schema() -> &'static Schema {
        &SCHEMA
    }

    fn server_id(&self) -> Option<i64> {
        self.id
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "id" => self.id.map(FieldValue::Number).unwrap_or(FieldValue::Null),
            "vin" => FieldValue::text(&self.vin),
            "model" => FieldValue::text(&self.model),
            "adaptation" => FieldValue::optional_text(self.adaptation.as_deref()),
            "scheduled_date" => FieldValue::optional_date(self.scheduled_date.as_deref()),
            "order_date" => FieldValue::optional_date(self.order_date.as_deref()),
            "location" => FieldValue::optional_text(self.location.as_deref()),
            "client_name" => FieldValue::optional_text(self.client_name.as_deref()),
            "dealers_comments" => FieldValue::optional_text(self.dealers_comments.as_deref()),
            "status" => FieldValue::text(&self.status),
            _ => FieldValue::Null,
        }
    }

    fn title(&self) -> String {
        format!("{} {}", self.model, self.vin)
    }
}

/// One element of the `POST /api/cars/manual_add/` batch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CarDraft {
    pub vin: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adaptation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dealers_comments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl CarDraft {
    /// Normalises blank optionals to `None` and checks the fields the server
    /// insists on.
    pub fn finalize(mut self) -> Result<Self> {
        if self.vin.trim().is_empty() {
            return Err(Error::validation("VIN is required"));
        }
        if self.model.trim().is_empty() {
            return Err(Error::validation("model is required"));
        }
        for slot in [
            &mut self.adaptation,
            &mut self.scheduled_date,
            &mut self.order_date,
            &mut self.location,
            &mut self.client_name,
            &mut self.dealers_comments,
            &mut self.status,
        ] {
            if slot.as_deref().is_some_and(|text| text.trim().is_empty()) {
                *slot = None;
            }
        }
        for date in [&self.scheduled_date, &self.order_date].into_iter().flatten() {
            FieldKind::Date.parse(date)?;
        }
        if let Some(status) = &self.status {
            if !CAR_STATUSES.contains(&status.as_str()) {
                return Err(Error::validation(format!("unknown car status '{status}'")));
            }
        }
        Ok(self)
    }
}

#[cfg(test)]
pub(crate) fn sample(vin: &str, model: &str, status: &str) -> Car {
    Car {
        id: None,
        vin: vin.to_string(),
        model: model.to_string(),
        adaptation: None,
        scheduled_date: None,
        order_date: None,
        location: None,
        client_name: None,
        dealers_comments: None,
        status: status.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn empty_strings_and_nulls_decode_as_missing() {
        let car: Car = serde_json::from_value(json!({
            "vin": "WVW123",
            "model": "Golf",
            "adaptation": "",
            "scheduled_date": null,
            "order_date": "2024-05-01",
            "status": "from_upcoming"
        }))
        .unwrap();
        assert_eq!(car.server_id(), None);
        assert_eq!(car.field("adaptation"), FieldValue::Null);
        assert_eq!(car.field("scheduled_date"), FieldValue::Null);
        assert_eq!(car.field("order_date"), FieldValue::Date("2024-05-01".into()));
        assert_eq!(car.status, "from_upcoming");
    }

    #[test]
    fn draft_checks_required_fields_and_dates() {
        assert_matches!(CarDraft::default().finalize(), Err(Error::Validation(_)));

        let bad_date = CarDraft {
            vin: "V1".into(),
            model: "Polo".into(),
            order_date: Some("tomorrow".into()),
            ..CarDraft::default()
        };
        assert_matches!(bad_date.finalize(), Err(Error::Validation(_)));

        let draft = CarDraft {
            vin: "V1".into(),
            model: "Polo".into(),
            location: Some("  ".into()),
            ..CarDraft::default()
        }
        .finalize()
        .unwrap();
        assert_eq!(draft.location, None);
        assert_eq!(
            serde_json::to_value(&draft).unwrap(),
            json!({"vin": "V1", "model": "Polo"})
        );
    }
}
