//! REST plumbing for the StockOverflow backend: the endpoint table, request
//! construction and response decoding.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::model::{Car, ResourceKind};

pub mod client;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{ApiClient, HttpTransport, Transport};
pub use worker::{Carried, Completion, Operation, Payload, RequestWorker, Ticket};

pub const CHECKOUT_PATH: &str = "/api/checkout/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    /// Path below the base URL, always with a trailing slash.
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            body: None,
        }
    }

    pub fn with_body(method: HttpMethod, path: impl Into<String>, body: Value) -> Self {
        Self {
            method,
            path: path.into(),
            body: Some(body),
        }
    }
}

/// Routes for one resource. `None` marks an operation the server does not
/// offer for it.
#[derive(Debug, Clone, Copy)]
pub struct Endpoint {
    pub collection: &'static str,
    pub create: Option<&'static str>,
    pub update: Option<HttpMethod>,
    pub delete: bool,
}

impl Endpoint {
    pub fn for_kind(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Inventory => Endpoint {
                collection: "/api/inventory/",
                create: Some("/api/inventory/"),
                update: Some(HttpMethod::Put),
                delete: true,
            },
            ResourceKind::Users => Endpoint {
                collection: "/api/users/",
                create: Some("/api/users/"),
                update: Some(HttpMethod::Put),
                delete: true,
            },
            ResourceKind::Cars => Endpoint {
                collection: "/api/cars/",
                create: Some("/api/cars/manual_add/"),
                update: Some(HttpMethod::Patch),
                delete: true,
            },
            ResourceKind::Logs => Endpoint {
                collection: "/api/logs/",
                create: None,
                update: None,
                delete: false,
            },
        }
    }

    pub fn member(&self, id: i64) -> String {
        format!("{}{id}/", self.collection)
    }
}

pub fn list_request(kind: ResourceKind) -> ApiRequest {
    ApiRequest::get(Endpoint::for_kind(kind).collection)
}

pub fn create_request(kind: ResourceKind, body: Value) -> Result<ApiRequest> {
    let path = Endpoint::for_kind(kind)
        .create
        .ok_or_else(|| Error::validation(format!("{kind} cannot be created")))?;
    Ok(ApiRequest::with_body(HttpMethod::Post, path, body))
}

pub fn update_request(kind: ResourceKind, id: i64, body: Value) -> Result<ApiRequest> {
    let endpoint = Endpoint::for_kind(kind);
    let method = endpoint
        .update
        .ok_or_else(|| Error::validation(format!("{kind} are read-only")))?;
    Ok(ApiRequest::with_body(method, endpoint.member(id), body))
}

pub fn delete_request(kind: ResourceKind, id: i64) -> Result<ApiRequest> {
    let endpoint = Endpoint::for_kind(kind);
    if !endpoint.delete {
        return Err(Error::validation(format!("{kind} cannot be deleted")));
    }
    Ok(ApiRequest {
        method: HttpMethod::Delete,
        path: endpoint.member(id),
        body: None,
    })
}

pub fn decode<T: DeserializeOwned>(body: Option<Value>) -> Result<T> {
    let value = body.ok_or_else(|| Error::InvalidResponse("empty response body".to_string()))?;
    serde_json::from_value(value).map_err(|err| Error::InvalidResponse(err.to_string()))
}

/// Decodes a list body, accepting either a bare array or a paginated
/// `{"results": [...]}` envelope.
pub fn decode_list<T: DeserializeOwned>(body: Option<Value>) -> Result<Vec<T>> {
    match body {
        Some(Value::Object(mut map)) if map.contains_key("results") => {
            decode(map.remove("results"))
        }
        other => decode(other),
    }
}

#[derive(Debug, Deserialize)]
struct CarBatchResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    cars: Vec<Car>,
}

/// Cars accepted by the batch endpoint, plus the server's summary line.
pub fn decode_car_batch(body: Option<Value>) -> Result<(Vec<Car>, Option<String>)> {
    let response: CarBatchResponse = decode(body)?;
    Ok((response.cars, response.message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn endpoint_table_matches_backend_routes() {
        let update = update_request(ResourceKind::Cars, 4, json!({"status": "pending"})).unwrap();
        assert_eq!(update.method, HttpMethod::Patch);
        assert_eq!(update.path, "/api/cars/4/");

        let update = update_request(ResourceKind::Users, 2, json!({})).unwrap();
        assert_eq!(update.method, HttpMethod::Put);
        assert_eq!(update.path, "/api/users/2/");

        let create = create_request(ResourceKind::Cars, json!([])).unwrap();
        assert_eq!(create.path, "/api/cars/manual_add/");

        assert_eq!(list_request(ResourceKind::Logs).path, "/api/logs/");
        assert_matches!(delete_request(ResourceKind::Logs, 1), Err(Error::Validation(_)));
        assert_matches!(update_request(ResourceKind::Logs, 1, json!({})), Err(Error::Validation(_)));
    }

    #[test]
    fn decode_list_accepts_paginated_envelope() {
        let rows: Vec<Value> = decode_list(Some(json!({"count": 1, "results": [{"a": 1}]}))).unwrap();
        assert_eq!(rows.len(), 1);
        let rows: Vec<Value> = decode_list(Some(json!([1, 2]))).unwrap();
        assert_eq!(rows.len(), 2);
        assert_matches!(decode_list::<Value>(None), Err(Error::InvalidResponse(_)));
    }

    #[test]
    fn decodes_car_batch_response() {
        let (cars, message) = decode_car_batch(Some(json!({
            "message": "Bulk upload successful!",
            "cars": [{"vin": "V1", "model": "Golf", "status": "pending"}]
        })))
        .unwrap();
        assert_eq!(cars.len(), 1);
        assert_eq!(message.as_deref(), Some("Bulk upload successful!"));
    }
}
