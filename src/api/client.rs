use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use reqwest::Method;
use serde_json::Value;

use crate::api::{
    create_request, decode, decode_car_batch, decode_list, delete_request, list_request,
    update_request, ApiRequest, HttpMethod, CHECKOUT_PATH,
};
use crate::checkout::{CheckoutOrder, CheckoutReceipt};
use crate::config::ApiOptions;
use crate::error::{rejection_message, Error, Result};
use crate::model::{Car, CarDraft, Entity, InventoryItem, ItemDraft, ResourceKind, User, UserDraft};

/// Executes one request and classifies the outcome. `Ok(None)` is a
/// successful response without a body.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &ApiRequest) -> Result<Option<Value>>;
}

pub struct HttpTransport {
    http: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(options: &ApiOptions) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(Duration::from_millis(options.timeout_ms.max(1)))
            .user_agent(options.user_agent.clone());
        if !options.system_proxy {
            builder = builder.no_proxy();
        }
        let http = builder
            .build()
            .map_err(|err| Error::Network(format!("building http client: {err}")))?;
        Ok(Self {
            http,
            base_url: options.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn to_reqwest(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: &ApiRequest) -> Result<Option<Value>> {
        let mut builder = self
            .http
            .request(to_reqwest(request.method), self.url(&request.path))
            .header(ACCEPT, "application/json");
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        let response = builder
            .send()
            .map_err(|err| Error::Network(err.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|err| Error::Network(err.to_string()))?;
        if !status.is_success() {
            return Err(Error::Rejected {
                status: status.as_u16(),
                message: rejection_message(&text),
            });
        }
        if text.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|err| Error::InvalidResponse(err.to_string()))
    }
}

/// Typed operations over a [`Transport`]. Cheap to clone and shareable with
/// the request worker thread.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub fn http(options: &ApiOptions) -> Result<Self> {
        Ok(Self::new(Arc::new(HttpTransport::new(options)?)))
    }

    pub fn send(&self, request: &ApiRequest) -> Result<Option<Value>> {
        tracing::debug!(method = %request.method, path = %request.path, "api request");
        match self.transport.execute(request) {
            Ok(body) => {
                tracing::debug!(method = %request.method, path = %request.path, "api request succeeded");
                Ok(body)
            }
            Err(err) => {
                tracing::warn!(method = %request.method, path = %request.path, error = %err, "api request failed");
                Err(err)
            }
        }
    }

    pub fn list<E: Entity>(&self) -> Result<Vec<E>> {
        decode_list(self.send(&list_request(E::KIND))?)
    }

    /// Sends a partial body and returns the server's copy of the entity.
    pub fn update<E: Entity>(&self, id: i64, body: Value) -> Result<E> {
        decode(self.send(&update_request(E::KIND, id, body)?)?)
    }

    pub fn delete(&self, kind: ResourceKind, id: i64) -> Result<()> {
        self.send(&delete_request(kind, id)?)?;
        Ok(())
    }

    pub fn create_item(&self, draft: &ItemDraft) -> Result<InventoryItem> {
        let body = to_body(draft)?;
        decode(self.send(&create_request(ResourceKind::Inventory, body)?)?)
    }

    pub fn create_user(&self, draft: &UserDraft) -> Result<User> {
        draft.validate()?;
        let body = to_body(draft)?;
        decode(self.send(&create_request(ResourceKind::Users, body)?)?)
    }

    pub fn add_cars(&self, drafts: &[CarDraft]) -> Result<Vec<Car>> {
        if drafts.is_empty() {
            return Err(Error::validation("no cars to add"));
        }
        let body = to_body(drafts)?;
        let (cars, message) = decode_car_batch(self.send(&create_request(ResourceKind::Cars, body)?)?)?;
        if let Some(message) = message {
            tracing::info!(count = cars.len(), %message, "car batch accepted");
        }
        Ok(cars)
    }

    pub fn checkout(&self, order: &CheckoutOrder) -> Result<CheckoutReceipt> {
        let body = to_body(order)?;
        decode(self.send(&ApiRequest::with_body(HttpMethod::Post, CHECKOUT_PATH, body))?)
    }
}

fn to_body<T: serde::Serialize + ?Sized>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|err| Error::validation(format!("encoding request: {err}")))
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    use super::*;
    use crate::api::testing::ScriptedTransport;
    use assert_matches::assert_matches;
    use serde_json::json;

    /// Accepts one connection, answers it with `status` and `body`, and
    /// hands back the raw request text.
    fn one_shot_server(status: &'static str, body: &'static str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut raw = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let read = stream.read(&mut chunk).unwrap();
                if read == 0 {
                    break;
                }
                raw.extend_from_slice(&chunk[..read]);
                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(split) = text.find("\r\n\r\n") {
                    let length = text[..split]
                        .lines()
                        .find_map(|line| {
                            let lower = line.to_ascii_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .map(|value| value.trim().parse::<usize>().unwrap_or(0))
                        })
                        .unwrap_or(0);
                    if raw.len() >= split + 4 + length {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).unwrap();
            String::from_utf8_lossy(&raw).to_string()
        });
        (format!("http://{addr}"), handle)
    }

    fn options(base_url: String) -> ApiOptions {
        ApiOptions {
            base_url,
            timeout_ms: 5_000,
            system_proxy: false,
            ..ApiOptions::default()
        }
    }

    #[test]
    fn http_transport_sends_json_and_decodes_list() {
        let (base, server) = one_shot_server("200 OK", r#"[{"id": 1, "username": "ana", "role": "admin"}]"#);
        let client = ApiClient::http(&options(base)).unwrap();
        let users: Vec<User> = client.list().unwrap();
        assert_eq!(users[0].username, "ana");

        let request = server.join().unwrap();
        assert!(request.starts_with("GET /api/users/ HTTP/1.1"));
    }

    #[test]
    fn http_transport_classifies_rejections() {
        let (base, server) = one_shot_server("400 Bad Request", r#"{"error": "Superuser cannot be deleted."}"#);
        let client = ApiClient::http(&options(base)).unwrap();
        let err = client.delete(ResourceKind::Users, 1).unwrap_err();
        assert_eq!(
            err,
            Error::Rejected {
                status: 400,
                message: "Superuser cannot be deleted.".into()
            }
        );
        let request = server.join().unwrap();
        assert!(request.starts_with("DELETE /api/users/1/ HTTP/1.1"));
    }

    #[test]
    fn http_transport_reports_unreachable_server() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = ApiClient::http(&options(format!("http://127.0.0.1:{port}"))).unwrap();
        assert_matches!(client.list::<User>(), Err(Error::Network(_)));
    }

    #[test]
    fn update_sends_partial_body_with_table_method() {
        let transport = ScriptedTransport::new();
        transport.push_ok(json!({"vin": "V1", "model": "Golf", "status": "completed"}));
        let client = transport.client();

        let car: Car = client.update(9, json!({"status": "completed"})).unwrap();
        assert_eq!(car.status, "completed");

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, HttpMethod::Patch);
        assert_eq!(requests[0].path, "/api/cars/9/");
        assert_eq!(requests[0].body, Some(json!({"status": "completed"})));
    }

    #[test]
    fn invalid_user_draft_never_reaches_transport() {
        let transport = ScriptedTransport::new();
        let client = transport.client();
        let result = client.create_user(&UserDraft::default());
        assert_matches!(result, Err(Error::Validation(_)));
        assert!(transport.requests().is_empty());
    }
}
