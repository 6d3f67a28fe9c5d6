use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::api::{ApiClient, ApiRequest, Transport};
use crate::error::{Error, Result};

/// In-process transport that replays queued responses and records every
/// request it was asked to send.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<Option<Value>>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn client(self: &Arc<Self>) -> ApiClient {
        ApiClient::new(self.clone())
    }

    pub(crate) fn push_ok(&self, body: Value) {
        self.responses.lock().unwrap().push_back(Ok(Some(body)));
    }

    pub(crate) fn push_empty(&self) {
        self.responses.lock().unwrap().push_back(Ok(None));
    }

    pub(crate) fn push_err(&self, err: Error) {
        self.responses.lock().unwrap().push_back(Err(err));
    }

    pub(crate) fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    fn execute(&self, request: &ApiRequest) -> Result<Option<Value>> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Network("no scripted response".to_string())))
    }
}
