// Test support: a `Transport` that replays canned responses per URL and
// records every request it sees.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use serde_json::{json, Value};
use url::Url;

use crate::api::Transport;
use crate::error::{ExportError, Result};

pub const BASE_URL: &str = "http://fake";

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub authorization: Option<String>,
}

#[derive(Default)]
pub struct ScriptedTransport {
    routes: RefCell<HashMap<String, VecDeque<Result<Value>>>>,
    requests: RefCell<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, url: &str, body: Value) -> Self {
        self.push(url, Ok(body))
    }

    pub fn fail(self, url: &str, status: u16) -> Self {
        let err = ExportError::Status {
            url: url.to_string(),
            status: reqwest::StatusCode::from_u16(status).unwrap(),
            body: String::new(),
        };
        self.push(url, Err(err))
    }

    pub fn error(self, url: &str, err: ExportError) -> Self {
        self.push(url, Err(err))
    }

    fn push(self, url: &str, response: Result<Value>) -> Self {
        self.routes
            .borrow_mut()
            .entry(url.to_string())
            .or_default()
            .push_back(response);
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.borrow().clone()
    }

    pub fn request_urls(&self) -> Vec<String> {
        self.requests.borrow().iter().map(|r| r.url.clone()).collect()
    }
}

impl Transport for ScriptedTransport {
    fn get(&self, url: &Url, authorization: Option<&str>) -> Result<Value> {
        self.requests.borrow_mut().push(RecordedRequest {
            url: url.to_string(),
            authorization: authorization.map(str::to_string),
        });

        self.routes
            .borrow_mut()
            .get_mut(url.as_str())
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| {
                Err(ExportError::UnexpectedResponse(format!(
                    "no scripted response for {}",
                    url
                )))
            })
    }
}

/// A listing response: `{key: {page, pages, items}}`.
pub fn listing(key: &str, page: u32, pages: u32, items: Value) -> Value {
    json!({ key: { "page": page, "pages": pages, "items": items } })
}
