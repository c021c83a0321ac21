use std::collections::VecDeque;
use std::sync::Arc;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use crate::common::error::{ArangoError, Result};
use crate::connection::{Authentication, Connection, Request, Response};

/// Scripted connection: records requests and replays queued responses
#[derive(Default)]
pub(crate) struct MockConnection {
    responses: Mutex<VecDeque<Result<Response>>>,
    requests: Mutex<Vec<Request>>,
    endpoints: Mutex<Vec<String>>,
    auth: Mutex<Authentication>,
}

impl MockConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(MockConnection {
            endpoints: Mutex::new(vec!["http://mock:8529".to_string()]),
            ..Default::default()
        })
    }

    pub fn push(&self, response: Response) -> &Self {
        self.responses.lock().push_back(Ok(response));
        self
    }

    pub fn push_json(&self, status: u16, body: Value) -> &Self {
        self.push(json_response(status, body))
    }

    pub fn push_error(&self, err: ArangoError) -> &Self {
        self.responses.lock().push_back(Err(err));
        self
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    pub fn last_request(&self) -> Request {
        self.requests.lock().last().cloned().expect("no request recorded")
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn authentication(&self) -> Authentication {
        self.auth.lock().clone()
    }
}

pub(crate) fn json_response(status: u16, body: Value) -> Response {
    Response::new(status).with_json_body(&body).expect("serializable body")
}

pub(crate) fn error_response(status: u16, error_num: u32, message: &str) -> Response {
    json_response(status, serde_json::json!({
        "error": true,
        "code": status,
        "errorNum": error_num,
        "errorMessage": message,
    }))
}

#[async_trait]
impl Connection for MockConnection {
    async fn execute(&self, request: Request) -> Result<Response> {
        self.requests.lock().push(request);
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(ArangoError::transport("no scripted response left")))
    }

    fn endpoints(&self) -> Vec<String> {
        self.endpoints.lock().clone()
    }

    fn update_endpoints(&self, endpoints: &[String]) -> Result<()> {
        *self.endpoints.lock() = endpoints.to_vec();
        Ok(())
    }

    fn set_authentication(&self, auth: Authentication) -> Result<()> {
        *self.auth.lock() = auth;
        Ok(())
    }
}
