//! Test doubles shared by the unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse};
use crate::transport::Transport;
use crate::types::Task;

#[derive(Debug, Default)]
struct Script {
    replies: VecDeque<Result<HttpResponse, TransportError>>,
    sent: Vec<HttpRequest>,
}

/// Transport that records every request and answers from a queue. An empty
/// queue answers with a transport failure.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(&self, status: u16, body: &str) {
        self.script
            .lock()
            .unwrap()
            .replies
            .push_back(Ok(HttpResponse::new(status, body)));
    }

    pub(crate) fn fail(&self, reason: &str) {
        self.script
            .lock()
            .unwrap()
            .replies
            .push_back(Err(TransportError(reason.to_string())));
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.script.lock().unwrap().sent.clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut script = self.script.lock().unwrap();
        script.sent.push(request);
        script
            .replies
            .pop_front()
            .unwrap_or_else(|| Err(TransportError("no scripted reply".to_string())))
    }
}

pub(crate) fn task(id: &str, title: &str, completed: bool) -> Task {
    let at = Utc.with_ymd_and_hms(2024, 6, 4, 10, 0, 0).unwrap();
    Task {
        id: id.to_string(),
        title: title.to_string(),
        completed,
        user: "u1".to_string(),
        created_at: at,
        updated_at: at,
    }
}

pub(crate) fn task_json(id: &str, title: &str, completed: bool) -> String {
    serde_json::to_string(&task(id, title, completed)).unwrap()
}
