#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use theta_client::transport::{HttpResponse, Transport, TransportFailure};
use tokio::sync::Notify;
use tokio::time::Instant;

pub enum Step {
    Respond(u16, String),
    Fail(TransportFailure),
    /// Respond only after the gate is opened.
    Gated(u16, String, Arc<Notify>),
    /// 200 with a body built from the request body.
    Reply(fn(&str) -> String),
}

#[derive(Debug, Clone)]
pub struct Call {
    pub path: String,
    pub body: String,
    pub at: Instant,
}

/// Transport that replays a fixed script and records every call.
#[derive(Default)]
pub struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedTransport {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, path: &str) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.path == path).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post(&self, path: &str, body: Vec<u8>) -> Result<HttpResponse, TransportFailure> {
        let body = String::from_utf8_lossy(&body).into_owned();
        self.calls.lock().unwrap().push(Call {
            path: path.to_string(),
            body: body.clone(),
            at: Instant::now(),
        });
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Respond(status, body)) => Ok(HttpResponse::new(status, body)),
            Some(Step::Fail(failure)) => Err(failure),
            Some(Step::Gated(status, body, gate)) => {
                gate.notified().await;
                Ok(HttpResponse::new(status, body))
            }
            Some(Step::Reply(reply)) => Ok(HttpResponse::new(200, reply(&body))),
            None => Err(TransportFailure::other(io::Error::other("script exhausted"))),
        }
    }
}

pub fn ok(body: &str) -> Step {
    Step::Respond(200, body.to_string())
}

pub fn in_progress(name: &str, id: &str) -> Step {
    ok(&format!(
        r#"{{"name":"{name}","state":"inProgress","id":"{id}","progress":{{"completion":0.0}}}}"#
    ))
}

pub fn connect_timeout() -> Step {
    Step::Fail(TransportFailure::timeout(io::Error::new(io::ErrorKind::TimedOut, "connect timeout")))
}
