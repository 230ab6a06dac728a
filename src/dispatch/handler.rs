//! Handler invocation.
//!
//! # Responsibilities
//! - Define the request/response exchanged with compiled functions
//! - Run an artifact as a child process speaking that protocol
//!
//! # Design Decisions
//! - One JSON request on stdin; stdout is either an envelope
//!   (`{"status": .., "headers": .., "body": ..}`) or bare output sent as 200
//! - An object with any key outside the envelope is bare output
//! - Non-zero exit is a handler failure carrying stderr as its message
//! - The child is killed when the invocation times out or is dropped

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use crate::routing::PathParams;

/// Request as seen by a function.
#[derive(Debug, Clone, Serialize)]
pub struct HandlerRequest {
    pub method: String,
    /// Matched route.
    pub route: String,
    /// Full request path including the API prefix.
    pub path: String,
    pub params: PathParams,
    pub query: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
    pub cookies: BTreeMap<String, String>,
    pub body: RequestBody,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Request body in parsed form.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum RequestBody {
    #[default]
    Empty,
    Form(BTreeMap<String, String>),
    Json(Value),
    Text(String),
    Raw(Vec<u8>),
}

/// Response produced by a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl HandlerResponse {
    /// Plain-text 500 response.
    pub fn server_error(message: impl Into<String>) -> Self {
        Self {
            status: 500,
            headers: BTreeMap::from([("content-type".to_string(), "text/plain; charset=utf-8".to_string())]),
            body: message.into().into_bytes(),
        }
    }

    /// Interpret raw handler stdout.
    pub fn from_output(stdout: Vec<u8>) -> Self {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Envelope {
            status: u16,
            #[serde(default)]
            headers: BTreeMap<String, String>,
            #[serde(default)]
            body: Option<Value>,
        }

        let Ok(envelope) = serde_json::from_slice::<Envelope>(&stdout) else {
            return Self {
                status: 200,
                headers: BTreeMap::new(),
                body: stdout,
            };
        };

        let mut headers: BTreeMap<String, String> = envelope
            .headers
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();

        let body = match envelope.body {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::String(s)) => {
                headers
                    .entry("content-type".to_string())
                    .or_insert_with(|| "text/plain; charset=utf-8".to_string());
                s.into_bytes()
            }
            Some(other) => {
                headers
                    .entry("content-type".to_string())
                    .or_insert_with(|| "application/json".to_string());
                other.to_string().into_bytes()
            }
        };

        Self {
            status: envelope.status,
            headers,
            body,
        }
    }
}

/// Why an invocation failed.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("compiled function {} does not exist", .0.display())]
    Missing(PathBuf),

    #[error("compiled function {} is not executable", .0.display())]
    NotExecutable(PathBuf),

    #[error("failed to start function: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("{0}")]
    Failed(String),

    #[error("function timed out after {0:?}")]
    Timeout(Duration),
}

/// An invocable function.
pub trait Handler: Send + Sync {
    fn invoke(&self, request: HandlerRequest) -> BoxFuture<'static, Result<HandlerResponse, HandlerError>>;
}

/// Runs a compiled artifact as a child process.
#[derive(Debug, Clone)]
pub struct ProcessHandler {
    path: PathBuf,
    timeout: Duration,
}

impl ProcessHandler {
    pub fn new(path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            path: path.into(),
            timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Handler for ProcessHandler {
    fn invoke(&self, request: HandlerRequest) -> BoxFuture<'static, Result<HandlerResponse, HandlerError>> {
        let path = self.path.clone();
        let timeout = self.timeout;
        Box::pin(async move {
            match tokio::time::timeout(timeout, run_process(&path, &request)).await {
                Ok(result) => result,
                Err(_) => Err(HandlerError::Timeout(timeout)),
            }
        })
    }
}

async fn run_process(path: &Path, request: &HandlerRequest) -> Result<HandlerResponse, HandlerError> {
    let input = serde_json::to_vec(request)?;

    let mut child = Command::new(path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(HandlerError::Spawn)?;

    let stdin = child.stdin.take();
    let write = async move {
        if let Some(mut stdin) = stdin {
            // Handlers that ignore their input close the pipe early.
            let _ = stdin.write_all(&input).await;
        }
    };
    let (_, output) = tokio::join!(write, child.wait_with_output());
    let output = output.map_err(HandlerError::Spawn)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("process exited with {}", output.status)
        } else {
            stderr
        };
        return Err(HandlerError::Failed(message));
    }

    Ok(HandlerResponse::from_output(output.stdout))
}
