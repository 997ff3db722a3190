//! JSON-RPC client for an aria2-compatible engine.
//!
//! Every call carries a bounded timeout. When a secret is configured it is
//! prepended as the first positional parameter (`token:<secret>`), which is
//! aria2's authentication convention.

use std::time::Duration;

use async_trait::async_trait;
use dlq_engine_core::{
    DownloadEngine, EngineError, EngineFile, EngineOptions, EngineStatus, TransferState,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

const RPC_TIMEOUT: Duration = Duration::from_secs(10);

const STATUS_KEYS: [&str; 7] = [
    "gid",
    "status",
    "totalLength",
    "completedLength",
    "downloadSpeed",
    "errorCode",
    "errorMessage",
];

/// Client for the aria2 JSON-RPC endpoint.
pub struct Aria2Client {
    endpoint: String,
    secret: Option<String>,
    http: reqwest::Client,
}

#[derive(serde::Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: &'static str,
    method: &'a str,
    params: Vec<Value>,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireStatus {
    #[serde(default)]
    gid: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    total_length: String,
    #[serde(default)]
    completed_length: String,
    #[serde(default)]
    download_speed: String,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    files: Vec<WireFile>,
}

#[derive(Deserialize)]
struct WireFile {
    #[serde(default)]
    path: String,
}

impl Aria2Client {
    /// Build a client against the given RPC endpoint, optionally with the
    /// engine's shared secret.
    pub fn new(endpoint: impl Into<String>, secret: Option<String>) -> Result<Self, EngineError> {
        let http = reqwest::Client::builder()
            .timeout(RPC_TIMEOUT)
            .build()
            .map_err(|err| EngineError::Transport {
                message: format!("failed to build http client: {err}"),
            })?;
        Ok(Self {
            endpoint: endpoint.into(),
            secret: secret.filter(|s| !s.trim().is_empty()),
            http,
        })
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, EngineError> {
        let mut all_params = Vec::with_capacity(params.len() + 1);
        if let Some(secret) = &self.secret {
            all_params.push(json!(format!("token:{secret}")));
        }
        all_params.extend(params);

        let request = RpcRequest {
            jsonrpc: "2.0",
            id: "dlq",
            method,
            params: all_params,
        };
        debug!(method, endpoint = %self.endpoint, "aria2 rpc call");
        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|err| EngineError::Transport {
                message: err.to_string(),
            })?;
        let body: RpcResponse = response.json().await.map_err(|err| EngineError::Transport {
            message: err.to_string(),
        })?;
        if let Some(error) = body.error {
            return Err(EngineError::from_rpc(error.code, error.message));
        }
        let result = body.result.ok_or_else(|| EngineError::InvalidResponse {
            message: format!("{method} returned neither result nor error"),
        })?;
        serde_json::from_value(result).map_err(|err| EngineError::InvalidResponse {
            message: format!("{method} result: {err}"),
        })
    }
}

/// aria2 reports byte counts and speeds as decimal strings.
fn parse_amount(value: &str) -> u64 {
    value.trim().parse().unwrap_or(0)
}

impl From<WireStatus> for EngineStatus {
    fn from(wire: WireStatus) -> Self {
        Self {
            state: TransferState::from_wire(&wire.status),
            total_bytes: parse_amount(&wire.total_length),
            completed_bytes: parse_amount(&wire.completed_length),
            download_speed: parse_amount(&wire.download_speed),
            gid: wire.gid,
            error_code: wire.error_code.filter(|c| !c.is_empty()),
            error_message: wire.error_message.filter(|m| !m.is_empty()),
            files: wire
                .files
                .into_iter()
                .map(|file| EngineFile { path: file.path })
                .collect(),
        }
    }
}

#[async_trait]
impl DownloadEngine for Aria2Client {
    async fn add_uri(&self, uri: &str, options: &EngineOptions) -> Result<String, EngineError> {
        let params = vec![json!([uri]), json!(options)];
        self.call("aria2.addUri", params).await
    }

    async fn tell_status(&self, gid: &str) -> Result<EngineStatus, EngineError> {
        let mut keys: Vec<Value> = STATUS_KEYS.iter().map(|key| json!(key)).collect();
        keys.push(json!("files"));
        let params = vec![json!(gid), Value::Array(keys)];
        let wire: WireStatus = self.call("aria2.tellStatus", params).await?;
        if wire.gid.is_empty() {
            return Err(EngineError::InvalidResponse {
                message: "tellStatus returned an empty gid".to_string(),
            });
        }
        Ok(wire.into())
    }

    async fn pause(&self, gid: &str) -> Result<(), EngineError> {
        self.call::<String>("aria2.pause", vec![json!(gid)])
            .await
            .map(drop)
    }

    async fn unpause(&self, gid: &str) -> Result<(), EngineError> {
        self.call::<String>("aria2.unpause", vec![json!(gid)])
            .await
            .map(drop)
    }

    async fn remove(&self, gid: &str) -> Result<(), EngineError> {
        // Stopped or completed transfers refuse a normal remove; walk the
        // fallback chain until the GID is gone.
        match self.call::<String>("aria2.remove", vec![json!(gid)]).await {
            Ok(_) => return Ok(()),
            Err(err) if err.is_action_not_allowed() => {}
            Err(err) => return Err(err),
        }
        match self
            .call::<String>("aria2.forceRemove", vec![json!(gid)])
            .await
        {
            Ok(_) => return Ok(()),
            Err(err) if err.is_action_not_allowed() => {}
            Err(err) => return Err(err),
        }
        self.call::<String>("aria2.removeDownloadResult", vec![json!(gid)])
            .await
            .map(drop)
    }
}
