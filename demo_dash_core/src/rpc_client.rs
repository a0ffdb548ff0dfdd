// JSON-RPC probe used by the dashboard's "test RPC" button

use crate::error::CoreError;
use log::debug;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(10);

/// Thin reqwest wrapper that issues a single `getSlot` call.
#[derive(Clone)]
pub struct RpcProbe {
    client: Client,
}

impl RpcProbe {
    pub fn new(timeout: Duration) -> Result<Self, CoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Rpc(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// POST `getSlot` to `url` and return the node's JSON reply as-is.
    pub async fn get_slot(&self, url: &str) -> Result<Value, CoreError> {
        debug!("Probing RPC endpoint: {}", url);
        let payload = json!({"jsonrpc": "2.0", "id": 1, "method": "getSlot"});

        let response = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| CoreError::Rpc(format!("RPC request failed: {}", e)))?;

        response
            .json::<Value>()
            .await
            .map_err(|e| CoreError::Rpc(format!("Failed to read RPC response: {}", e)))
    }
}
