use reqwest::Client;
use saleflow_core::{GatewayError, GatewayResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::app_config::GatewayConfig;

/// JSON-over-HTTP transport shared by the planning and ERP clients.
/// Business rejections come back in a 2xx body; only transport problems
/// become a `GatewayError`.
#[derive(Clone)]
pub struct JsonGateway {
    name: &'static str,
    client: Client,
    base_url: String,
    api_key: Option<String>,
    timeout_secs: u64,
}

impl JsonGateway {
    pub fn new(name: &'static str, config: &GatewayConfig) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Unavailable {
                gateway: name,
                message: format!("failed to build http client: {}", e),
            })?;

        Ok(Self {
            name,
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    pub async fn post<Req, Resp>(&self, path: &str, body: &Req) -> GatewayResult<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {} ({})", url, self.name);

        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes).to_string();
            warn!("{} returned HTTP {} for {}", self.name, status, path);
            return Err(GatewayError::Status {
                gateway: self.name,
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_slice(&bytes).map_err(|e| GatewayError::Decode {
            gateway: self.name,
            message: e.to_string(),
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> GatewayError {
        if e.is_timeout() {
            GatewayError::Timeout {
                gateway: self.name,
                timeout_secs: self.timeout_secs,
            }
        } else {
            GatewayError::Unavailable {
                gateway: self.name,
                message: e.to_string(),
            }
        }
    }
}
