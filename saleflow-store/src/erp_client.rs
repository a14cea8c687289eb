use async_trait::async_trait;
use saleflow_core::erp::{ErpChangeRequest, ErpCreateRequest, ErpGateway, ErpResponse};
use saleflow_core::GatewayResult;

use crate::app_config::GatewayConfig;
use crate::http_gateway::JsonGateway;

pub const GATEWAY_NAME: &str = "erp";

/// Sales-document create/change through the integration gateway
pub struct HttpErpGateway {
    http: JsonGateway,
}

impl HttpErpGateway {
    pub fn new(config: &GatewayConfig) -> GatewayResult<Self> {
        Ok(Self {
            http: JsonGateway::new(GATEWAY_NAME, config)?,
        })
    }
}

#[async_trait]
impl ErpGateway for HttpErpGateway {
    async fn create_order(&self, request: &ErpCreateRequest) -> GatewayResult<ErpResponse> {
        self.http.post("/sales-orders", request).await
    }

    async fn change_order(&self, request: &ErpChangeRequest) -> GatewayResult<ErpResponse> {
        self.http.post("/sales-orders/change", request).await
    }
}
