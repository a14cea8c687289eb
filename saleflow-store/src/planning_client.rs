use async_trait::async_trait;
use saleflow_core::planning::{Acknowledge, ConfirmRequest, PlanningGateway, PlanningRequest, PlanningResponse};
use saleflow_core::GatewayResult;

use crate::app_config::GatewayConfig;
use crate::http_gateway::JsonGateway;

pub const GATEWAY_NAME: &str = "planning";

pub struct HttpPlanningGateway {
    http: JsonGateway,
}

impl HttpPlanningGateway {
    pub fn new(config: &GatewayConfig) -> GatewayResult<Self> {
        Ok(Self {
            http: JsonGateway::new(GATEWAY_NAME, config)?,
        })
    }
}

#[async_trait]
impl PlanningGateway for HttpPlanningGateway {
    async fn request_allocation(&self, request: &PlanningRequest) -> GatewayResult<PlanningResponse> {
        self.http.post("/allocations", request).await
    }

    async fn confirm_allocation(&self, request: &ConfirmRequest) -> GatewayResult<Acknowledge> {
        self.http.post("/allocations/confirm", request).await
    }
}
