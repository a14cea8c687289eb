use rust_decimal::Decimal;
use saleflow_catalog::TaxTable;
use saleflow_order::{BypassPolicy, OrchestratorConfig};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub kafka: KafkaConfig,
    pub planning: GatewayConfig,
    pub erp: GatewayConfig,
    pub business_rules: BusinessRules,
    #[serde(default)]
    pub audit: AuditConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    #[serde(default)]
    pub enabled: bool,
}

/// Connection settings for one external system
#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Use the scripted in-process gateway
    #[serde(default)]
    pub mock: bool,
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    /// Plants outside the planning engine's scope
    #[serde(default)]
    pub special_plants: Vec<String>,
    /// Item categories shipped as containers, never planned
    #[serde(default)]
    pub container_item_categories: Vec<String>,
    #[serde(default = "default_tax_percent")]
    pub default_tax_percent: Decimal,
    /// Overrides of the default percent per sold-to party
    #[serde(default)]
    pub sold_to_tax_percent: HashMap<String, Decimal>,
    #[serde(default = "default_reject_reason")]
    pub reject_reason: String,
}

impl BusinessRules {
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        let tax = self
            .sold_to_tax_percent
            .iter()
            .fold(TaxTable::new(self.default_tax_percent), |table, (sold_to, percent)| {
                table.with_sold_to(sold_to.clone(), *percent)
            });

        OrchestratorConfig {
            bypass: BypassPolicy::new(
                self.special_plants.iter().cloned(),
                self.container_item_categories.iter().cloned(),
            ),
            tax,
            reject_reason: self.reject_reason.clone(),
        }
    }
}

fn default_tax_percent() -> Decimal {
    Decimal::from(7)
}

fn default_reject_reason() -> String {
    "93".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuditConfig {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_channel_capacity() -> usize {
    1024
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `SALEFLOW__ERP__MOCK=true`
            .add_source(config::Environment::with_prefix("SALEFLOW").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_optional_keys() {
        let toml = r#"
            [server]
            port = 3000

            [database]
            url = "postgres://localhost/saleflow"

            [kafka]
            brokers = "localhost:9092"

            [planning]
            base_url = "http://planning.local"

            [erp]
            base_url = "http://erp.local"
            mock = true

            [business_rules]
            special_plants = ["754F"]
        "#;

        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.planning.timeout_secs, 30);
        assert!(!config.planning.mock);
        assert!(config.erp.mock);
        assert_eq!(config.business_rules.special_plants, vec!["754F".to_string()]);
        assert_eq!(config.business_rules.default_tax_percent, Decimal::from(7));
        assert!(config.business_rules.sold_to_tax_percent.is_empty());
        assert_eq!(config.business_rules.reject_reason, "93");
        assert_eq!(config.audit.channel_capacity, 1024);
    }

    #[test]
    fn test_business_rules_become_orchestrator_config() {
        let mut sold_to_tax_percent = HashMap::new();
        sold_to_tax_percent.insert("0001000999".to_string(), Decimal::ZERO);
        let rules = BusinessRules {
            special_plants: vec!["754F".to_string()],
            container_item_categories: vec!["ZKC0".to_string()],
            default_tax_percent: Decimal::from(7),
            sold_to_tax_percent,
            reject_reason: "93".to_string(),
        };

        let config = rules.orchestrator_config();
        assert_eq!(config.tax.percent_for("0001000123"), Decimal::from(7));
        assert_eq!(config.tax.percent_for("0001000999"), Decimal::ZERO);
        assert_eq!(config.reject_reason, "93");
    }
}
