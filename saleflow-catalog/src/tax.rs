use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Output tax percent per sold-to party
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxTable {
    pub default_percent: Decimal,
    pub sold_to_percent: HashMap<String, Decimal>,
}

impl Default for TaxTable {
    fn default() -> Self {
        Self {
            default_percent: Decimal::from(7),
            sold_to_percent: HashMap::new(),
        }
    }
}

impl TaxTable {
    pub fn new(default_percent: Decimal) -> Self {
        Self {
            default_percent,
            sold_to_percent: HashMap::new(),
        }
    }

    pub fn with_sold_to(mut self, sold_to: impl Into<String>, percent: Decimal) -> Self {
        self.sold_to_percent.insert(sold_to.into(), percent);
        self
    }

    pub fn percent_for(&self, sold_to: &str) -> Decimal {
        self.sold_to_percent
            .get(sold_to)
            .copied()
            .unwrap_or(self.default_percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_sold_to_override() {
        let table = TaxTable::default().with_sold_to("0001000999", dec!(0));
        assert_eq!(table.percent_for("0001000999"), dec!(0));
        assert_eq!(table.percent_for("0001000123"), dec!(7));
    }
}
