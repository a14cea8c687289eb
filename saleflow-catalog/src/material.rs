use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Weight of one unit of a material, in kilograms
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnitConversion {
    pub unit: String,
    pub kg_per_unit: Decimal,
}

/// Material master record as maintained in the ERP
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialMaster {
    pub material_code: String,
    pub description: String,
    /// Orders never mix product groups
    pub product_group: String,
    pub material_group: String,
    pub base_unit: String,
    /// ERP item category, e.g. "ZKSO" for standard lines or a container category
    pub item_category: String,
    pub default_over_tolerance: Decimal,
    pub default_under_tolerance: Decimal,
    pub conversions: Vec<UnitConversion>,
}

impl MaterialMaster {
    /// Kilograms per `unit`. KG and TON are fixed; everything else comes
    /// from the material's conversion table.
    pub fn kg_per(&self, unit: &str) -> Option<Decimal> {
        match unit.to_uppercase().as_str() {
            "KG" => Some(Decimal::ONE),
            "TON" => Some(Decimal::from(1000)),
            other => self
                .conversions
                .iter()
                .find(|c| c.unit.eq_ignore_ascii_case(other))
                .map(|c| c.kg_per_unit),
        }
    }
}

/// A material as sold under a specific contract
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractMaterial {
    pub contract_no: String,
    pub material_code: String,
    pub plant: String,
    pub sales_unit: String,
    pub price_per_unit: Decimal,
    pub currency: String,
    pub remaining_quantity: Decimal,
    pub over_tolerance: Option<Decimal>,
    pub under_tolerance: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_kg_conversion() {
        let material = MaterialMaster {
            material_code: "Z02KS-125D0980117N".to_string(),
            description: "KS125 98cm".to_string(),
            product_group: "K01".to_string(),
            material_group: "PK00".to_string(),
            base_unit: "ROL".to_string(),
            item_category: "ZKSO".to_string(),
            default_over_tolerance: dec!(10),
            default_under_tolerance: dec!(10),
            conversions: vec![UnitConversion {
                unit: "ROL".to_string(),
                kg_per_unit: dec!(412.5),
            }],
        };

        assert_eq!(material.kg_per("ton"), Some(dec!(1000)));
        assert_eq!(material.kg_per("KG"), Some(dec!(1)));
        assert_eq!(material.kg_per("rol"), Some(dec!(412.5)));
        assert_eq!(material.kg_per("PAL"), None);
    }
}
