use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::material::{ContractMaterial, MaterialMaster};

/// Read-only snapshot of the master data one order mutation needs
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    pub contract_no: String,
    materials: HashMap<String, MaterialMaster>,
    contract_materials: HashMap<String, ContractMaterial>,
    cart_lines: HashSet<Uuid>,
}

impl ReferenceData {
    pub fn new(contract_no: impl Into<String>) -> Self {
        Self {
            contract_no: contract_no.into(),
            ..Default::default()
        }
    }

    pub fn with_material(mut self, material: MaterialMaster) -> Self {
        self.materials.insert(material.material_code.clone(), material);
        self
    }

    pub fn with_contract_material(mut self, material: ContractMaterial) -> Self {
        self.contract_materials.insert(material.material_code.clone(), material);
        self
    }

    pub fn with_cart_line(mut self, cart_line_id: Uuid) -> Self {
        self.cart_lines.insert(cart_line_id);
        self
    }

    pub fn material(&self, code: &str) -> Result<&MaterialMaster, CatalogError> {
        self.materials
            .get(code)
            .ok_or_else(|| CatalogError::MaterialNotFound(code.to_string()))
    }

    pub fn contract_material(&self, code: &str) -> Result<&ContractMaterial, CatalogError> {
        self.contract_materials
            .get(code)
            .ok_or_else(|| CatalogError::NotOnContract {
                contract_no: self.contract_no.clone(),
                material_code: code.to_string(),
            })
    }

    pub fn has_cart_line(&self, cart_line_id: &Uuid) -> bool {
        self.cart_lines.contains(cart_line_id)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CatalogError {
    #[error("Material not found: {0}")]
    MaterialNotFound(String),

    #[error("Material {material_code} is not on contract {contract_no}")]
    NotOnContract {
        contract_no: String,
        material_code: String,
    },
}
