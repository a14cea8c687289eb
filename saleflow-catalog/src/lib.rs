pub mod material;
pub mod reference;
pub mod tax;

pub use material::{ContractMaterial, MaterialMaster, UnitConversion};
pub use reference::{CatalogError, ReferenceData};
pub use tax::TaxTable;
