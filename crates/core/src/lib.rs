pub mod catalog;
pub mod error;
pub mod permission;
pub mod permission_set;
pub mod types;

pub use catalog::{FeatureToggles, PermissionCatalog};
pub use error::EngineError;
pub use permission::{AccessType, AdditionalKind, FitnessType, MedicalType, Permission, HEALTH_PERMISSION_PREFIX};
pub use permission_set::PermissionSet;
pub use types::*;
