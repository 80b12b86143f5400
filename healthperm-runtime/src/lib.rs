//! Healthperm Runtime
//!
//! Request sequencing and app permission management on top of the grant engine.

pub mod async_adapters;
pub mod config;
pub mod controller;
pub mod interfaces;
pub mod results;
pub mod sequencer;
pub mod session;

pub use async_adapters::{AsyncGrantRevokeEngine, AsyncSessionStore};
pub use config::{load_engine_config, EngineConfig};
pub use controller::{AppPermissionsController, AppPermissionsView, RevokeInclusion};
pub use interfaces::{GrantService, RuntimeError, SessionStore};
pub use results::{PermissionGrants, ResultArrays};
pub use sequencer::RequestFlowSequencer;
pub use session::{FlowState, RequestSession, ScreenBuckets, SCHEMA_VERSION};

pub use healthperm::infra::grant_engine::RouteUpdate;
