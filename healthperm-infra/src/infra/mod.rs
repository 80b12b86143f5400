pub mod contracts;
pub mod grant_engine;
pub mod lock_manager;
pub mod memory_backend;
pub mod session_store;
pub mod state_store;
