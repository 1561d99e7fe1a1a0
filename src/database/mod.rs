pub mod event_store;
pub mod memory;
pub mod pool;
pub mod run_store;
