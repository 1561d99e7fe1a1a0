pub mod audit_service;
pub mod correlation_service;
pub mod dispatch_service;
pub mod event_ledger;
pub mod run_ledger;
pub mod telephony;
pub mod tenant_directory;
