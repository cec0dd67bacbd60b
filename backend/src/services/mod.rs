pub mod audit_log;
pub mod audit_pipeline;
pub mod audit_store;
