//! Audit data shared between the pipeline and the database layer.

pub mod audit_event;
pub mod audit_log;
