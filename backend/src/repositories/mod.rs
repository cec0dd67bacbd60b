pub mod audit_log;
pub mod transaction;

pub use transaction::*;
