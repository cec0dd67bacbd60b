//! In-memory audit event handed from request handlers to the audit pipeline.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Kind of state change an audit event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventKind {
    Create,
    Update,
    Delete,
    Restore,
    Login,
    Logout,
}

impl AuditEventKind {
    pub const ALL: [AuditEventKind; 6] = [
        AuditEventKind::Create,
        AuditEventKind::Update,
        AuditEventKind::Delete,
        AuditEventKind::Restore,
        AuditEventKind::Login,
        AuditEventKind::Logout,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventKind::Create => "CREATE",
            AuditEventKind::Update => "UPDATE",
            AuditEventKind::Delete => "DELETE",
            AuditEventKind::Restore => "RESTORE",
            AuditEventKind::Login => "LOGIN",
            AuditEventKind::Logout => "LOGOUT",
        }
    }
}

impl fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditEventKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| format!("unknown audit event kind: {}", value))
    }
}

/// One completed mutation waiting to be written to `audit_logs`.
///
/// Fields are private: once built, an event is only read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    #[serde(default)]
    actor_id: Option<i64>,
    kind: AuditEventKind,
    resource_type: String,
    resource_id: i64,
    #[serde(default)]
    before_state: Option<Value>,
    #[serde(default)]
    after_state: Option<Value>,
    #[serde(default)]
    ip_address: Option<String>,
    #[serde(default)]
    user_agent: Option<String>,
    #[serde(skip, default = "Instant::now")]
    enqueued_at: Instant,
}

impl AuditEvent {
    pub fn new(kind: AuditEventKind, resource_type: impl Into<String>, resource_id: i64) -> Self {
        Self {
            actor_id: None,
            kind,
            resource_type: resource_type.into(),
            resource_id,
            before_state: None,
            after_state: None,
            ip_address: None,
            user_agent: None,
            enqueued_at: Instant::now(),
        }
    }

    pub fn with_actor(mut self, actor_id: Option<i64>) -> Self {
        self.actor_id = actor_id;
        self
    }

    pub fn with_before_state(mut self, state: Option<Value>) -> Self {
        self.before_state = state;
        self
    }

    pub fn with_after_state(mut self, state: Option<Value>) -> Self {
        self.after_state = state;
        self
    }

    pub fn with_request_context(
        mut self,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }

    pub fn actor_id(&self) -> Option<i64> {
        self.actor_id
    }

    pub fn kind(&self) -> AuditEventKind {
        self.kind
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn resource_id(&self) -> i64 {
        self.resource_id
    }

    pub fn before_state(&self) -> Option<&Value> {
        self.before_state.as_ref()
    }

    pub fn after_state(&self) -> Option<&Value> {
        self.after_state.as_ref()
    }

    pub fn ip_address(&self) -> Option<&str> {
        self.ip_address.as_deref()
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    pub fn enqueued_at(&self) -> Instant {
        self.enqueued_at
    }

    /// Time spent in memory since the event was built.
    pub fn age(&self) -> Duration {
        self.enqueued_at.elapsed()
    }
}

/// Serializes a record into an opaque snapshot for `before_state`/`after_state`.
///
/// A value that cannot be serialized is recorded without a snapshot.
pub fn snapshot<T: Serialize + ?Sized>(value: &T) -> Option<Value> {
    match serde_json::to_value(value) {
        Ok(Value::Null) => None,
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(error = %err, "Failed to serialize audit snapshot");
            None
        }
    }
}
