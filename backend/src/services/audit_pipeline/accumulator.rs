use crate::models::audit_event::AuditEvent;

/// Worker-local buffer of audit events.
///
/// Each worker owns exactly one accumulator.
#[derive(Debug)]
pub struct BatchAccumulator {
    events: Vec<AuditEvent>,
    max_size: usize,
}

impl BatchAccumulator {
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            events: Vec::with_capacity(max_size),
            max_size,
        }
    }

    /// Appends an event and hands back the full batch once it reaches the size bound.
    pub fn push(&mut self, event: AuditEvent) -> Option<Vec<AuditEvent>> {
        self.events.push(event);
        if self.events.len() >= self.max_size {
            self.take()
        } else {
            None
        }
    }

    /// Takes whatever has accumulated, leaving the accumulator empty.
    pub fn take(&mut self) -> Option<Vec<AuditEvent>> {
        if self.events.is_empty() {
            return None;
        }
        Some(std::mem::replace(
            &mut self.events,
            Vec::with_capacity(self.max_size),
        ))
    }
}
