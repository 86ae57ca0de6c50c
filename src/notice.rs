//! Purpose: Define a structured schema for non-fatal planning advisories.
//! Exports: `Notice`, `notice_json`, `Notify`, `TracingNotify`, `NoticeLog`.
//! Role: Injected diagnostics sink for the recorder and partitioner.
//! Invariants: Notices are non-fatal and never alter the instruction log.
//! Invariants: Sinks receive notices in emission order, synchronously.
use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{Map, Value, json};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: String,
    pub message: String,
    pub details: Map<String, Value>,
}

impl Notice {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            details: Map::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: Value) -> Self {
        self.details.insert(key.into(), value);
        self
    }
}

pub fn notice_json(notice: &Notice) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(notice.kind));
    inner.insert("message".to_string(), json!(notice.message));
    inner.insert("details".to_string(), Value::Object(notice.details.clone()));

    let mut outer = Map::new();
    outer.insert("notice".to_string(), Value::Object(inner));
    Value::Object(outer)
}

/// Sink for non-fatal advisories emitted while planning.
pub trait Notify {
    fn notify(&self, notice: Notice);
}

/// Default sink: forwards notices to `tracing` at warn level.
#[derive(Debug, Default)]
pub struct TracingNotify;

impl Notify for TracingNotify {
    fn notify(&self, notice: Notice) {
        tracing::warn!(kind = %notice.kind, "{}", notice.message);
    }
}

/// Recording sink for tests. Cloned handles share the same buffer.
#[derive(Clone, Debug, Default)]
pub struct NoticeLog {
    notices: Rc<RefCell<Vec<Notice>>>,
}

impl NoticeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<Notice> {
        self.notices.borrow_mut().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.notices.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.notices.borrow().is_empty()
    }
}

impl Notify for NoticeLog {
    fn notify(&self, notice: Notice) {
        self.notices.borrow_mut().push(notice);
    }
}
