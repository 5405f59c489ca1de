//! Message type shared by all queue backends

use serde::{Deserialize, Serialize};

/// A unit of work consumed from a queue
///
/// The identity is backend-specific and opaque to the engine (an SQS receipt
/// handle, a line timestamp, a sequence number). Messages are immutable once
/// consumed.
///
/// # Example
///
/// ```rust
/// use qp::queue::Message;
///
/// let message = Message::new("42", "hello").with_raw("raw frame");
/// assert_eq!(
///     message.to_json().unwrap(),
///     r#"{"ID":"42","Body":"hello","Raw":"raw frame"}"#
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Message {
    #[serde(rename = "ID")]
    id: String,
    body: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    raw: Option<String>,
}

impl Message {
    pub fn new(id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
            raw: None,
        }
    }

    /// Attach the backend's own representation of the message
    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = Some(raw.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    /// JSON form handed to external processors
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
