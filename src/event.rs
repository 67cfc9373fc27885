//! Validation events: the single channel through which recoverable problems
//! found during unmarshalling and marshalling are reported.
//!
//! A [`ValidationEventHandler`] decides for every event whether processing
//! continues. Returning `false` turns the event into [`Error::Validation`]
//! and aborts the whole call.
//!
//! [`Error::Validation`]: crate::errors::Error::Validation

use std::fmt;
use std::sync::{Arc, Mutex};

/// How serious a reported problem is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde-types", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum Severity {
    /// The document is processed as if the problem did not exist
    Warning,
    /// Part of the document or of the object graph is skipped
    Error,
    /// Processing cannot continue
    FatalError,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::FatalError => "FATAL_ERROR",
        })
    }
}

/// Position in the input document. Lines and columns are 1-based,
/// the offset is a byte offset from the start of the input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-types", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct Location {
    /// Line number
    pub line: usize,
    /// Column number, in bytes
    pub column: usize,
    /// Byte offset
    pub offset: u64,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// One reported anomaly.
#[derive(Clone, Debug)]
pub struct ValidationEvent {
    severity: Severity,
    message: String,
    location: Option<Location>,
    field: Option<String>,
    cause: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl ValidationEvent {
    /// Creates an event without location information
    pub fn new<M: Into<String>>(severity: Severity, message: M) -> Self {
        ValidationEvent {
            severity,
            message: message.into(),
            location: None,
            field: None,
            cause: None,
        }
    }

    /// Shorthand for a [`Severity::Warning`] event
    pub fn warning<M: Into<String>>(message: M) -> Self {
        Self::new(Severity::Warning, message)
    }

    /// Shorthand for a [`Severity::Error`] event
    pub fn error<M: Into<String>>(message: M) -> Self {
        Self::new(Severity::Error, message)
    }

    /// Shorthand for a [`Severity::FatalError`] event
    pub fn fatal<M: Into<String>>(message: M) -> Self {
        Self::new(Severity::FatalError, message)
    }

    /// Attaches a document position
    pub fn at(mut self, location: Option<Location>) -> Self {
        self.location = location;
        self
    }

    /// Attaches the name of the property being processed (marshalling side)
    pub fn in_field<F: Into<String>>(mut self, field: F) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Attaches the error that caused this event
    pub fn caused_by<E>(mut self, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// Severity of the event
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Human readable description
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Position in the input document, if known
    pub fn location(&self) -> Option<Location> {
        self.location
    }

    /// Property being marshalled when the event was raised
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    /// Underlying error, if any
    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.cause.as_deref()
    }
}

impl fmt::Display for ValidationEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)?;
        if let Some(field) = &self.field {
            write!(f, " (property '{}')", field)?;
        }
        if let Some(loc) = &self.location {
            write!(f, " at {}", loc)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationEvent {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref() as &(dyn std::error::Error + 'static)),
            None => None,
        }
    }
}

/// Decides whether processing continues after an event.
pub trait ValidationEventHandler {
    /// Returns `true` to recover and continue, `false` to abort.
    fn handle_event(&self, event: &ValidationEvent) -> bool;
}

impl<F> ValidationEventHandler for F
where
    F: Fn(&ValidationEvent) -> bool,
{
    fn handle_event(&self, event: &ValidationEvent) -> bool {
        self(event)
    }
}

/// Records every event and always continues.
///
/// Share it through an `Arc` to inspect the events after the call:
///
/// ```
/// # use std::sync::Arc;
/// # use quick_bind::event::{ValidationEvent, ValidationEventCollector, ValidationEventHandler};
/// let collector = Arc::new(ValidationEventCollector::new());
/// let handler = Arc::clone(&collector);
/// assert!(handler.handle_event(&ValidationEvent::error("oops")));
/// assert_eq!(collector.events().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct ValidationEventCollector {
    events: Mutex<Vec<ValidationEvent>>,
}

impl ValidationEventCollector {
    /// Creates an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events recorded so far
    pub fn events(&self) -> Vec<ValidationEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Whether at least one event was recorded
    pub fn has_events(&self) -> bool {
        !self.events().is_empty()
    }

    /// Forgets all recorded events
    pub fn reset(&self) {
        match self.events.lock() {
            Ok(mut events) => events.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

impl ValidationEventHandler for ValidationEventCollector {
    fn handle_event(&self, event: &ValidationEvent) -> bool {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
        true
    }
}

/// Continues on warnings and aborts on anything more serious.
#[derive(Clone, Copy, Debug, Default)]
pub struct FailFast;

impl ValidationEventHandler for FailFast {
    fn handle_event(&self, event: &ValidationEvent) -> bool {
        event.severity() == Severity::Warning
    }
}
