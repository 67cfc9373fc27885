//! Error management module

use crate::event::ValidationEvent;
use std::fmt;

/// The error type used by this crate.
#[derive(Debug)]
pub enum Error {
    /// Malformed XML reported by the underlying tokenizer
    Xml(quick_xml::Error),
    /// IO error
    Io(::std::io::Error),
    /// A prefix was used in a name without being declared
    UnboundPrefix(String),
    /// The class model handed to the context builder is inconsistent.
    ///
    /// Contains every problem found while linking, not only the first one.
    IllegalModel(Vec<String>),
    /// A bound class cannot be instantiated
    Instantiation {
        /// Name of the class
        class: String,
        /// Why the instance could not be created
        reason: String,
    },
    /// Reading or writing a property failed outside of a recoverable context
    Accessor(AccessorError),
    /// A validation event that the installed handler refused to recover from,
    /// or that cannot be recovered at all
    Validation(ValidationEvent),
    /// The value has no element representation and cannot be marshalled as a root
    NotBound(String),
    /// The document was consumed without producing a root value
    NoResult,
}

impl From<::std::io::Error> for Error {
    /// Creates a new `Error::Io` from the given error
    #[inline]
    fn from(error: ::std::io::Error) -> Error {
        Error::Io(error)
    }
}

impl From<quick_xml::Error> for Error {
    /// Creates a new `Error::Xml` from the given error
    #[inline]
    fn from(error: quick_xml::Error) -> Error {
        Error::Xml(error)
    }
}

impl From<AccessorError> for Error {
    #[inline]
    fn from(error: AccessorError) -> Error {
        Error::Accessor(error)
    }
}

impl From<ValidationEvent> for Error {
    #[inline]
    fn from(event: ValidationEvent) -> Error {
        Error::Validation(event)
    }
}

/// A specialized `Result` type where the error is hard-wired to [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Xml(e) => write!(f, "malformed XML: {}", e),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::UnboundPrefix(p) => write!(f, "prefix '{}' is not bound to a namespace", p),
            Error::IllegalModel(problems) => {
                write!(f, "{} problem(s) in the class model", problems.len())?;
                for p in problems {
                    write!(f, "\n  - {}", p)?;
                }
                Ok(())
            }
            Error::Instantiation { class, reason } => {
                write!(f, "cannot create an instance of '{}': {}", class, reason)
            }
            Error::Accessor(e) => write!(f, "{}", e),
            Error::Validation(e) => write!(f, "{}", e),
            Error::NotBound(what) => write!(
                f,
                "unable to marshal {} as an element because it has no element name",
                what
            ),
            Error::NoResult => write!(f, "the document did not produce a root value"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Xml(e) => Some(e),
            Error::Io(e) => Some(e),
            Error::Accessor(e) => Some(e),
            Error::Validation(e) => Some(e),
            _ => None,
        }
    }
}

/// Failure of a single get/set/convert step on a bean property.
#[derive(Clone, Debug, PartialEq)]
pub enum AccessorError {
    /// The accessor was given a bean of another class
    WrongBean {
        /// Class the accessor was compiled for
        expected: String,
        /// Class of the bean that was passed in
        found: String,
    },
    /// The property holds (or was given) a value of an unexpected kind
    TypeMismatch {
        /// What the property expects
        expected: &'static str,
        /// What was found instead
        found: &'static str,
    },
    /// The property has no setter
    ReadOnly(String),
    /// A dynamic bean has no slot with this name
    UnknownProperty(String),
    /// An [`XmlAdapter`](crate::accessor::XmlAdapter) rejected the value
    Adapter(String),
}

impl fmt::Display for AccessorError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AccessorError::WrongBean { expected, found } => {
                write!(f, "expected an instance of '{}', found '{}'", expected, found)
            }
            AccessorError::TypeMismatch { expected, found } => {
                write!(f, "expected a {} value, found {}", expected, found)
            }
            AccessorError::ReadOnly(name) => write!(f, "property '{}' cannot be set", name),
            AccessorError::UnknownProperty(name) => write!(f, "no property named '{}'", name),
            AccessorError::Adapter(msg) => write!(f, "adapter failed: {}", msg),
        }
    }
}

impl std::error::Error for AccessorError {}

/// Lexical text could not be converted into a value.
///
/// Never escapes an unmarshal call: the loader that called the transducer
/// reports it as a validation event and leaves the property unset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    message: String,
}

impl ParseError {
    /// Creates a parse error with the given message
    pub fn new<M: Into<String>>(message: M) -> Self {
        ParseError {
            message: message.into(),
        }
    }

    /// Reports that `lexical` is not a valid lexical form of `type_name`
    pub fn invalid(type_name: &str, lexical: &str) -> Self {
        ParseError {
            message: format!("'{}' is not a valid value of type {}", lexical, type_name),
        }
    }

    /// Human readable description
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ParseError {}
