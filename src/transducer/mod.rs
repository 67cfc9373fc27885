//! Conversion of single leaf values to and from their XML lexical form.
//!
//! A [`Transducer`] is stateless and shared by every property and every
//! (un)marshalling call of a context. Whatever a conversion needs to know
//! about the document being processed (bound prefixes, the expected MIME
//! type, the schema type a property declares) comes through the
//! [`ParseContext`] and [`PrintContext`] arguments.

use crate::bean::BeanRef;
use crate::datatype::Base64Data;
use crate::errors::{Error, ParseError, Result};
use crate::event::{Severity, ValidationEvent};
use crate::name::QName;
use crate::value::Value;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::Debug;

pub mod builtin;
pub mod enumeration;
pub mod filter;

pub use self::builtin::{catalog, Catalog, LeafTransducer, LeafType};
pub use self::enumeration::{EnumLeafInfo, EnumTransducer};
pub use self::filter::{
    IdRefTransducer, IdTransducer, InlineBinaryTransducer, MimeTypedTransducer,
    SchemaTypeTransducer,
};

/// Lexical representation of a leaf value: plain text, or binary data that
/// stands in for base64 text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Lexical<'a> {
    /// Character data
    Text(Cow<'a, str>),
    /// Binary data, printed as base64
    Binary(Base64Data<'a>),
}

impl<'a> Lexical<'a> {
    /// Borrowed text
    pub fn borrowed(text: &'a str) -> Self {
        Lexical::Text(Cow::Borrowed(text))
    }

    /// The text form, encoding binary data as base64
    pub fn to_text(&self) -> Cow<str> {
        match self {
            Lexical::Text(t) => Cow::Borrowed(t.as_ref()),
            Lexical::Binary(b) => Cow::Owned(b.encode()),
        }
    }

    /// Consumes the lexical and returns its text form
    pub fn into_text(self) -> Cow<'a, str> {
        match self {
            Lexical::Text(t) => t,
            Lexical::Binary(b) => Cow::Owned(b.encode()),
        }
    }

    /// Whether the text is empty
    pub fn is_empty(&self) -> bool {
        match self {
            Lexical::Text(t) => t.is_empty(),
            Lexical::Binary(b) => b.data().is_empty(),
        }
    }

    /// Copies the payload so it can outlive the callback that received it
    pub fn into_owned(self) -> Lexical<'static> {
        match self {
            Lexical::Text(t) => Lexical::Text(Cow::Owned(t.into_owned())),
            Lexical::Binary(b) => Lexical::Binary(b.into_owned()),
        }
    }
}

impl<'a> From<&'a str> for Lexical<'a> {
    fn from(text: &'a str) -> Self {
        Lexical::borrowed(text)
    }
}

impl From<String> for Lexical<'static> {
    fn from(text: String) -> Self {
        Lexical::Text(Cow::Owned(text))
    }
}

/// What a transducer may ask of the unmarshalling side.
pub trait ParseContext {
    /// Namespace bound to `prefix` at the current position; the empty prefix
    /// gives the default namespace
    fn resolve_prefix(&self, prefix: &str) -> Option<String>;
    /// Registers the object under construction as the target of `id`
    fn add_to_id_table(&mut self, id: &str);
    /// MIME type the current property expects, if declared
    fn expected_mime_type(&self) -> Option<&str>;
    /// Replaces the expected MIME type, returning the previous one
    fn set_expected_mime_type(&mut self, mime: Option<String>) -> Option<String>;
}

/// What a transducer may ask of the marshalling side.
pub trait PrintContext {
    /// Prefix currently bound to `uri`, `""` for the default namespace
    fn prefix_of(&self, uri: &str) -> Option<String>;
    /// Makes `uri` available on the element being opened and returns its
    /// prefix. Only valid while namespace declarations are collected.
    fn declare_namespace(&mut self, uri: &str, hint: Option<&str>, require_prefix: bool) -> String;
    /// Schema type declared by the property being printed
    fn schema_type(&self) -> Option<&QName>;
    /// Replaces the declared schema type, returning the previous one
    fn set_schema_type(&mut self, schema_type: Option<QName>) -> Option<QName>;
    /// MIME type declared by the property being printed
    fn expected_mime_type(&self) -> Option<&str>;
    /// Replaces the expected MIME type, returning the previous one
    fn set_expected_mime_type(&mut self, mime: Option<String>) -> Option<String>;
    /// Whether binary data must be inlined rather than sent as an attachment
    fn inline_binary(&self) -> bool;
    /// Replaces the inline flag, returning the previous one
    fn set_inline_binary(&mut self, inline: bool) -> bool;
    /// Reports a problem; returns an error when the handler refuses to continue
    fn report(&mut self, event: ValidationEvent) -> Result<()>;
    /// ID of a bean that is referenced by an IDREF property
    fn id_of(&self, bean: &BeanRef) -> Option<String>;
}

/// Converts one kind of leaf value to and from text.
pub trait Transducer: Send + Sync + Debug {
    /// Whether printing or parsing needs namespace bindings (`xs:QName`)
    fn use_namespace(&self) -> bool {
        false
    }

    /// Declares the namespaces `value` needs before the enclosing start tag
    /// is written. Does nothing unless [`use_namespace`](Self::use_namespace).
    fn declare_namespace(&self, _value: &Value, _ctx: &mut dyn PrintContext) -> Result<()> {
        Ok(())
    }

    /// Converts a value to its lexical form.
    ///
    /// Only fails on values of the wrong kind or when a reported problem is
    /// not recovered.
    fn print<'v>(&self, value: &'v Value, ctx: &mut dyn PrintContext) -> Result<Lexical<'v>>;

    /// Converts a lexical form to a value
    fn parse(&self, lexical: &Lexical, ctx: &mut dyn ParseContext) -> std::result::Result<Value, ParseError>;

    /// Schema type of this particular value, when it differs between
    /// instances (partial calendars)
    fn type_name(&self, _value: &Value) -> Option<QName> {
        None
    }
}

/// Stand-alone context for using transducers outside of (un)marshalling.
///
/// Holds prefix bindings in a flat map and an ID table; events are collected
/// and never abort, except errors when `fail_on_error` is set.
#[derive(Debug, Default)]
pub struct SimpleContext {
    /// Prefix to namespace bindings
    pub bindings: HashMap<String, String>,
    /// IDs registered while parsing
    pub ids: Vec<String>,
    /// Events reported while printing
    pub events: Vec<ValidationEvent>,
    /// Abort on ERROR and FATAL_ERROR events
    pub fail_on_error: bool,
    schema_type: Option<QName>,
    mime_type: Option<String>,
    inline: bool,
    counter: usize,
}

impl SimpleContext {
    /// Creates a context without bindings
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a prefix, builder style
    pub fn bind<P: Into<String>, U: Into<String>>(mut self, prefix: P, uri: U) -> Self {
        self.bindings.insert(prefix.into(), uri.into());
        self
    }
}

impl ParseContext for SimpleContext {
    fn resolve_prefix(&self, prefix: &str) -> Option<String> {
        match self.bindings.get(prefix) {
            Some(uri) => Some(uri.clone()),
            None if prefix.is_empty() => Some(String::new()),
            None if prefix == "xml" => Some(crate::name::XML_NS.to_string()),
            None => None,
        }
    }

    fn add_to_id_table(&mut self, id: &str) {
        self.ids.push(id.to_string());
    }

    fn expected_mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    fn set_expected_mime_type(&mut self, mime: Option<String>) -> Option<String> {
        std::mem::replace(&mut self.mime_type, mime)
    }
}

impl PrintContext for SimpleContext {
    fn prefix_of(&self, uri: &str) -> Option<String> {
        if uri.is_empty() {
            return Some(String::new());
        }
        self.bindings
            .iter()
            .find(|(_, u)| u.as_str() == uri)
            .map(|(p, _)| p.clone())
    }

    fn declare_namespace(&mut self, uri: &str, hint: Option<&str>, require_prefix: bool) -> String {
        if let Some(prefix) = self.prefix_of(uri) {
            if !(require_prefix && prefix.is_empty() && !uri.is_empty()) {
                return prefix;
            }
        }
        let prefix = match hint {
            Some(h) if !h.is_empty() && !self.bindings.contains_key(h) => h.to_string(),
            _ => loop {
                self.counter += 1;
                let candidate = format!("ns{}", self.counter);
                if !self.bindings.contains_key(&candidate) {
                    break candidate;
                }
            },
        };
        self.bindings.insert(prefix.clone(), uri.to_string());
        prefix
    }

    fn schema_type(&self) -> Option<&QName> {
        self.schema_type.as_ref()
    }

    fn set_schema_type(&mut self, schema_type: Option<QName>) -> Option<QName> {
        std::mem::replace(&mut self.schema_type, schema_type)
    }

    fn expected_mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    fn set_expected_mime_type(&mut self, mime: Option<String>) -> Option<String> {
        std::mem::replace(&mut self.mime_type, mime)
    }

    fn inline_binary(&self) -> bool {
        self.inline
    }

    fn set_inline_binary(&mut self, inline: bool) -> bool {
        std::mem::replace(&mut self.inline, inline)
    }

    fn report(&mut self, event: ValidationEvent) -> Result<()> {
        let abort = self.fail_on_error && event.severity() != Severity::Warning;
        self.events.push(event.clone());
        if abort {
            return Err(Error::Validation(event));
        }
        Ok(())
    }

    fn id_of(&self, _bean: &BeanRef) -> Option<String> {
        None
    }
}

/// Prints `value` to a string, resolving prefixes and reporting problems
/// through `ctx`
pub fn print_text(xducer: &dyn Transducer, value: &Value, ctx: &mut dyn PrintContext) -> Result<String> {
    Ok(xducer.print(value, ctx)?.into_text().into_owned())
}
