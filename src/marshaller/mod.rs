//! Writing values as documents.
//!
//! ```
//! use quick_bind::bean::{bean_ref, DynamicBean};
//! use quick_bind::context::ContextBuilder;
//! use quick_bind::model::{ClassInfo, PropertyInfo, Target};
//! use quick_bind::name::QName;
//! use quick_bind::transducer::LeafType;
//! use quick_bind::value::Value;
//!
//! let context = ContextBuilder::new()
//!     .class(
//!         ClassInfo::new("Greeting")
//!             .root_element(QName::new("urn:hello", "greeting"))
//!             .property(PropertyInfo::attribute("lang", QName::unqualified("lang"), Target::Leaf(LeafType::String)))
//!             .property(PropertyInfo::value("text", Target::Leaf(LeafType::String))),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let bean = bean_ref(DynamicBean::new("Greeting").with("lang", "en").with("text", "Hello"));
//! let mut marshaller = context.marshaller();
//! marshaller.config_mut().fragment(true);
//! let xml = marshaller.marshal_to_string(&Value::Bean(bean)).unwrap();
//! assert_eq!(xml, r#"<greeting xmlns="urn:hello" lang="en">Hello</greeting>"#);
//! ```

use crate::bean::BeanRef;
use crate::dom::DomElement;
use crate::errors::{Error, Result};
use crate::event::ValidationEventHandler;
use crate::name::QName;
use crate::runtime::Grammar;
use crate::value::Value;
use std::fmt;
use std::io::Write;
use std::sync::Arc;

mod namespace;
mod output;
mod serializer;

pub use self::output::{DomOutput, WriterOutput, XmlOutput};
pub(crate) use self::serializer::XmlSerializer;

/// Layout of the written documents
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde-types", derive(serde::Deserialize, serde::Serialize))]
pub struct MarshallerConfig {
    /// Whether elements are put on lines of their own and indented.
    ///
    /// Default: `false`
    pub formatted_output: bool,
    /// Character used for indentation
    ///
    /// Default: `' '`
    pub indent_char: char,
    /// Number of [`Self::indent_char`] per level
    ///
    /// Default: `2`
    pub indent_size: usize,
    /// Whether the XML declaration is left out
    ///
    /// Default: `false`
    pub fragment: bool,
    /// Encoding named in the XML declaration. Other encodings than UTF-8
    /// are only produced with the `encoding` feature.
    ///
    /// Default: `UTF-8`
    pub encoding: String,
    /// `standalone` pseudo-attribute of the declaration, left out when `None`
    ///
    /// Default: `None`
    pub standalone: Option<bool>,
}

impl MarshallerConfig {
    /// Changes [`Self::formatted_output`]
    pub fn formatted_output(&mut self, val: bool) -> &mut Self {
        self.formatted_output = val;
        self
    }

    /// Changes [`Self::indent_char`] and [`Self::indent_size`]
    pub fn indent(&mut self, indent_char: char, indent_size: usize) -> &mut Self {
        self.indent_char = indent_char;
        self.indent_size = indent_size;
        self
    }

    /// Changes [`Self::fragment`]
    pub fn fragment(&mut self, val: bool) -> &mut Self {
        self.fragment = val;
        self
    }

    /// Changes [`Self::encoding`]
    pub fn encoding<E: Into<String>>(&mut self, label: E) -> &mut Self {
        self.encoding = label.into();
        self
    }

    /// Changes [`Self::standalone`]
    pub fn standalone(&mut self, val: Option<bool>) -> &mut Self {
        self.standalone = val;
        self
    }
}

impl Default for MarshallerConfig {
    fn default() -> Self {
        MarshallerConfig {
            formatted_output: false,
            indent_char: ' ',
            indent_size: 2,
            fragment: false,
            encoding: "UTF-8".to_string(),
            standalone: None,
        }
    }
}

/// Observes the beans of a marshal call.
///
/// Called after the hooks of the class of the bean.
pub trait MarshalListener {
    /// The bean is about to be written
    fn before_marshal(&self, _bean: &BeanRef) {}

    /// The end tag of the bean was written
    fn after_marshal(&self, _bean: &BeanRef) {}
}

/// Sends binary data out of band (MTOM/XOP).
pub trait AttachmentMarshaller {
    /// Stores `data` of element `element` as an attachment and returns the
    /// URI the document refers to it with, usually `cid:...`. `None` keeps
    /// the data inline.
    fn add_attachment(&self, data: &[u8], content_type: &str, element: &QName) -> Option<String>;
}

/// Writes values with the model of a [`BindingContext`].
///
/// [`BindingContext`]: crate::context::BindingContext
pub struct Marshaller {
    grammar: Arc<Grammar>,
    config: MarshallerConfig,
    handler: Option<Arc<dyn ValidationEventHandler>>,
    listener: Option<Arc<dyn MarshalListener>>,
    attachments: Option<Arc<dyn AttachmentMarshaller>>,
}

impl Marshaller {
    pub(crate) fn new(grammar: Arc<Grammar>) -> Self {
        Marshaller {
            grammar,
            config: MarshallerConfig::default(),
            handler: None,
            listener: None,
            attachments: None,
        }
    }

    /// Layout of the output
    pub fn config(&self) -> &MarshallerConfig {
        &self.config
    }

    /// Changes the layout of the output
    pub fn config_mut(&mut self) -> &mut MarshallerConfig {
        &mut self.config
    }

    /// Decides what happens with validation events.
    ///
    /// Without a handler, warnings are logged and anything more serious
    /// stops marshalling.
    pub fn set_event_handler(&mut self, handler: Arc<dyn ValidationEventHandler>) -> &mut Self {
        self.handler = Some(handler);
        self
    }

    /// Observes the beans being written
    pub fn set_listener(&mut self, listener: Arc<dyn MarshalListener>) -> &mut Self {
        self.listener = Some(listener);
        self
    }

    /// Sends binary data as attachments
    pub fn set_attachment_marshaller(&mut self, attachments: Arc<dyn AttachmentMarshaller>) -> &mut Self {
        self.attachments = Some(attachments);
        self
    }

    /// Writes `value` as a document to `output`.
    ///
    /// `value` must be a bean of a root class, an
    /// [`ElementValue`](crate::value::ElementValue) or a DOM element;
    /// anything else is [`Error::NotBound`].
    pub fn marshal_to_output(&self, value: &Value, output: &mut dyn XmlOutput) -> Result<()> {
        debug!("marshal start: {}", value.kind_name());
        let mut ser = XmlSerializer::new(Arc::clone(&self.grammar), output)
            .with_handler(self.handler.clone())
            .with_listener(self.listener.clone())
            .with_attachments(self.attachments.clone());
        ser.write_root(value)?;
        debug!("marshal end");
        Ok(())
    }

    /// Writes `value` as a document in the configured encoding
    pub fn marshal<W: Write>(&self, value: &Value, mut writer: W) -> Result<()> {
        #[cfg(feature = "encoding")]
        {
            if let Some(encoding) = self.target_encoding() {
                let text = self.marshal_to_string(value)?;
                let (bytes, _, unmappable) = encoding.encode(&text);
                if unmappable {
                    warn!("characters not representable in {} were written as references", encoding.name());
                }
                writer.write_all(&bytes)?;
                return Ok(());
            }
        }
        let mut output = WriterOutput::new(&mut writer, &self.config);
        self.marshal_to_output(value, &mut output)
    }

    /// Writes `value` as a document into a string. The text is UTF-8
    /// whatever the configured encoding.
    pub fn marshal_to_string(&self, value: &Value) -> Result<String> {
        let mut output = WriterOutput::new(Vec::new(), &self.config);
        self.marshal_to_output(value, &mut output)?;
        String::from_utf8(output.into_inner())
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
    }

    /// Writes `value` as a DOM tree
    pub fn marshal_to_dom(&self, value: &Value) -> Result<DomElement> {
        let mut output = DomOutput::new();
        self.marshal_to_output(value, &mut output)?;
        output.into_root().ok_or(Error::NoResult)
    }

    #[cfg(feature = "encoding")]
    fn target_encoding(&self) -> Option<&'static encoding_rs::Encoding> {
        let encoding = encoding_rs::Encoding::for_label(self.config.encoding.as_bytes())?;
        if encoding == encoding_rs::UTF_8 {
            None
        } else {
            Some(encoding)
        }
    }
}

impl fmt::Debug for Marshaller {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Marshaller")
            .field("config", &self.config)
            .field("handler", &self.handler.is_some())
            .field("listener", &self.listener.is_some())
            .field("attachments", &self.attachments.is_some())
            .finish()
    }
}
