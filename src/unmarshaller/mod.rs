//! Reading documents into values.
//!
//! An [`Unmarshaller`] feeds the events of a document to an
//! [`UnmarshallingContext`], which drives the loaders of the grammar:
//!
//! ```
//! use quick_bind::bean::{downcast_ref, DynamicBean};
//! use quick_bind::context::ContextBuilder;
//! use quick_bind::model::{ClassInfo, PropertyInfo, Target};
//! use quick_bind::name::QName;
//! use quick_bind::transducer::LeafType;
//! use quick_bind::value::Value;
//!
//! let context = ContextBuilder::new()
//!     .class(
//!         ClassInfo::new("Point")
//!             .root_element(QName::unqualified("point"))
//!             .property(PropertyInfo::attribute("x", QName::unqualified("x"), Target::Leaf(LeafType::Int)))
//!             .property(PropertyInfo::attribute("y", QName::unqualified("y"), Target::Leaf(LeafType::Int))),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let point = context.unmarshaller().unmarshal_str(r#"<point x="1" y="2"/>"#).unwrap();
//! let bean = point.as_bean().unwrap();
//! let bean = bean.borrow();
//! let point = downcast_ref::<DynamicBean>(&*bean).unwrap();
//! assert_eq!(point.get("x"), Some(&Value::Int(1)));
//! ```

use crate::bean::BeanRef;
use crate::errors::{Error, Result};
use crate::event::ValidationEventHandler;
use crate::model::Target;
use crate::runtime::Grammar;
use crate::value::{ElementValue, MimeData, Value};
use std::fmt;
use std::io::BufRead;
use std::sync::Arc;

pub(crate) mod context;
pub(crate) mod items;
pub(crate) mod loader;
pub(crate) mod reader;
pub(crate) mod structure;
pub mod visitor;

pub use self::context::UnmarshallingContext;
pub use self::visitor::{Attribute, TagName, XmlVisitor};

use self::context::RootMode;

/// Observes the beans of an unmarshal call.
///
/// Called after the hooks of the class of the bean.
pub trait UnmarshalListener {
    /// The bean was created; none of its properties is set yet
    fn before_unmarshal(&self, _bean: &BeanRef, _parent: Option<&BeanRef>) {}

    /// The end tag of the bean was read
    fn after_unmarshal(&self, _bean: &BeanRef, _parent: Option<&BeanRef>) {}
}

/// Resolves `xop:Include` references to attachments sent alongside the
/// document.
pub trait AttachmentUnmarshaller {
    /// The attachment with content ID `cid`, if there is one
    fn attachment(&self, cid: &str) -> Option<MimeData>;
}

/// Reads documents with the model of a [`BindingContext`].
///
/// [`BindingContext`]: crate::context::BindingContext
pub struct Unmarshaller {
    grammar: Arc<Grammar>,
    handler: Option<Arc<dyn ValidationEventHandler>>,
    listener: Option<Arc<dyn UnmarshalListener>>,
    attachments: Option<Arc<dyn AttachmentUnmarshaller>>,
}

impl Unmarshaller {
    pub(crate) fn new(grammar: Arc<Grammar>) -> Self {
        Unmarshaller {
            grammar,
            handler: None,
            listener: None,
            attachments: None,
        }
    }

    /// Decides what happens with validation events.
    ///
    /// Without a handler, warnings and errors are logged and processing
    /// goes on; fatal errors stop it.
    pub fn set_event_handler(&mut self, handler: Arc<dyn ValidationEventHandler>) -> &mut Self {
        self.handler = Some(handler);
        self
    }

    /// Observes the beans being created
    pub fn set_listener(&mut self, listener: Arc<dyn UnmarshalListener>) -> &mut Self {
        self.listener = Some(listener);
        self
    }

    /// Resolves `xop:Include` elements
    pub fn set_attachment_unmarshaller(&mut self, attachments: Arc<dyn AttachmentUnmarshaller>) -> &mut Self {
        self.attachments = Some(attachments);
        self
    }

    /// Reads a document whose root is a root class or a global element.
    ///
    /// Root classes produce [`Value::Bean`], global elements
    /// [`Value::Element`].
    pub fn unmarshal<R: BufRead>(&self, source: R) -> Result<Value> {
        let mut ctx = self.visitor_for(RootMode::Normal);
        debug!("unmarshal start");
        reader::read_document(source, &mut ctx)?;
        debug!("unmarshal end");
        ctx.into_result()
    }

    /// [`Self::unmarshal`] from a string
    pub fn unmarshal_str(&self, source: &str) -> Result<Value> {
        self.unmarshal(source.as_bytes())
    }

    /// Reads a document whose root element, whatever its name, holds
    /// content of type `declared`
    pub fn unmarshal_declared<R: BufRead>(&self, source: R, declared: &Target) -> Result<ElementValue> {
        let loader = match declared {
            Target::Class(name) => match self.grammar.class_named(name) {
                Some(class) => self.grammar.classes[class].typed_loader,
                None => return Err(Error::NotBound(name.clone())),
            },
            Target::Leaf(leaf) => match self.grammar.leaf_loaders.get(leaf) {
                Some(loader) => *loader,
                None => return Err(Error::NotBound(leaf.name().to_string())),
            },
            Target::Any => self.grammar.any_loader,
            Target::Enum(info) => return Err(Error::NotBound(info.name().to_string())),
        };
        let mut ctx = self.visitor_for(RootMode::Declared(loader));
        reader::read_document(source, &mut ctx)?;
        match ctx.into_result()? {
            Value::Element(element) => Ok(*element),
            _ => Err(Error::NoResult),
        }
    }

    /// Reads a document into an existing bean, resetting its collections
    /// first
    pub fn unmarshal_into<R: BufRead>(&self, source: R, bean: &BeanRef) -> Result<()> {
        let class = {
            let bean = bean.borrow();
            match self.grammar.class_named(bean.class_name()) {
                Some(class) => class,
                None => return Err(Error::NotBound(bean.class_name().to_string())),
            }
        };
        let mut ctx = self.visitor_for(RootMode::Into(class)).reusing(BeanRef::clone(bean));
        reader::read_document(source, &mut ctx)?;
        ctx.into_result().map(|_| ())
    }

    /// Reads a document from an asynchronous source
    #[cfg(feature = "async-tokio")]
    pub async fn unmarshal_async<R>(&self, source: R) -> Result<Value>
    where
        R: tokio::io::AsyncBufRead + Unpin,
    {
        let mut ctx = self.visitor_for(RootMode::Normal);
        reader::read_document_async(source, &mut ctx).await?;
        ctx.into_result()
    }

    /// A receiver of events for callers that produce them on their own.
    ///
    /// Feed it a complete document, then take the value with
    /// [`UnmarshallingContext::into_result`].
    pub fn visitor(&self) -> UnmarshallingContext {
        self.visitor_for(RootMode::Normal)
    }

    fn visitor_for(&self, mode: RootMode) -> UnmarshallingContext {
        UnmarshallingContext::new(Arc::clone(&self.grammar), mode)
            .with_handler(self.handler.clone())
            .with_listener(self.listener.clone())
            .with_attachments(self.attachments.clone())
    }
}

impl fmt::Debug for Unmarshaller {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Unmarshaller")
            .field("handler", &self.handler.is_some())
            .field("listener", &self.listener.is_some())
            .field("attachments", &self.attachments.is_some())
            .finish()
    }
}
