//! XML data binding: read documents into object graphs and write them back.
//!
//! ## Description
//!
//! A model of classes is declared with [`ClassInfo`] and [`PropertyInfo`]:
//! which property is an attribute, which one a child element, a collection,
//! a reference to another object by ID. [`ContextBuilder`] checks the model
//! and compiles it into a [`BindingContext`], a graph of loaders and
//! properties shared by every call.
//!
//! - [`Unmarshaller`] streams a document through [`quick_xml`] and a state
//!   machine of loaders, creating objects as their start tags are read.
//! - [`Marshaller`] walks an object graph and writes it with
//!   [`quick_xml::Writer`], declaring namespaces where they are first needed.
//!
//! Problems found in the data do not stop processing by themselves: they are
//! reported as [`ValidationEvent`]s, and the installed
//! [`ValidationEventHandler`] decides whether to go on.
//!
//! ## Example
//!
//! ```
//! use quick_bind::bean::{bean_ref, DynamicBean};
//! use quick_bind::context::ContextBuilder;
//! use quick_bind::lister::CollectionType;
//! use quick_bind::model::{ClassInfo, PropertyInfo, Target, Wrapper};
//! use quick_bind::name::QName;
//! use quick_bind::transducer::LeafType;
//! use quick_bind::value::Value;
//!
//! let context = ContextBuilder::new()
//!     .class(
//!         ClassInfo::new("Order")
//!             .root_element(QName::unqualified("order"))
//!             .property(PropertyInfo::attribute("id", QName::unqualified("id"), Target::Leaf(LeafType::Long)))
//!             .property(
//!                 PropertyInfo::element("items", QName::unqualified("item"), Target::Leaf(LeafType::String))
//!                     .collection(CollectionType::List)
//!                     .wrapped(Wrapper::new(QName::unqualified("items"))),
//!             ),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let xml = r#"<order id="7"><items><item>tea</item><item>milk</item></items></order>"#;
//! let order = context.unmarshaller().unmarshal_str(xml).unwrap();
//!
//! let mut marshaller = context.marshaller();
//! marshaller.config_mut().fragment(true);
//! assert_eq!(marshaller.marshal_to_string(&order).unwrap(), xml);
//!
//! let copy = bean_ref(
//!     DynamicBean::new("Order")
//!         .with("id", Value::Long(8))
//!         .with("items", Value::List(vec![Value::from("bread")])),
//! );
//! assert_eq!(
//!     marshaller.marshal_to_string(&Value::Bean(copy)).unwrap(),
//!     r#"<order id="8"><items><item>bread</item></items></order>"#,
//! );
//! ```
//!
//! ## Optional features
//!
//! `quick-bind` supports the following features:
//!
//! [`ClassInfo`]: model::ClassInfo
//! [`PropertyInfo`]: model::PropertyInfo
//! [`ContextBuilder`]: context::ContextBuilder
//! [`BindingContext`]: context::BindingContext
//! [`Unmarshaller`]: unmarshaller::Unmarshaller
//! [`Marshaller`]: marshaller::Marshaller
//! [`ValidationEvent`]: event::ValidationEvent
//! [`ValidationEventHandler`]: event::ValidationEventHandler
#![cfg_attr(
    feature = "document-features",
    cfg_attr(doc, doc = ::document_features::document_features!(
        feature_label = "<a id=\"{feature}\" href=\"#{feature}\"><code>{feature}</code></a>"
    ))
)]
#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![recursion_limit = "1024"]
// Enable feature requirements in the docs from 1.57
// See https://stackoverflow.com/questions/61417452
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

#[macro_use]
extern crate log;

pub mod accessor;
pub mod bean;
pub mod context;
pub mod datatype;
pub mod dom;
pub mod errors;
pub mod event;
pub mod lister;
pub mod marshaller;
pub mod model;
pub mod name;
mod property;
mod runtime;
pub mod transducer;
pub mod unmarshaller;
mod utils;
pub mod value;

// reexports
pub use crate::context::{BindingContext, ContextBuilder, ContextConfig};
pub use crate::errors::{Error, Result};
pub use crate::event::{ValidationEvent, ValidationEventHandler};
pub use crate::marshaller::{Marshaller, MarshallerConfig};
pub use crate::unmarshaller::Unmarshaller;
pub use crate::value::Value;
