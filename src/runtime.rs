//! The linked form of a model, shared by every (un)marshaller of a context.
//!
//! Classes, properties and loaders refer to each other by index into the
//! tables of [`Grammar`], which keeps the whole graph immutable and `Sync`
//! once linked.

use crate::accessor::{Accessor, TransducedAccessor};
use crate::bean::{dynamic_factory, BeanFactory, BeanRef, ConstructorCache};
use crate::context::ContextConfig;
use crate::errors::Result;
use crate::model::Hooks;
use crate::name::{QName, QNameMap};
use crate::property::Property;
use crate::transducer::{print_text, LeafType, SimpleContext, Transducer};
use crate::unmarshaller::loader::{ChildLoader, Loader};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Index of a loader in [`Grammar::loaders`]
pub(crate) type LoaderId = usize;

/// Skips an element and everything inside it
pub(crate) const DISCARDER: LoaderId = 0;
/// Dispatches the document element
pub(crate) const ROOT: LoaderId = 1;
/// Captures an element as a [`DomElement`](crate::dom::DomElement)
pub(crate) const DOM: LoaderId = 2;

/// How the content of one element name is written
#[derive(Clone, Debug)]
pub(crate) enum Content {
    /// Text through a transducer
    Leaf(Arc<dyn Transducer>),
    /// A bean of the class at this index, or of a subclass
    Class(usize),
    /// Whatever the value is
    Any,
}

/// One element name of an element property, compiled
#[derive(Clone, Debug)]
pub(crate) struct ElementContent {
    pub name: QName,
    pub content: Content,
    pub nillable: bool,
    /// Built-in type of leaf content; `None` for enumerations and references
    pub leaf: Option<LeafType>,
}

/// A global element declaration, compiled
#[derive(Debug)]
pub(crate) struct ElementBeanInfo {
    pub content: ElementContent,
}

/// Target of an `xsi:type` name
#[derive(Clone, Copy, Debug)]
pub(crate) struct TypeBinding {
    /// Loader of the content
    pub loader: LoaderId,
    /// Class, when the type is a class
    pub class: Option<usize>,
}

/// A bound class, linked
pub(crate) struct ClassBeanInfo {
    pub name: String,
    pub type_name: Option<QName>,
    pub element_name: Option<QName>,
    /// The hierarchy from its root down to this class
    pub chain: Vec<usize>,
    /// Declared properties, in declaration order
    pub properties: Vec<Property>,
    pub attribute_wildcard: Option<Arc<dyn Accessor>>,
    /// ID property, inherited or declared
    pub id: Option<TransducedAccessor>,
    pub factory: Option<BeanFactory>,
    pub hooks: Hooks,
    pub is_abstract: bool,
    /// Number of collection scopes a bean element needs
    pub frame_size: usize,
    /// Reads the bean element
    pub loader: LoaderId,
    /// Reads the bean element, honoring `xsi:type`
    pub typed_loader: LoaderId,
}

impl fmt::Debug for ClassBeanInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ClassBeanInfo")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("chain", &self.chain)
            .field("properties", &self.properties.len())
            .field("frame_size", &self.frame_size)
            .finish()
    }
}

/// Everything a context knows after linking
#[derive(Debug)]
pub(crate) struct Grammar {
    pub config: ContextConfig,
    pub classes: Vec<ClassBeanInfo>,
    pub class_index: HashMap<String, usize>,
    pub elements: QNameMap<ElementBeanInfo>,
    pub loaders: Vec<Loader>,
    /// Names usable in `xsi:type`
    pub types: HashMap<QName, TypeBinding>,
    /// Document elements
    pub roots: QNameMap<ChildLoader>,
    /// Text loaders of the built-in leaf types
    pub leaf_loaders: HashMap<LeafType, LoaderId>,
    /// Reads `xs:anyType` content
    pub any_loader: LoaderId,
    pub constructors: ConstructorCache,
}

impl Grammar {
    /// Index of a class by name
    pub fn class_named(&self, name: &str) -> Option<usize> {
        self.class_index.get(name).copied()
    }

    /// Index of the class of a bean
    pub fn class_of(&self, bean: &BeanRef) -> Option<usize> {
        let bean = bean.borrow();
        self.class_named(bean.class_name())
    }

    /// Whether `class` is `base` or derives from it
    pub fn is_subclass(&self, class: usize, base: usize) -> bool {
        self.classes[class].chain.contains(&base)
    }

    /// The hierarchy of `class`, root first
    pub fn chain(&self, class: usize) -> impl Iterator<Item = &ClassBeanInfo> {
        self.classes[class].chain.iter().map(move |i| &self.classes[*i])
    }

    /// Creates a fresh instance of `class`
    pub fn create_instance(&self, class: usize) -> Result<BeanRef> {
        let info = &self.classes[class];
        let factory = match &info.factory {
            Some(factory) => Arc::clone(factory),
            None => self
                .constructors
                .get_or_resolve(&info.name, || dynamic_factory(&info.name, info.is_abstract))?,
        };
        Ok(factory())
    }

    /// ID of a bean, printed, if its class has an ID property that is set
    pub fn id_of(&self, bean: &BeanRef) -> Option<String> {
        let class = self.class_of(bean)?;
        let id = self.classes[class].id.as_ref()?;
        let value = id.get(&*bean.borrow()).ok()??;
        let xducer = match id {
            TransducedAccessor::Plain { xducer, .. } => xducer,
            _ => return None,
        };
        print_text(&**xducer, &value, &mut SimpleContext::new()).ok()
    }

    /// Names accepted as document element
    pub fn root_names(&self) -> impl Iterator<Item = &QName> {
        self.roots.keys()
    }
}
