//! The declarative class model consumed by [`ContextBuilder`].
//!
//! A [`ClassInfo`] describes one bound class: its schema type, the element it
//! is written as when it is a document root, its base class and an ordered
//! list of [`PropertyInfo`]s. Global element declarations that are not tied to
//! a class are described by [`ElementInfo`].
//!
//! Models are plain data. Nothing is checked until the context is built, at
//! which point every problem is reported at once as
//! [`Error::IllegalModel`](crate::errors::Error::IllegalModel).
//!
//! ```
//! use quick_bind::model::{ClassInfo, PropertyInfo, Target, Wrapper};
//! use quick_bind::lister::CollectionType;
//! use quick_bind::name::QName;
//! use quick_bind::transducer::LeafType;
//!
//! let person = ClassInfo::new("Person")
//!     .root_element(QName::unqualified("person"))
//!     .property(PropertyInfo::element("name", QName::unqualified("name"), Target::Leaf(LeafType::String)))
//!     .property(
//!         PropertyInfo::element("pets", QName::unqualified("pet"), Target::Leaf(LeafType::String))
//!             .collection(CollectionType::List)
//!             .wrapped(Wrapper::new(QName::unqualified("pets"))),
//!     );
//! assert_eq!(person.properties.len(), 2);
//! ```
//!
//! [`ContextBuilder`]: crate::context::ContextBuilder

use crate::accessor::{slot, Accessor, XmlAdapter};
use crate::bean::{BeanFactory, BeanRef};
use crate::lister::CollectionType;
use crate::name::QName;
use crate::transducer::{EnumLeafInfo, LeafType};
use std::fmt;
use std::sync::Arc;

mod check;

pub(crate) use self::check::check_model;

/// What a property or element holds
#[derive(Clone, Debug)]
pub enum Target {
    /// A built-in leaf type
    Leaf(LeafType),
    /// A bound class, by name
    Class(String),
    /// An enumeration
    Enum(Arc<EnumLeafInfo>),
    /// `xs:anyType`: anything announced by `xsi:type`, otherwise raw content
    Any,
}

impl Target {
    /// Shorthand for [`Target::Class`]
    pub fn class<C: Into<String>>(name: C) -> Self {
        Target::Class(name.into())
    }

    /// Whether values are written as text
    pub fn is_leaf(&self) -> bool {
        matches!(self, Target::Leaf(_) | Target::Enum(_))
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            Target::Leaf(leaf) => leaf.name().to_string(),
            Target::Class(name) => name.clone(),
            Target::Enum(info) => info.name().to_string(),
            Target::Any => "anyType".to_string(),
        }
    }
}

/// Whether a property identifies its bean or refers to another one
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IdKind {
    /// Ordinary value
    #[default]
    None,
    /// The value is the ID of the bean (`xs:ID`)
    Id,
    /// The value is a bean written as its ID (`xs:IDREF`)
    IdRef,
}

/// One element name an element property can appear as, with its type
#[derive(Clone, Debug)]
pub struct TypeRef {
    /// Element name
    pub name: QName,
    /// Content type
    pub target: Target,
    /// Whether the element may be written as `xsi:nil="true"`
    pub nillable: bool,
    /// Text used when the element is present but empty
    pub default_value: Option<String>,
}

impl TypeRef {
    /// An element name bound to a content type
    pub fn new(name: QName, target: Target) -> Self {
        TypeRef {
            name,
            target,
            nillable: false,
            default_value: None,
        }
    }

    /// Allows `xsi:nil`
    pub fn nillable(mut self) -> Self {
        self.nillable = true;
        self
    }

    /// Sets the default text of the element
    pub fn default_value<D: Into<String>>(mut self, value: D) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

/// Enclosing element around the items of a collection
#[derive(Clone, Debug)]
pub struct Wrapper {
    /// Element name
    pub name: QName,
    /// An absent collection is written as `xsi:nil="true"` rather than omitted
    pub nillable: bool,
    /// The wrapper must be present
    pub required: bool,
}

impl Wrapper {
    /// A wrapper element named `name`
    pub fn new(name: QName) -> Self {
        Wrapper {
            name,
            nillable: false,
            required: false,
        }
    }

    /// Writes absent collections as a nil wrapper
    pub fn nillable(mut self) -> Self {
        self.nillable = true;
        self
    }

    /// Marks the wrapper as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Processing of elements matched by an element wildcard
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WildcardMode {
    /// Known elements become beans, unknown elements are errors
    Strict,
    /// Known elements become beans, unknown elements are kept as DOM
    Lax,
    /// Everything is kept as DOM
    Skip,
}

/// The kinds of property
#[derive(Clone, Debug)]
pub enum PropertyKind {
    /// An attribute with a leaf value
    Attribute {
        /// Attribute name
        name: QName,
        /// Value type, a leaf or an enumeration
        target: Target,
    },
    /// One or more element names, each with its own type
    Element {
        /// Possible element names
        types: Vec<TypeRef>,
        /// Enclosing element of a collection
        wrapper: Option<Wrapper>,
    },
    /// References to global elements; values are beans of root classes or
    /// [`ElementValue`](crate::value::ElementValue)s
    Reference {
        /// Names of the global elements accepted
        elements: Vec<QName>,
        /// Whether (and how) other elements are accepted too
        wildcard: Option<WildcardMode>,
        /// Enclosing element of a collection
        wrapper: Option<Wrapper>,
    },
    /// The text content of the element of the bean
    Value {
        /// Value type, a leaf or an enumeration
        target: Target,
    },
    /// A map written as `<name><entry><key/><value/></entry></name>`
    Map {
        /// Name of the enclosing element
        name: QName,
        /// Type of the keys
        key: Target,
        /// Type of the values
        value: Target,
        /// An absent map is written as `xsi:nil="true"`
        nillable: bool,
    },
}

/// One property of a bound class
#[derive(Clone)]
pub struct PropertyInfo {
    /// Name of the property, unique among the properties a class declares
    pub name: String,
    /// Kind specific description
    pub kind: PropertyKind,
    /// How the value is read and written on the bean
    pub accessor: Arc<dyn Accessor>,
    /// Collection held by the property, `None` for single values
    pub collection: Option<CollectionType>,
    /// The property must be present
    pub required: bool,
    /// ID-ness
    pub id: IdKind,
    /// Converter applied to the value, or to every item of a collection
    pub adapter: Option<Arc<dyn XmlAdapter>>,
    /// MIME type of binary content
    pub mime_type: Option<String>,
    /// Binary content is never sent as an attachment
    pub inline_binary: bool,
    /// Schema type the value is printed as, when it differs from the default
    pub schema_type: Option<QName>,
    /// A collection written as whitespace separated tokens in one attribute
    /// or element
    pub list: bool,
}

impl PropertyInfo {
    fn new(name: String, kind: PropertyKind) -> Self {
        PropertyInfo {
            accessor: slot(name.clone()),
            name,
            kind,
            collection: None,
            required: false,
            id: IdKind::None,
            adapter: None,
            mime_type: None,
            inline_binary: false,
            schema_type: None,
            list: false,
        }
    }

    /// An attribute property
    pub fn attribute<N: Into<String>>(name: N, attribute: QName, target: Target) -> Self {
        Self::new(name.into(), PropertyKind::Attribute { name: attribute, target })
    }

    /// An element property with a single element name
    pub fn element<N: Into<String>>(name: N, element: QName, target: Target) -> Self {
        Self::elements(name, vec![TypeRef::new(element, target)])
    }

    /// An element property whose type depends on the element name
    pub fn elements<N: Into<String>>(name: N, types: Vec<TypeRef>) -> Self {
        Self::new(name.into(), PropertyKind::Element { types, wrapper: None })
    }

    /// A property holding global elements
    pub fn reference<N: Into<String>>(name: N, elements: Vec<QName>) -> Self {
        Self::new(
            name.into(),
            PropertyKind::Reference {
                elements,
                wildcard: None,
                wrapper: None,
            },
        )
    }

    /// A property holding any element (`xs:any`)
    pub fn any_element<N: Into<String>>(name: N, mode: WildcardMode) -> Self {
        Self::new(
            name.into(),
            PropertyKind::Reference {
                elements: Vec::new(),
                wildcard: Some(mode),
                wrapper: None,
            },
        )
    }

    /// The text content of the bean element
    pub fn value<N: Into<String>>(name: N, target: Target) -> Self {
        Self::new(name.into(), PropertyKind::Value { target })
    }

    /// A map property
    pub fn map<N: Into<String>>(name: N, element: QName, key: Target, value: Target) -> Self {
        Self::new(
            name.into(),
            PropertyKind::Map {
                name: element,
                key,
                value,
                nillable: false,
            },
        )
    }

    /// Replaces the default slot accessor
    pub fn accessor(mut self, accessor: Arc<dyn Accessor>) -> Self {
        self.accessor = accessor;
        self
    }

    /// Makes the property a collection
    pub fn collection(mut self, collection: CollectionType) -> Self {
        self.collection = Some(collection);
        self
    }

    /// Encloses the items of a collection in a wrapper element.
    ///
    /// Has no effect on attribute, value and map properties.
    pub fn wrapped(mut self, w: Wrapper) -> Self {
        if let PropertyKind::Element { wrapper, .. } | PropertyKind::Reference { wrapper, .. } = &mut self.kind {
            *wrapper = Some(w);
        }
        self
    }

    /// Allows `xsi:nil` on every element name of an element property, or on
    /// the element of a map
    pub fn nillable(mut self) -> Self {
        match &mut self.kind {
            PropertyKind::Element { types, .. } => types.iter_mut().for_each(|t| t.nillable = true),
            PropertyKind::Map { nillable, .. } => *nillable = true,
            _ => {}
        }
        self
    }

    /// Sets the default text of every element name
    pub fn default_value<D: Into<String>>(mut self, value: D) -> Self {
        let value = value.into();
        if let PropertyKind::Element { types, .. } = &mut self.kind {
            for t in types {
                t.default_value = Some(value.clone());
            }
        }
        self
    }

    /// Sets how unknown elements are handled by a reference property
    pub fn wildcard(mut self, mode: WildcardMode) -> Self {
        if let PropertyKind::Reference { wildcard, .. } = &mut self.kind {
            *wildcard = Some(mode);
        }
        self
    }

    /// Marks the property as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// The property holds the ID of its bean
    pub fn id(mut self) -> Self {
        self.id = IdKind::Id;
        self
    }

    /// The property refers to beans by their ID
    pub fn idref(mut self) -> Self {
        self.id = IdKind::IdRef;
        self
    }

    /// Converts values through `adapter`
    pub fn adapter(mut self, adapter: Arc<dyn XmlAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// Declares the MIME type of binary content
    pub fn mime_type<M: Into<String>>(mut self, mime: M) -> Self {
        self.mime_type = Some(mime.into());
        self
    }

    /// Keeps binary content inline
    pub fn inline_binary(mut self) -> Self {
        self.inline_binary = true;
        self
    }

    /// Prints the value as `schema_type`
    pub fn schema_type(mut self, schema_type: QName) -> Self {
        self.schema_type = Some(schema_type);
        self
    }

    /// Writes a collection as whitespace separated tokens
    pub fn list(mut self) -> Self {
        self.list = true;
        if self.collection.is_none() {
            self.collection = Some(CollectionType::List);
        }
        self
    }

    /// Element names declared by the property, wrapper excluded
    pub fn element_names(&self) -> Vec<&QName> {
        match &self.kind {
            PropertyKind::Element { types, .. } => types.iter().map(|t| &t.name).collect(),
            PropertyKind::Reference { elements, .. } => elements.iter().collect(),
            PropertyKind::Map { name, .. } => vec![name],
            _ => Vec::new(),
        }
    }

    /// Wrapper element, if any
    pub fn wrapper(&self) -> Option<&Wrapper> {
        match &self.kind {
            PropertyKind::Element { wrapper, .. } | PropertyKind::Reference { wrapper, .. } => wrapper.as_ref(),
            _ => None,
        }
    }

    /// Whether this is a value property
    pub fn is_value(&self) -> bool {
        matches!(self.kind, PropertyKind::Value { .. })
    }
}

impl fmt::Debug for PropertyInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PropertyInfo")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("collection", &self.collection)
            .field("id", &self.id)
            .finish()
    }
}

/// Called with the bean and its parent bean, if any
pub type UnmarshalHook = Arc<dyn Fn(&BeanRef, Option<&BeanRef>) + Send + Sync>;
/// Called with the bean being written
pub type MarshalHook = Arc<dyn Fn(&BeanRef) + Send + Sync>;

/// Lifecycle callbacks of a class
#[derive(Clone, Default)]
pub struct Hooks {
    /// Before any property of a new bean is set
    pub before_unmarshal: Option<UnmarshalHook>,
    /// After the end tag of the bean was read
    pub after_unmarshal: Option<UnmarshalHook>,
    /// Before the start tag of the bean is written
    pub before_marshal: Option<MarshalHook>,
    /// After the end tag of the bean was written
    pub after_marshal: Option<MarshalHook>,
}

/// One bound class
#[derive(Clone)]
pub struct ClassInfo {
    /// Class name, matched against [`Bean::class_name`](crate::bean::Bean::class_name)
    pub name: String,
    /// Schema type, used by `xsi:type`
    pub type_name: Option<QName>,
    /// Element the class is written as when it is the document root
    pub element_name: Option<QName>,
    /// Name of the base class
    pub base: Option<String>,
    /// Declared properties, base class properties excluded
    pub properties: Vec<PropertyInfo>,
    /// Properties are written in declaration order (`xs:sequence`)
    pub ordered: bool,
    /// The class cannot be instantiated
    pub is_abstract: bool,
    /// No class may extend this one
    pub is_final: bool,
    /// Property receiving unknown attributes, as a
    /// [`Value::AttributeMap`](crate::value::Value::AttributeMap)
    pub attribute_wildcard: Option<Arc<dyn Accessor>>,
    /// Creates instances; [`DynamicBean`](crate::bean::DynamicBean)s are
    /// created when absent
    pub factory: Option<BeanFactory>,
    /// Lifecycle callbacks
    pub hooks: Hooks,
}

impl ClassInfo {
    /// A class without properties
    pub fn new<N: Into<String>>(name: N) -> Self {
        ClassInfo {
            name: name.into(),
            type_name: None,
            element_name: None,
            base: None,
            properties: Vec::new(),
            ordered: true,
            is_abstract: false,
            is_final: false,
            attribute_wildcard: None,
            factory: None,
            hooks: Hooks::default(),
        }
    }

    /// Sets the schema type name
    pub fn type_name(mut self, name: QName) -> Self {
        self.type_name = Some(name);
        self
    }

    /// Makes the class a document root written as `name`
    pub fn root_element(mut self, name: QName) -> Self {
        self.element_name = Some(name);
        self
    }

    /// Derives the class from `base`
    pub fn extends<B: Into<String>>(mut self, base: B) -> Self {
        self.base = Some(base.into());
        self
    }

    /// Appends a property
    pub fn property(mut self, property: PropertyInfo) -> Self {
        self.properties.push(property);
        self
    }

    /// Properties may appear in any order (`xs:all`)
    pub fn unordered(mut self) -> Self {
        self.ordered = false;
        self
    }

    /// Marks the class abstract
    pub fn abstract_class(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Marks the class final
    pub fn final_class(mut self) -> Self {
        self.is_final = true;
        self
    }

    /// Captures unknown attributes through `accessor`
    pub fn attribute_wildcard(mut self, accessor: Arc<dyn Accessor>) -> Self {
        self.attribute_wildcard = Some(accessor);
        self
    }

    /// Sets the instance factory
    pub fn factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> BeanRef + Send + Sync + 'static,
    {
        self.factory = Some(Arc::new(factory));
        self
    }

    /// Called on a new bean before its properties are set
    pub fn before_unmarshal<F>(mut self, hook: F) -> Self
    where
        F: Fn(&BeanRef, Option<&BeanRef>) + Send + Sync + 'static,
    {
        self.hooks.before_unmarshal = Some(Arc::new(hook));
        self
    }

    /// Called on a bean once its end tag was read
    pub fn after_unmarshal<F>(mut self, hook: F) -> Self
    where
        F: Fn(&BeanRef, Option<&BeanRef>) + Send + Sync + 'static,
    {
        self.hooks.after_unmarshal = Some(Arc::new(hook));
        self
    }

    /// Called before the bean is written
    pub fn before_marshal<F>(mut self, hook: F) -> Self
    where
        F: Fn(&BeanRef) + Send + Sync + 'static,
    {
        self.hooks.before_marshal = Some(Arc::new(hook));
        self
    }

    /// Called after the bean was written
    pub fn after_marshal<F>(mut self, hook: F) -> Self
    where
        F: Fn(&BeanRef) + Send + Sync + 'static,
    {
        self.hooks.after_marshal = Some(Arc::new(hook));
        self
    }

    /// Whether the class itself declares a value property
    pub fn has_value_property(&self) -> bool {
        self.properties.iter().any(PropertyInfo::is_value)
    }
}

impl fmt::Debug for ClassInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ClassInfo")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("element_name", &self.element_name)
            .field("base", &self.base)
            .field("properties", &self.properties)
            .finish()
    }
}

/// A global element declaration with a content type
#[derive(Clone, Debug)]
pub struct ElementInfo {
    /// Element name
    pub name: QName,
    /// Content type
    pub target: Target,
    /// Whether the element may be `xsi:nil="true"`
    pub nillable: bool,
    /// Text used when the element is empty
    pub default_value: Option<String>,
}

impl ElementInfo {
    /// Declares `name` with content `target`
    pub fn new(name: QName, target: Target) -> Self {
        ElementInfo {
            name,
            target,
            nillable: false,
            default_value: None,
        }
    }

    /// Allows `xsi:nil`
    pub fn nillable(mut self) -> Self {
        self.nillable = true;
        self
    }

    /// Sets the default text
    pub fn default_value<D: Into<String>>(mut self, value: D) -> Self {
        self.default_value = Some(value.into());
        self
    }
}
