//! Compiled properties.
//!
//! Every [`PropertyInfo`] of the model is linked into one [`Property`], which
//! combines the accessor, transducer and lister of the property. A property
//! registers the loaders that read it into the structure loader of its class
//! and writes itself in three steps of the serialization of a bean:
//! namespace declarations, attributes, then content.

use crate::accessor::TransducedAccessor;
use crate::bean::BeanRef;
use crate::context::Linker;
use crate::errors::{AccessorError, Result};
use crate::marshaller::XmlSerializer;
use crate::model::{IdKind, PropertyInfo, PropertyKind};
use crate::name::QNameMap;
use crate::runtime::{Content, ElementContent, Grammar};
use crate::transducer::LeafType;
use crate::unmarshaller::loader::ChildLoader;
use crate::unmarshaller::structure::Wildcard;
use crate::value::Value;

mod array;
mod attribute;
mod leaf;
mod map;
mod node;
mod reference;
mod value;

pub(crate) use self::array::ArrayProperty;
pub(crate) use self::attribute::AttributeProperty;
pub(crate) use self::leaf::LeafProperty;
pub(crate) use self::map::MapProperty;
pub(crate) use self::node::NodeProperty;
pub(crate) use self::reference::ReferenceProperty;
pub(crate) use self::value::ValueProperty;

/// What the structure loader of a class is made of
#[derive(Clone, Debug, Default)]
pub(crate) struct StructureParts {
    pub children: QNameMap<ChildLoader>,
    pub attributes: QNameMap<TransducedAccessor>,
    pub text: Option<TransducedAccessor>,
    pub wildcard: Option<Wildcard>,
}

/// One property of a class, linked
#[derive(Debug)]
pub(crate) enum Property {
    /// Leaf value in an attribute
    Attribute(AttributeProperty),
    /// Single leaf value in an element
    Leaf(LeafProperty),
    /// Single bean or value of one of several element names
    Node(NodeProperty),
    /// Collection of elements, possibly wrapped
    Array(ArrayProperty),
    /// Global elements
    Reference(ReferenceProperty),
    /// Text content of the bean element
    Value(ValueProperty),
    /// Map of entries
    Map(MapProperty),
}

macro_rules! dispatch {
    ($self:ident, $p:ident => $body:expr) => {
        match $self {
            Property::Attribute($p) => $body,
            Property::Leaf($p) => $body,
            Property::Node($p) => $body,
            Property::Array($p) => $body,
            Property::Reference($p) => $body,
            Property::Value($p) => $body,
            Property::Map($p) => $body,
        }
    };
}

impl Property {
    /// Links `info` and registers its loaders in `parts`. `next_offset` is the
    /// next free collection slot of the class scope.
    pub fn compile(info: &PropertyInfo, linker: &mut Linker, parts: &mut StructureParts, next_offset: &mut usize) -> Self {
        match &info.kind {
            PropertyKind::Attribute { name, target } => {
                Property::Attribute(AttributeProperty::compile(info, name, target, linker, parts))
            }
            PropertyKind::Value { target } => Property::Value(ValueProperty::compile(info, target, linker, parts)),
            PropertyKind::Element { types, wrapper } => {
                if info.collection.is_some() && !info.list {
                    Property::Array(ArrayProperty::compile(info, types, wrapper.as_ref(), linker, parts, next_offset))
                } else if types.len() == 1 && (types[0].target.is_leaf() || info.list || info.id == IdKind::IdRef) {
                    Property::Leaf(LeafProperty::compile(info, &types[0], linker, parts))
                } else {
                    Property::Node(NodeProperty::compile(info, types, linker, parts))
                }
            }
            PropertyKind::Reference {
                elements,
                wildcard,
                wrapper,
            } => Property::Reference(ReferenceProperty::compile(
                info,
                elements,
                *wildcard,
                wrapper.as_ref(),
                linker,
                parts,
                next_offset,
            )),
            PropertyKind::Map {
                name,
                key,
                value,
                nillable,
            } => Property::Map(MapProperty::compile(info, name, key, value, *nillable, linker, parts)),
        }
    }

    /// Text conversion of the property when it is the ID of its bean
    pub fn id(&self) -> Option<&TransducedAccessor> {
        match self {
            Property::Attribute(p) if p.is_id => Some(&p.xacc),
            Property::Leaf(p) if p.is_id => Some(&p.xacc),
            Property::Value(p) if p.is_id => Some(&p.xacc),
            _ => None,
        }
    }

    /// Declares the namespaces the property needs on the bean element
    pub fn declare_namespaces(&self, bean: &BeanRef, ser: &mut XmlSerializer) -> Result<()> {
        match self {
            Property::Attribute(p) => p.declare_namespaces(bean, ser),
            Property::Value(p) => p.declare_namespaces(bean, ser),
            _ => Ok(()),
        }
    }

    /// Writes the attributes of the property
    pub fn serialize_attributes(&self, bean: &BeanRef, ser: &mut XmlSerializer) -> Result<()> {
        match self {
            Property::Attribute(p) => p.serialize(bean, ser),
            _ => Ok(()),
        }
    }

    /// Writes the content of the property
    pub fn serialize_body(&self, bean: &BeanRef, ser: &mut XmlSerializer) -> Result<()> {
        match self {
            Property::Attribute(_) => Ok(()),
            Property::Leaf(p) => p.serialize(bean, ser),
            Property::Node(p) => p.serialize(bean, ser),
            Property::Array(p) => p.serialize(bean, ser),
            Property::Reference(p) => p.serialize(bean, ser),
            Property::Value(p) => p.serialize(bean, ser),
            Property::Map(p) => p.serialize(bean, ser),
        }
    }

    /// Prepares a reused bean for unmarshalling
    pub fn reset(&self, bean: &BeanRef) -> std::result::Result<(), AccessorError> {
        match self {
            Property::Array(p) => p.reset(bean),
            Property::Reference(p) => p.reset(bean),
            _ => Ok(()),
        }
    }

    /// Name of the property, for messages
    pub fn name(&self) -> &str {
        dispatch!(self, p => &p.name)
    }
}

/// The element name and content a value of a property with several element
/// names is written as
pub(crate) fn select<'t>(types: &'t [ElementContent], value: &Value, grammar: &Grammar) -> Option<&'t ElementContent> {
    if types.len() == 1 {
        return types.first();
    }
    let any = || types.iter().find(|t| matches!(t.content, Content::Any));
    // enumerations and ID references
    let untyped_leaf = || {
        types
            .iter()
            .find(|t| matches!(t.content, Content::Leaf(_)) && t.leaf.is_none())
    };
    match value {
        Value::Element(element) => types.iter().find(|t| t.name == element.name).or_else(any),
        Value::Bean(bean) => {
            let class = grammar.class_of(bean);
            types
                .iter()
                .find(|t| match (&t.content, class) {
                    (Content::Class(declared), Some(class)) => grammar.is_subclass(class, *declared),
                    _ => false,
                })
                .or_else(untyped_leaf)
                .or_else(any)
        }
        Value::Dom(_) => any(),
        other => {
            let leaf = LeafType::of(other);
            types
                .iter()
                .find(|t| t.leaf.is_some() && t.leaf == leaf)
                .or_else(|| match other {
                    Value::String(_) => untyped_leaf(),
                    _ => None,
                })
                .or_else(any)
        }
    }
}
