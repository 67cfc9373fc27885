//! Dynamically typed property values.
//!
//! Accessors read and write [`Value`]s, transducers convert leaf values to and
//! from text, and listers iterate and pack the collection variants.

use crate::bean::{same_bean, BeanRef};
use crate::datatype::{XmlCalendar, XmlDuration};
use crate::dom::DomElement;
use crate::errors::AccessorError;
use crate::name::QName;
use chrono::{DateTime, FixedOffset};
use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use std::collections::BTreeMap;
use std::path::PathBuf;
use url::Url;
use uuid::Uuid;

/// A binary payload together with its MIME type (images, data handlers,
/// XML sources)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MimeData {
    /// MIME type of the payload
    pub content_type: String,
    /// Raw bytes
    pub data: Vec<u8>,
}

impl MimeData {
    /// Creates a payload
    pub fn new<C: Into<String>>(content_type: C, data: Vec<u8>) -> Self {
        MimeData {
            content_type: content_type.into(),
            data,
        }
    }
}

/// A value tagged with the name of the element it was read from or should be
/// written as.
#[derive(Clone, Debug, PartialEq)]
pub struct ElementValue {
    /// Element name
    pub name: QName,
    /// Whether the element was (or should be written as) `xsi:nil="true"`
    pub nil: bool,
    /// Content, absent for nil elements
    pub value: Option<Value>,
}

impl ElementValue {
    /// Creates a non-nil element value
    pub fn new(name: QName, value: Value) -> Self {
        ElementValue {
            name,
            nil: false,
            value: Some(value),
        }
    }

    /// Creates a nil element value
    pub fn nil(name: QName) -> Self {
        ElementValue {
            name,
            nil: true,
            value: None,
        }
    }
}

/// Primitive kinds with dedicated array storage
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    /// `bool`
    Boolean,
    /// `i8`
    Byte,
    /// `i16`
    Short,
    /// `i32`
    Int,
    /// `i64`
    Long,
    /// `f32`
    Float,
    /// `f64`
    Double,
    /// `char`
    Char,
}

/// Unboxed array of primitives
#[derive(Clone, Debug, PartialEq)]
pub enum PrimitiveArray {
    /// `bool[]`
    Boolean(Vec<bool>),
    /// `i8[]`
    Byte(Vec<i8>),
    /// `i16[]`
    Short(Vec<i16>),
    /// `i32[]`
    Int(Vec<i32>),
    /// `i64[]`
    Long(Vec<i64>),
    /// `f32[]`
    Float(Vec<f32>),
    /// `f64[]`
    Double(Vec<f64>),
    /// `char[]`
    Char(Vec<char>),
}

macro_rules! for_each_primitive {
    ($array:expr, $v:ident => $body:expr) => {
        match $array {
            PrimitiveArray::Boolean($v) => $body,
            PrimitiveArray::Byte($v) => $body,
            PrimitiveArray::Short($v) => $body,
            PrimitiveArray::Int($v) => $body,
            PrimitiveArray::Long($v) => $body,
            PrimitiveArray::Float($v) => $body,
            PrimitiveArray::Double($v) => $body,
            PrimitiveArray::Char($v) => $body,
        }
    };
}

impl PrimitiveArray {
    /// An empty array of the given kind with room for `capacity` items
    pub fn with_capacity(kind: PrimitiveKind, capacity: usize) -> Self {
        match kind {
            PrimitiveKind::Boolean => PrimitiveArray::Boolean(Vec::with_capacity(capacity)),
            PrimitiveKind::Byte => PrimitiveArray::Byte(Vec::with_capacity(capacity)),
            PrimitiveKind::Short => PrimitiveArray::Short(Vec::with_capacity(capacity)),
            PrimitiveKind::Int => PrimitiveArray::Int(Vec::with_capacity(capacity)),
            PrimitiveKind::Long => PrimitiveArray::Long(Vec::with_capacity(capacity)),
            PrimitiveKind::Float => PrimitiveArray::Float(Vec::with_capacity(capacity)),
            PrimitiveKind::Double => PrimitiveArray::Double(Vec::with_capacity(capacity)),
            PrimitiveKind::Char => PrimitiveArray::Char(Vec::with_capacity(capacity)),
        }
    }

    /// Kind of the items
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            PrimitiveArray::Boolean(_) => PrimitiveKind::Boolean,
            PrimitiveArray::Byte(_) => PrimitiveKind::Byte,
            PrimitiveArray::Short(_) => PrimitiveKind::Short,
            PrimitiveArray::Int(_) => PrimitiveKind::Int,
            PrimitiveArray::Long(_) => PrimitiveKind::Long,
            PrimitiveArray::Float(_) => PrimitiveKind::Float,
            PrimitiveArray::Double(_) => PrimitiveKind::Double,
            PrimitiveArray::Char(_) => PrimitiveKind::Char,
        }
    }

    /// Number of items
    pub fn len(&self) -> usize {
        for_each_primitive!(self, v => v.len())
    }

    /// Whether the array has no items
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Allocated room
    pub fn capacity(&self) -> usize {
        for_each_primitive!(self, v => v.capacity())
    }

    /// Grows the allocation to exactly `capacity` items
    pub(crate) fn grow_to(&mut self, capacity: usize) {
        for_each_primitive!(self, v => v.reserve_exact(capacity.saturating_sub(v.len())))
    }

    /// Drops unused capacity
    pub(crate) fn trim(&mut self) {
        for_each_primitive!(self, v => v.shrink_to_fit())
    }

    /// Item at `index`, boxed as a [`Value`]
    pub fn get(&self, index: usize) -> Option<Value> {
        match self {
            PrimitiveArray::Boolean(v) => v.get(index).map(|x| Value::Boolean(*x)),
            PrimitiveArray::Byte(v) => v.get(index).map(|x| Value::Byte(*x)),
            PrimitiveArray::Short(v) => v.get(index).map(|x| Value::Short(*x)),
            PrimitiveArray::Int(v) => v.get(index).map(|x| Value::Int(*x)),
            PrimitiveArray::Long(v) => v.get(index).map(|x| Value::Long(*x)),
            PrimitiveArray::Float(v) => v.get(index).map(|x| Value::Float(*x)),
            PrimitiveArray::Double(v) => v.get(index).map(|x| Value::Double(*x)),
            PrimitiveArray::Char(v) => v.get(index).map(|x| Value::Char(*x)),
        }
    }

    /// Appends a boxed item of the matching kind
    pub fn push(&mut self, item: Value) -> Result<(), AccessorError> {
        match (self, item) {
            (PrimitiveArray::Boolean(v), Value::Boolean(x)) => v.push(x),
            (PrimitiveArray::Byte(v), Value::Byte(x)) => v.push(x),
            (PrimitiveArray::Short(v), Value::Short(x)) => v.push(x),
            (PrimitiveArray::Int(v), Value::Int(x)) => v.push(x),
            (PrimitiveArray::Long(v), Value::Long(x)) => v.push(x),
            (PrimitiveArray::Float(v), Value::Float(x)) => v.push(x),
            (PrimitiveArray::Double(v), Value::Double(x)) => v.push(x),
            (PrimitiveArray::Char(v), Value::Char(x)) => v.push(x),
            (array, item) => {
                return Err(AccessorError::TypeMismatch {
                    expected: array.kind().name(),
                    found: item.kind_name(),
                })
            }
        }
        Ok(())
    }
}

impl PrimitiveKind {
    /// Rust name of the primitive
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "bool",
            PrimitiveKind::Byte => "i8",
            PrimitiveKind::Short => "i16",
            PrimitiveKind::Int => "i32",
            PrimitiveKind::Long => "i64",
            PrimitiveKind::Float => "f32",
            PrimitiveKind::Double => "f64",
            PrimitiveKind::Char => "char",
        }
    }
}

/// The value of a property
#[derive(Clone, Debug)]
pub enum Value {
    /// `xs:string` and its derivations
    String(String),
    /// `xs:boolean`
    Boolean(bool),
    /// `xs:byte`
    Byte(i8),
    /// `xs:short`, `xs:unsignedByte`
    Short(i16),
    /// `xs:int`, `xs:unsignedShort`
    Int(i32),
    /// `xs:long`, `xs:unsignedInt`
    Long(i64),
    /// `xs:float`
    Float(f32),
    /// `xs:double`
    Double(f64),
    /// A character, printed as its code point
    Char(char),
    /// `xs:integer` and its unbounded derivations
    Integer(BigInt),
    /// `xs:decimal`
    Decimal(BigDecimal),
    /// `xs:base64Binary`, `xs:hexBinary`
    Bytes(Vec<u8>),
    /// `xs:QName`
    QName(QName),
    /// An absolute URL (`xs:anyURI`)
    Url(Url),
    /// `xs:duration`
    Duration(XmlDuration),
    /// A full timestamp (`xs:dateTime`)
    DateTime(DateTime<FixedOffset>),
    /// A partial date/time whose schema type depends on the fields set
    Calendar(XmlCalendar),
    /// A UUID, printed as `xs:string`
    Uuid(Uuid),
    /// A class name, printed as `xs:string`
    Class(String),
    /// A file path, printed as `xs:string`
    File(PathBuf),
    /// Binary data with a MIME type
    Data(MimeData),
    /// An instance of a bound class
    Bean(BeanRef),
    /// A value tagged with an element name
    Element(Box<ElementValue>),
    /// Unbound element content
    Dom(DomElement),
    /// A growable collection
    List(Vec<Value>),
    /// A fixed-size array of objects
    Array(Vec<Value>),
    /// A fixed-size array of primitives
    PrimitiveArray(PrimitiveArray),
    /// Key/value pairs of a map property
    Map(Vec<(Value, Value)>),
    /// Attributes captured by an attribute wildcard
    AttributeMap(BTreeMap<QName, String>),
}

impl Value {
    /// Short description of the variant, used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Boolean(_) => "boolean",
            Value::Byte(_) => "byte",
            Value::Short(_) => "short",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Char(_) => "char",
            Value::Integer(_) => "integer",
            Value::Decimal(_) => "decimal",
            Value::Bytes(_) => "bytes",
            Value::QName(_) => "QName",
            Value::Url(_) => "URL",
            Value::Duration(_) => "duration",
            Value::DateTime(_) => "date-time",
            Value::Calendar(_) => "calendar",
            Value::Uuid(_) => "UUID",
            Value::Class(_) => "class",
            Value::File(_) => "file",
            Value::Data(_) => "MIME data",
            Value::Bean(_) => "bean",
            Value::Element(_) => "element",
            Value::Dom(_) => "DOM element",
            Value::List(_) => "list",
            Value::Array(_) => "array",
            Value::PrimitiveArray(_) => "primitive array",
            Value::Map(_) => "map",
            Value::AttributeMap(_) => "attribute map",
        }
    }

    /// Borrows the string of a [`Value::String`]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Clones the handle of a [`Value::Bean`]
    pub fn as_bean(&self) -> Option<BeanRef> {
        match self {
            Value::Bean(b) => Some(BeanRef::clone(b)),
            _ => None,
        }
    }

    /// Borrows the items of a [`Value::List`] or [`Value::Array`]
    pub fn as_items(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Error for a value of an unexpected variant
    pub(crate) fn mismatch(&self, expected: &'static str) -> AccessorError {
        AccessorError::TypeMismatch {
            expected,
            found: self.kind_name(),
        }
    }
}

impl PartialEq for Value {
    /// Structural equality, except for beans which compare by identity
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (String(a), String(b)) => a == b,
            (Boolean(a), Boolean(b)) => a == b,
            (Byte(a), Byte(b)) => a == b,
            (Short(a), Short(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Long(a), Long(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Double(a), Double(b)) => a == b,
            (Char(a), Char(b)) => a == b,
            (Integer(a), Integer(b)) => a == b,
            (Decimal(a), Decimal(b)) => a == b,
            (Bytes(a), Bytes(b)) => a == b,
            (QName(a), QName(b)) => a == b,
            (Url(a), Url(b)) => a == b,
            (Duration(a), Duration(b)) => a == b,
            (DateTime(a), DateTime(b)) => a == b,
            (Calendar(a), Calendar(b)) => a == b,
            (Uuid(a), Uuid(b)) => a == b,
            (Class(a), Class(b)) => a == b,
            (File(a), File(b)) => a == b,
            (Data(a), Data(b)) => a == b,
            (Bean(a), Bean(b)) => same_bean(a, b),
            (Element(a), Element(b)) => a == b,
            (Dom(a), Dom(b)) => a == b,
            (List(a), List(b)) => a == b,
            (Array(a), Array(b)) => a == b,
            (PrimitiveArray(a), PrimitiveArray(b)) => a == b,
            (Map(a), Map(b)) => a == b,
            (AttributeMap(a), AttributeMap(b)) => a == b,
            _ => false,
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                #[inline]
                fn from(v: $ty) -> Value {
                    Value::$variant(v)
                }
            }

            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self, AccessorError> {
                    match value {
                        Value::$variant(v) => Ok(v),
                        other => Err(other.mismatch(stringify!($variant))),
                    }
                }
            }
        )*
    };
}

/// Extracts a typed value, the inverse of `Into<Value>`.
///
/// Used by compiled accessors to move values into native struct fields.
pub trait FromValue: Sized {
    /// Converts the value or reports which variant was found instead
    fn from_value(value: Value) -> Result<Self, AccessorError>;
}

value_from! {
    String => String,
    bool => Boolean,
    i8 => Byte,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    char => Char,
    BigInt => Integer,
    BigDecimal => Decimal,
    Vec<u8> => Bytes,
    QName => QName,
    Url => Url,
    XmlDuration => Duration,
    DateTime<FixedOffset> => DateTime,
    XmlCalendar => Calendar,
    Uuid => Uuid,
    PathBuf => File,
    MimeData => Data,
    BeanRef => Bean,
    DomElement => Dom,
    PrimitiveArray => PrimitiveArray,
    BTreeMap<QName, String> => AttributeMap,
}

impl From<&str> for Value {
    #[inline]
    fn from(v: &str) -> Value {
        Value::String(v.to_string())
    }
}

impl From<ElementValue> for Value {
    #[inline]
    fn from(v: ElementValue) -> Value {
        Value::Element(Box::new(v))
    }
}

impl FromValue for Value {
    #[inline]
    fn from_value(value: Value) -> Result<Self, AccessorError> {
        Ok(value)
    }
}

impl FromValue for ElementValue {
    fn from_value(value: Value) -> Result<Self, AccessorError> {
        match value {
            Value::Element(e) => Ok(*e),
            other => Err(other.mismatch("Element")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean::{bean_ref, DynamicBean};
    use pretty_assertions::assert_eq;

    #[test]
    fn beans_compare_by_identity() {
        let a = bean_ref(DynamicBean::new("A"));
        let b = bean_ref(DynamicBean::new("A"));
        assert_eq!(Value::Bean(a.clone()), Value::Bean(a.clone()));
        assert_ne!(Value::Bean(a), Value::Bean(b));
    }

    #[test]
    fn typed_extraction() {
        assert_eq!(i32::from_value(Value::Int(5)), Ok(5));
        assert_eq!(
            i32::from_value(Value::String("5".into())),
            Err(AccessorError::TypeMismatch {
                expected: "Int",
                found: "string"
            })
        );
    }

    #[test]
    fn primitive_array_push() {
        let mut array = PrimitiveArray::with_capacity(PrimitiveKind::Int, 2);
        array.push(Value::Int(1)).unwrap();
        assert!(array.push(Value::Long(1)).is_err());
        assert_eq!(array.len(), 1);
        assert_eq!(array.get(0), Some(Value::Int(1)));
    }
}
