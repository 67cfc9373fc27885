//! Built-in leaf types and their codecs.
//!
//! Every [`LeafType`] is bound to one or more schema types. Several leaf
//! types may be bound to the same schema type (`Calendar`, `Date` and
//! `XmlCalendar` all print as `xs:dateTime`); when a schema type is looked up,
//! for instance to honor `xsi:type`, only the *primary* binding is used, so
//! unmarshalling an `xs:string` always produces a [`Value::String`] and never
//! a [`Value::File`] or [`Value::Class`].

use super::{Lexical, ParseContext, PrintContext, Transducer};
use crate::datatype::base64::decode_base64;
use crate::datatype::lexical::{
    parse_boolean, parse_double, parse_float, parse_hex, print_double, print_float, print_hex, trim,
};
use crate::datatype::{Base64Data, CalendarType, XmlCalendar};
use crate::errors::{ParseError, Result};
use crate::event::ValidationEvent;
use crate::name::{split_prefixed, QName, XS_NS};
use crate::value::{MimeData, Value};
use bigdecimal::BigDecimal;
use chrono::{DateTime, FixedOffset, NaiveDate, Offset, TimeZone, Utc};
use num_bigint::BigInt;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::borrow::Cow;
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use url::Url;
use uuid::Uuid;

/// Leaf types with a built-in codec
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LeafType {
    /// [`Value::String`] as `xs:string`
    String,
    /// [`Value::Boolean`]
    Boolean,
    /// [`Value::Byte`]
    Byte,
    /// [`Value::Short`]
    Short,
    /// [`Value::Int`]
    Int,
    /// [`Value::Long`]
    Long,
    /// [`Value::Float`]
    Float,
    /// [`Value::Double`]
    Double,
    /// [`Value::Char`] as `xs:unsignedShort`
    Char,
    /// [`Value::Integer`]
    Integer,
    /// [`Value::Decimal`]
    Decimal,
    /// [`Value::Bytes`] as `xs:base64Binary`
    Bytes,
    /// [`Value::QName`]
    QName,
    /// [`Value::Url`] as `xs:anyURI`
    Url,
    /// [`Value::String`] holding a URI reference
    Uri,
    /// [`Value::Duration`]
    Duration,
    /// [`Value::DateTime`] as `xs:dateTime`, keeping its offset
    Calendar,
    /// [`Value::DateTime`] as `xs:dateTime`, printed in UTC
    Date,
    /// [`Value::Calendar`], schema type taken from the fields that are set
    XmlCalendar,
    /// [`Value::Uuid`] as `xs:string`
    Uuid,
    /// [`Value::Class`] as `xs:string`
    Class,
    /// [`Value::File`] as `xs:string`
    File,
    /// [`Value::Data`] holding an image, `image/png` by default
    Image,
    /// [`Value::Data`] holding arbitrary binary data
    DataHandler,
    /// [`Value::Data`] holding an XML document, `text/xml` by default
    Source,
}

/// Registration order. Later entries replace earlier ones in the schema type
/// lookup, so the primary bindings come last.
const REGISTRATIONS: &[(LeafType, &[&str])] = &[
    // secondary bindings
    (LeafType::Char, &["unsignedShort"]),
    (LeafType::Calendar, &["dateTime"]),
    (LeafType::Date, &["dateTime"]),
    (LeafType::File, &["string"]),
    (LeafType::Url, &["anyURI"]),
    (LeafType::Uri, &["string"]),
    (LeafType::Class, &["string"]),
    (LeafType::Image, &["base64Binary"]),
    (LeafType::DataHandler, &["base64Binary"]),
    (LeafType::Source, &["base64Binary"]),
    (
        LeafType::XmlCalendar,
        &[
            "anySimpleType",
            "date",
            "dateTime",
            "time",
            "gMonth",
            "gDay",
            "gYear",
            "gYearMonth",
            "gMonthDay",
        ],
    ),
    (LeafType::Uuid, &["string"]),
    // primary bindings
    (
        LeafType::String,
        &[
            "string",
            "anySimpleType",
            "normalizedString",
            "anyURI",
            "token",
            "language",
            "Name",
            "NCName",
            "NMTOKEN",
            "ENTITY",
        ],
    ),
    (LeafType::Boolean, &["boolean"]),
    (LeafType::Bytes, &["base64Binary", "hexBinary"]),
    (LeafType::Byte, &["byte"]),
    (LeafType::Short, &["short", "unsignedByte"]),
    (LeafType::Int, &["int", "unsignedShort"]),
    (LeafType::Long, &["long", "unsignedInt"]),
    (LeafType::Float, &["float"]),
    (LeafType::Double, &["double"]),
    (
        LeafType::Integer,
        &[
            "integer",
            "positiveInteger",
            "negativeInteger",
            "nonPositiveInteger",
            "nonNegativeInteger",
            "unsignedLong",
        ],
    ),
    (LeafType::Decimal, &["decimal"]),
    (LeafType::QName, &["QName"]),
    (LeafType::Duration, &["duration"]),
];

impl LeafType {
    /// Name used in error messages
    pub fn name(self) -> &'static str {
        match self {
            LeafType::String => "String",
            LeafType::Boolean => "Boolean",
            LeafType::Byte => "Byte",
            LeafType::Short => "Short",
            LeafType::Int => "Int",
            LeafType::Long => "Long",
            LeafType::Float => "Float",
            LeafType::Double => "Double",
            LeafType::Char => "Char",
            LeafType::Integer => "Integer",
            LeafType::Decimal => "Decimal",
            LeafType::Bytes => "Bytes",
            LeafType::QName => "QName",
            LeafType::Url => "Url",
            LeafType::Uri => "Uri",
            LeafType::Duration => "Duration",
            LeafType::Calendar => "Calendar",
            LeafType::Date => "Date",
            LeafType::XmlCalendar => "XmlCalendar",
            LeafType::Uuid => "Uuid",
            LeafType::Class => "Class",
            LeafType::File => "File",
            LeafType::Image => "Image",
            LeafType::DataHandler => "DataHandler",
            LeafType::Source => "Source",
        }
    }

    /// The schema type this leaf type prints as by default
    pub fn schema_type(self) -> QName {
        let local = REGISTRATIONS
            .iter()
            .find(|(leaf, _)| *leaf == self)
            .map(|(_, types)| types[0])
            .unwrap_or("anySimpleType");
        match self {
            // `anySimpleType` comes first in the list only to keep it secondary
            LeafType::XmlCalendar => QName::xs("dateTime"),
            _ => QName::xs(local),
        }
    }

    /// The leaf type a value is written as when the declared type does not
    /// say (properties typed `anyType`)
    pub fn of(value: &Value) -> Option<LeafType> {
        Some(match value {
            Value::String(_) => LeafType::String,
            Value::Boolean(_) => LeafType::Boolean,
            Value::Byte(_) => LeafType::Byte,
            Value::Short(_) => LeafType::Short,
            Value::Int(_) => LeafType::Int,
            Value::Long(_) => LeafType::Long,
            Value::Float(_) => LeafType::Float,
            Value::Double(_) => LeafType::Double,
            Value::Char(_) => LeafType::Char,
            Value::Integer(_) => LeafType::Integer,
            Value::Decimal(_) => LeafType::Decimal,
            Value::Bytes(_) => LeafType::Bytes,
            Value::QName(_) => LeafType::QName,
            Value::Url(_) => LeafType::Url,
            Value::Duration(_) => LeafType::Duration,
            Value::DateTime(_) => LeafType::Calendar,
            Value::Calendar(_) => LeafType::XmlCalendar,
            Value::Uuid(_) => LeafType::Uuid,
            Value::Class(_) => LeafType::Class,
            Value::File(_) => LeafType::File,
            Value::Data(_) => LeafType::DataHandler,
            _ => return None,
        })
    }

    fn default_mime_type(self) -> &'static str {
        match self {
            LeafType::Image => "image/png",
            LeafType::Source => "text/xml",
            _ => crate::datatype::base64::DEFAULT_MIME_TYPE,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// Codec of a built-in [`LeafType`]
#[derive(Clone, Debug)]
pub struct LeafTransducer {
    leaf: LeafType,
    hex: bool,
}

impl LeafTransducer {
    /// Codec of `leaf`
    pub fn new(leaf: LeafType) -> Self {
        LeafTransducer { leaf, hex: false }
    }

    /// Byte arrays as `xs:hexBinary`
    pub fn hex_binary() -> Self {
        LeafTransducer {
            leaf: LeafType::Bytes,
            hex: true,
        }
    }

    /// The leaf type handled
    pub fn leaf(&self) -> LeafType {
        self.leaf
    }
}

fn parse_number<T: FromStr>(text: &str, type_name: &str) -> std::result::Result<T, ParseError> {
    trim(text)
        .parse()
        .map_err(|_| ParseError::invalid(type_name, text))
}

/// `xs:integer` of any size
fn parse_integer(text: &str) -> std::result::Result<BigInt, ParseError> {
    let unsigned = text.strip_prefix(['+', '-']).unwrap_or(text);
    if unsigned.is_empty() || !unsigned.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::invalid("xs:integer", text));
    }
    BigInt::from_str(text.strip_prefix('+').unwrap_or(text)).map_err(|_| ParseError::invalid("xs:integer", text))
}

/// `xs:decimal` of any precision. Exponents are not part of the lexical space.
fn parse_decimal(text: &str) -> std::result::Result<BigDecimal, ParseError> {
    let invalid = || ParseError::invalid("xs:decimal", text);
    let (negative, unsigned) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let (int, frac) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (int.is_empty() && frac.is_empty()) || !digits(int) || !digits(frac) {
        return Err(invalid());
    }
    let mut normalized = String::with_capacity(unsigned.len() + 3);
    if negative {
        normalized.push('-');
    }
    normalized.push_str(if int.is_empty() { "0" } else { int });
    if !frac.is_empty() {
        normalized.push('.');
        normalized.push_str(frac);
    }
    BigDecimal::from_str(&normalized).map_err(|_| invalid())
}

fn to_date_time(cal: &XmlCalendar, text: &str) -> std::result::Result<DateTime<FixedOffset>, ParseError> {
    let invalid = || ParseError::invalid("xs:dateTime", text);
    let (Some(year), Some(month), Some(day)) = (cal.year, cal.month, cal.day) else {
        return Err(invalid());
    };
    let nanos = match cal.fraction {
        Some(f) => (f * Decimal::from(1_000_000_000u32))
            .trunc()
            .to_u32()
            .ok_or_else(invalid)?,
        None => 0,
    };
    let naive = NaiveDate::from_ymd_opt(year, month.into(), day.into())
        .and_then(|d| {
            d.and_hms_nano_opt(
                cal.hour.unwrap_or(0).into(),
                cal.minute.unwrap_or(0).into(),
                cal.second.unwrap_or(0).into(),
                nanos,
            )
        })
        .ok_or_else(invalid)?;
    let offset = match cal.timezone {
        Some(minutes) => FixedOffset::east_opt(i32::from(minutes) * 60).ok_or_else(invalid)?,
        None => Utc.fix(),
    };
    offset.from_local_datetime(&naive).single().ok_or_else(invalid)
}

fn print_date_time(dt: &DateTime<FixedOffset>, ctx: &dyn PrintContext) -> String {
    let cal = XmlCalendar::from_datetime(dt);
    let date_only = ctx
        .schema_type()
        .map_or(false, |t| t.matches(XS_NS, "date"));
    let ty = if date_only {
        CalendarType::Date
    } else {
        CalendarType::DateTime
    };
    cal.format_as(ty).unwrap_or_default()
}

impl Transducer for LeafTransducer {
    fn use_namespace(&self) -> bool {
        self.leaf == LeafType::QName
    }

    fn declare_namespace(&self, value: &Value, ctx: &mut dyn PrintContext) -> Result<()> {
        if let Value::QName(name) = value {
            if !name.namespace().is_empty() {
                ctx.declare_namespace(name.namespace(), name.prefix(), false);
            }
        }
        Ok(())
    }

    fn print<'v>(&self, value: &'v Value, ctx: &mut dyn PrintContext) -> Result<Lexical<'v>> {
        let text = match (self.leaf, value) {
            (LeafType::String | LeafType::Uri, Value::String(s)) => return Ok(Lexical::borrowed(s)),
            (LeafType::Class, Value::Class(s)) => return Ok(Lexical::borrowed(s)),
            (LeafType::Url, Value::Url(u)) => return Ok(Lexical::borrowed(u.as_str())),
            (LeafType::Boolean, Value::Boolean(v)) => v.to_string(),
            (LeafType::Byte, Value::Byte(v)) => v.to_string(),
            (LeafType::Short, Value::Short(v)) => v.to_string(),
            (LeafType::Int, Value::Int(v)) => v.to_string(),
            (LeafType::Long, Value::Long(v)) => v.to_string(),
            (LeafType::Float, Value::Float(v)) => print_float(*v),
            (LeafType::Double, Value::Double(v)) => print_double(*v),
            (LeafType::Char, Value::Char(c)) => u32::from(*c).to_string(),
            (LeafType::Integer, Value::Integer(v)) => v.to_string(),
            (LeafType::Decimal, Value::Decimal(v)) => v.to_plain_string(),
            (LeafType::Bytes, Value::Bytes(data)) => {
                if self.hex {
                    print_hex(data)
                } else {
                    return Ok(Lexical::Binary(Base64Data::borrowed(data, None)));
                }
            }
            (LeafType::QName, Value::QName(name)) => match ctx.prefix_of(name.namespace()) {
                Some(prefix) if prefix.is_empty() => name.local_name().to_string(),
                Some(prefix) => format!("{}:{}", prefix, name.local_name()),
                None => {
                    ctx.report(ValidationEvent::error(format!(
                        "namespace '{}' of QName value {} has no prefix in scope",
                        name.namespace(),
                        name
                    )))?;
                    name.local_name().to_string()
                }
            },
            (LeafType::Duration, Value::Duration(d)) => d.to_string(),
            (LeafType::Calendar, Value::DateTime(dt)) => print_date_time(dt, ctx),
            (LeafType::Date, Value::DateTime(dt)) => {
                print_date_time(&dt.with_timezone(&Utc.fix()), ctx)
            }
            (LeafType::XmlCalendar, Value::Calendar(cal)) => {
                let ty = ctx
                    .schema_type()
                    .and_then(CalendarType::from_schema_type)
                    .or_else(|| cal.calendar_type());
                match ty.and_then(|t| cal.format_as(t)) {
                    Some(text) => text,
                    None => {
                        let target = ty.map_or("any calendar type", CalendarType::local_name);
                        ctx.report(ValidationEvent::warning(format!(
                            "calendar value {:?} lacks fields required by xs:{}",
                            cal, target
                        )))?;
                        String::new()
                    }
                }
            }
            (LeafType::Uuid, Value::Uuid(u)) => u.hyphenated().to_string(),
            (LeafType::File, Value::File(path)) => path.to_string_lossy().into_owned(),
            (LeafType::Image | LeafType::DataHandler | LeafType::Source, Value::Data(d)) => {
                return Ok(Lexical::Binary(Base64Data::borrowed(
                    &d.data,
                    Some(&d.content_type),
                )));
            }
            (leaf, other) => return Err(other.mismatch(leaf.name()).into()),
        };
        Ok(Lexical::Text(Cow::Owned(text)))
    }

    fn parse(&self, lexical: &Lexical, ctx: &mut dyn ParseContext) -> std::result::Result<Value, ParseError> {
        if let Lexical::Binary(binary) = lexical {
            match self.leaf {
                LeafType::Bytes => return Ok(Value::Bytes(binary.data().to_vec())),
                LeafType::Image | LeafType::DataHandler | LeafType::Source => {
                    let content_type = binary
                        .mime_type()
                        .or(ctx.expected_mime_type())
                        .unwrap_or(self.leaf.default_mime_type());
                    return Ok(Value::Data(MimeData::new(content_type, binary.data().to_vec())));
                }
                _ => {}
            }
        }
        let text = lexical.to_text();
        let t = trim(&text);
        Ok(match self.leaf {
            LeafType::String | LeafType::Uri => Value::String(text.into_owned()),
            LeafType::Boolean => Value::Boolean(parse_boolean(t)?),
            LeafType::Byte => Value::Byte(parse_number(t, "xs:byte")?),
            LeafType::Short => Value::Short(parse_number(t, "xs:short")?),
            LeafType::Int => Value::Int(parse_number(t, "xs:int")?),
            LeafType::Long => Value::Long(parse_number(t, "xs:long")?),
            LeafType::Float => Value::Float(parse_float(t)?),
            LeafType::Double => Value::Double(parse_double(t)?),
            LeafType::Char => {
                let code: u32 = parse_number(t, "xs:unsignedShort")?;
                Value::Char(char::from_u32(code).ok_or_else(|| ParseError::invalid("char", t))?)
            }
            LeafType::Integer => Value::Integer(parse_integer(t)?),
            LeafType::Decimal => Value::Decimal(parse_decimal(t)?),
            LeafType::Bytes if self.hex => Value::Bytes(parse_hex(t)?),
            LeafType::Bytes => Value::Bytes(decode_base64(t)?),
            LeafType::QName => {
                let (prefix, local) = split_prefixed(t);
                let prefix = prefix.unwrap_or("");
                let namespace = ctx.resolve_prefix(prefix).ok_or_else(|| {
                    ParseError::new(format!("prefix '{}' of QName value '{}' is not bound", prefix, t))
                })?;
                Value::QName(QName::new(namespace, local.to_string()).with_prefix(prefix.to_string()))
            }
            LeafType::Url => {
                Value::Url(Url::parse(t).map_err(|e| ParseError::new(format!("'{}' is not a URL: {}", t, e)))?)
            }
            LeafType::Duration => Value::Duration(t.parse()?),
            LeafType::Calendar => Value::DateTime(to_date_time(&t.parse()?, t)?),
            LeafType::Date => Value::DateTime(to_date_time(&t.parse()?, t)?.with_timezone(&Utc.fix())),
            LeafType::XmlCalendar => Value::Calendar(t.parse()?),
            LeafType::Uuid => Value::Uuid(Uuid::parse_str(t).map_err(|_| ParseError::invalid("UUID", t))?),
            LeafType::Class => Value::Class(t.to_string()),
            LeafType::File => Value::File(PathBuf::from(t)),
            LeafType::Image | LeafType::DataHandler | LeafType::Source => {
                let content_type = ctx
                    .expected_mime_type()
                    .unwrap_or(self.leaf.default_mime_type())
                    .to_string();
                Value::Data(MimeData::new(content_type, decode_base64(t)?))
            }
        })
    }

    fn type_name(&self, value: &Value) -> Option<QName> {
        match value {
            Value::Calendar(cal) => cal.calendar_type().map(CalendarType::schema_type),
            _ => None,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// The built-in codecs and the schema types bound to them
pub struct Catalog {
    transducers: HashMap<LeafType, Arc<dyn Transducer>>,
    primary: HashMap<QName, LeafType>,
    hex_binary: Arc<dyn Transducer>,
}

impl Catalog {
    fn build() -> Self {
        let mut transducers: HashMap<LeafType, Arc<dyn Transducer>> = HashMap::new();
        let mut primary = HashMap::new();
        for (leaf, types) in REGISTRATIONS {
            transducers.insert(*leaf, Arc::new(LeafTransducer::new(*leaf)));
            for local in *types {
                primary.insert(QName::xs(*local), *leaf);
            }
        }
        Catalog {
            transducers,
            primary,
            hex_binary: Arc::new(LeafTransducer::hex_binary()),
        }
    }

    /// Codec of a leaf type
    pub fn transducer(&self, leaf: LeafType) -> Arc<dyn Transducer> {
        match self.transducers.get(&leaf) {
            Some(x) => Arc::clone(x),
            None => Arc::new(LeafTransducer::new(leaf)),
        }
    }

    /// Codec of byte arrays printed as `xs:hexBinary`
    pub fn hex_binary(&self) -> Arc<dyn Transducer> {
        Arc::clone(&self.hex_binary)
    }

    /// The primary leaf type bound to a schema type
    pub fn leaf_for(&self, schema_type: &QName) -> Option<LeafType> {
        self.primary.get(schema_type).copied()
    }

    /// Codec used when a value announces `schema_type` through `xsi:type`
    pub fn transducer_for(&self, schema_type: &QName) -> Option<Arc<dyn Transducer>> {
        if schema_type.matches(XS_NS, "hexBinary") {
            return Some(self.hex_binary());
        }
        self.leaf_for(schema_type).map(|leaf| self.transducer(leaf))
    }

    /// Schema types with a primary binding
    pub fn schema_types(&self) -> impl Iterator<Item = (&QName, LeafType)> {
        self.primary.iter().map(|(k, v)| (k, *v))
    }

    /// Every leaf type with a codec
    pub fn leaf_types(&self) -> impl Iterator<Item = LeafType> + '_ {
        self.transducers.keys().copied()
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Catalog({} schema types)", self.primary.len())
    }
}

/// The process-wide catalog of built-in codecs
pub fn catalog() -> &'static Catalog {
    static CATALOG: OnceLock<Catalog> = OnceLock::new();
    CATALOG.get_or_init(Catalog::build)
}
