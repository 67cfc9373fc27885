//! Leaf values read from and written to documents
use bigdecimal::BigDecimal;
use chrono::DateTime;
use num_bigint::BigInt;
use quick_bind::bean::{bean_ref, DynamicBean};
use quick_bind::context::{BindingContext, ContextBuilder};
use quick_bind::event::ValidationEventCollector;
use quick_bind::model::{ClassInfo, PropertyInfo};
use quick_bind::name::QName;
use quick_bind::transducer::LeafType;
use quick_bind::value::Value;
use std::str::FromStr;
use std::sync::Arc;
use url::Url;
use uuid::Uuid;

use pretty_assertions::assert_eq;

mod helpers;
use helpers::*;

fn samples() -> BindingContext {
    let attribute = |name: &'static str, leaf: LeafType| PropertyInfo::attribute(name, q(name), helpers::leaf(leaf));
    let element = |name: &'static str, leaf: LeafType| PropertyInfo::element(name, q(name), helpers::leaf(leaf));
    ContextBuilder::new()
        .class(
            ClassInfo::new("Sample")
                .root_element(q("sample"))
                .property(attribute("flag", LeafType::Boolean))
                .property(attribute("small", LeafType::Byte))
                .property(attribute("ratio", LeafType::Double))
                .property(attribute("id", LeafType::Uuid))
                .property(element("price", LeafType::Decimal))
                .property(element("big", LeafType::Integer))
                .property(element("link", LeafType::Url))
                .property(element("wait", LeafType::Duration))
                .property(element("when", LeafType::Calendar))
                .property(element("day", LeafType::XmlCalendar))
                .property(element("initial", LeafType::Char))
                .property(element("hash", LeafType::Bytes).schema_type(QName::xs("hexBinary")))
                .property(element("tokens", LeafType::String).list())
                .property(element("code", LeafType::QName)),
        )
        .build()
        .unwrap()
}

#[test]
fn read_values() {
    let xml = concat!(
        r#"<sample flag="1" small="-8" ratio="0.25" id="67e55044-10b1-426f-9247-bb680e5fe0c8">"#,
        "<price>12.50</price>",
        "<big>123456789012345678901234567890</big>",
        "<link>https://example.com/a?b=c</link>",
        "<when>2001-10-26T21:32:52+02:00</when>",
        "<initial> 65 </initial>",
        "<hash>cafe</hash>",
        "<tokens> a b\n c </tokens>",
        "</sample>",
    );
    let sample = bean(&samples().unmarshaller().unmarshal_str(xml).unwrap());

    assert_eq!(slot(&sample, "flag"), Some(Value::Boolean(true)));
    assert_eq!(slot(&sample, "small"), Some(Value::Byte(-8)));
    assert_eq!(slot(&sample, "ratio"), Some(Value::Double(0.25)));
    assert_eq!(
        slot(&sample, "id"),
        Some(Value::Uuid(Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap()))
    );
    assert_eq!(slot(&sample, "price"), Some(Value::Decimal(BigDecimal::from_str("12.50").unwrap())));
    assert_eq!(
        slot(&sample, "big"),
        Some(Value::Integer(BigInt::from_str("123456789012345678901234567890").unwrap()))
    );
    assert_eq!(
        slot(&sample, "link"),
        Some(Value::Url(Url::parse("https://example.com/a?b=c").unwrap()))
    );
    assert_eq!(
        slot(&sample, "when"),
        Some(Value::DateTime(DateTime::parse_from_rfc3339("2001-10-26T21:32:52+02:00").unwrap()))
    );
    assert_eq!(slot(&sample, "initial"), Some(Value::Char('A')));
    assert_eq!(slot(&sample, "hash"), Some(Value::Bytes(vec![0xCA, 0xFE])));
    assert_eq!(
        slot(&sample, "tokens"),
        Some(Value::List(vec![Value::from("a"), Value::from("b"), Value::from("c")]))
    );
}

#[test]
fn canonical_forms_survive_a_round_trip() {
    let xml = concat!(
        r#"<sample flag="true" small="-8" ratio="0.25" id="67e55044-10b1-426f-9247-bb680e5fe0c8">"#,
        "<price>12.50</price>",
        "<big>-170141183460469231731687303715884105728</big>",
        "<link>https://example.com/a?b=c</link>",
        "<wait>P1DT2H</wait>",
        "<when>2001-10-26T21:32:52+02:00</when>",
        "<day>2024-02-29</day>",
        "<initial>65</initial>",
        "<hash>CAFE</hash>",
        "<tokens>a b c</tokens>",
        "</sample>",
    );
    let context = samples();
    let sample = context.unmarshaller().unmarshal_str(xml).unwrap();

    let mut marshaller = context.marshaller();
    marshaller.config_mut().fragment(true);
    assert_eq!(marshaller.marshal_to_string(&sample).unwrap(), xml);
}

#[test]
fn numbers_beyond_machine_width() {
    let xml = concat!(
        "<sample>",
        "<price>0.12345678901234567890123456789012345</price>",
        "<big>1000000000000000000000000000000000000000</big>",
        "</sample>",
    );
    let context = samples();
    let collector = Arc::new(ValidationEventCollector::new());
    let mut unmarshaller = context.unmarshaller();
    unmarshaller.set_event_handler(collector.clone());
    let sample = unmarshaller.unmarshal_str(xml).unwrap();

    assert_eq!(collector.events().len(), 0);
    let big = BigInt::from_str("1000000000000000000000000000000000000000").unwrap();
    assert_eq!(slot(&bean(&sample), "big"), Some(Value::Integer(big)));
    let mut marshaller = context.marshaller();
    marshaller.config_mut().fragment(true);
    assert_eq!(marshaller.marshal_to_string(&sample).unwrap(), xml);
}

#[test]
fn special_floats() {
    let context = samples();
    let sample = context
        .unmarshaller()
        .unmarshal_str(r#"<sample ratio="-INF"/>"#)
        .unwrap();
    assert_eq!(slot(&bean(&sample), "ratio"), Some(Value::Double(f64::NEG_INFINITY)));

    let mut marshaller = context.marshaller();
    marshaller.config_mut().fragment(true);
    assert_eq!(marshaller.marshal_to_string(&sample).unwrap(), r#"<sample ratio="-INF"/>"#);
}

#[test]
fn qname_prefix_is_resolved_in_scope() {
    let xml = r#"<sample xmlns:p="urn:p"><code>p:x</code></sample>"#;
    let sample = bean(&samples().unmarshaller().unmarshal_str(xml).unwrap());
    assert_eq!(slot(&sample, "code"), Some(Value::QName(QName::new("urn:p", "x"))));
}

#[test]
fn qname_list_declares_every_namespace() {
    let context = ContextBuilder::new()
        .class(
            ClassInfo::new("Kinds")
                .root_element(q("kinds"))
                .property(PropertyInfo::attribute("of", q("of"), leaf(LeafType::QName)).list()),
        )
        .build()
        .unwrap();
    let kinds = Value::List(vec![
        Value::QName(QName::new("urn:a", "x").with_prefix("a")),
        Value::QName(QName::new("urn:b", "y").with_prefix("b")),
    ]);
    let holder = bean_ref(DynamicBean::new("Kinds").with("of", kinds.clone()));

    let mut marshaller = context.marshaller();
    marshaller.config_mut().fragment(true);
    let xml = marshaller.marshal_to_string(&Value::Bean(holder)).unwrap();
    assert!(xml.contains(r#"="urn:a""#), "{}", xml);
    assert!(xml.contains(r#"="urn:b""#), "{}", xml);

    let read = context.unmarshaller().unmarshal_str(&xml).unwrap();
    assert_eq!(slot(&bean(&read), "of"), Some(kinds));
}

#[test]
fn invalid_values_are_reported() {
    let collector = Arc::new(ValidationEventCollector::new());
    let mut unmarshaller = samples().unmarshaller();
    unmarshaller.set_event_handler(collector.clone());

    let xml = r#"<sample flag="yes" small="300"><price>cheap</price><code>q:x</code></sample>"#;
    let sample = bean(&unmarshaller.unmarshal_str(xml).unwrap());

    assert_eq!(slot(&sample, "flag"), None);
    assert_eq!(slot(&sample, "price"), None);
    let fields: Vec<_> = collector
        .events()
        .iter()
        .map(|e| e.field().map(str::to_string))
        .collect();
    assert_eq!(
        fields,
        vec![
            Some("flag".to_string()),
            Some("small".to_string()),
            Some("price".to_string()),
            Some("code".to_string()),
        ]
    );
}
