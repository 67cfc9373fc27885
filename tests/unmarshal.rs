use quick_bind::bean::{same_bean, DynamicBean};
use quick_bind::context::ContextBuilder;
use quick_bind::errors::Error;
use quick_bind::event::{FailFast, Severity, ValidationEventCollector};
use quick_bind::lister::CollectionType;
use quick_bind::model::{ClassInfo, ElementInfo, PropertyInfo, Target, WildcardMode};
use quick_bind::name::QName;
use quick_bind::transducer::LeafType;
use quick_bind::value::Value;
use regex::Regex;
use std::sync::Arc;

use pretty_assertions::assert_eq;

mod helpers;
use helpers::*;

mod structure {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn library() {
        let context = helpers::library();
        let library = bean(&context.unmarshaller().unmarshal_str(LIBRARY).unwrap());

        assert_eq!(class_of(&library), "Library");
        assert_eq!(slot(&library, "name"), Some(Value::from("City")));
        assert_eq!(
            slot(&library, "tags"),
            Some(Value::List(vec![Value::from("sf"), Value::from("classic")]))
        );

        let books = slot(&library, "books").unwrap();
        let books = books.as_items().unwrap();
        assert_eq!(books.len(), 2);

        let dune = bean(&books[0]);
        assert_eq!(class_of(&dune), "Book");
        assert_eq!(slot(&dune, "title"), Some(Value::from("Dune")));
        assert_eq!(slot(&dune, "year"), Some(Value::Int(1965)));

        let messiah = bean(&books[1]);
        assert_eq!(class_of(&messiah), "Ebook");
        assert_eq!(slot(&messiah, "isbn"), Some(Value::from("2")));
        assert_eq!(slot(&messiah, "format"), Some(Value::from("epub")));
    }

    #[test]
    fn whitespace_between_elements() {
        let xml = r#"
            <library name="City">
                <books>
                    <book isbn="1">
                        <title>Dune</title>
                    </book>
                </books>
            </library>
        "#;
        let library = bean(&helpers::library().unmarshaller().unmarshal_str(xml).unwrap());
        let books = slot(&library, "books").unwrap();
        let dune = bean(&books.as_items().unwrap()[0]);
        assert_eq!(slot(&dune, "title"), Some(Value::from("Dune")));
        assert_eq!(slot(&library, "tags"), None);
    }

    #[test]
    fn empty_wrapper_is_empty_list() {
        let xml = r#"<library><books/></library>"#;
        let library = bean(&helpers::library().unmarshaller().unmarshal_str(xml).unwrap());
        assert_eq!(slot(&library, "books"), Some(Value::List(Vec::new())));
    }

    #[test]
    fn namespaced_root_and_text() {
        let xml = r#"<h:greeting xmlns:h="urn:hello" lang="en">Hello</h:greeting>"#;
        let greeting = bean(&greeting().unmarshaller().unmarshal_str(xml).unwrap());
        assert_eq!(slot(&greeting, "lang"), Some(Value::from("en")));
        assert_eq!(slot(&greeting, "text"), Some(Value::from("Hello")));
    }

    #[test]
    fn entities_and_cdata() {
        let xml = r#"<greeting xmlns="urn:hello">a &amp; <![CDATA[<b>]]></greeting>"#;
        let greeting = bean(&greeting().unmarshaller().unmarshal_str(xml).unwrap());
        assert_eq!(slot(&greeting, "text"), Some(Value::from("a & <b>")));
    }

    #[test]
    fn unmarshal_into_existing_bean() {
        let context = helpers::library();
        let library = quick_bind::bean::bean_ref(
            DynamicBean::new("Library").with("tags", Value::List(vec![Value::from("old")])),
        );
        let xml = r#"<library name="New"><tag>fresh</tag></library>"#;
        context
            .unmarshaller()
            .unmarshal_into(xml.as_bytes(), &library)
            .unwrap();
        assert_eq!(slot(&library, "name"), Some(Value::from("New")));
        assert_eq!(slot(&library, "tags"), Some(Value::List(vec![Value::from("fresh")])));
    }
}

mod references {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn forward_idref_is_resolved() {
        let library = bean(&helpers::library().unmarshaller().unmarshal_str(LIBRARY).unwrap());
        let books = slot(&library, "books").unwrap();
        let books = books.as_items().unwrap();
        let sequel = bean(&slot(&bean(&books[0]), "sequel").unwrap());
        assert!(same_bean(&sequel, &bean(&books[1])));
    }

    #[test]
    fn undefined_id() {
        let xml = r#"<library><books><book isbn="1"><sequel>9</sequel></book></books></library>"#;
        let collector = Arc::new(ValidationEventCollector::new());
        let mut unmarshaller = helpers::library().unmarshaller();
        unmarshaller.set_event_handler(collector.clone());

        let library = bean(&unmarshaller.unmarshal_str(xml).unwrap());
        let events = collector.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message(), "undefined ID \"9\"");

        let books = slot(&library, "books").unwrap();
        assert_eq!(slot(&bean(&books.as_items().unwrap()[0]), "sequel"), None);
    }
}

mod nil_and_defaults {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn nil_clears_property() {
        let xml = r#"<prices xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><note xsi:nil="true"/></prices>"#;
        let prices = bean(&price_list().unmarshaller().unmarshal_str(xml).unwrap());
        assert_eq!(slot(&prices, "note"), None);
    }

    #[test]
    fn default_value_of_empty_element() {
        let xml = r#"<prices><currency/></prices>"#;
        let prices = bean(&price_list().unmarshaller().unmarshal_str(xml).unwrap());
        assert_eq!(slot(&prices, "currency"), Some(Value::from("EUR")));
    }

    #[test]
    fn absent_element_keeps_no_default() {
        let prices = bean(&price_list().unmarshaller().unmarshal_str("<prices/>").unwrap());
        assert_eq!(slot(&prices, "currency"), None);
    }
}

mod maps {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn entries() {
        let xml = r#"<prices><entries><entry><key>tea</key><value>3</value></entry><entry><key>milk</key><value>1</value></entry></entries></prices>"#;
        let prices = bean(&price_list().unmarshaller().unmarshal_str(xml).unwrap());
        assert_eq!(
            slot(&prices, "entries"),
            Some(Value::Map(vec![
                (Value::from("tea"), Value::Int(3)),
                (Value::from("milk"), Value::Int(1)),
            ]))
        );
    }

    #[test]
    fn entry_without_value_is_skipped() {
        let xml = r#"<prices><entries><entry><key>tea</key></entry></entries></prices>"#;
        let collector = Arc::new(ValidationEventCollector::new());
        let mut unmarshaller = price_list().unmarshaller();
        unmarshaller.set_event_handler(collector.clone());

        let prices = bean(&unmarshaller.unmarshal_str(xml).unwrap());
        assert_eq!(slot(&prices, "entries"), Some(Value::Map(Vec::new())));
        let events = collector.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].severity(), Severity::Warning);
    }
}

mod elements {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn global_element_is_intercepted() {
        let context = ContextBuilder::new()
            .element(ElementInfo::new(q("count"), leaf(LeafType::Int)))
            .build()
            .unwrap();
        let value = context.unmarshaller().unmarshal_str("<count> 42 </count>").unwrap();
        match value {
            Value::Element(element) => {
                assert_eq!(element.name, q("count"));
                assert_eq!(element.value, Some(Value::Int(42)));
                assert!(!element.nil);
            }
            other => panic!("expected an element, found {:?}", other),
        }
    }

    #[test]
    fn declared_type() {
        let context = helpers::library();
        let xml = r#"<anything isbn="5"><title>Emma</title></anything>"#;
        let element = context
            .unmarshaller()
            .unmarshal_declared(xml.as_bytes(), &Target::class("Book"))
            .unwrap();
        assert_eq!(element.name, q("anything"));
        let book = bean(element.value.as_ref().unwrap());
        assert_eq!(class_of(&book), "Book");
        assert_eq!(slot(&book, "title"), Some(Value::from("Emma")));
    }

    #[test]
    fn declared_leaf_type() {
        let context = ContextBuilder::new().build().unwrap();
        let element = context
            .unmarshaller()
            .unmarshal_declared("<flag>true</flag>".as_bytes(), &leaf(LeafType::Boolean))
            .unwrap();
        assert_eq!(element.value, Some(Value::Boolean(true)));
    }

    #[test]
    fn xsi_type_on_unknown_root() {
        let xml = r#"<book xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:type="Ebook" isbn="3"><format>pdf</format></book>"#;
        let value = helpers::library().unmarshaller().unmarshal_str(xml).unwrap();
        let element = match value {
            Value::Element(element) => element,
            other => panic!("expected an element, found {:?}", other),
        };
        let ebook = bean(element.value.as_ref().unwrap());
        assert_eq!(class_of(&ebook), "Ebook");
        assert_eq!(slot(&ebook, "format"), Some(Value::from("pdf")));
    }

    #[test]
    fn wildcard_keeps_unknown_elements() {
        let context = ContextBuilder::new()
            .class(
                ClassInfo::new("Envelope")
                    .root_element(q("envelope"))
                    .property(PropertyInfo::any_element("content", WildcardMode::Lax).collection(CollectionType::List)),
            )
            .build()
            .unwrap();
        let xml = r#"<envelope><x:note xmlns:x="urn:x" to="me">hi<b>!</b></x:note></envelope>"#;
        let envelope = bean(&context.unmarshaller().unmarshal_str(xml).unwrap());
        let content = slot(&envelope, "content").unwrap();
        let items = content.as_items().unwrap();
        assert_eq!(items.len(), 1);
        match &items[0] {
            Value::Dom(note) => {
                assert_eq!(note.name(), &QName::new("urn:x", "note"));
                assert_eq!(note.attribute("", "to"), Some("me"));
                assert_eq!(note.elements().count(), 1);
            }
            other => panic!("expected a DOM element, found {:?}", other),
        }
    }
}

mod errors {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unknown_root() {
        match helpers::library().unmarshaller().unmarshal_str("<shelf/>") {
            Err(Error::Validation(event)) => {
                assert!(event.message().starts_with("unexpected element (uri:\"\", local:\"shelf\")"));
            }
            other => panic!("expected a validation error, found {:?}", other),
        }
    }

    #[test]
    fn unknown_child_is_skipped_by_default() {
        let xml = r#"<library name="City"><shelf><book/></shelf><tag>x</tag></library>"#;
        let library = bean(&helpers::library().unmarshaller().unmarshal_str(xml).unwrap());
        assert_eq!(slot(&library, "tags"), Some(Value::List(vec![Value::from("x")])));
    }

    #[test]
    fn near_miss_is_suggested() {
        let xml = r#"<library><books><book><titel>Dune</titel></book></books></library>"#;
        let collector = Arc::new(ValidationEventCollector::new());
        let mut unmarshaller = helpers::library().unmarshaller();
        unmarshaller.set_event_handler(collector.clone());
        unmarshaller.unmarshal_str(xml).unwrap();

        let events = collector.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].severity(), Severity::Error);
        assert!(events[0].message().ends_with("Did you mean <title>?"), "{}", events[0].message());
        assert!(events[0].location().is_some());
    }

    #[test]
    fn unrelated_name_is_not_suggested() {
        let xml = r#"<library><books><bogus/><book isbn="1"/></books></library>"#;
        let collector = Arc::new(ValidationEventCollector::new());
        let mut unmarshaller = helpers::library().unmarshaller();
        unmarshaller.set_event_handler(collector.clone());
        unmarshaller.unmarshal_str(xml).unwrap();

        let events = collector.events();
        assert_eq!(events.len(), 1);
        let message = events[0].message();
        assert!(message.starts_with(r#"unexpected element (uri:"", local:"bogus")"#), "{}", message);
        assert!(!message.contains("Did you mean"), "{}", message);
    }

    #[test]
    fn fail_fast_stops_on_bad_number() {
        let xml = r#"<library><books><book><year>soon</year></book></books></library>"#;
        let mut unmarshaller = helpers::library().unmarshaller();
        unmarshaller.set_event_handler(Arc::new(FailFast));
        match unmarshaller.unmarshal_str(xml) {
            Err(Error::Validation(event)) => assert_eq!(event.field(), Some("year")),
            other => panic!("expected a validation error, found {:?}", other),
        }
    }

    #[test]
    fn event_names_property_and_position() {
        let xml = "<library>\n  <books>\n    <book><year>soon</year></book>\n  </books>\n</library>";
        let mut unmarshaller = helpers::library().unmarshaller();
        unmarshaller.set_event_handler(Arc::new(FailFast));
        let event = match unmarshaller.unmarshal_str(xml) {
            Err(Error::Validation(event)) => event,
            other => panic!("expected a validation error, found {:?}", other),
        };
        let expected = Regex::new(r"^\[ERROR\] .+ \(property 'year'\) at line 3, column \d+$").unwrap();
        assert!(expected.is_match(&event.to_string()), "{}", event);
        assert_eq!(event.location().map(|l| l.line), Some(3));
    }

    #[test]
    fn bad_number_is_reported_and_skipped() {
        let xml = r#"<library><books><book><year>soon</year><title>Dune</title></book></books></library>"#;
        let library = bean(&helpers::library().unmarshaller().unmarshal_str(xml).unwrap());
        let books = slot(&library, "books").unwrap();
        let book = bean(&books.as_items().unwrap()[0]);
        assert_eq!(slot(&book, "year"), None);
        assert_eq!(slot(&book, "title"), Some(Value::from("Dune")));
    }

    #[test]
    fn malformed_document() {
        let result = helpers::library().unmarshaller().unmarshal_str("<library><books></library>");
        assert!(matches!(result, Err(Error::Xml(_))), "{:?}", result);
    }

    #[test]
    fn abstract_class_cannot_be_created() {
        let context = ContextBuilder::new()
            .class(ClassInfo::new("Shape").root_element(q("shape")).abstract_class())
            .build()
            .unwrap();
        let result = context.unmarshaller().unmarshal_str("<shape/>");
        assert!(matches!(result, Err(Error::Instantiation { .. })), "{:?}", result);
    }
}

#[test]
fn collections_are_plain_lists() {
    let context = ContextBuilder::new()
        .class(
            ClassInfo::new("Row")
                .root_element(q("row"))
                .property(
                    PropertyInfo::attribute("cells", q("cells"), leaf(LeafType::Int))
                        .collection(CollectionType::List)
                        .list(),
                ),
        )
        .build()
        .unwrap();
    let row = bean(&context.unmarshaller().unmarshal_str(r#"<row cells=" 1 2  3"/>"#).unwrap());
    assert_eq!(
        slot(&row, "cells"),
        Some(Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]))
    );
}
