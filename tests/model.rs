use quick_bind::accessor::{FieldAccessor, FnAdapter};
use quick_bind::bean::{bean_ref, downcast_ref, BeanRef, DynamicBean};
use quick_bind::context::ContextBuilder;
use quick_bind::errors::{AccessorError, Error};
use quick_bind::event::{Severity, ValidationEventCollector};
use quick_bind::impl_bean;
use quick_bind::lister::CollectionType;
use quick_bind::model::{ClassInfo, PropertyInfo, Target, Wrapper};
use quick_bind::name::QName;
use quick_bind::transducer::{EnumLeafInfo, LeafType};
use quick_bind::unmarshaller::{AttachmentUnmarshaller, UnmarshalListener};
use quick_bind::value::{FromValue, MimeData, Value};
use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;

mod helpers;
use helpers::*;

mod context {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn queries() {
        let context = helpers::library();

        assert!(context.is_bound("Book"));
        assert!(context.is_bound("Ebook"));
        assert!(!context.is_bound("Magazine"));
        assert_eq!(context.type_name("Ebook"), Some(&q("Ebook")));
        assert_eq!(context.type_name("Library"), None);
        assert_eq!(context.root_names().collect::<Vec<_>>(), vec![&q("library")]);
    }

    #[test]
    fn element_names_and_ids() {
        let context = helpers::library();
        let library = context.unmarshaller().unmarshal_str(LIBRARY).unwrap();
        let books = slot(&bean(&library), "books").unwrap();
        let dune = bean(&books.as_items().unwrap()[0]);

        assert_eq!(context.element_name(&library), Some(q("library")));
        assert!(context.is_element(&library));
        assert_eq!(context.element_name(&Value::Bean(dune.clone())), None);
        assert_eq!(context.element_name(&Value::Int(1)), None);
        assert_eq!(context.id_of(&dune), Some("1".to_string()));
        assert_eq!(context.id_of(&bean(&library)), None);
    }

    #[test]
    fn constructors_are_cached() {
        let context = helpers::library();
        assert!(context.constructor_cache().is_empty());

        context.unmarshaller().unmarshal_str(LIBRARY).unwrap();
        assert_eq!(context.constructor_cache().len(), 3);
    }

    #[test]
    fn illegal_model() {
        let result = ContextBuilder::new()
            .class(
                ClassInfo::new("Shelf")
                    .property(
                        PropertyInfo::element("book", q("book"), Target::class("Book"))
                            .wrapped(Wrapper::new(q("books"))),
                    )
                    .property(PropertyInfo::element("owner", q("owner"), Target::class("Person"))),
            )
            .class(ClassInfo::new("Book"))
            .build();

        match result {
            Err(Error::IllegalModel(problems)) => assert_eq!(
                problems,
                vec![
                    "property 'book' of class 'Shelf' has a wrapper element but is not a collection".to_string(),
                    "property 'owner' of class 'Shelf' refers to unknown class 'Person'".to_string(),
                ]
            ),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn lenient_model_reads_unknown_classes_as_dom() {
        let mut builder = ContextBuilder::new().class(
            ClassInfo::new("Box")
                .root_element(q("box"))
                .property(PropertyInfo::element("item", q("item"), Target::class("Gone"))),
        );
        builder.config_mut().strict_model(false);
        let context = builder.build().unwrap();

        let boxed = bean(
            &context
                .unmarshaller()
                .unmarshal_str("<box><item kind=\"x\"><a>1</a></item></box>")
                .unwrap(),
        );
        match slot(&boxed, "item") {
            Some(Value::Dom(item)) => {
                assert_eq!(item.name(), &q("item"));
                assert_eq!(item.attribute("", "kind"), Some("x"));
                let a = item.select("a");
                assert_eq!(a.len(), 1);
                assert_eq!(a[0].text(), "1");
            }
            other => panic!("expected a DOM element, found {:?}", other),
        }
    }

    #[test]
    fn backup_with_parent_namespace() {
        let classes = || {
            ClassInfo::new("Note")
                .root_element(QName::new("urn:notes", "note"))
                .property(PropertyInfo::element("body", q("body"), leaf(LeafType::String)))
        };
        let xml = r#"<note xmlns="urn:notes"><body>hi</body></note>"#;

        let strict = ContextBuilder::new().class(classes()).build().unwrap();
        let note = bean(&strict.unmarshaller().unmarshal_str(xml).unwrap());
        assert_eq!(slot(&note, "body"), None);

        let mut builder = ContextBuilder::new().class(classes());
        builder.config_mut().backup_with_parent_namespace(true);
        let lenient = builder.build().unwrap();
        let note = bean(&lenient.unmarshaller().unmarshal_str(xml).unwrap());
        assert_eq!(slot(&note, "body"), Some(Value::from("hi")));
    }
}

/// Native structs bound through compiled accessors
mod native {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Default)]
    struct Point {
        x: i32,
        y: i32,
        label: Option<String>,
    }
    impl_bean!(Point, "Point");

    fn points() -> quick_bind::BindingContext {
        ContextBuilder::new()
            .class(
                ClassInfo::new("Point")
                    .root_element(q("point"))
                    .factory(|| bean_ref(Point::default()))
                    .property(
                        PropertyInfo::attribute("x", q("x"), leaf(LeafType::Int)).accessor(
                            FieldAccessor::<Point>::new(
                                "x",
                                |p| Some(Value::Int(p.x)),
                                Some(|p, v| {
                                    p.x = v.map(i32::from_value).transpose()?.unwrap_or_default();
                                    Ok(())
                                }),
                            )
                            .shared(),
                        ),
                    )
                    .property(
                        PropertyInfo::attribute("y", q("y"), leaf(LeafType::Int)).accessor(
                            FieldAccessor::<Point>::new(
                                "y",
                                |p| Some(Value::Int(p.y)),
                                Some(|p, v| {
                                    p.y = v.map(i32::from_value).transpose()?.unwrap_or_default();
                                    Ok(())
                                }),
                            )
                            .shared(),
                        ),
                    )
                    .property(
                        PropertyInfo::element("label", q("label"), leaf(LeafType::String)).accessor(
                            FieldAccessor::<Point>::new(
                                "label",
                                |p| p.label.clone().map(Value::String),
                                Some(|p, v| {
                                    p.label = v.map(String::from_value).transpose()?;
                                    Ok(())
                                }),
                            )
                            .shared(),
                        ),
                    ),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn unmarshal() {
        let point = points()
            .unmarshaller()
            .unmarshal_str(r#"<point x="3" y="-4"><label>origin</label></point>"#)
            .unwrap();
        let point = bean(&point);
        let point = point.borrow();
        let point = downcast_ref::<Point>(&*point).unwrap();

        assert_eq!(point.x, 3);
        assert_eq!(point.y, -4);
        assert_eq!(point.label.as_deref(), Some("origin"));
    }

    #[test]
    fn marshal() {
        let point = bean_ref(Point {
            x: 1,
            y: 2,
            label: None,
        });
        let mut marshaller = points().marshaller();
        marshaller.config_mut().fragment(true);

        assert_eq!(
            marshaller.marshal_to_string(&Value::Bean(point)).unwrap(),
            r#"<point x="1" y="2"/>"#
        );
    }

    #[derive(Debug, Default)]
    struct Route {
        stops: Vec<Value>,
    }
    impl_bean!(Route, "Route");

    #[test]
    fn reset_failure_names_the_property() {
        let context = ContextBuilder::new()
            .class(
                ClassInfo::new("Route").root_element(q("route")).property(
                    PropertyInfo::element("stops", q("stop"), leaf(LeafType::String))
                        .collection(CollectionType::Array)
                        .accessor(
                            FieldAccessor::<Route>::new("stops", |r| Some(Value::Array(r.stops.clone())), None)
                                .shared(),
                        ),
                ),
            )
            .build()
            .unwrap();
        let route = bean_ref(Route::default());
        let collector = Arc::new(ValidationEventCollector::new());
        let mut unmarshaller = context.unmarshaller();
        unmarshaller.set_event_handler(collector.clone());
        unmarshaller.unmarshal_into("<route/>".as_bytes(), &route).unwrap();

        let events = collector.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].field(), Some("stops"));
    }
}

mod conversions {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Stores percents as numbers, writes them as `50%`
    fn percent() -> Arc<FnAdapter> {
        Arc::new(FnAdapter::new(
            "percent",
            |value| match value {
                Value::Int(n) => Ok(Value::String(format!("{}%", n))),
                other => Err(AccessorError::Adapter(format!("not a percentage: {:?}", other))),
            },
            |value| match value {
                Value::String(s) => s
                    .trim_end_matches('%')
                    .parse()
                    .map(Value::Int)
                    .map_err(|e| AccessorError::Adapter(format!("{}: {}", s, e))),
                other => Err(AccessorError::Adapter(format!("not a percentage: {:?}", other))),
            },
        ))
    }

    fn discounts() -> quick_bind::BindingContext {
        ContextBuilder::new()
            .class(
                ClassInfo::new("Discount")
                    .root_element(q("discount"))
                    .property(PropertyInfo::attribute("rate", q("rate"), leaf(LeafType::String)).adapter(percent())),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn adapter_round_trip() {
        let context = discounts();
        let discount = bean(&context.unmarshaller().unmarshal_str(r#"<discount rate="15%"/>"#).unwrap());
        assert_eq!(slot(&discount, "rate"), Some(Value::Int(15)));

        let mut marshaller = context.marshaller();
        marshaller.config_mut().fragment(true);
        assert_eq!(
            marshaller.marshal_to_string(&Value::Bean(discount)).unwrap(),
            r#"<discount rate="15%"/>"#
        );
    }

    #[test]
    fn adapter_errors_are_events() {
        let collector = Arc::new(ValidationEventCollector::new());
        let mut unmarshaller = discounts().unmarshaller();
        unmarshaller.set_event_handler(collector.clone());

        let discount = bean(&unmarshaller.unmarshal_str(r#"<discount rate="lots"/>"#).unwrap());
        assert_eq!(slot(&discount, "rate"), None);
        let events = collector.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].severity(), Severity::Error);
        assert_eq!(events[0].field(), Some("rate"));
    }

    fn palette() -> quick_bind::BindingContext {
        let color = Arc::new(
            EnumLeafInfo::new("Color")
                .type_name(q("color"))
                .constant("RED", "red")
                .constant("DARK_GREEN", "dark-green"),
        );
        ContextBuilder::new()
            .class(
                ClassInfo::new("Palette")
                    .root_element(q("palette"))
                    .property(PropertyInfo::element("colors", q("color"), Target::Enum(color)).list()),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn enum_constants() {
        let context = palette();
        let xml = "<palette><color>red dark-green</color></palette>";
        let palette = bean(&context.unmarshaller().unmarshal_str(xml).unwrap());
        assert_eq!(
            slot(&palette, "colors"),
            Some(Value::List(vec![Value::from("RED"), Value::from("DARK_GREEN")]))
        );

        let mut marshaller = context.marshaller();
        marshaller.config_mut().fragment(true);
        assert_eq!(marshaller.marshal_to_string(&Value::Bean(palette)).unwrap(), xml);
    }

    #[test]
    fn unknown_enum_constant() {
        let collector = Arc::new(ValidationEventCollector::new());
        let mut unmarshaller = palette().unmarshaller();
        unmarshaller.set_event_handler(collector.clone());

        let palette = bean(&unmarshaller.unmarshal_str("<palette><color>red blue</color></palette>").unwrap());
        assert_eq!(slot(&palette, "colors"), Some(Value::List(vec![Value::from("RED")])));
        assert_eq!(collector.events().len(), 1);
    }

    #[derive(Debug, Default)]
    struct Store(Mutex<Vec<(String, MimeData)>>);

    impl AttachmentUnmarshaller for Store {
        fn attachment(&self, cid: &str) -> Option<MimeData> {
            let parts = self.0.lock().unwrap();
            parts.iter().find(|(id, _)| id == cid).map(|(_, data)| data.clone())
        }
    }

    #[test]
    fn attachments() {
        let context = ContextBuilder::new()
            .class(
                ClassInfo::new("Photo")
                    .root_element(q("photo"))
                    .property(PropertyInfo::element("data", q("data"), leaf(LeafType::Bytes))),
            )
            .build()
            .unwrap();
        let store = Store::default();
        store
            .0
            .lock()
            .unwrap()
            .push(("cid:1".to_string(), MimeData::new("image/png", b"png".to_vec())));
        let mut unmarshaller = context.unmarshaller();
        unmarshaller.set_attachment_unmarshaller(Arc::new(store));

        let xml = r#"<photo><data><xop:Include xmlns:xop="http://www.w3.org/2004/08/xop/include" href="cid:1"/></data></photo>"#;
        let photo = bean(&unmarshaller.unmarshal_str(xml).unwrap());
        assert_eq!(slot(&photo, "data"), Some(Value::Bytes(b"png".to_vec())));
    }

    #[test]
    fn missing_attachment() {
        let context = ContextBuilder::new()
            .class(
                ClassInfo::new("Photo")
                    .root_element(q("photo"))
                    .property(PropertyInfo::element("data", q("data"), leaf(LeafType::Bytes))),
            )
            .build()
            .unwrap();
        let collector = Arc::new(ValidationEventCollector::new());
        let mut unmarshaller = context.unmarshaller();
        unmarshaller.set_attachment_unmarshaller(Arc::new(Store::default()));
        unmarshaller.set_event_handler(collector.clone());

        let xml = r#"<photo><data><xop:Include xmlns:xop="http://www.w3.org/2004/08/xop/include" href="cid:7"/></data></photo>"#;
        unmarshaller.unmarshal_str(xml).unwrap();
        let events = collector.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message(), "attachment cid:7 cannot be resolved");
    }
}

mod callbacks {
    use super::*;
    use pretty_assertions::assert_eq;

    type Log = Arc<Mutex<Vec<String>>>;

    fn describe(what: &str, bean: &BeanRef, parent: Option<&BeanRef>) -> String {
        match parent {
            Some(parent) => format!("{} {} in {}", what, class_of(bean), class_of(parent)),
            None => format!("{} {}", what, class_of(bean)),
        }
    }

    #[test]
    fn class_hooks_run_for_subclasses() {
        let log = Log::default();
        let classes = library_classes().into_iter().map(|class| {
            if class.name != "Book" {
                return class;
            }
            let before = log.clone();
            let after = log.clone();
            class
                .before_unmarshal(move |bean, parent| before.lock().unwrap().push(describe("before", bean, parent)))
                .after_unmarshal(move |bean, parent| after.lock().unwrap().push(describe("after", bean, parent)))
        });
        let context = ContextBuilder::new().classes(classes).build().unwrap();
        context.unmarshaller().unmarshal_str(LIBRARY).unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "before Book in Library",
                "after Book in Library",
                "before Ebook in Library",
                "after Ebook in Library",
            ]
        );
    }

    #[derive(Debug, Default)]
    struct Recorder(Log);

    impl UnmarshalListener for Recorder {
        fn before_unmarshal(&self, bean: &BeanRef, parent: Option<&BeanRef>) {
            self.0.lock().unwrap().push(describe("before", bean, parent));
        }

        fn after_unmarshal(&self, bean: &BeanRef, parent: Option<&BeanRef>) {
            self.0.lock().unwrap().push(describe("after", bean, parent));
        }
    }

    #[test]
    fn listener_sees_every_bean() {
        let recorder = Arc::new(Recorder::default());
        let mut unmarshaller = helpers::library().unmarshaller();
        unmarshaller.set_listener(recorder.clone());
        unmarshaller.unmarshal_str(LIBRARY).unwrap();

        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec![
                "before Library",
                "before Book in Library",
                "after Book in Library",
                "before Ebook in Library",
                "after Ebook in Library",
                "after Library",
            ]
        );
    }

    #[test]
    fn factory_prepares_instances() {
        let context = ContextBuilder::new()
            .class(
                ClassInfo::new("Counter")
                    .root_element(q("counter"))
                    .factory(|| bean_ref(DynamicBean::new("Counter").with("step", Value::Int(1))))
                    .property(PropertyInfo::element("step", q("step"), leaf(LeafType::Int)))
                    .property(PropertyInfo::element("start", q("start"), leaf(LeafType::Int))),
            )
            .build()
            .unwrap();

        let counter = bean(&context.unmarshaller().unmarshal_str("<counter><start>5</start></counter>").unwrap());
        assert_eq!(slot(&counter, "step"), Some(Value::Int(1)));
        assert_eq!(slot(&counter, "start"), Some(Value::Int(5)));
        // explicit factories bypass the cache
        assert!(context.constructor_cache().is_empty());
    }
}
