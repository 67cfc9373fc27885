//! Models and small utilities shared by the integration tests.
#![allow(dead_code)]

use quick_bind::bean::{downcast_ref, BeanRef, DynamicBean};
use quick_bind::context::{BindingContext, ContextBuilder};
use quick_bind::lister::CollectionType;
use quick_bind::model::{ClassInfo, PropertyInfo, Target, Wrapper};
use quick_bind::name::QName;
use quick_bind::transducer::LeafType;
use quick_bind::value::Value;

/// Shorthand for a name in no namespace
pub fn q(local: &'static str) -> QName {
    QName::unqualified(local)
}

pub fn leaf(leaf: LeafType) -> Target {
    Target::Leaf(leaf)
}

/// A slot of a dynamic bean
pub fn slot(bean: &BeanRef, name: &str) -> Option<Value> {
    let bean = bean.borrow();
    downcast_ref::<DynamicBean>(&*bean).ok()?.get(name).cloned()
}

/// The bean of a value, panicking on anything else
pub fn bean(value: &Value) -> BeanRef {
    match value.as_bean() {
        Some(bean) => bean,
        None => panic!("expected a bean, found {:?}", value),
    }
}

/// Class name of a bean
pub fn class_of(bean: &BeanRef) -> String {
    bean.borrow().class_name().to_string()
}

/// Library, books and electronic books.
///
/// - `Library` is the document element, with a wrapped list of books and an
///   unwrapped list of tags;
/// - `Book` is identified by its `isbn` and may refer to its sequel by IDREF;
/// - `Ebook` derives from `Book` and is announced with `xsi:type`.
pub fn library_classes() -> Vec<ClassInfo> {
    vec![
        ClassInfo::new("Library")
            .root_element(q("library"))
            .property(PropertyInfo::attribute("name", q("name"), leaf(LeafType::String)))
            .property(
                PropertyInfo::element("books", q("book"), Target::class("Book"))
                    .collection(CollectionType::List)
                    .wrapped(Wrapper::new(q("books"))),
            )
            .property(PropertyInfo::element("tags", q("tag"), leaf(LeafType::String)).collection(CollectionType::List)),
        ClassInfo::new("Book")
            .type_name(q("Book"))
            .property(PropertyInfo::attribute("isbn", q("isbn"), leaf(LeafType::String)).id())
            .property(PropertyInfo::element("title", q("title"), leaf(LeafType::String)))
            .property(PropertyInfo::element("year", q("year"), leaf(LeafType::Int)))
            .property(PropertyInfo::element("sequel", q("sequel"), Target::class("Book")).idref()),
        ClassInfo::new("Ebook")
            .type_name(q("Ebook"))
            .extends("Book")
            .property(PropertyInfo::element("format", q("format"), leaf(LeafType::String))),
    ]
}

pub fn library() -> BindingContext {
    ContextBuilder::new()
        .classes(library_classes())
        .build()
        .expect("library model is valid")
}

/// A library with two books, the first one referring to the second
pub const LIBRARY: &str = r#"<library name="City"><books><book isbn="1"><title>Dune</title><year>1965</year><sequel>2</sequel></book><book xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:type="Ebook" isbn="2"><title>Messiah</title><year>1969</year><format>epub</format></book></books><tag>sf</tag><tag>classic</tag></library>"#;

/// Greeting in a namespace, with text content
pub fn greeting() -> BindingContext {
    ContextBuilder::new()
        .class(
            ClassInfo::new("Greeting")
                .root_element(QName::new("urn:hello", "greeting"))
                .property(PropertyInfo::attribute("lang", q("lang"), leaf(LeafType::String)))
                .property(PropertyInfo::value("text", leaf(LeafType::String))),
        )
        .build()
        .expect("greeting model is valid")
}

/// A price list keyed by product, with optional note
pub fn price_list() -> BindingContext {
    ContextBuilder::new()
        .class(
            ClassInfo::new("PriceList")
                .root_element(q("prices"))
                .property(PropertyInfo::map(
                    "entries",
                    q("entries"),
                    leaf(LeafType::String),
                    leaf(LeafType::Int),
                ))
                .property(PropertyInfo::element("note", q("note"), leaf(LeafType::String)).nillable())
                .property(PropertyInfo::element("currency", q("currency"), leaf(LeafType::String)).default_value("EUR")),
        )
        .build()
        .expect("price list model is valid")
}
