use criterion::{self, criterion_group, criterion_main, Criterion, Throughput};
use quick_bind::context::{BindingContext, ContextBuilder};
use quick_bind::lister::CollectionType;
use quick_bind::model::{ClassInfo, PropertyInfo, Target, Wrapper};
use quick_bind::name::QName;
use quick_bind::transducer::LeafType;
use std::fmt::Write;

fn context() -> BindingContext {
    let q = QName::unqualified;
    ContextBuilder::new()
        .class(
            ClassInfo::new("Catalog")
                .root_element(q("catalog"))
                .property(
                    PropertyInfo::element("books", q("book"), Target::class("Book"))
                        .collection(CollectionType::List)
                        .wrapped(Wrapper::new(q("books"))),
                ),
        )
        .class(
            ClassInfo::new("Book")
                .property(PropertyInfo::attribute("isbn", q("isbn"), Target::Leaf(LeafType::String)).id())
                .property(PropertyInfo::element("title", q("title"), Target::Leaf(LeafType::String)))
                .property(PropertyInfo::element("year", q("year"), Target::Leaf(LeafType::Int)))
                .property(PropertyInfo::element("price", q("price"), Target::Leaf(LeafType::Decimal)))
                .property(PropertyInfo::element("sequel", q("sequel"), Target::class("Book")).idref())
                .property(
                    PropertyInfo::element("keywords", q("keywords"), Target::Leaf(LeafType::String)).list(),
                ),
        )
        .build()
        .unwrap()
}

/// A catalog of `books` books, each one referring to the next
fn document(books: usize) -> String {
    let mut xml = String::from("<catalog><books>");
    for i in 0..books {
        write!(
            xml,
            r#"<book isbn="{i}"><title>Title &amp; subtitle {i}</title><year>{}</year><price>{}.99</price>"#,
            1900 + i % 120,
            i % 50,
        )
        .unwrap();
        if i + 1 < books {
            write!(xml, "<sequel>{}</sequel>", i + 1).unwrap();
        }
        xml.push_str("<keywords>fiction classic paperback</keywords></book>");
    }
    xml.push_str("</books></catalog>");
    xml
}

fn unmarshal(c: &mut Criterion) {
    let context = context();
    let mut group = c.benchmark_group("unmarshal");
    for books in [10, 1000] {
        let xml = document(books);
        group.throughput(Throughput::Bytes(xml.len() as u64));
        group.bench_function(format!("{} books", books), |b| {
            let unmarshaller = context.unmarshaller();
            b.iter(|| {
                criterion::black_box(unmarshaller.unmarshal(xml.as_bytes()).unwrap());
            })
        });
    }
    group.finish();
}

fn marshal(c: &mut Criterion) {
    let context = context();
    let mut group = c.benchmark_group("marshal");
    for books in [10, 1000] {
        let xml = document(books);
        let value = context.unmarshaller().unmarshal(xml.as_bytes()).unwrap();
        group.throughput(Throughput::Bytes(xml.len() as u64));
        group.bench_function(format!("{} books", books), |b| {
            let mut marshaller = context.marshaller();
            marshaller.config_mut().fragment(true);
            let mut out = Vec::with_capacity(xml.len());
            b.iter(|| {
                out.clear();
                marshaller.marshal(&value, &mut out).unwrap();
                criterion::black_box(&out);
            })
        });
    }
    group.finish();
}

criterion_group!(benches, unmarshal, marshal);
criterion_main!(benches);
