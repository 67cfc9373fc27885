//! Building a [`BindingContext`] from a model.
//!
//! Linking runs in two phases. The first one reserves a loader slot for every
//! class, so that properties can refer to the loader of any class, including
//! their own, before it exists. The second one compiles the classes base
//! first, each starting from the structure of its base, and fills the
//! reserved slots.

use crate::accessor::{AdaptedAccessor, Accessor, TransducedAccessor};
use crate::bean::{BeanRef, ConstructorCache};
use crate::errors::{Error, Result};
use crate::lister::{lister_for, CollectionType, Lister};
use crate::marshaller::Marshaller;
use crate::model::{check_model, ClassInfo, ElementInfo, IdKind, PropertyInfo, PropertyKind, Target};
use crate::name::{QName, QNameMap, XS_NS};
use crate::property::{Property, StructureParts};
use crate::runtime::{ClassBeanInfo, Content, ElementBeanInfo, ElementContent, Grammar, LoaderId, TypeBinding, DOM};
use crate::transducer::{
    catalog, EnumTransducer, IdRefTransducer, IdTransducer, InlineBinaryTransducer, LeafType, MimeTypedTransducer,
    SchemaTypeTransducer, Transducer,
};
use crate::unmarshaller::loader::{ChildLoader, Loader, NilAction};
use crate::unmarshaller::structure::StructureLoader;
use crate::unmarshaller::Unmarshaller;
use crate::value::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Settings of a [`BindingContext`]
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde-types", derive(serde::Deserialize, serde::Serialize))]
pub struct ContextConfig {
    /// Whether a child element that is not expected in its namespace is
    /// looked up by local name in the namespace of its parent.
    ///
    /// Helps reading documents that forgot to qualify their elements.
    ///
    /// Default: `false`
    pub backup_with_parent_namespace: bool,

    /// Whether properties may only refer to classes of the model.
    ///
    /// When `false`, a property typed with an unknown class is read and
    /// written as `xs:anyType`.
    ///
    /// Default: `true`
    pub strict_model: bool,
}

impl ContextConfig {
    /// Changes [`Self::backup_with_parent_namespace`]
    pub fn backup_with_parent_namespace(&mut self, val: bool) -> &mut Self {
        self.backup_with_parent_namespace = val;
        self
    }

    /// Changes [`Self::strict_model`]
    pub fn strict_model(&mut self, val: bool) -> &mut Self {
        self.strict_model = val;
        self
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        ContextConfig {
            backup_with_parent_namespace: false,
            strict_model: true,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// Collects the classes and global elements of a [`BindingContext`].
///
/// ```
/// use quick_bind::context::ContextBuilder;
/// use quick_bind::model::{ClassInfo, PropertyInfo, Target};
/// use quick_bind::name::QName;
/// use quick_bind::transducer::LeafType;
///
/// let mut builder = ContextBuilder::new().class(
///     ClassInfo::new("Note")
///         .root_element(QName::unqualified("note"))
///         .property(PropertyInfo::value("text", Target::Leaf(LeafType::String))),
/// );
/// builder.config_mut().backup_with_parent_namespace(true);
/// let context = builder.build().unwrap();
/// assert!(context.config().backup_with_parent_namespace);
/// ```
#[derive(Default)]
pub struct ContextBuilder {
    classes: Vec<ClassInfo>,
    elements: Vec<ElementInfo>,
    config: ContextConfig,
}

impl ContextBuilder {
    /// An empty model
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a class
    pub fn class(mut self, class: ClassInfo) -> Self {
        self.classes.push(class);
        self
    }

    /// Adds several classes
    pub fn classes<I: IntoIterator<Item = ClassInfo>>(mut self, classes: I) -> Self {
        self.classes.extend(classes);
        self
    }

    /// Adds a global element declaration
    pub fn element(mut self, element: ElementInfo) -> Self {
        self.elements.push(element);
        self
    }

    /// Settings of the context
    pub fn config_mut(&mut self) -> &mut ContextConfig {
        &mut self.config
    }

    /// Checks and links the model.
    ///
    /// Every problem of the model is reported at once in
    /// [`Error::IllegalModel`].
    pub fn build(self) -> Result<BindingContext> {
        let problems = check_model(&self.classes, &self.elements, self.config.strict_model);
        if !problems.is_empty() {
            return Err(Error::IllegalModel(problems));
        }
        let grammar = Linker::new(&self.classes).link(&self.elements, self.config.clone())?;
        debug!(
            "linked {} classes, {} elements, {} loaders",
            grammar.classes.len(),
            grammar.elements.len(),
            grammar.loaders.len()
        );
        Ok(BindingContext(Arc::new(grammar)))
    }
}

impl fmt::Debug for ContextBuilder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ContextBuilder")
            .field("classes", &self.classes.len())
            .field("elements", &self.elements.len())
            .field("config", &self.config)
            .finish()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// A linked model, shared by every unmarshaller and marshaller created from it.
///
/// Cheap to clone and safe to use from several threads; the objects it reads
/// and writes are local to each call.
#[derive(Clone, Debug)]
pub struct BindingContext(Arc<Grammar>);

impl BindingContext {
    /// Starts a new model
    pub fn builder() -> ContextBuilder {
        ContextBuilder::new()
    }

    /// Creates an unmarshaller
    pub fn unmarshaller(&self) -> Unmarshaller {
        Unmarshaller::new(Arc::clone(&self.0))
    }

    /// Creates a marshaller
    pub fn marshaller(&self) -> Marshaller {
        Marshaller::new(Arc::clone(&self.0))
    }

    /// Settings the context was built with
    pub fn config(&self) -> &ContextConfig {
        &self.0.config
    }

    /// Name of the element `value` is written as on its own, if it has one
    pub fn element_name(&self, value: &Value) -> Option<QName> {
        match value {
            Value::Element(element) => Some(element.name.clone()),
            Value::Dom(element) => Some(element.name().clone()),
            Value::Bean(bean) => {
                let class = self.0.class_of(bean)?;
                self.0.classes[class].element_name.clone()
            }
            _ => None,
        }
    }

    /// Whether `value` can be marshalled as a document
    pub fn is_element(&self, value: &Value) -> bool {
        self.element_name(value).is_some()
    }

    /// ID of a bean, if its class has a set ID property
    pub fn id_of(&self, bean: &BeanRef) -> Option<String> {
        self.0.id_of(bean)
    }

    /// Whether a class of this name is bound
    pub fn is_bound(&self, class: &str) -> bool {
        self.0.class_named(class).is_some()
    }

    /// Schema type of a bound class
    pub fn type_name(&self, class: &str) -> Option<&QName> {
        let class = self.0.class_named(class)?;
        self.0.classes[class].type_name.as_ref()
    }

    /// Names accepted as document element
    pub fn root_names(&self) -> impl Iterator<Item = &QName> {
        self.0.root_names()
    }

    /// Factories resolved for classes without an explicit one
    pub fn constructor_cache(&self) -> &ConstructorCache {
        &self.0.constructors
    }

    #[inline]
    pub(crate) fn grammar(&self) -> &Grammar {
        &self.0
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// Result of compiling one class
struct Compiled {
    parts: StructureParts,
    frame_size: usize,
    properties: Vec<Property>,
    id: Option<TransducedAccessor>,
    attribute_wildcard: Option<Arc<dyn Accessor>>,
    chain: Vec<usize>,
}

/// Builds a [`Grammar`]. Properties use it to create their loaders and
/// to find the loaders of classes and global elements.
pub(crate) struct Linker<'m> {
    classes: &'m [ClassInfo],
    class_index: HashMap<String, usize>,
    loaders: Vec<Loader>,
    /// Structure and `xsi:type` aware loader of every class
    class_loaders: Vec<(LoaderId, LoaderId)>,
    leaf_loaders: HashMap<LeafType, LoaderId>,
    any_loader: LoaderId,
    roots: QNameMap<ChildLoader>,
    compiled: Vec<Option<Compiled>>,
    visiting: HashSet<usize>,
}

impl<'m> Linker<'m> {
    fn new(classes: &'m [ClassInfo]) -> Self {
        let mut loaders = vec![Loader::Discarder, Loader::Root, Loader::Dom];
        let class_index = classes.iter().enumerate().map(|(i, c)| (c.name.clone(), i)).collect();
        let mut class_loaders = Vec::with_capacity(classes.len());
        for i in 0..classes.len() {
            // placeholder, replaced once the class is compiled
            let structure = loaders.len();
            loaders.push(Loader::Discarder);
            let typed = loaders.len();
            loaders.push(Loader::XsiType {
                default: structure,
                declared: Some(i),
            });
            class_loaders.push((structure, typed));
        }
        let mut leaf_loaders = HashMap::new();
        for leaf in catalog().leaf_types() {
            leaf_loaders.insert(leaf, loaders.len());
            loaders.push(Loader::Text(catalog().transducer(leaf)));
        }
        let any_loader = loaders.len();
        loaders.push(Loader::XsiType {
            default: DOM,
            declared: None,
        });
        Linker {
            classes,
            class_index,
            loaders,
            class_loaders,
            leaf_loaders,
            any_loader,
            roots: QNameMap::new(),
            compiled: classes.iter().map(|_| None).collect(),
            visiting: HashSet::new(),
        }
    }

    fn link(mut self, elements: &[ElementInfo], config: ContextConfig) -> Result<Grammar> {
        let types = self.types(elements);

        let classes = self.classes;
        for (i, class) in classes.iter().enumerate() {
            if let Some(name) = &class.element_name {
                self.roots.insert(name.clone(), ChildLoader::new(self.class_loaders[i].1, None));
            }
        }
        let mut element_infos = QNameMap::new();
        for element in elements {
            let content = self.content(element.name.clone(), &element.target, None, element.nillable);
            let loader = self.element_loader(&content, element.default_value.as_deref(), NilAction::Nothing);
            self.roots.insert(element.name.clone(), ChildLoader::new(loader, None).intercepted());
            element_infos.insert(element.name.clone(), ElementBeanInfo { content });
        }

        for i in 0..classes.len() {
            self.compile_class(i)?;
        }

        let mut infos = Vec::with_capacity(classes.len());
        for (i, class) in classes.iter().enumerate() {
            let compiled = match self.compiled[i].take() {
                Some(compiled) => compiled,
                None => return Err(Error::IllegalModel(vec![format!("class '{}' was not linked", class.name)])),
            };
            let (structure, typed) = self.class_loaders[i];
            self.loaders[structure] = Loader::Structure(Box::new(StructureLoader {
                class: i,
                children: compiled.parts.children,
                attributes: compiled.parts.attributes,
                text: compiled.parts.text,
                wildcard: compiled.parts.wildcard,
                attribute_wildcard: compiled.attribute_wildcard,
                frame_size: compiled.frame_size,
            }));
            trace!("class {} -> loader {}, {} slots", class.name, structure, compiled.frame_size);
            infos.push(ClassBeanInfo {
                name: class.name.clone(),
                type_name: class.type_name.clone(),
                element_name: class.element_name.clone(),
                chain: compiled.chain,
                properties: compiled.properties,
                attribute_wildcard: class.attribute_wildcard.clone(),
                id: compiled.id,
                factory: class.factory.clone(),
                hooks: class.hooks.clone(),
                is_abstract: class.is_abstract,
                frame_size: compiled.frame_size,
                loader: structure,
                typed_loader: typed,
            });
        }

        Ok(Grammar {
            config,
            classes: infos,
            class_index: self.class_index,
            elements: element_infos,
            loaders: self.loaders,
            types,
            roots: self.roots,
            leaf_loaders: self.leaf_loaders,
            any_loader: self.any_loader,
            constructors: ConstructorCache::new(),
        })
    }

    /// Names usable in `xsi:type`. Classes win over built-in types.
    fn types(&mut self, elements: &[ElementInfo]) -> HashMap<QName, TypeBinding> {
        let mut types = HashMap::new();
        for (name, leaf) in catalog().schema_types() {
            if let Some(loader) = self.leaf_loaders.get(&leaf) {
                types.insert(name.clone(), TypeBinding { loader: *loader, class: None });
            }
        }
        let hex = self.push(Loader::Text(catalog().hex_binary()));
        types.insert(QName::xs("hexBinary"), TypeBinding { loader: hex, class: None });
        // the any loader itself looks at xsi:type, capture the content instead
        types.insert(QName::new(XS_NS, "anyType"), TypeBinding { loader: DOM, class: None });

        let mut enums = Vec::new();
        let classes = self.classes;
        for class in classes {
            for property in &class.properties {
                enums.extend(targets(&property.kind).filter_map(|t| match t {
                    Target::Enum(info) => Some(Arc::clone(info)),
                    _ => None,
                }));
            }
        }
        enums.extend(elements.iter().filter_map(|e| match &e.target {
            Target::Enum(info) => Some(Arc::clone(info)),
            _ => None,
        }));
        for info in enums {
            if let Some(name) = info.schema_type() {
                if !types.contains_key(name) {
                    let loader = self.push(Loader::Text(Arc::new(EnumTransducer::new(Arc::clone(&info)))));
                    types.insert(name.clone(), TypeBinding { loader, class: None });
                }
            }
        }

        for (i, class) in classes.iter().enumerate() {
            if let Some(name) = &class.type_name {
                types.insert(
                    name.clone(),
                    TypeBinding {
                        loader: self.class_loaders[i].0,
                        class: Some(i),
                    },
                );
            }
        }
        types
    }

    fn compile_class(&mut self, i: usize) -> Result<()> {
        if self.compiled[i].is_some() {
            return Ok(());
        }
        let classes = self.classes;
        let class = &classes[i];
        if !self.visiting.insert(i) {
            return Err(Error::IllegalModel(vec![format!("class '{}' derives from itself", class.name)]));
        }
        let base = class.base.as_ref().and_then(|b| self.class_index.get(b).copied());
        let mut compiled = match base {
            Some(base) => {
                self.compile_class(base)?;
                match &self.compiled[base] {
                    Some(b) => Compiled {
                        parts: b.parts.clone(),
                        frame_size: b.frame_size,
                        properties: Vec::new(),
                        id: b.id.clone(),
                        attribute_wildcard: b.attribute_wildcard.clone(),
                        chain: b.chain.clone(),
                    },
                    None => return Err(Error::IllegalModel(vec![format!("base of '{}' was not linked", class.name)])),
                }
            }
            None => Compiled {
                parts: StructureParts::default(),
                frame_size: 0,
                properties: Vec::new(),
                id: None,
                attribute_wildcard: None,
                chain: Vec::new(),
            },
        };
        compiled.chain.push(i);
        if class.attribute_wildcard.is_some() {
            compiled.attribute_wildcard = class.attribute_wildcard.clone();
        }
        for info in &class.properties {
            let property = Property::compile(info, self, &mut compiled.parts, &mut compiled.frame_size);
            if let Some(id) = property.id() {
                compiled.id = Some(id.clone());
            }
            compiled.properties.push(property);
        }
        self.visiting.remove(&i);
        self.compiled[i] = Some(compiled);
        Ok(())
    }

    ////////////////////////////////////////////////////////////////////////////////////////////////
    // Used by properties

    /// Adds a loader
    pub fn push(&mut self, loader: Loader) -> LoaderId {
        self.loaders.push(loader);
        self.loaders.len() - 1
    }

    /// Accessor of a property, with the adapter of single values applied.
    /// Collections apply their adapter item by item in the lister.
    pub fn accessor(&self, info: &PropertyInfo) -> Arc<dyn Accessor> {
        match (&info.adapter, info.collection) {
            (Some(adapter), None) => Arc::new(AdaptedAccessor::new(Arc::clone(&info.accessor), Arc::clone(adapter))),
            _ => Arc::clone(&info.accessor),
        }
    }

    /// Lister of a collection property
    pub fn lister(&self, info: &PropertyInfo) -> Arc<dyn Lister> {
        let component = targets(&info.kind)
            .next()
            .map(Target::describe)
            .unwrap_or_else(|| "anyType".to_string());
        lister_for(
            info.collection.unwrap_or(CollectionType::List),
            &component,
            info.id == IdKind::IdRef,
            info.adapter.clone(),
        )
    }

    /// Text conversion of a property written as one attribute, element or
    /// text node
    pub fn transduced(&self, info: &PropertyInfo, target: &Target) -> TransducedAccessor {
        let acc = self.accessor(info);
        if info.id == IdKind::IdRef {
            return match info.collection {
                None => TransducedAccessor::IdRef { acc },
                Some(_) => TransducedAccessor::List {
                    acc,
                    xducer: Arc::new(IdRefTransducer),
                    lister: self.lister(info),
                },
            };
        }
        let xducer = self.transducer(target, Some(info));
        match info.collection {
            Some(_) => TransducedAccessor::List {
                acc,
                xducer,
                lister: self.lister(info),
            },
            None => TransducedAccessor::Plain { acc, xducer },
        }
    }

    /// Codec of a leaf target, decorated after the annotations of `info`
    fn transducer(&self, target: &Target, info: Option<&PropertyInfo>) -> Arc<dyn Transducer> {
        let schema_type = info.and_then(|i| i.schema_type.as_ref());
        let hex = matches!(target, Target::Leaf(LeafType::Bytes))
            && schema_type.map_or(false, |t| t.matches(XS_NS, "hexBinary"));
        let mut xducer = match target {
            Target::Leaf(_) if hex => catalog().hex_binary(),
            Target::Leaf(leaf) => catalog().transducer(*leaf),
            Target::Enum(enumeration) => Arc::new(EnumTransducer::new(Arc::clone(enumeration))),
            Target::Class(_) | Target::Any => catalog().transducer(LeafType::String),
        };
        let info = match info {
            Some(info) => info,
            None => return xducer,
        };
        if info.id == IdKind::Id {
            xducer = Arc::new(IdTransducer::new(xducer));
        }
        if let Some(mime) = &info.mime_type {
            xducer = Arc::new(MimeTypedTransducer::new(xducer, mime.clone()));
        }
        if info.inline_binary {
            xducer = Arc::new(InlineBinaryTransducer::new(xducer));
        }
        if let (Some(schema_type), false) = (schema_type, hex) {
            xducer = Arc::new(SchemaTypeTransducer::new(xducer, schema_type.clone()));
        }
        xducer
    }

    /// Content of one element name of an element property
    pub fn element_content(&self, t: &crate::model::TypeRef, info: &PropertyInfo) -> ElementContent {
        if info.id == IdKind::IdRef {
            return ElementContent {
                name: t.name.clone(),
                content: Content::Leaf(Arc::new(IdRefTransducer)),
                nillable: t.nillable,
                leaf: None,
            };
        }
        self.content(t.name.clone(), &t.target, Some(info), t.nillable)
    }

    /// Content of an element of type `target`
    pub fn content(&self, name: QName, target: &Target, info: Option<&PropertyInfo>, nillable: bool) -> ElementContent {
        let (content, leaf) = match target {
            Target::Leaf(leaf) => (Content::Leaf(self.transducer(target, info)), Some(*leaf)),
            Target::Enum(_) => (Content::Leaf(self.transducer(target, info)), None),
            Target::Class(class) => match self.class_index.get(class) {
                Some(i) => (Content::Class(*i), None),
                None => {
                    debug!("class {} is not bound, read as anyType", class);
                    (Content::Any, None)
                }
            },
            Target::Any => (Content::Any, None),
        };
        ElementContent {
            name,
            content,
            nillable,
            leaf,
        }
    }

    /// Loader reading the content of an element, ignoring `xsi:nil`
    pub fn content_loader(&mut self, content: &ElementContent) -> LoaderId {
        match &content.content {
            Content::Leaf(xducer) => self.push(Loader::Text(Arc::clone(xducer))),
            Content::Class(class) => self.class_loaders[*class].1,
            Content::Any => self.any_loader,
        }
    }

    /// Loader of an element: its content with the default value and
    /// `xsi:nil` handling it is declared with
    pub fn element_loader(&mut self, content: &ElementContent, default: Option<&str>, on_nil: NilAction) -> LoaderId {
        let mut loader = self.content_loader(content);
        if let Some(default) = default {
            loader = self.push(Loader::DefaultValue {
                inner: loader,
                default: default.to_string(),
            });
        }
        if content.nillable {
            loader = self.push(Loader::XsiNil { inner: loader, on_nil });
        }
        loader
    }

    /// Loader of a document element
    pub fn root(&self, name: &QName) -> Option<ChildLoader> {
        self.roots.get_name(name).cloned()
    }
}

/// Content targets of a property
fn targets(kind: &PropertyKind) -> Box<dyn Iterator<Item = &Target> + '_> {
    match kind {
        PropertyKind::Attribute { target, .. } | PropertyKind::Value { target } => Box::new(std::iter::once(target)),
        PropertyKind::Element { types, .. } => Box::new(types.iter().map(|t| &t.target)),
        PropertyKind::Map { key, value, .. } => Box::new([key, value].into_iter()),
        PropertyKind::Reference { .. } => Box::new(std::iter::empty()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassInfo, PropertyInfo};
    use pretty_assertions::assert_eq;

    fn person() -> ClassInfo {
        ClassInfo::new("Person")
            .type_name(QName::unqualified("person"))
            .root_element(QName::unqualified("person"))
            .property(PropertyInfo::attribute("id", QName::unqualified("id"), Target::Leaf(LeafType::String)).id())
            .property(PropertyInfo::element("name", QName::unqualified("name"), Target::Leaf(LeafType::String)))
    }

    #[test]
    fn default_config() {
        let config = ContextConfig::default();
        assert_eq!(config.backup_with_parent_namespace, false);
        assert_eq!(config.strict_model, true);
    }

    #[test]
    fn subclass_inherits_structure() {
        let context = ContextBuilder::new()
            .class(person())
            .class(
                ClassInfo::new("Employee")
                    .extends("Person")
                    .type_name(QName::unqualified("employee"))
                    .property(
                        PropertyInfo::element("tags", QName::unqualified("tag"), Target::Leaf(LeafType::String))
                            .collection(CollectionType::List),
                    ),
            )
            .build()
            .unwrap();
        let grammar = context.grammar();
        let employee = grammar.class_named("Employee").unwrap();
        let person = grammar.class_named("Person").unwrap();
        assert_eq!(grammar.classes[employee].chain, vec![person, employee]);
        assert_eq!(grammar.classes[employee].frame_size, 1);
        assert!(grammar.classes[employee].id.is_some());
        match &grammar.loaders[grammar.classes[employee].loader] {
            Loader::Structure(s) => {
                assert!(s.children.contains("", "name"));
                assert!(s.children.contains("", "tag"));
                assert!(s.attributes.contains("", "id"));
            }
            other => panic!("unexpected loader {:?}", other),
        }
    }

    #[test]
    fn type_names() {
        let context = ContextBuilder::new().class(person()).build().unwrap();
        let grammar = context.grammar();
        let binding = grammar.types[&QName::unqualified("person")];
        assert_eq!(binding.class, grammar.class_named("Person"));
        assert!(grammar.types[&QName::xs("int")].class.is_none());
        assert_eq!(context.type_name("Person"), Some(&QName::unqualified("person")));
    }

    #[test]
    fn problems_are_reported_together() {
        let result = ContextBuilder::new()
            .class(ClassInfo::new("A").extends("Missing"))
            .class(ClassInfo::new("A"))
            .build();
        match result {
            Err(Error::IllegalModel(problems)) => assert!(problems.len() >= 2, "{:?}", problems),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn unknown_class_is_any_when_lenient() {
        let mut builder = ContextBuilder::new().class(
            ClassInfo::new("Box")
                .root_element(QName::unqualified("box"))
                .property(PropertyInfo::element("item", QName::unqualified("item"), Target::class("Gone"))),
        );
        builder.config_mut().strict_model(false);
        let context = builder.build().unwrap();
        assert!(context.is_bound("Box"));
        assert!(!context.is_bound("Gone"));
    }

    #[test]
    fn send_and_sync() {
        fn check<T: Send + Sync>() {}
        check::<BindingContext>();
    }
}
