//! Writing a value graph as a stream of elements.
//!
//! The start tag of an element stays open until [`XmlSerializer::end_attributes`]:
//! first the namespaces needed by the element are declared, then its
//! attributes are added, and only then is the tag handed to the output with
//! the bindings it declares. Content written afterwards reuses the bindings
//! in scope and only declares new ones on the elements it opens.

use super::namespace::NamespaceContext;
use super::output::XmlOutput;
use super::{AttachmentMarshaller, MarshalListener};
use crate::accessor::Accessor;
use crate::bean::{same_bean, BeanRef};
use crate::dom::{DomElement, DomNode};
use crate::errors::{Error, Result};
use crate::event::{Severity, ValidationEvent, ValidationEventHandler};
use crate::lister::Lister;
use crate::name::{QName, XOP_NS, XSI_NIL, XSI_TYPE, XS_NS};
use crate::runtime::{Content, Grammar};
use crate::transducer::{catalog, Lexical, LeafType, PrintContext};
use crate::value::{ElementValue, Value};
use std::borrow::Cow;
use std::sync::Arc;

const XOP_INCLUDE: QName = QName::from_static(XOP_NS, "Include");

/// Start tag being assembled
struct Pending {
    name: QName,
    attributes: Vec<(QName, String)>,
}

/// State of one marshal call
pub(crate) struct XmlSerializer<'a> {
    grammar: Arc<Grammar>,
    out: &'a mut dyn XmlOutput,
    namespaces: NamespaceContext,
    handler: Option<Arc<dyn ValidationEventHandler>>,
    listener: Option<Arc<dyn MarshalListener>>,
    attachments: Option<Arc<dyn AttachmentMarshaller>>,
    /// Beans being written, outermost first
    beans: Vec<BeanRef>,
    /// Names of the open elements, with their prefixes
    open: Vec<QName>,
    pending: Option<Pending>,
    schema_type: Option<QName>,
    mime_type: Option<String>,
    inline: bool,
    /// Whether inline binary was requested while printing the current element
    inline_seen: bool,
}

/// `name` with `prefix`, dropping the prefix hint it came with
fn prefixed(name: &QName, prefix: &str) -> QName {
    let plain = QName::new(name.namespace().to_string(), name.local_name().to_string());
    if prefix.is_empty() {
        plain
    } else {
        plain.with_prefix(prefix.to_string())
    }
}

impl<'a> XmlSerializer<'a> {
    pub fn new(grammar: Arc<Grammar>, out: &'a mut dyn XmlOutput) -> Self {
        XmlSerializer {
            grammar,
            out,
            namespaces: NamespaceContext::new(),
            handler: None,
            listener: None,
            attachments: None,
            beans: Vec::new(),
            open: Vec::new(),
            pending: None,
            schema_type: None,
            mime_type: None,
            inline: false,
            inline_seen: false,
        }
    }

    pub fn with_handler(mut self, handler: Option<Arc<dyn ValidationEventHandler>>) -> Self {
        self.handler = handler;
        self
    }

    pub fn with_listener(mut self, listener: Option<Arc<dyn MarshalListener>>) -> Self {
        self.listener = listener;
        self
    }

    pub fn with_attachments(mut self, attachments: Option<Arc<dyn AttachmentMarshaller>>) -> Self {
        self.attachments = attachments;
        self
    }

    #[inline]
    pub fn grammar(&self) -> Arc<Grammar> {
        Arc::clone(&self.grammar)
    }

    ////////////////////////////////////////////////////////////////////////////////////////////////
    // Documents

    /// Writes `value` as a whole document
    pub fn write_root(&mut self, value: &Value) -> Result<()> {
        self.out.start_document()?;
        match value {
            Value::Bean(bean) => {
                let class = match self.grammar.class_of(bean) {
                    Some(class) => class,
                    None => return Err(Error::NotBound(bean.borrow().class_name().to_string())),
                };
                let name = match &self.grammar.classes[class].element_name {
                    Some(name) => name.clone(),
                    None => return Err(Error::NotBound(self.grammar.classes[class].name.clone())),
                };
                self.write_bean(&name, bean, Some(class))?;
            }
            Value::Element(element) => self.write_element_value(element)?,
            Value::Dom(element) => self.write_dom(element)?,
            other => return Err(Error::NotBound(other.kind_name().to_string())),
        }
        self.out.end_document()
    }

    ////////////////////////////////////////////////////////////////////////////////////////////////
    // Building blocks

    /// Opens the start tag of `name`
    pub fn start_element(&mut self, name: &QName) -> Result<()> {
        if self.pending.is_some() {
            self.end_attributes()?;
        }
        self.namespaces.push_frame();
        let prefix = self.namespaces.declare_element(name.namespace(), name.prefix());
        self.pending = Some(Pending {
            name: prefixed(name, &prefix),
            attributes: Vec::new(),
        });
        Ok(())
    }

    /// Adds an attribute to the open start tag
    pub fn attribute(&mut self, name: &QName, value: String) -> Result<()> {
        let prefix = self.namespaces.declare(name.namespace(), name.prefix(), true);
        if let Some(pending) = &mut self.pending {
            pending.attributes.push((prefixed(name, &prefix), value));
            return Ok(());
        }
        self.report(ValidationEvent::error(format!(
            "attribute {} written outside of a start tag",
            name
        )))
    }

    /// Closes the start tag. Content may follow.
    pub fn end_attributes(&mut self) -> Result<()> {
        self.inline_seen = false;
        if let Some(pending) = self.pending.take() {
            self.out
                .start_element(&pending.name, self.namespaces.declarations(), &pending.attributes)?;
            self.open.push(pending.name);
        }
        Ok(())
    }

    /// Writes the end tag of the innermost element
    pub fn end_element(&mut self) -> Result<()> {
        if self.pending.is_some() {
            self.end_attributes()?;
        }
        if let Some(name) = self.open.pop() {
            self.out.end_element(&name)?;
            self.namespaces.pop_frame();
        }
        Ok(())
    }

    /// Character content
    pub fn text(&mut self, text: &str) -> Result<()> {
        if self.pending.is_some() {
            self.end_attributes()?;
        }
        self.out.text(text)
    }

    /// Content of a leaf element. Binary data goes to the attachment
    /// marshaller, if there is one and the property does not ask for inline
    /// data.
    pub fn leaf_body(&mut self, lexical: Lexical) -> Result<()> {
        let data = match lexical {
            Lexical::Binary(data) if !self.inline && !self.inline_seen => data,
            other => return self.text(&other.to_text()),
        };
        let cid = match (&self.attachments, self.open.last()) {
            (Some(attachments), Some(element)) => {
                attachments.add_attachment(data.data(), data.content_type(), element)
            }
            _ => None,
        };
        match cid {
            Some(cid) => {
                self.start_element(&XOP_INCLUDE.with_prefix("xop"))?;
                self.attribute(&QName::unqualified("href"), cid)?;
                self.end_element()
            }
            None => self.text(&data.encode()),
        }
    }

    /// `<name xsi:nil="true"/>`
    pub fn write_nil(&mut self, name: &QName) -> Result<()> {
        self.start_element(name)?;
        self.attribute(&XSI_NIL.with_prefix("xsi"), "true".to_string())?;
        self.end_element()
    }

    /// Reads a property, reporting failures as events
    pub fn get(&mut self, bean: &BeanRef, acc: &Arc<dyn Accessor>) -> Result<Option<Value>> {
        let result = acc.get(&*bean.borrow());
        match result {
            Ok(value) => Ok(value),
            Err(e) => {
                self.report(ValidationEvent::error(e.to_string()).in_field(acc.name()).caused_by(e))?;
                Ok(None)
            }
        }
    }

    /// Items of a collection value, reporting failures as events
    pub fn items<'v>(&mut self, lister: &Arc<dyn Lister>, value: &'v Value, field: &str) -> Result<Vec<Cow<'v, Value>>> {
        let iter = match lister.iterator(value) {
            Ok(iter) => iter,
            Err(e) => {
                self.report(ValidationEvent::error(e.to_string()).in_field(field).caused_by(e))?;
                return Ok(Vec::new());
            }
        };
        let mut items = Vec::new();
        for item in iter {
            match item {
                Ok(item) => items.push(item),
                Err(e) => self.report(ValidationEvent::error(e.to_string()).in_field(field).caused_by(e))?,
            }
        }
        Ok(items)
    }

    ////////////////////////////////////////////////////////////////////////////////////////////////
    // Values

    /// Writes `value` as element `name` with the declared content
    pub fn write_content(&mut self, name: &QName, content: &Content, value: &Value) -> Result<()> {
        if let Value::Element(element) = value {
            return match &element.value {
                Some(inner) if !element.nil => self.write_content(&element.name, content, inner),
                _ => self.write_nil(&element.name),
            };
        }
        match content {
            Content::Leaf(xducer) => {
                self.start_element(name)?;
                if xducer.use_namespace() {
                    xducer.declare_namespace(value, self)?;
                }
                self.end_attributes()?;
                let lexical = xducer.print(value, self)?;
                self.leaf_body(lexical)?;
                self.end_element()
            }
            Content::Class(declared) => match value {
                Value::Bean(bean) => self.write_bean(name, bean, Some(*declared)),
                other => {
                    let message = format!(
                        "element {} expects a {}, not a {}",
                        name,
                        self.grammar.classes[*declared].name,
                        other.kind_name()
                    );
                    self.report(ValidationEvent::error(message))
                }
            },
            Content::Any => self.write_any(name, value),
        }
    }

    /// Writes `value` as element `name` of type `xs:anyType`, announcing its
    /// actual type with `xsi:type`
    fn write_any(&mut self, name: &QName, value: &Value) -> Result<()> {
        match value {
            Value::Bean(bean) => return self.write_bean(name, bean, None),
            Value::Dom(element) => return self.write_dom(element),
            Value::Element(element) => return self.write_element_value(element),
            _ => {}
        }
        let leaf = match LeafType::of(value) {
            Some(leaf) => leaf,
            None => {
                return self.report(ValidationEvent::error(format!(
                    "a {} cannot be written as element {}",
                    value.kind_name(),
                    name
                )))
            }
        };
        let xducer = catalog().transducer(leaf);
        let schema_type = xducer.type_name(value).unwrap_or_else(|| leaf.schema_type());
        self.start_element(name)?;
        self.xsi_type(&schema_type)?;
        if xducer.use_namespace() {
            xducer.declare_namespace(value, self)?;
        }
        self.end_attributes()?;
        let lexical = xducer.print(value, self)?;
        self.leaf_body(lexical)?;
        self.end_element()
    }

    /// Adds `xsi:type` to the open start tag
    fn xsi_type(&mut self, type_name: &QName) -> Result<()> {
        let hint = match type_name.namespace() {
            XS_NS => Some("xs"),
            _ => type_name.prefix(),
        };
        let prefix = self.namespaces.declare(type_name.namespace(), hint, false);
        let value = match prefix.as_str() {
            "" => type_name.local_name().to_string(),
            p => format!("{}:{}", p, type_name.local_name()),
        };
        self.attribute(&XSI_TYPE.with_prefix("xsi"), value)
    }

    /// Writes a bean as element `name`. `declared` is the class the context
    /// expects; any other class is announced with `xsi:type`.
    pub fn write_bean(&mut self, name: &QName, bean: &BeanRef, declared: Option<usize>) -> Result<()> {
        let grammar = self.grammar();
        let class = match grammar.class_of(bean) {
            Some(class) => class,
            None => {
                let message = format!("class {} is not bound", bean.borrow().class_name());
                return self.report(ValidationEvent::error(message));
            }
        };
        let info = &grammar.classes[class];

        if self.beans.iter().any(|b| same_bean(b, bean)) {
            let path: Vec<String> = self
                .beans
                .iter()
                .map(|b| b.borrow().class_name().to_string())
                .collect();
            self.report(ValidationEvent::error(format!(
                "a cycle is detected in the object graph: {} -> {}",
                path.join(" -> "),
                info.name
            )))?;
            self.start_element(name)?;
            return self.end_element();
        }

        self.beans.push(BeanRef::clone(bean));
        for c in grammar.chain(class) {
            if let Some(hook) = &c.hooks.before_marshal {
                hook(bean);
            }
        }
        if let Some(listener) = &self.listener {
            listener.before_marshal(bean);
        }

        self.start_element(name)?;
        if declared != Some(class) {
            match &info.type_name {
                Some(type_name) => self.xsi_type(type_name)?,
                None => self.report(ValidationEvent::warning(format!(
                    "{} has no type name to announce it with xsi:type",
                    info.name
                )))?,
            }
        }
        for c in grammar.chain(class) {
            for property in &c.properties {
                property.declare_namespaces(bean, self)?;
            }
        }
        for c in grammar.chain(class) {
            for property in &c.properties {
                property.serialize_attributes(bean, self)?;
            }
        }
        let wildcard = grammar.chain(class).filter_map(|c| c.attribute_wildcard.as_ref()).last();
        if let Some(acc) = wildcard {
            match self.get(bean, acc)? {
                Some(Value::AttributeMap(attributes)) => {
                    for (name, value) in attributes {
                        self.attribute(&name, value)?;
                    }
                }
                Some(other) => {
                    self.report(ValidationEvent::error(format!(
                        "attribute wildcard holds a {}",
                        other.kind_name()
                    )))?;
                }
                None => {}
            }
        }
        self.end_attributes()?;
        for c in grammar.chain(class) {
            for property in &c.properties {
                property.serialize_body(bean, self)?;
            }
        }
        self.end_element()?;

        self.beans.pop();
        for c in grammar.chain(class) {
            if let Some(hook) = &c.hooks.after_marshal {
                hook(bean);
            }
        }
        if let Some(listener) = &self.listener {
            listener.after_marshal(bean);
        }
        Ok(())
    }

    /// Writes a global element: a bean of a root class, an element value or
    /// a DOM element
    pub fn write_element(&mut self, value: &Value, field: &str) -> Result<()> {
        match value {
            Value::Bean(bean) => {
                let grammar = self.grammar();
                let target = grammar
                    .class_of(bean)
                    .and_then(|class| Some((class, grammar.classes[class].element_name.as_ref()?)));
                match target {
                    Some((class, name)) => self.write_bean(name, bean, Some(class)),
                    None => {
                        let message = format!(
                            "unable to marshal {} as an element because it has no element name",
                            bean.borrow().class_name()
                        );
                        self.report(ValidationEvent::error(message).in_field(field))
                    }
                }
            }
            Value::Element(element) => self.write_element_value(element),
            Value::Dom(element) => self.write_dom(element),
            other => self.report(
                ValidationEvent::error(format!("a {} is not an element", other.kind_name())).in_field(field),
            ),
        }
    }

    fn write_element_value(&mut self, element: &ElementValue) -> Result<()> {
        let value = match &element.value {
            Some(value) if !element.nil => value,
            _ => return self.write_nil(&element.name),
        };
        let grammar = self.grammar();
        match grammar.elements.get_name(&element.name) {
            Some(info) => self.write_content(&element.name, &info.content.content, value),
            None => self.write_any(&element.name, value),
        }
    }

    fn write_dom(&mut self, element: &DomElement) -> Result<()> {
        self.start_element(element.name())?;
        for (name, value) in element.attributes() {
            self.attribute(name, value.clone())?;
        }
        self.end_attributes()?;
        for child in element.children() {
            match child {
                DomNode::Element(e) => self.write_dom(e)?,
                DomNode::Text(t) => self.text(t)?,
            }
        }
        self.end_element()
    }
}

impl<'a> PrintContext for XmlSerializer<'a> {
    fn prefix_of(&self, uri: &str) -> Option<String> {
        self.namespaces.prefix_of(uri).map(str::to_string)
    }

    fn declare_namespace(&mut self, uri: &str, hint: Option<&str>, require_prefix: bool) -> String {
        if self.pending.is_none() {
            if let Some(prefix) = self.namespaces.prefix_of(uri) {
                return prefix.to_string();
            }
            warn!("namespace {} declared after the start tag was written", uri);
        }
        self.namespaces.declare(uri, hint, require_prefix)
    }

    fn schema_type(&self) -> Option<&QName> {
        self.schema_type.as_ref()
    }

    fn set_schema_type(&mut self, schema_type: Option<QName>) -> Option<QName> {
        std::mem::replace(&mut self.schema_type, schema_type)
    }

    fn expected_mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    fn set_expected_mime_type(&mut self, mime: Option<String>) -> Option<String> {
        std::mem::replace(&mut self.mime_type, mime)
    }

    fn inline_binary(&self) -> bool {
        self.inline
    }

    fn set_inline_binary(&mut self, inline: bool) -> bool {
        self.inline_seen |= inline;
        std::mem::replace(&mut self.inline, inline)
    }

    /// Warnings are logged when no handler is installed; anything more
    /// serious stops marshalling.
    fn report(&mut self, event: ValidationEvent) -> Result<()> {
        match &self.handler {
            Some(handler) if handler.handle_event(&event) => Ok(()),
            Some(_) => Err(Error::Validation(event)),
            None if event.severity() == Severity::Warning => {
                warn!("{}", event);
                Ok(())
            }
            None => Err(Error::Validation(event)),
        }
    }

    fn id_of(&self, bean: &BeanRef) -> Option<String> {
        self.grammar.id_of(bean)
    }
}
