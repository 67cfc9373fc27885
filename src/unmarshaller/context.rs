use super::loader::{ChildLoader, Receiver};
use super::visitor::{TagName, XmlVisitor};
use super::{AttachmentUnmarshaller, UnmarshalListener};
use crate::accessor::Accessor;
use crate::bean::BeanRef;
use crate::datatype::lexical::is_whitespace;
use crate::datatype::Base64Data;
use crate::errors::{Error, Result};
use crate::event::{Location, Severity, ValidationEvent, ValidationEventHandler};
use crate::lister::{Lister, Pack, PackContext, Patcher};
use crate::name::{split_prefixed, QName, XML_NS, XSI_NS};
use crate::runtime::{Grammar, LoaderId, TypeBinding, ROOT};
use crate::transducer::{Lexical, ParseContext};
use crate::value::{ElementValue, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// What the document element is bound to
#[derive(Clone, Debug)]
pub(crate) enum RootMode {
    /// A root class or global element, by name
    Normal,
    /// Any name, content read by this loader
    Declared(LoaderId),
    /// Any name, content read into an existing bean of this class
    Into(usize),
}

/// Per-element frame of the loader stack
#[derive(Debug)]
pub(crate) struct State {
    /// Loader handling the element
    pub loader: LoaderId,
    /// Where the finished target goes
    pub receiver: Option<Receiver>,
    /// Object built by the loader
    pub target: Option<Value>,
    /// The element carried `xsi:nil="true"`
    pub nil: bool,
    /// Name the target is wrapped with on completion
    pub intercept: Option<QName>,
    /// Text substituted when the element is empty
    pub default_text: Option<String>,
    /// Binary content received as an attachment
    pub attachment: Option<Base64Data<'static>>,
    /// Key of the map entry being read
    pub pending_key: Option<Value>,
}

impl State {
    fn new(loader: LoaderId, receiver: Option<Receiver>, intercept: Option<QName>) -> Self {
        State {
            loader,
            receiver,
            target: None,
            nil: false,
            intercept,
            default_text: None,
            attachment: None,
            pending_key: None,
        }
    }
}

/// A collection being filled item by item
struct Scope {
    bean: BeanRef,
    acc: Arc<dyn Accessor>,
    lister: Arc<dyn Lister>,
    pack: Pack,
}

/// The state of one unmarshalling call.
///
/// Implements [`XmlVisitor`]: feed it the events of a document, then take the
/// result with [`into_result`](Self::into_result).
pub struct UnmarshallingContext {
    grammar: Arc<Grammar>,
    stack: Vec<State>,
    text: String,
    scopes: Vec<Option<Scope>>,
    scope_marks: Vec<usize>,
    ids: HashMap<String, BeanRef>,
    patchers: Vec<Patcher>,
    namespaces: Vec<(String, String)>,
    location: Option<Location>,
    mime_type: Option<String>,
    root_mode: RootMode,
    reuse: Option<BeanRef>,
    result: Option<Value>,
    handler: Option<Arc<dyn ValidationEventHandler>>,
    listener: Option<Arc<dyn UnmarshalListener>>,
    attachments: Option<Arc<dyn AttachmentUnmarshaller>>,
}

impl UnmarshallingContext {
    pub(crate) fn new(grammar: Arc<Grammar>, root_mode: RootMode) -> Self {
        UnmarshallingContext {
            grammar,
            stack: Vec::new(),
            text: String::new(),
            scopes: Vec::new(),
            scope_marks: Vec::new(),
            ids: HashMap::new(),
            patchers: Vec::new(),
            namespaces: Vec::new(),
            location: None,
            mime_type: None,
            root_mode,
            reuse: None,
            result: None,
            handler: None,
            listener: None,
            attachments: None,
        }
    }

    pub(crate) fn with_handler(mut self, handler: Option<Arc<dyn ValidationEventHandler>>) -> Self {
        self.handler = handler;
        self
    }

    pub(crate) fn with_listener(mut self, listener: Option<Arc<dyn UnmarshalListener>>) -> Self {
        self.listener = listener;
        self
    }

    pub(crate) fn with_attachments(mut self, attachments: Option<Arc<dyn AttachmentUnmarshaller>>) -> Self {
        self.attachments = attachments;
        self
    }

    pub(crate) fn reusing(mut self, bean: BeanRef) -> Self {
        self.reuse = Some(bean);
        self
    }

    /// The value of the document element, once the document ended
    pub fn into_result(self) -> Result<Value> {
        self.result.ok_or(Error::NoResult)
    }

    ////////////////////////////////////////////////////////////////////////////////////////////////

    #[inline]
    pub(crate) fn grammar(&self) -> Arc<Grammar> {
        Arc::clone(&self.grammar)
    }

    pub(crate) fn root_mode(&self) -> &RootMode {
        &self.root_mode
    }

    pub(crate) fn state(&self) -> &State {
        // the root frame lives from start_document to end_document
        &self.stack[self.stack.len() - 1]
    }

    pub(crate) fn state_mut(&mut self) -> &mut State {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    /// Depth of the current element, 1 for the document element
    pub(crate) fn depth(&self) -> usize {
        self.stack.len() - 1
    }

    /// Innermost bean under construction; with `skip_current`, the innermost
    /// one enclosing the current element
    pub(crate) fn nearest_bean(&self, skip_current: bool) -> Option<BeanRef> {
        let end = if skip_current {
            self.stack.len().saturating_sub(1)
        } else {
            self.stack.len()
        };
        self.stack[..end].iter().rev().find_map(|s| match &s.target {
            Some(Value::Bean(bean)) => Some(BeanRef::clone(bean)),
            _ => None,
        })
    }

    /// Bean held by the current frame
    pub(crate) fn current_bean(&self) -> Option<BeanRef> {
        match &self.state().target {
            Some(Value::Bean(bean)) => Some(BeanRef::clone(bean)),
            _ => None,
        }
    }

    pub(crate) fn take_reuse(&mut self) -> Option<BeanRef> {
        if self.depth() == 1 {
            self.reuse.take()
        } else {
            None
        }
    }

    pub(crate) fn attachments(&self) -> Option<&Arc<dyn AttachmentUnmarshaller>> {
        self.attachments.as_ref()
    }

    ////////////////////////////////////////////////////////////////////////////////////////////////
    // Events

    /// Passes an event to the handler. An error is returned when processing
    /// must stop.
    pub(crate) fn handle_event(&mut self, event: ValidationEvent) -> Result<()> {
        let event = match event.location() {
            Some(_) => event,
            None => event.at(self.location),
        };
        match &self.handler {
            Some(handler) if handler.handle_event(&event) => Ok(()),
            Some(_) => Err(Error::Validation(event)),
            None if event.severity() == Severity::FatalError => Err(Error::Validation(event)),
            None => {
                warn!("{}", event);
                Ok(())
            }
        }
    }

    /// Reports a recoverable error
    pub(crate) fn handle_error<M: Into<String>>(&mut self, message: M) -> Result<()> {
        self.handle_event(ValidationEvent::error(message))
    }

    /// Reports an event processing cannot recover from, whatever the handler says
    pub(crate) fn unrecoverable(&mut self, event: ValidationEvent) -> Error {
        let event = event.at(self.location);
        if let Some(handler) = &self.handler {
            handler.handle_event(&event);
        }
        Error::Validation(event)
    }

    ////////////////////////////////////////////////////////////////////////////////////////////////
    // Lifecycle

    pub(crate) fn fire_before_unmarshal(&self, class: usize, bean: &BeanRef) {
        let parent = self.nearest_bean(true);
        for info in self.grammar.chain(class) {
            if let Some(hook) = &info.hooks.before_unmarshal {
                hook(bean, parent.as_ref());
            }
        }
        if let Some(listener) = &self.listener {
            listener.before_unmarshal(bean, parent.as_ref());
        }
    }

    pub(crate) fn fire_after_unmarshal(&self, class: usize, bean: &BeanRef) {
        let parent = self.nearest_bean(true);
        for info in self.grammar.chain(class) {
            if let Some(hook) = &info.hooks.after_unmarshal {
                hook(bean, parent.as_ref());
            }
        }
        if let Some(listener) = &self.listener {
            listener.after_unmarshal(bean, parent.as_ref());
        }
    }

    ////////////////////////////////////////////////////////////////////////////////////////////////
    // Collection scopes

    /// Opens `size` collection slots for the current element
    pub(crate) fn start_scope(&mut self, size: usize) {
        self.scope_marks.push(self.scopes.len());
        self.scopes.extend((0..size).map(|_| None));
    }

    /// Stores every collection filled since the matching `start_scope`
    pub(crate) fn end_scope(&mut self) -> Result<()> {
        let mark = match self.scope_marks.pop() {
            Some(mark) => mark,
            None => return Ok(()),
        };
        let finished: Vec<Scope> = self.scopes.drain(mark..).flatten().collect();
        for scope in finished {
            if let Err(e) = scope.lister.end_packing(scope.pack, &scope.bean, &scope.acc) {
                let event = ValidationEvent::error(e.to_string()).in_field(scope.acc.name());
                self.handle_event(event)?;
            }
        }
        Ok(())
    }

    /// Starts packing slot `offset` of the current scope, if not started yet
    pub(crate) fn start_pack(
        &mut self,
        offset: usize,
        bean: BeanRef,
        acc: &Arc<dyn Accessor>,
        lister: &Arc<dyn Lister>,
    ) -> Result<()> {
        let index = self.scope_index(offset)?;
        if self.scopes[index].is_some() {
            return Ok(());
        }
        match lister.start_packing(&bean, acc, self) {
            Ok(pack) => {
                self.scopes[index] = Some(Scope {
                    bean,
                    acc: Arc::clone(acc),
                    lister: Arc::clone(lister),
                    pack,
                });
                Ok(())
            }
            Err(e) => self.handle_event(ValidationEvent::error(e.to_string()).in_field(acc.name())),
        }
    }

    /// Adds an item to slot `offset` of the current scope, starting it lazily
    /// for the bean of the current frame
    pub(crate) fn add_to_pack(
        &mut self,
        offset: usize,
        acc: &Arc<dyn Accessor>,
        lister: &Arc<dyn Lister>,
        item: Value,
    ) -> Result<()> {
        let index = self.scope_index(offset)?;
        if self.scopes[index].is_none() {
            let bean = match self.current_bean() {
                Some(bean) => bean,
                None => return self.handle_error(format!("no object to add {} to", acc.name())),
            };
            self.start_pack(offset, bean, acc, lister)?;
        }
        let result = match &mut self.scopes[index] {
            Some(scope) => scope.lister.add_to_pack(&mut scope.pack, item),
            None => Ok(()),
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) => self.handle_event(ValidationEvent::error(e.to_string()).in_field(acc.name())),
        }
    }

    fn scope_index(&mut self, offset: usize) -> Result<usize> {
        let index = self.scope_marks.last().copied().unwrap_or(0) + offset;
        if index < self.scopes.len() {
            Ok(index)
        } else {
            Err(self.unrecoverable(ValidationEvent::fatal(format!(
                "collection slot {} is outside of the current scope",
                offset
            ))))
        }
    }

    ////////////////////////////////////////////////////////////////////////////////////////////////
    // Namespaces and types

    /// Resolves a prefixed name written in the document
    pub(crate) fn resolve_qname(&self, raw: &str) -> Option<QName> {
        let (prefix, local) = split_prefixed(raw.trim());
        let uri = self.resolve_prefix(prefix.unwrap_or(""))?;
        let name = QName::new(uri, local.to_string());
        Some(match prefix {
            Some(p) => name.with_prefix(p.to_string()),
            None => name,
        })
    }

    /// Name and binding of the `xsi:type` of a tag. The binding is `None`
    /// for names that cannot be resolved.
    pub(crate) fn xsi_type(&self, tag: &TagName) -> Option<(String, Option<TypeBinding>)> {
        let raw = tag.attribute(XSI_NS, "type")?;
        let binding = self
            .resolve_qname(raw)
            .and_then(|name| self.grammar.types.get(&name).copied());
        Some((raw.to_string(), binding))
    }

    ////////////////////////////////////////////////////////////////////////////////////////////////

    /// Routes the finished target of a popped frame
    fn receive(&mut self, receiver: Receiver, value: Value) -> Result<()> {
        match receiver {
            Receiver::Set(acc) => {
                let bean = match self.current_bean() {
                    Some(bean) => bean,
                    None => return self.handle_error(format!("no object to set {} on", acc.name())),
                };
                let result = acc.set(&mut *bean.borrow_mut(), Some(value));
                match result {
                    Ok(()) => Ok(()),
                    Err(e) => {
                        let event = ValidationEvent::error(e.to_string()).in_field(acc.name()).caused_by(e);
                        self.handle_event(event)
                    }
                }
            }
            Receiver::Pack { offset, acc, lister } => self.add_to_pack(offset, &acc, &lister, value),
            Receiver::Root => {
                self.result = Some(value);
                Ok(())
            }
            Receiver::DomChild => {
                if let (Some(Value::Dom(parent)), Value::Dom(child)) = (&mut self.state_mut().target, value) {
                    parent.push_element(child);
                }
                Ok(())
            }
            Receiver::MapKey => {
                self.state_mut().pending_key = Some(value);
                Ok(())
            }
            Receiver::MapValue => {
                self.state_mut().target = Some(value);
                Ok(())
            }
            Receiver::MapEntry => {
                if let (Some(Value::Map(entries)), Value::Map(mut entry)) = (&mut self.state_mut().target, value) {
                    entries.append(&mut entry);
                }
                Ok(())
            }
        }
    }

    /// Hands buffered text to the current loader. Before a child element only
    /// significant text is delivered; at an end tag everything is, when the
    /// loader expects text.
    fn deliver_text(&mut self, at_end: bool) -> Result<()> {
        let grammar = self.grammar();
        let loader = &grammar.loaders[self.state().loader];
        if at_end {
            if let Some(data) = self.state_mut().attachment.take() {
                self.text.clear();
                return loader.text(self, &Lexical::Binary(data));
            }
        }
        let expected = at_end && loader.expects_text();
        if !expected && is_whitespace(&self.text) {
            self.text.clear();
            return Ok(());
        }
        let mut text = std::mem::take(&mut self.text);
        if at_end && text.is_empty() {
            if let Some(default) = self.state_mut().default_text.take() {
                text = default;
            }
        }
        loader.text(self, &Lexical::from(text))
    }

    fn push(&mut self, child: ChildLoader, tag: &TagName) {
        let intercept = if child.intercept { Some(tag.name()) } else { None };
        self.stack.push(State::new(child.loader, child.receiver, intercept));
    }
}

impl XmlVisitor for UnmarshallingContext {
    fn start_document(&mut self) -> Result<()> {
        self.stack.clear();
        self.stack.push(State::new(ROOT, None, None));
        Ok(())
    }

    fn end_document(&mut self) -> Result<()> {
        for patcher in std::mem::take(&mut self.patchers) {
            patcher(self)?;
        }
        self.stack.clear();
        Ok(())
    }

    fn start_prefix_mapping(&mut self, prefix: &str, uri: &str) -> Result<()> {
        self.namespaces.push((prefix.to_string(), uri.to_string()));
        Ok(())
    }

    fn end_prefix_mapping(&mut self, prefix: &str) -> Result<()> {
        if let Some(index) = self.namespaces.iter().rposition(|(p, _)| p == prefix) {
            self.namespaces.remove(index);
        }
        Ok(())
    }

    fn start_element(&mut self, tag: &TagName) -> Result<()> {
        if self.stack.is_empty() {
            self.start_document()?;
        }
        self.deliver_text(false)?;
        let grammar = self.grammar();
        let child = grammar.loaders[self.state().loader].child_element(self, tag)?;
        let loader = child.loader;
        self.push(child, tag);
        grammar.loaders[loader].start_element(self, tag)
    }

    fn end_element(&mut self, tag: &TagName) -> Result<()> {
        // unbalanced end tag
        if self.stack.len() < 2 {
            return Ok(());
        }
        self.deliver_text(true)?;
        let grammar = self.grammar();
        grammar.loaders[self.state().loader].leave_element(self, tag)?;
        let state = match self.stack.pop() {
            Some(state) => state,
            None => return Ok(()),
        };
        let value = match state.intercept {
            Some(name) => Some(Value::Element(Box::new(ElementValue {
                name,
                nil: state.nil,
                value: state.target,
            }))),
            None => state.target,
        };
        match (state.receiver, value) {
            (Some(receiver), Some(value)) => self.receive(receiver, value),
            _ => Ok(()),
        }
    }

    fn text(&mut self, text: &str) -> Result<()> {
        self.text.push_str(text);
        Ok(())
    }

    fn set_location(&mut self, location: Location) {
        self.location = Some(location);
    }
}

impl ParseContext for UnmarshallingContext {
    fn resolve_prefix(&self, prefix: &str) -> Option<String> {
        match self.namespaces.iter().rev().find(|(p, _)| p == prefix) {
            Some((_, uri)) => Some(uri.clone()),
            None if prefix.is_empty() => Some(String::new()),
            None if prefix == "xml" => Some(XML_NS.to_string()),
            None => None,
        }
    }

    fn add_to_id_table(&mut self, id: &str) {
        if let Some(bean) = self.nearest_bean(false) {
            self.ids.insert(id.to_string(), bean);
        }
    }

    fn expected_mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    fn set_expected_mime_type(&mut self, mime: Option<String>) -> Option<String> {
        std::mem::replace(&mut self.mime_type, mime)
    }
}

impl PackContext for UnmarshallingContext {
    fn add_patcher(&mut self, patcher: Patcher) {
        self.patchers.push(patcher);
    }

    fn resolve_id(&self, id: &str) -> Option<BeanRef> {
        self.ids.get(id).cloned()
    }

    fn report(&mut self, event: ValidationEvent) -> Result<()> {
        self.handle_event(event)
    }

    fn location(&self) -> Option<Location> {
        self.location
    }
}
