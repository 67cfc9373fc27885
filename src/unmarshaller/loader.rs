//! The loader state machine.
//!
//! Every element of the document is handled by one [`Loader`]. The loader of
//! the enclosing element picks it in [`Loader::child_element`], together with
//! the [`Receiver`] the finished value is handed to once the element ends.
//! Loaders are stateless; what they build lives in the [`State`] frame of
//! their element.
//!
//! [`State`]: super::context::State

use super::context::{RootMode, UnmarshallingContext};
use super::items::ItemsLoader;
use super::structure::StructureLoader;
use super::visitor::TagName;
use crate::accessor::{Accessor, TransducedAccessor};
use crate::datatype::lexical::{is_whitespace, trim};
use crate::datatype::Base64Data;
use crate::dom::DomElement;
use crate::errors::Result;
use crate::event::ValidationEvent;
use crate::lister::Lister;
use crate::name::{QName, XOP_NS, XSI_NS};
use crate::runtime::{LoaderId, DISCARDER, DOM};
use crate::transducer::{Lexical, Transducer};
use crate::utils::{edit_distance, find_nearest};
use crate::value::Value;
use std::sync::Arc;

/// What happens to the target of a finished child element
#[derive(Clone, Debug)]
pub(crate) enum Receiver {
    /// Set on the bean of the enclosing element
    Set(Arc<dyn Accessor>),
    /// Added to a collection of the enclosing element
    Pack {
        /// Slot in the collection scope of the enclosing element
        offset: usize,
        acc: Arc<dyn Accessor>,
        lister: Arc<dyn Lister>,
    },
    /// Becomes the result of the call
    Root,
    /// Appended to the enclosing DOM element
    DomChild,
    /// Key of the enclosing map entry
    MapKey,
    /// Value of the enclosing map entry
    MapValue,
    /// Entry of the enclosing map
    MapEntry,
}

/// The loader of a child element and where its value goes
#[derive(Clone, Debug)]
pub(crate) struct ChildLoader {
    pub loader: LoaderId,
    pub receiver: Option<Receiver>,
    /// Wrap the value into an [`ElementValue`](crate::value::ElementValue)
    /// named after the element
    pub intercept: bool,
}

impl ChildLoader {
    pub fn new(loader: LoaderId, receiver: Option<Receiver>) -> Self {
        ChildLoader {
            loader,
            receiver,
            intercept: false,
        }
    }

    /// Skips the element
    pub fn discard() -> Self {
        Self::new(DISCARDER, None)
    }

    pub fn intercepted(mut self) -> Self {
        self.intercept = true;
        self
    }

    pub fn with_receiver(mut self, receiver: Option<Receiver>) -> Self {
        self.receiver = receiver;
        self
    }
}

/// Effect of `xsi:nil="true"`
#[derive(Clone, Debug)]
pub(crate) enum NilAction {
    /// The element produces no value
    Nothing,
    /// The property is cleared on the enclosing bean
    Clear(Arc<dyn Accessor>),
}

/// Handler of one kind of element
#[derive(Debug)]
pub(crate) enum Loader {
    /// Skips the element and its content
    Discarder,
    /// Picks the loader of the document element
    Root,
    /// Captures the element as a DOM tree
    Dom,
    /// Element of a bean
    Structure(Box<StructureLoader>),
    /// Wrapper element around the items of a collection
    Items(ItemsLoader),
    /// Honors `xsi:nil` before handing over to `inner`
    XsiNil { inner: LoaderId, on_nil: NilAction },
    /// Honors `xsi:type`, reading with `default` otherwise. `declared` is the
    /// class every announced type must derive from, `None` for `anyType`.
    XsiType { default: LoaderId, declared: Option<usize> },
    /// Substitutes `default` for empty content before handing over to `inner`
    DefaultValue { inner: LoaderId, default: String },
    /// Leaf content parsed into the target
    Text(Arc<dyn Transducer>),
    /// Leaf content parsed straight into a property of the enclosing bean
    LeafProperty(TransducedAccessor),
    /// Element of a map property
    MapBody { entry: ChildLoader },
    /// One `<entry>` of a map
    MapEntry { key: ChildLoader, value: ChildLoader },
}

impl Loader {
    /// Whether empty content is significant
    pub fn expects_text(&self) -> bool {
        match self {
            Loader::Text(_) | Loader::LeafProperty(_) | Loader::Dom => true,
            Loader::Structure(s) => s.expects_text(),
            _ => false,
        }
    }

    /// Called with the frame of the element on top of the stack
    pub fn start_element(&self, ctx: &mut UnmarshallingContext, tag: &TagName) -> Result<()> {
        match self {
            Loader::Discarder | Loader::Root | Loader::Text(_) | Loader::LeafProperty(_) => Ok(()),
            Loader::MapEntry { .. } => Ok(()),
            Loader::Dom => {
                let mut element = DomElement::new(tag.name());
                for attribute in &tag.attributes {
                    element.set_attribute(attribute.name.clone(), attribute.value.clone());
                }
                ctx.state_mut().target = Some(Value::Dom(element));
                Ok(())
            }
            Loader::Structure(s) => s.start_element(ctx, tag),
            Loader::Items(items) => items.start_element(ctx),
            Loader::XsiNil { inner, on_nil } => {
                let nil = matches!(tag.attribute(XSI_NS, "nil").map(trim), Some("true" | "1"));
                if !nil {
                    return delegate(ctx, *inner, tag);
                }
                let state = ctx.state_mut();
                state.nil = true;
                state.loader = DISCARDER;
                if let NilAction::Clear(acc) = on_nil {
                    if let Some(bean) = ctx.nearest_bean(true) {
                        let result = acc.set(&mut *bean.borrow_mut(), None);
                        if let Err(e) = result {
                            return ctx.handle_event(ValidationEvent::error(e.to_string()).in_field(acc.name()));
                        }
                    }
                }
                Ok(())
            }
            Loader::XsiType { default, declared } => {
                let loader = typed_loader(ctx, tag, *default, *declared)?;
                delegate(ctx, loader, tag)
            }
            Loader::DefaultValue { inner, default } => {
                ctx.state_mut().default_text = Some(default.clone());
                delegate(ctx, *inner, tag)
            }
            Loader::MapBody { .. } => {
                ctx.state_mut().target = Some(Value::Map(Vec::new()));
                Ok(())
            }
        }
    }

    /// Picks the loader of a child element
    pub fn child_element(&self, ctx: &mut UnmarshallingContext, tag: &TagName) -> Result<ChildLoader> {
        match self {
            Loader::Discarder => Ok(ChildLoader::discard()),
            Loader::Root => root_child(ctx, tag),
            Loader::Dom => Ok(ChildLoader::new(DOM, Some(Receiver::DomChild))),
            Loader::Structure(s) => s.child_element(ctx, tag),
            Loader::Items(items) => items.child_element(ctx, tag),
            Loader::Text(_) | Loader::LeafProperty(_) => leaf_child(ctx, tag),
            Loader::MapBody { entry } => {
                if tag.matches("", "entry") {
                    return Ok(entry.clone());
                }
                unexpected_element(ctx, tag, &[QName::unqualified("entry")])
            }
            Loader::MapEntry { key, value } => {
                if tag.matches("", "key") {
                    return Ok(key.clone());
                }
                if tag.matches("", "value") {
                    return Ok(value.clone());
                }
                unexpected_element(ctx, tag, &[QName::unqualified("key"), QName::unqualified("value")])
            }
            // never the loader of a frame: they hand over in start_element
            Loader::XsiNil { .. } | Loader::XsiType { .. } | Loader::DefaultValue { .. } => Ok(ChildLoader::discard()),
        }
    }

    /// Receives the character content of the element
    pub fn text(&self, ctx: &mut UnmarshallingContext, text: &Lexical) -> Result<()> {
        match self {
            Loader::Discarder | Loader::Root => Ok(()),
            Loader::Dom => {
                let text = text.to_text();
                if !is_whitespace(&text) {
                    if let Some(Value::Dom(element)) = &mut ctx.state_mut().target {
                        element.push_text(&text);
                    }
                }
                Ok(())
            }
            Loader::Structure(s) => s.text(ctx, text),
            Loader::Text(xducer) => match xducer.parse(text, ctx) {
                Ok(value) => {
                    ctx.state_mut().target = Some(value);
                    Ok(())
                }
                Err(e) => ctx.handle_error(e.message()),
            },
            Loader::LeafProperty(xacc) => match ctx.nearest_bean(true) {
                Some(bean) => xacc.parse(&bean, text, ctx),
                None => ctx.handle_error(format!("no object to set {} on", xacc.accessor().name())),
            },
            _ => unexpected_text(ctx, text),
        }
    }

    /// Called before the frame of the element is popped
    pub fn leave_element(&self, ctx: &mut UnmarshallingContext, _tag: &TagName) -> Result<()> {
        match self {
            Loader::Structure(s) => s.leave_element(ctx),
            Loader::Items(_) => ctx.end_scope(),
            Loader::MapEntry { .. } => {
                let state = ctx.state_mut();
                match (state.pending_key.take(), state.target.take()) {
                    (Some(key), Some(value)) => {
                        state.target = Some(Value::Map(vec![(key, value)]));
                        Ok(())
                    }
                    _ => ctx.handle_event(ValidationEvent::warning("map entry without key or value is ignored")),
                }
            }
            _ => Ok(()),
        }
    }
}

/// Hands the current element over to another loader
fn delegate(ctx: &mut UnmarshallingContext, loader: LoaderId, tag: &TagName) -> Result<()> {
    ctx.state_mut().loader = loader;
    let grammar = ctx.grammar();
    grammar.loaders[loader].start_element(ctx, tag)
}

/// Loader selected by the `xsi:type` of `tag`
fn typed_loader(
    ctx: &mut UnmarshallingContext,
    tag: &TagName,
    default: LoaderId,
    declared: Option<usize>,
) -> Result<LoaderId> {
    let (raw, binding) = match ctx.xsi_type(tag) {
        Some(found) => found,
        None => return Ok(default),
    };
    let binding = match binding {
        Some(binding) => binding,
        None => {
            ctx.handle_error(format!("unrecognized type name: {}", raw))?;
            return Ok(default);
        }
    };
    let declared = match declared {
        Some(declared) => declared,
        None => return Ok(binding.loader),
    };
    let grammar = ctx.grammar();
    match binding.class {
        Some(class) if grammar.is_subclass(class, declared) => Ok(binding.loader),
        _ => {
            ctx.handle_error(format!(
                "type {} is not a subtype of {}",
                raw, grammar.classes[declared].name
            ))?;
            Ok(default)
        }
    }
}

fn root_child(ctx: &mut UnmarshallingContext, tag: &TagName) -> Result<ChildLoader> {
    let grammar = ctx.grammar();
    match ctx.root_mode().clone() {
        RootMode::Declared(loader) => Ok(ChildLoader::new(loader, Some(Receiver::Root)).intercepted()),
        RootMode::Into(class) => Ok(ChildLoader::new(grammar.classes[class].loader, Some(Receiver::Root))),
        RootMode::Normal => {
            if let Some(child) = grammar.roots.get(&tag.namespace, &tag.local) {
                return Ok(child.clone().with_receiver(Some(Receiver::Root)));
            }
            if let Some((_, Some(binding))) = ctx.xsi_type(tag) {
                return Ok(ChildLoader::new(binding.loader, Some(Receiver::Root)).intercepted());
            }
            let message = unexpected_message(tag, grammar.root_names());
            Err(ctx.unrecoverable(ValidationEvent::error(message)))
        }
    }
}

/// Children of leaf elements: only attachment references are understood
fn leaf_child(ctx: &mut UnmarshallingContext, tag: &TagName) -> Result<ChildLoader> {
    if tag.matches(XOP_NS, "Include") {
        if let Some(attachments) = ctx.attachments().cloned() {
            match tag.attribute("", "href") {
                Some(href) => match attachments.attachment(href) {
                    Some(data) => {
                        let payload = Base64Data::owned(data.data, Some(data.content_type));
                        ctx.state_mut().attachment = Some(payload);
                    }
                    None => ctx.handle_error(format!("attachment {} cannot be resolved", href))?,
                },
                None => ctx.handle_error("xop:Include without href")?,
            }
            return Ok(ChildLoader::discard());
        }
    }
    unexpected_element(ctx, tag, std::iter::empty())
}

fn unexpected_message<'a, I>(tag: &TagName, expected: I) -> String
where
    I: IntoIterator<Item = &'a QName>,
{
    let expected: Vec<&QName> = expected.into_iter().collect();
    let mut message = format!(
        "unexpected element (uri:\"{}\", local:\"{}\")",
        tag.namespace, tag.local
    );
    if expected.is_empty() {
        return message;
    }
    let names: Vec<String> = expected.iter().map(|n| format!("<{}>", n)).collect();
    message.push_str(". Expected elements are ");
    message.push_str(&names.join(","));
    let name = tag.name();
    if let Some(nearest) = find_nearest(&name, expected.iter().copied()) {
        let distance = edit_distance(&tag.local, nearest.local_name());
        let len = tag.local.chars().count();
        // close enough to be a typo
        if distance <= usize::max(2, len / 3) && distance < len {
            message.push_str(&format!(". Did you mean <{}>?", nearest));
        }
    }
    message
}

/// Reports an element nothing is bound to and skips it
pub(crate) fn unexpected_element<'a, I>(ctx: &mut UnmarshallingContext, tag: &TagName, expected: I) -> Result<ChildLoader>
where
    I: IntoIterator<Item = &'a QName>,
{
    let message = unexpected_message(tag, expected);
    ctx.handle_error(message)?;
    Ok(ChildLoader::discard())
}

/// Reports character content in an element that only has child elements
pub(crate) fn unexpected_text(ctx: &mut UnmarshallingContext, text: &Lexical) -> Result<()> {
    let text = text.to_text();
    let shown: String = trim(&text).chars().take(40).collect();
    ctx.handle_error(format!("unexpected text \"{}\"", shown))
}
