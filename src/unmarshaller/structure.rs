use super::context::UnmarshallingContext;
use super::loader::{unexpected_element, unexpected_text, ChildLoader, Receiver};
use super::visitor::{Attribute, TagName};
use crate::accessor::{Accessor, TransducedAccessor};
use crate::bean::BeanRef;
use crate::datatype::lexical::is_whitespace;
use crate::errors::{AccessorError, Result};
use crate::event::ValidationEvent;
use crate::model::WildcardMode;
use crate::name::{QNameMap, XSI_NS};
use crate::runtime::DOM;
use crate::transducer::Lexical;
use crate::value::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Elements accepted by an element wildcard
#[derive(Clone, Debug)]
pub(crate) struct Wildcard {
    pub mode: WildcardMode,
    pub receiver: Option<Receiver>,
}

/// Loader of the element of a bean.
///
/// Creates the bean, sets its attribute properties, dispatches child elements
/// through the compiled child map and sends character content to the value
/// property, if any.
#[derive(Debug)]
pub(crate) struct StructureLoader {
    pub class: usize,
    pub children: QNameMap<ChildLoader>,
    pub attributes: QNameMap<TransducedAccessor>,
    pub text: Option<TransducedAccessor>,
    pub wildcard: Option<Wildcard>,
    pub attribute_wildcard: Option<Arc<dyn Accessor>>,
    pub frame_size: usize,
}

impl StructureLoader {
    pub fn expects_text(&self) -> bool {
        self.text.is_some()
    }

    pub fn start_element(&self, ctx: &mut UnmarshallingContext, tag: &TagName) -> Result<()> {
        let grammar = ctx.grammar();
        let bean = match ctx.take_reuse() {
            Some(bean) => {
                for info in grammar.chain(self.class) {
                    for property in &info.properties {
                        if let Err(e) = property.reset(&bean) {
                            let event = ValidationEvent::error(e.to_string()).in_field(property.name());
                            ctx.handle_event(event.caused_by(e))?;
                        }
                    }
                }
                bean
            }
            None => grammar.create_instance(self.class)?,
        };
        ctx.state_mut().target = Some(Value::Bean(BeanRef::clone(&bean)));
        ctx.fire_before_unmarshal(self.class, &bean);
        ctx.start_scope(self.frame_size);

        for attribute in &tag.attributes {
            if let Some(xacc) = self.attributes.get_name(&attribute.name) {
                xacc.parse(&bean, &Lexical::borrowed(&attribute.value), ctx)?;
            } else if attribute.name.namespace() == XSI_NS {
                continue;
            } else if let Some(acc) = &self.attribute_wildcard {
                if let Err(e) = capture(&bean, acc, attribute) {
                    ctx.handle_event(ValidationEvent::error(e.to_string()).in_field(acc.name()))?;
                }
            }
        }
        Ok(())
    }

    pub fn child_element(&self, ctx: &mut UnmarshallingContext, tag: &TagName) -> Result<ChildLoader> {
        if let Some(child) = self.children.get(&tag.namespace, &tag.local) {
            return Ok(child.clone());
        }
        let grammar = ctx.grammar();
        if grammar.config.backup_with_parent_namespace {
            let same_local = self.children.iter().find(|(name, _)| name.local_name() == tag.local);
            if let Some((_, child)) = same_local {
                return Ok(child.clone());
            }
        }
        if let Some(wildcard) = &self.wildcard {
            let receiver = wildcard.receiver.clone();
            if wildcard.mode != WildcardMode::Skip {
                if let Some(root) = grammar.roots.get(&tag.namespace, &tag.local) {
                    return Ok(root.clone().with_receiver(receiver));
                }
            }
            if wildcard.mode != WildcardMode::Strict {
                return Ok(ChildLoader::new(DOM, receiver));
            }
        }
        unexpected_element(ctx, tag, self.children.keys())
    }

    pub fn text(&self, ctx: &mut UnmarshallingContext, text: &Lexical) -> Result<()> {
        match &self.text {
            Some(xacc) => match ctx.current_bean() {
                Some(bean) => xacc.parse(&bean, text, ctx),
                None => Ok(()),
            },
            None if is_whitespace(&text.to_text()) => Ok(()),
            None => unexpected_text(ctx, text),
        }
    }

    pub fn leave_element(&self, ctx: &mut UnmarshallingContext) -> Result<()> {
        ctx.end_scope()?;
        if let Some(bean) = ctx.current_bean() {
            ctx.fire_after_unmarshal(self.class, &bean);
        }
        Ok(())
    }
}

/// Adds an unknown attribute to the attribute map of the bean
fn capture(bean: &BeanRef, acc: &Arc<dyn Accessor>, attribute: &Attribute) -> std::result::Result<(), AccessorError> {
    let current = acc.get(&*bean.borrow())?;
    let mut map = match current {
        Some(Value::AttributeMap(map)) => map,
        Some(other) => return Err(other.mismatch("attribute map")),
        None => BTreeMap::new(),
    };
    map.insert(attribute.name.clone(), attribute.value.clone());
    acc.set(&mut *bean.borrow_mut(), Some(Value::AttributeMap(map)))
}
