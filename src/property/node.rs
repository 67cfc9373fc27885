use super::{select, StructureParts};
use crate::accessor::Accessor;
use crate::bean::BeanRef;
use crate::context::Linker;
use crate::errors::Result;
use crate::event::ValidationEvent;
use crate::marshaller::XmlSerializer;
use crate::model::{PropertyInfo, TypeRef};
use crate::runtime::ElementContent;
use crate::transducer::PrintContext;
use crate::unmarshaller::loader::{ChildLoader, NilAction, Receiver};
use std::sync::Arc;

/// Single value written as one of several elements, or as a bean element
#[derive(Debug)]
pub(crate) struct NodeProperty {
    pub name: String,
    pub acc: Arc<dyn Accessor>,
    pub types: Vec<ElementContent>,
}

impl NodeProperty {
    pub fn compile(info: &PropertyInfo, types: &[TypeRef], linker: &mut Linker, parts: &mut StructureParts) -> Self {
        let acc = linker.accessor(info);
        let mut contents = Vec::with_capacity(types.len());
        for t in types {
            let content = linker.element_content(t, info);
            let loader = linker.element_loader(
                &content,
                t.default_value.as_deref(),
                NilAction::Clear(Arc::clone(&acc)),
            );
            let receiver = Receiver::Set(Arc::clone(&acc));
            parts.children.insert(t.name.clone(), ChildLoader::new(loader, Some(receiver)));
            contents.push(content);
        }
        NodeProperty {
            name: info.name.clone(),
            acc,
            types: contents,
        }
    }

    pub fn serialize(&self, bean: &BeanRef, ser: &mut XmlSerializer) -> Result<()> {
        let value = match ser.get(bean, &self.acc)? {
            Some(value) => value,
            None => {
                return match self.types.first() {
                    Some(t) if t.nillable => ser.write_nil(&t.name),
                    _ => Ok(()),
                }
            }
        };
        let grammar = ser.grammar();
        match select(&self.types, &value, &grammar) {
            Some(t) => ser.write_content(&t.name, &t.content, &value),
            None => ser.report(
                ValidationEvent::error(format!("no element of property {} accepts a {}", self.name, value.kind_name()))
                    .in_field(self.name.clone()),
            ),
        }
    }
}
