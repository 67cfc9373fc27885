use super::{select, StructureParts};
use crate::accessor::Accessor;
use crate::bean::BeanRef;
use crate::context::Linker;
use crate::errors::{AccessorError, Result};
use crate::event::ValidationEvent;
use crate::lister::Lister;
use crate::marshaller::XmlSerializer;
use crate::model::{PropertyInfo, TypeRef, Wrapper};
use crate::name::QNameMap;
use crate::runtime::ElementContent;
use crate::transducer::PrintContext;
use crate::unmarshaller::items::ItemsLoader;
use crate::unmarshaller::loader::{ChildLoader, Loader, NilAction, Receiver};
use std::sync::Arc;

/// Collection written as repeated elements, optionally enclosed in a wrapper
/// element.
///
/// Without a wrapper the items are packed into a slot of the scope of the
/// bean element; with one, the wrapper opens a scope of its own.
#[derive(Debug)]
pub(crate) struct ArrayProperty {
    pub name: String,
    pub acc: Arc<dyn Accessor>,
    pub lister: Arc<dyn Lister>,
    pub wrapper: Option<Wrapper>,
    pub types: Vec<ElementContent>,
}

impl ArrayProperty {
    pub fn compile(
        info: &PropertyInfo,
        types: &[TypeRef],
        wrapper: Option<&Wrapper>,
        linker: &mut Linker,
        parts: &mut StructureParts,
        next_offset: &mut usize,
    ) -> Self {
        let acc = linker.accessor(info);
        let lister = linker.lister(info);
        let offset = match wrapper {
            Some(_) => 0,
            None => {
                *next_offset += 1;
                *next_offset - 1
            }
        };
        let receiver = Receiver::Pack {
            offset,
            acc: Arc::clone(&acc),
            lister: Arc::clone(&lister),
        };

        let mut items = QNameMap::new();
        let mut contents = Vec::with_capacity(types.len());
        for t in types {
            let content = linker.element_content(t, info);
            let loader = linker.element_loader(&content, t.default_value.as_deref(), NilAction::Nothing);
            items.insert(t.name.clone(), ChildLoader::new(loader, Some(receiver.clone())));
            contents.push(content);
        }

        match wrapper {
            Some(w) => {
                let mut loader = linker.push(Loader::Items(ItemsLoader {
                    children: items,
                    acc: Arc::clone(&acc),
                    lister: Arc::clone(&lister),
                }));
                if w.nillable {
                    loader = linker.push(Loader::XsiNil {
                        inner: loader,
                        on_nil: NilAction::Clear(Arc::clone(&acc)),
                    });
                }
                parts.children.insert(w.name.clone(), ChildLoader::new(loader, None));
            }
            None => {
                for (name, child) in items.iter() {
                    parts.children.insert(name.clone(), child.clone());
                }
            }
        }

        ArrayProperty {
            name: info.name.clone(),
            acc,
            lister,
            wrapper: wrapper.cloned(),
            types: contents,
        }
    }

    pub fn serialize(&self, bean: &BeanRef, ser: &mut XmlSerializer) -> Result<()> {
        let value = match ser.get(bean, &self.acc)? {
            Some(value) => value,
            None => {
                return match &self.wrapper {
                    Some(w) if w.nillable => ser.write_nil(&w.name),
                    _ => Ok(()),
                }
            }
        };
        if let Some(w) = &self.wrapper {
            ser.start_element(&w.name)?;
            ser.end_attributes()?;
        }
        let grammar = ser.grammar();
        for item in ser.items(&self.lister, &value, &self.name)? {
            match select(&self.types, &item, &grammar) {
                Some(t) => ser.write_content(&t.name, &t.content, &item)?,
                None => ser.report(
                    ValidationEvent::error(format!(
                        "no element of property {} accepts a {}",
                        self.name,
                        item.kind_name()
                    ))
                    .in_field(self.name.clone()),
                )?,
            }
        }
        if self.wrapper.is_some() {
            ser.end_element()?;
        }
        Ok(())
    }

    pub fn reset(&self, bean: &BeanRef) -> std::result::Result<(), AccessorError> {
        self.lister.reset(bean, &self.acc)
    }
}

