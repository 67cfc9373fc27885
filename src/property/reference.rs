use super::StructureParts;
use crate::accessor::Accessor;
use crate::bean::BeanRef;
use crate::context::Linker;
use crate::errors::{AccessorError, Result};
use crate::lister::Lister;
use crate::marshaller::XmlSerializer;
use crate::model::{PropertyInfo, WildcardMode, Wrapper};
use crate::name::{QName, QNameMap};
use crate::unmarshaller::items::ItemsLoader;
use crate::unmarshaller::loader::{ChildLoader, Loader, NilAction, Receiver};
use crate::unmarshaller::structure::Wildcard;
use std::sync::Arc;

/// Property holding global elements: beans of root classes,
/// [`ElementValue`](crate::value::ElementValue)s and, through a wildcard,
/// DOM elements.
///
/// Items are read with the loaders of the document elements and written as
/// document elements are.
#[derive(Debug)]
pub(crate) struct ReferenceProperty {
    pub name: String,
    pub acc: Arc<dyn Accessor>,
    pub lister: Option<Arc<dyn Lister>>,
    pub wrapper: Option<Wrapper>,
}

impl ReferenceProperty {
    pub fn compile(
        info: &PropertyInfo,
        elements: &[QName],
        wildcard: Option<WildcardMode>,
        wrapper: Option<&Wrapper>,
        linker: &mut Linker,
        parts: &mut StructureParts,
        next_offset: &mut usize,
    ) -> Self {
        let acc = linker.accessor(info);
        let lister = info.collection.map(|_| linker.lister(info));
        let receiver = match &lister {
            Some(lister) => {
                let offset = match wrapper {
                    Some(_) => 0,
                    None => {
                        *next_offset += 1;
                        *next_offset - 1
                    }
                };
                Receiver::Pack {
                    offset,
                    acc: Arc::clone(&acc),
                    lister: Arc::clone(lister),
                }
            }
            None => Receiver::Set(Arc::clone(&acc)),
        };

        let mut children = QNameMap::new();
        for name in elements {
            if let Some(root) = linker.root(name) {
                children.insert(name.clone(), root.with_receiver(Some(receiver.clone())));
            }
        }

        match (wrapper, &lister) {
            (Some(w), Some(lister)) => {
                let mut loader = linker.push(Loader::Items(ItemsLoader {
                    children,
                    acc: Arc::clone(&acc),
                    lister: Arc::clone(lister),
                }));
                if w.nillable {
                    loader = linker.push(Loader::XsiNil {
                        inner: loader,
                        on_nil: NilAction::Clear(Arc::clone(&acc)),
                    });
                }
                parts.children.insert(w.name.clone(), ChildLoader::new(loader, None));
            }
            _ => {
                for (name, child) in children.iter() {
                    parts.children.insert(name.clone(), child.clone());
                }
                if let Some(mode) = wildcard {
                    parts.wildcard = Some(Wildcard {
                        mode,
                        receiver: Some(receiver),
                    });
                }
            }
        }

        ReferenceProperty {
            name: info.name.clone(),
            acc,
            lister,
            wrapper: wrapper.cloned(),
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
        let lister = match &self.lister {
            Some(lister) => lister,
            None => return ser.write_element(&value, &self.name),
        };
        if let Some(w) = &self.wrapper {
            ser.start_element(&w.name)?;
            ser.end_attributes()?;
        }
        for item in ser.items(lister, &value, &self.name)? {
            ser.write_element(&item, &self.name)?;
        }
        if self.wrapper.is_some() {
            ser.end_element()?;
        }
        Ok(())
    }

    pub fn reset(&self, bean: &BeanRef) -> std::result::Result<(), AccessorError> {
        match &self.lister {
            Some(lister) => lister.reset(bean, &self.acc),
            None => Ok(()),
        }
    }
}
