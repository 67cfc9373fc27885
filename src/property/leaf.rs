use super::StructureParts;
use crate::accessor::TransducedAccessor;
use crate::bean::BeanRef;
use crate::context::Linker;
use crate::errors::Result;
use crate::marshaller::XmlSerializer;
use crate::model::{IdKind, PropertyInfo, TypeRef};
use crate::name::QName;
use crate::unmarshaller::loader::{ChildLoader, Loader, NilAction};
use std::sync::Arc;

/// Single leaf value written as a child element.
///
/// The element is read straight into the property of the enclosing bean, no
/// intermediate value is built. Also covers lists of leaves written as
/// whitespace separated tokens and single IDREFs.
#[derive(Debug)]
pub(crate) struct LeafProperty {
    pub name: String,
    pub element: QName,
    pub xacc: TransducedAccessor,
    pub nillable: bool,
    pub is_id: bool,
}

impl LeafProperty {
    pub fn compile(info: &PropertyInfo, t: &TypeRef, linker: &mut Linker, parts: &mut StructureParts) -> Self {
        let xacc = linker.transduced(info, &t.target);
        let mut loader = linker.push(Loader::LeafProperty(xacc.clone()));
        if let Some(default) = &t.default_value {
            loader = linker.push(Loader::DefaultValue {
                inner: loader,
                default: default.clone(),
            });
        }
        if t.nillable {
            loader = linker.push(Loader::XsiNil {
                inner: loader,
                on_nil: NilAction::Clear(Arc::clone(xacc.accessor())),
            });
        }
        parts.children.insert(t.name.clone(), ChildLoader::new(loader, None));
        LeafProperty {
            name: info.name.clone(),
            element: t.name.clone(),
            xacc,
            nillable: t.nillable,
            is_id: info.id == IdKind::Id,
        }
    }

    pub fn serialize(&self, bean: &BeanRef, ser: &mut XmlSerializer) -> Result<()> {
        let value = match ser.get(bean, self.xacc.accessor())? {
            Some(value) => value,
            None if self.nillable => return ser.write_nil(&self.element),
            None => return Ok(()),
        };
        ser.start_element(&self.element)?;
        if self.xacc.use_namespace() {
            self.xacc.declare_namespace(&value, ser)?;
        }
        ser.end_attributes()?;
        let lexical = self.xacc.print(&value, ser)?;
        ser.leaf_body(lexical)?;
        ser.end_element()
    }
}
