use super::StructureParts;
use crate::accessor::TransducedAccessor;
use crate::bean::BeanRef;
use crate::context::Linker;
use crate::errors::Result;
use crate::marshaller::XmlSerializer;
use crate::model::{IdKind, PropertyInfo, Target};

/// Property holding the character content of the bean element
#[derive(Debug)]
pub(crate) struct ValueProperty {
    pub name: String,
    pub xacc: TransducedAccessor,
    pub is_id: bool,
}

impl ValueProperty {
    pub fn compile(info: &PropertyInfo, target: &Target, linker: &mut Linker, parts: &mut StructureParts) -> Self {
        let xacc = linker.transduced(info, target);
        parts.text = Some(xacc.clone());
        ValueProperty {
            name: info.name.clone(),
            xacc,
            is_id: info.id == IdKind::Id,
        }
    }

    pub fn declare_namespaces(&self, bean: &BeanRef, ser: &mut XmlSerializer) -> Result<()> {
        if !self.xacc.use_namespace() {
            return Ok(());
        }
        match ser.get(bean, self.xacc.accessor())? {
            Some(value) => self.xacc.declare_namespace(&value, ser),
            None => Ok(()),
        }
    }

    pub fn serialize(&self, bean: &BeanRef, ser: &mut XmlSerializer) -> Result<()> {
        match ser.get(bean, self.xacc.accessor())? {
            Some(value) => {
                let lexical = self.xacc.print(&value, ser)?;
                ser.leaf_body(lexical)
            }
            None => Ok(()),
        }
    }
}
