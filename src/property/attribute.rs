use super::StructureParts;
use crate::accessor::TransducedAccessor;
use crate::bean::BeanRef;
use crate::context::Linker;
use crate::errors::Result;
use crate::marshaller::XmlSerializer;
use crate::model::{IdKind, PropertyInfo, Target};
use crate::name::QName;

/// Property written as an attribute of the bean element
#[derive(Debug)]
pub(crate) struct AttributeProperty {
    pub name: String,
    pub attribute: QName,
    pub xacc: TransducedAccessor,
    pub is_id: bool,
}

impl AttributeProperty {
    pub fn compile(
        info: &PropertyInfo,
        attribute: &QName,
        target: &Target,
        linker: &mut Linker,
        parts: &mut StructureParts,
    ) -> Self {
        let xacc = linker.transduced(info, target);
        parts.attributes.insert(attribute.clone(), xacc.clone());
        AttributeProperty {
            name: info.name.clone(),
            attribute: attribute.clone(),
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
        if let Some(value) = ser.get(bean, self.xacc.accessor())? {
            let text = self.xacc.print(&value, ser)?.into_text().into_owned();
            ser.attribute(&self.attribute, text)?;
        }
        Ok(())
    }
}
