use super::StructureParts;
use crate::accessor::Accessor;
use crate::bean::BeanRef;
use crate::context::Linker;
use crate::errors::Result;
use crate::event::ValidationEvent;
use crate::marshaller::XmlSerializer;
use crate::model::{PropertyInfo, Target};
use crate::name::QName;
use crate::runtime::ElementContent;
use crate::transducer::PrintContext;
use crate::unmarshaller::loader::{ChildLoader, Loader, NilAction, Receiver};
use crate::value::Value;
use std::sync::Arc;

/// Map written as `<name><entry><key/><value/></entry>...</name>`
#[derive(Debug)]
pub(crate) struct MapProperty {
    pub name: String,
    pub acc: Arc<dyn Accessor>,
    pub element: QName,
    pub key: ElementContent,
    pub value: ElementContent,
    pub nillable: bool,
}

const ENTRY: QName = QName::from_static("", "entry");

impl MapProperty {
    pub fn compile(
        info: &PropertyInfo,
        element: &QName,
        key: &Target,
        value: &Target,
        nillable: bool,
        linker: &mut Linker,
        parts: &mut StructureParts,
    ) -> Self {
        let acc = linker.accessor(info);
        let key = linker.content(QName::unqualified("key"), key, None, false);
        let value = linker.content(QName::unqualified("value"), value, None, false);

        let key_loader = linker.content_loader(&key);
        let value_loader = linker.content_loader(&value);
        let entry = linker.push(Loader::MapEntry {
            key: ChildLoader::new(key_loader, Some(Receiver::MapKey)),
            value: ChildLoader::new(value_loader, Some(Receiver::MapValue)),
        });
        let mut body = linker.push(Loader::MapBody {
            entry: ChildLoader::new(entry, Some(Receiver::MapEntry)),
        });
        if nillable {
            body = linker.push(Loader::XsiNil {
                inner: body,
                on_nil: NilAction::Clear(Arc::clone(&acc)),
            });
        }
        let receiver = Receiver::Set(Arc::clone(&acc));
        parts.children.insert(element.clone(), ChildLoader::new(body, Some(receiver)));

        MapProperty {
            name: info.name.clone(),
            acc,
            element: element.clone(),
            key,
            value,
            nillable,
        }
    }

    pub fn serialize(&self, bean: &BeanRef, ser: &mut XmlSerializer) -> Result<()> {
        let entries = match ser.get(bean, &self.acc)? {
            Some(Value::Map(entries)) => entries,
            Some(other) => {
                let event = ValidationEvent::error(format!("property {} holds a {}, not a map", self.name, other.kind_name()));
                return ser.report(event.in_field(self.name.clone()));
            }
            None if self.nillable => return ser.write_nil(&self.element),
            None => return Ok(()),
        };
        ser.start_element(&self.element)?;
        ser.end_attributes()?;
        for (key, value) in &entries {
            ser.start_element(&ENTRY)?;
            ser.end_attributes()?;
            ser.write_content(&self.key.name, &self.key.content, key)?;
            ser.write_content(&self.value.name, &self.value.content, value)?;
            ser.end_element()?;
        }
        ser.end_element()
    }
}
