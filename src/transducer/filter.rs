//! Decorators adding one concern to another transducer.
//!
//! Each decorator forwards everything it does not handle to its delegate.
//! Context state that a decorator changes is restored before it returns,
//! also when the delegate fails.

use super::{Lexical, ParseContext, PrintContext, Transducer};
use crate::datatype::lexical::trim;
use crate::errors::{ParseError, Result};
use crate::event::ValidationEvent;
use crate::name::QName;
use crate::value::Value;
use std::sync::Arc;

macro_rules! forward {
    () => {
        fn use_namespace(&self) -> bool {
            self.core.use_namespace()
        }

        fn declare_namespace(&self, value: &Value, ctx: &mut dyn PrintContext) -> Result<()> {
            self.core.declare_namespace(value, ctx)
        }

        fn type_name(&self, value: &Value) -> Option<QName> {
            self.core.type_name(value)
        }
    };
}

/// Registers parsed values in the ID table of the document
#[derive(Debug)]
pub struct IdTransducer {
    core: Arc<dyn Transducer>,
}

impl IdTransducer {
    /// Decorates `core`
    pub fn new(core: Arc<dyn Transducer>) -> Self {
        IdTransducer { core }
    }
}

impl Transducer for IdTransducer {
    forward!();

    fn print<'v>(&self, value: &'v Value, ctx: &mut dyn PrintContext) -> Result<Lexical<'v>> {
        self.core.print(value, ctx)
    }

    fn parse(&self, lexical: &Lexical, ctx: &mut dyn ParseContext) -> std::result::Result<Value, ParseError> {
        let text = lexical.to_text();
        let id = trim(&text);
        ctx.add_to_id_table(id);
        self.core.parse(&Lexical::borrowed(id), ctx)
    }
}

/// Writes a referenced bean as its ID; reads the ID text.
///
/// Resolution of a parsed ID to its bean is done by the property, possibly
/// after the whole document was read.
#[derive(Debug, Default)]
pub struct IdRefTransducer;

impl Transducer for IdRefTransducer {
    fn print<'v>(&self, value: &'v Value, ctx: &mut dyn PrintContext) -> Result<Lexical<'v>> {
        let bean = match value {
            Value::Bean(bean) => bean,
            other => return Err(other.mismatch("referenced bean").into()),
        };
        match ctx.id_of(bean) {
            Some(id) => Ok(Lexical::from(id)),
            None => {
                ctx.report(ValidationEvent::error(format!(
                    "{} is referenced by an IDREF but has no ID",
                    bean.borrow().class_name()
                )))?;
                Ok(Lexical::borrowed(""))
            }
        }
    }

    fn parse(&self, lexical: &Lexical, _ctx: &mut dyn ParseContext) -> std::result::Result<Value, ParseError> {
        Ok(Value::String(trim(&lexical.to_text()).to_string()))
    }
}

/// Makes a MIME type known while the delegate runs
#[derive(Debug)]
pub struct MimeTypedTransducer {
    core: Arc<dyn Transducer>,
    mime_type: String,
}

impl MimeTypedTransducer {
    /// Decorates `core`
    pub fn new<M: Into<String>>(core: Arc<dyn Transducer>, mime_type: M) -> Self {
        MimeTypedTransducer {
            core,
            mime_type: mime_type.into(),
        }
    }
}

impl Transducer for MimeTypedTransducer {
    forward!();

    fn print<'v>(&self, value: &'v Value, ctx: &mut dyn PrintContext) -> Result<Lexical<'v>> {
        let old = ctx.set_expected_mime_type(Some(self.mime_type.clone()));
        let result = self.core.print(value, ctx);
        ctx.set_expected_mime_type(old);
        result
    }

    fn parse(&self, lexical: &Lexical, ctx: &mut dyn ParseContext) -> std::result::Result<Value, ParseError> {
        let old = ctx.set_expected_mime_type(Some(self.mime_type.clone()));
        let result = self.core.parse(lexical, ctx);
        ctx.set_expected_mime_type(old);
        result
    }
}

/// Keeps binary data of the delegate inline instead of as an attachment
#[derive(Debug)]
pub struct InlineBinaryTransducer {
    core: Arc<dyn Transducer>,
}

impl InlineBinaryTransducer {
    /// Decorates `core`
    pub fn new(core: Arc<dyn Transducer>) -> Self {
        InlineBinaryTransducer { core }
    }
}

impl Transducer for InlineBinaryTransducer {
    forward!();

    fn print<'v>(&self, value: &'v Value, ctx: &mut dyn PrintContext) -> Result<Lexical<'v>> {
        let old = ctx.set_inline_binary(true);
        let result = self.core.print(value, ctx);
        ctx.set_inline_binary(old);
        result
    }

    fn parse(&self, lexical: &Lexical, ctx: &mut dyn ParseContext) -> std::result::Result<Value, ParseError> {
        self.core.parse(lexical, ctx)
    }
}

/// Makes the schema type declared by a property known while the delegate prints
#[derive(Debug)]
pub struct SchemaTypeTransducer {
    core: Arc<dyn Transducer>,
    schema_type: QName,
}

impl SchemaTypeTransducer {
    /// Decorates `core`
    pub fn new(core: Arc<dyn Transducer>, schema_type: QName) -> Self {
        SchemaTypeTransducer { core, schema_type }
    }
}

impl Transducer for SchemaTypeTransducer {
    forward!();

    fn print<'v>(&self, value: &'v Value, ctx: &mut dyn PrintContext) -> Result<Lexical<'v>> {
        let old = ctx.set_schema_type(Some(self.schema_type.clone()));
        let result = self.core.print(value, ctx);
        ctx.set_schema_type(old);
        result
    }

    fn parse(&self, lexical: &Lexical, ctx: &mut dyn ParseContext) -> std::result::Result<Value, ParseError> {
        self.core.parse(lexical, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::XmlCalendar;
    use crate::transducer::{catalog, LeafType, SimpleContext};
    use pretty_assertions::assert_eq;

    #[test]
    fn id_is_trimmed_and_registered() {
        let mut ctx = SimpleContext::new();
        let x = IdTransducer::new(catalog().transducer(LeafType::String));
        let value = x.parse(&Lexical::borrowed("  x1 "), &mut ctx).unwrap();
        assert_eq!(value, Value::String("x1".into()));
        assert_eq!(ctx.ids, vec!["x1".to_string()]);
    }

    #[test]
    fn schema_type_is_restored() {
        let mut ctx = SimpleContext::new();
        let x = SchemaTypeTransducer::new(catalog().transducer(LeafType::XmlCalendar), QName::xs("date"));
        let cal: XmlCalendar = "2001-10-26T21:32:52".parse().unwrap();
        let value = Value::Calendar(cal);
        let text = x.print(&value, &mut ctx).unwrap();
        assert_eq!(text.to_text(), "2001-10-26");
        assert_eq!(PrintContext::schema_type(&ctx), None);
    }

    #[test]
    fn mime_type_reaches_the_delegate() {
        let mut ctx = SimpleContext::new();
        let x = MimeTypedTransducer::new(catalog().transducer(LeafType::DataHandler), "text/plain");
        let value = x.parse(&Lexical::borrowed("YWI="), &mut ctx).unwrap();
        match value {
            Value::Data(d) => assert_eq!(d.content_type, "text/plain"),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(ParseContext::expected_mime_type(&ctx), None);
    }

    #[test]
    fn idref_without_id_reports() {
        use crate::bean::{bean_ref, DynamicBean};
        let mut ctx = SimpleContext::new();
        let value = Value::Bean(bean_ref(DynamicBean::new("Node")));
        let text = IdRefTransducer.print(&value, &mut ctx).unwrap();
        assert_eq!(text.to_text(), "");
        assert_eq!(ctx.events.len(), 1);
    }
}
