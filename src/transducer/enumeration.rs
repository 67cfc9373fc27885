use super::{Lexical, ParseContext, PrintContext, Transducer};
use crate::datatype::lexical::trim;
use crate::errors::{ParseError, Result};
use crate::event::ValidationEvent;
use crate::name::QName;
use crate::value::Value;
use std::borrow::Cow;

/// A bound enumeration: a closed set of constants, each written as a fixed
/// lexical value. Constants are carried as [`Value::String`] holding the
/// constant name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumLeafInfo {
    name: String,
    type_name: Option<QName>,
    constants: Vec<(String, String)>,
}

impl EnumLeafInfo {
    /// Creates an enumeration without constants
    pub fn new<N: Into<String>>(name: N) -> Self {
        EnumLeafInfo {
            name: name.into(),
            type_name: None,
            constants: Vec::new(),
        }
    }

    /// Sets the schema type name used for `xsi:type`
    pub fn type_name(mut self, name: QName) -> Self {
        self.type_name = Some(name);
        self
    }

    /// Adds a constant written as `lexical`
    pub fn constant<C: Into<String>, L: Into<String>>(mut self, constant: C, lexical: L) -> Self {
        self.constants.push((constant.into(), lexical.into()));
        self
    }

    /// Name of the enumeration
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Schema type name, if any
    pub fn schema_type(&self) -> Option<&QName> {
        self.type_name.as_ref()
    }

    /// `(constant, lexical)` pairs in declaration order
    pub fn constants(&self) -> &[(String, String)] {
        &self.constants
    }

    /// Lexical value of a constant
    pub fn lexical_of(&self, constant: &str) -> Option<&str> {
        self.constants
            .iter()
            .find(|(c, _)| c == constant)
            .map(|(_, l)| l.as_str())
    }

    /// Constant written as `lexical`
    pub fn constant_of(&self, lexical: &str) -> Option<&str> {
        self.constants
            .iter()
            .find(|(_, l)| l == lexical)
            .map(|(c, _)| c.as_str())
    }
}

/// Codec of an [`EnumLeafInfo`]
#[derive(Clone, Debug)]
pub struct EnumTransducer {
    info: std::sync::Arc<EnumLeafInfo>,
}

impl EnumTransducer {
    /// Codec of `info`
    pub fn new(info: std::sync::Arc<EnumLeafInfo>) -> Self {
        EnumTransducer { info }
    }
}

impl Transducer for EnumTransducer {
    fn print<'v>(&self, value: &'v Value, ctx: &mut dyn PrintContext) -> Result<Lexical<'v>> {
        let constant = match value {
            Value::String(c) => c,
            other => return Err(other.mismatch("enum constant").into()),
        };
        match self.info.lexical_of(constant) {
            Some(lexical) => Ok(Lexical::Text(Cow::Owned(lexical.to_string()))),
            None => {
                ctx.report(ValidationEvent::error(format!(
                    "'{}' is not a constant of enumeration {}",
                    constant, self.info.name
                )))?;
                Ok(Lexical::borrowed(""))
            }
        }
    }

    fn parse(&self, lexical: &Lexical, _ctx: &mut dyn ParseContext) -> std::result::Result<Value, ParseError> {
        let text = lexical.to_text();
        let text = trim(&text);
        match self.info.constant_of(text) {
            Some(constant) => Ok(Value::String(constant.to_string())),
            None => Err(ParseError::invalid(&self.info.name, text)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transducer::SimpleContext;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn color() -> EnumTransducer {
        EnumTransducer::new(Arc::new(
            EnumLeafInfo::new("Color")
                .constant("RED", "red")
                .constant("DARK_BLUE", "dark-blue"),
        ))
    }

    #[test]
    fn maps_lexical_to_constant() {
        let mut ctx = SimpleContext::new();
        let x = color();
        assert_eq!(
            x.parse(&Lexical::borrowed(" dark-blue "), &mut ctx),
            Ok(Value::String("DARK_BLUE".into()))
        );
        let value = Value::String("RED".into());
        assert_eq!(x.print(&value, &mut ctx).unwrap().to_text(), "red");
    }

    #[test]
    fn unknown_constants() {
        let mut ctx = SimpleContext::new();
        let x = color();
        assert!(x.parse(&Lexical::borrowed("green"), &mut ctx).is_err());
        let value = Value::String("GREEN".into());
        assert_eq!(x.print(&value, &mut ctx).unwrap().to_text(), "");
        assert_eq!(ctx.events.len(), 1);
    }
}
