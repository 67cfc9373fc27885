//! An [`Accessor`] paired with the [`Transducer`] of the property value, so
//! that the property can be read from and written to text directly.

use super::Accessor;
use crate::bean::{Bean, BeanRef};
use crate::datatype::lexical::{tokens, trim};
use crate::errors::{AccessorError, Result};
use crate::event::ValidationEvent;
use crate::lister::{Lister, PackContext};
use crate::transducer::{IdRefTransducer, Lexical, ParseContext, PrintContext, Transducer};
use crate::value::Value;
use std::borrow::Cow;
use std::sync::Arc;

/// Text conversion of one property
#[derive(Debug, Clone)]
pub enum TransducedAccessor {
    /// The whole property value is one lexical value
    Plain {
        /// Property accessor
        acc: Arc<dyn Accessor>,
        /// Codec of the value
        xducer: Arc<dyn Transducer>,
    },
    /// The property references a bean by its ID
    IdRef {
        /// Property accessor
        acc: Arc<dyn Accessor>,
    },
    /// The property is a collection written as whitespace separated tokens
    List {
        /// Property accessor
        acc: Arc<dyn Accessor>,
        /// Codec of one item
        xducer: Arc<dyn Transducer>,
        /// Iterates and packs the items
        lister: Arc<dyn Lister>,
    },
}

impl TransducedAccessor {
    /// The underlying accessor
    pub fn accessor(&self) -> &Arc<dyn Accessor> {
        match self {
            Self::Plain { acc, .. } | Self::IdRef { acc } | Self::List { acc, .. } => acc,
        }
    }

    /// Reads the property value
    pub fn get(&self, bean: &dyn Bean) -> std::result::Result<Option<Value>, AccessorError> {
        self.accessor().get(bean)
    }

    /// Whether printing needs namespace bindings
    pub fn use_namespace(&self) -> bool {
        match self {
            Self::Plain { xducer, .. } | Self::List { xducer, .. } => xducer.use_namespace(),
            Self::IdRef { .. } => false,
        }
    }

    /// Declares the namespaces needed to print `value`
    pub fn declare_namespace(&self, value: &Value, ctx: &mut dyn PrintContext) -> Result<()> {
        match self {
            Self::Plain { xducer, .. } => xducer.declare_namespace(value, ctx),
            Self::List { xducer, lister, .. } => {
                for item in lister.iterator(value)? {
                    xducer.declare_namespace(&*item?, ctx)?;
                }
                Ok(())
            }
            Self::IdRef { .. } => Ok(()),
        }
    }

    /// Prints a value previously read with [`get`](Self::get)
    pub fn print<'v>(&self, value: &'v Value, ctx: &mut dyn PrintContext) -> Result<Lexical<'v>> {
        match self {
            Self::Plain { xducer, .. } => xducer.print(value, ctx),
            Self::IdRef { .. } => IdRefTransducer.print(value, ctx),
            Self::List { xducer, lister, .. } => {
                let mut text = String::new();
                for item in lister.iterator(value)? {
                    let item = item?;
                    let printed = xducer.print(&item, ctx)?;
                    if !text.is_empty() {
                        text.push(' ');
                    }
                    text.push_str(&printed.to_text());
                }
                Ok(Lexical::Text(Cow::Owned(text)))
            }
        }
    }

    /// Parses `lexical` and stores the result on `bean`.
    ///
    /// Conversion and accessor failures are reported through `ctx` and leave
    /// the property untouched. Only a refused event is returned as an error.
    pub fn parse<C>(&self, bean: &BeanRef, lexical: &Lexical, ctx: &mut C) -> Result<()>
    where
        C: ParseContext + PackContext,
    {
        match self {
            Self::Plain { acc, xducer } => {
                let value = match xducer.parse(lexical, ctx) {
                    Ok(value) => value,
                    Err(e) => return report_parse_error(ctx, e.message(), acc),
                };
                let result = acc.set(&mut *bean.borrow_mut(), Some(value));
                report_accessor_error(ctx, result, acc)
            }
            Self::IdRef { acc } => {
                let text = lexical.to_text();
                let id = trim(&text).to_string();
                if let Some(target) = ctx.resolve_id(&id) {
                    let result = acc.set(&mut *bean.borrow_mut(), Some(Value::Bean(target)));
                    return report_accessor_error(ctx, result, acc);
                }
                let location = ctx.location();
                let bean = BeanRef::clone(bean);
                let acc = Arc::clone(acc);
                ctx.add_patcher(Box::new(move |ctx: &mut dyn PackContext| {
                    match ctx.resolve_id(&id) {
                        Some(target) => {
                            if let Err(e) = acc.set(&mut *bean.borrow_mut(), Some(Value::Bean(target))) {
                                ctx.report(ValidationEvent::error(e.to_string()).at(location))?;
                            }
                            Ok(())
                        }
                        None => ctx.report(
                            ValidationEvent::error(format!("undefined ID \"{}\"", id)).at(location),
                        ),
                    }
                }));
                Ok(())
            }
            Self::List { acc, xducer, lister } => {
                let mut pack = match lister.start_packing(bean, acc, ctx) {
                    Ok(pack) => pack,
                    Err(e) => return report_accessor_error(ctx, Err(e), acc),
                };
                let text = lexical.to_text();
                for token in tokens(&text) {
                    match xducer.parse(&Lexical::borrowed(token), ctx) {
                        Ok(item) => {
                            let result = lister.add_to_pack(&mut pack, item);
                            report_accessor_error(ctx, result, acc)?;
                        }
                        Err(e) => report_parse_error(ctx, e.message(), acc)?,
                    }
                }
                let result = lister.end_packing(pack, bean, acc);
                report_accessor_error(ctx, result, acc)
            }
        }
    }
}

fn report_parse_error<C: PackContext>(ctx: &mut C, message: &str, acc: &Arc<dyn Accessor>) -> Result<()> {
    let location = ctx.location();
    ctx.report(ValidationEvent::error(message).in_field(acc.name()).at(location))
}

fn report_accessor_error<C: PackContext>(
    ctx: &mut C,
    result: std::result::Result<(), AccessorError>,
    acc: &Arc<dyn Accessor>,
) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            let location = ctx.location();
            let event = ValidationEvent::error(e.to_string())
                .in_field(acc.name())
                .at(location)
                .caused_by(e);
            ctx.report(event)
        }
    }
}
