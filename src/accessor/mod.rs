//! Reading and writing one property of a bean.
//!
//! An [`Accessor`] is chosen when a class model is declared: a
//! [`FieldAccessor`] reaches a field of a native struct through plain
//! function pointers, a [`DynamicAccessor`] reaches a named slot of a
//! [`DynamicBean`]. An [`AdaptedAccessor`] puts an [`XmlAdapter`] between the
//! bean and the XML side.

use crate::bean::{downcast_mut, downcast_ref, Bean, DynamicBean};
use crate::errors::AccessorError;
use crate::value::Value;
use std::fmt::{self, Debug};
use std::marker::PhantomData;
use std::sync::Arc;

pub mod transduced;

pub use self::transduced::TransducedAccessor;

/// Gets and sets one property of a bean
pub trait Accessor: Send + Sync + Debug {
    /// Name of the property, for messages
    fn name(&self) -> &str;

    /// Reads the property; `None` when it is not set
    fn get(&self, bean: &dyn Bean) -> Result<Option<Value>, AccessorError>;

    /// Writes the property; `None` clears it
    fn set(&self, bean: &mut dyn Bean, value: Option<Value>) -> Result<(), AccessorError>;

    /// Whether values pass through an [`XmlAdapter`]
    fn is_adapted(&self) -> bool {
        false
    }
}

/// Reads a property of a native struct
pub type Getter<B> = fn(&B) -> Option<Value>;
/// Writes a property of a native struct
pub type Setter<B> = fn(&mut B, Option<Value>) -> Result<(), AccessorError>;

/// Accessor compiled to direct field access on a native struct `B`.
///
/// ```
/// use quick_bind::accessor::{Accessor, FieldAccessor};
/// use quick_bind::bean::Bean;
/// use quick_bind::impl_bean;
/// use quick_bind::value::{FromValue, Value};
///
/// #[derive(Debug, Default)]
/// struct Point { x: i32 }
/// impl_bean!(Point, "Point");
///
/// let x = FieldAccessor::<Point>::new(
///     "x",
///     |p| Some(Value::Int(p.x)),
///     Some(|p, v| { p.x = v.map(i32::from_value).transpose()?.unwrap_or_default(); Ok(()) }),
/// );
/// let mut point = Point::default();
/// x.set(&mut point, Some(Value::Int(3))).unwrap();
/// assert_eq!(x.get(&point).unwrap(), Some(Value::Int(3)));
/// ```
pub struct FieldAccessor<B> {
    name: String,
    getter: Getter<B>,
    setter: Option<Setter<B>>,
    _bean: PhantomData<fn(B)>,
}

impl<B: Bean> FieldAccessor<B> {
    /// Creates an accessor; without a setter the property is read-only
    pub fn new<N: Into<String>>(name: N, getter: Getter<B>, setter: Option<Setter<B>>) -> Self {
        FieldAccessor {
            name: name.into(),
            getter,
            setter,
            _bean: PhantomData,
        }
    }

    /// Boxes the accessor for use in a class model
    pub fn shared(self) -> Arc<dyn Accessor> {
        Arc::new(self)
    }
}

impl<B> Debug for FieldAccessor<B> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "FieldAccessor({}::{})", std::any::type_name::<B>(), self.name)
    }
}

impl<B: Bean> Accessor for FieldAccessor<B> {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, bean: &dyn Bean) -> Result<Option<Value>, AccessorError> {
        Ok((self.getter)(downcast_ref::<B>(bean)?))
    }

    fn set(&self, bean: &mut dyn Bean, value: Option<Value>) -> Result<(), AccessorError> {
        match self.setter {
            Some(setter) => setter(downcast_mut::<B>(bean)?, value),
            None => Err(AccessorError::ReadOnly(self.name.clone())),
        }
    }
}

/// Accessor of a named slot of a [`DynamicBean`]
#[derive(Clone, Debug)]
pub struct DynamicAccessor {
    slot: String,
}

impl DynamicAccessor {
    /// Accessor of `slot`
    pub fn new<S: Into<String>>(slot: S) -> Self {
        DynamicAccessor { slot: slot.into() }
    }
}

/// Shorthand for a shared [`DynamicAccessor`]
pub fn slot<S: Into<String>>(name: S) -> Arc<dyn Accessor> {
    Arc::new(DynamicAccessor::new(name))
}

impl Accessor for DynamicAccessor {
    fn name(&self) -> &str {
        &self.slot
    }

    fn get(&self, bean: &dyn Bean) -> Result<Option<Value>, AccessorError> {
        Ok(downcast_ref::<DynamicBean>(bean)?.get(&self.slot).cloned())
    }

    fn set(&self, bean: &mut dyn Bean, value: Option<Value>) -> Result<(), AccessorError> {
        downcast_mut::<DynamicBean>(bean)?.set(&self.slot, value);
        Ok(())
    }
}

/// Converts between the value stored in a bean and the value written to XML
pub trait XmlAdapter: Send + Sync + Debug {
    /// Bean value to XML value
    fn marshal(&self, value: Value) -> Result<Value, AccessorError>;
    /// XML value to bean value
    fn unmarshal(&self, value: Value) -> Result<Value, AccessorError>;
}

/// [`XmlAdapter`] made of two functions
pub struct FnAdapter {
    name: &'static str,
    marshal: Box<dyn Fn(Value) -> Result<Value, AccessorError> + Send + Sync>,
    unmarshal: Box<dyn Fn(Value) -> Result<Value, AccessorError> + Send + Sync>,
}

impl FnAdapter {
    /// Creates an adapter
    pub fn new<M, U>(name: &'static str, marshal: M, unmarshal: U) -> Self
    where
        M: Fn(Value) -> Result<Value, AccessorError> + Send + Sync + 'static,
        U: Fn(Value) -> Result<Value, AccessorError> + Send + Sync + 'static,
    {
        FnAdapter {
            name,
            marshal: Box::new(marshal),
            unmarshal: Box::new(unmarshal),
        }
    }
}

impl Debug for FnAdapter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "FnAdapter({})", self.name)
    }
}

impl XmlAdapter for FnAdapter {
    fn marshal(&self, value: Value) -> Result<Value, AccessorError> {
        (self.marshal)(value)
    }

    fn unmarshal(&self, value: Value) -> Result<Value, AccessorError> {
        (self.unmarshal)(value)
    }
}

/// Accessor that converts through an [`XmlAdapter`]
#[derive(Debug)]
pub struct AdaptedAccessor {
    core: Arc<dyn Accessor>,
    adapter: Arc<dyn XmlAdapter>,
}

impl AdaptedAccessor {
    /// Adapts `core`
    pub fn new(core: Arc<dyn Accessor>, adapter: Arc<dyn XmlAdapter>) -> Self {
        AdaptedAccessor { core, adapter }
    }
}

impl Accessor for AdaptedAccessor {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn get(&self, bean: &dyn Bean) -> Result<Option<Value>, AccessorError> {
        self.core
            .get(bean)?
            .map(|v| self.adapter.marshal(v))
            .transpose()
    }

    fn set(&self, bean: &mut dyn Bean, value: Option<Value>) -> Result<(), AccessorError> {
        let value = value.map(|v| self.adapter.unmarshal(v)).transpose()?;
        self.core.set(bean, value)
    }

    fn is_adapted(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impl_bean;
    use crate::value::FromValue;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Default)]
    struct Counter {
        count: i64,
    }
    impl_bean!(Counter, "Counter");

    fn count() -> FieldAccessor<Counter> {
        FieldAccessor::new("count", |c| Some(Value::Long(c.count)), None)
    }

    #[test]
    fn read_only_field() {
        let mut c = Counter { count: 7 };
        let acc = count();
        assert_eq!(acc.get(&c), Ok(Some(Value::Long(7))));
        assert_eq!(
            acc.set(&mut c, Some(Value::Long(1))),
            Err(AccessorError::ReadOnly("count".into()))
        );
    }

    #[test]
    fn wrong_bean() {
        let bean = DynamicBean::new("Other");
        assert!(matches!(count().get(&bean), Err(AccessorError::WrongBean { .. })));
    }

    #[test]
    fn dynamic_slot() {
        let mut bean = DynamicBean::new("Person");
        let acc = DynamicAccessor::new("name");
        acc.set(&mut bean, Some("Ada".into())).unwrap();
        assert_eq!(acc.get(&bean), Ok(Some(Value::String("Ada".into()))));
        acc.set(&mut bean, None).unwrap();
        assert_eq!(acc.get(&bean), Ok(None));
    }

    #[test]
    fn adapter_converts_both_ways() {
        let adapter = FnAdapter::new(
            "cents",
            |v| Ok(Value::String(format!("{}", i64::from_value(v)? as f64 / 100.0))),
            |v| match v {
                Value::String(s) => s
                    .parse::<f64>()
                    .map(|f| Value::Long((f * 100.0).round() as i64))
                    .map_err(|e| AccessorError::Adapter(e.to_string())),
                other => Err(other.mismatch("string")),
            },
        );
        let acc = AdaptedAccessor::new(slot("price"), Arc::new(adapter));
        let mut bean = DynamicBean::new("Item");
        acc.set(&mut bean, Some("1.25".into())).unwrap();
        assert_eq!(bean.get("price"), Some(&Value::Long(125)));
        assert_eq!(acc.get(&bean), Ok(Some(Value::String("1.25".into()))));
        assert!(acc.is_adapted());
    }
}
