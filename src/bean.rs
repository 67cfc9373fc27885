//! Bound object instances.
//!
//! Unmarshalling builds a graph of [`BeanRef`]s. Instances are created by the
//! factory registered on their [`ClassInfo`], or as [`DynamicBean`]s when the
//! class declares none.
//!
//! [`ClassInfo`]: crate::model::ClassInfo

use crate::errors::{AccessorError, Error, Result};
use crate::value::Value;
use std::any::Any;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::rc::Rc;
use std::sync::{Arc, RwLock};

/// An instance of a bound class.
pub trait Bean: Any + Debug {
    /// Name of the [`ClassInfo`](crate::model::ClassInfo) describing this instance
    fn class_name(&self) -> &str;
    /// Upcast for downcasting to the concrete type
    fn as_any(&self) -> &dyn Any;
    /// Upcast for downcasting to the concrete type
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Shared, mutable handle to a bean. Equality of two handles is identity.
pub type BeanRef = Rc<RefCell<dyn Bean>>;

/// Creates a new handle
pub fn bean_ref<B: Bean>(bean: B) -> BeanRef {
    Rc::new(RefCell::new(bean))
}

/// Whether both handles point to the same instance
#[inline]
pub fn same_bean(a: &BeanRef, b: &BeanRef) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

/// Borrows `bean` as its concrete type
pub fn downcast_ref<B: Bean>(bean: &dyn Bean) -> std::result::Result<&B, AccessorError> {
    let class = bean.class_name().to_string();
    bean.as_any().downcast_ref::<B>().ok_or_else(|| AccessorError::WrongBean {
        expected: std::any::type_name::<B>().to_string(),
        found: class,
    })
}

/// Mutably borrows `bean` as its concrete type
pub fn downcast_mut<B: Bean>(bean: &mut dyn Bean) -> std::result::Result<&mut B, AccessorError> {
    let class = bean.class_name().to_string();
    bean.as_any_mut().downcast_mut::<B>().ok_or_else(|| AccessorError::WrongBean {
        expected: std::any::type_name::<B>().to_string(),
        found: class,
    })
}

/// Implements [`Bean`] for a struct whose class name is fixed
#[macro_export]
macro_rules! impl_bean {
    ($ty:ty, $class:expr) => {
        impl $crate::bean::Bean for $ty {
            fn class_name(&self) -> &str {
                $class
            }
            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }
            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }
        }
    };
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// A bean whose properties live in named slots.
///
/// Used for classes that are declared without a native Rust type. Slots are
/// read and written by [`DynamicAccessor`](crate::accessor::DynamicAccessor).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DynamicBean {
    class: String,
    slots: BTreeMap<String, Value>,
}

impl DynamicBean {
    /// Creates an instance with no slot set
    pub fn new<C: Into<String>>(class: C) -> Self {
        DynamicBean {
            class: class.into(),
            slots: BTreeMap::new(),
        }
    }

    /// Sets a slot, builder style
    pub fn with<K: Into<String>, V: Into<Value>>(mut self, slot: K, value: V) -> Self {
        self.slots.insert(slot.into(), value.into());
        self
    }

    /// Reads a slot
    pub fn get(&self, slot: &str) -> Option<&Value> {
        self.slots.get(slot)
    }

    /// Writes or clears a slot
    pub fn set(&mut self, slot: &str, value: Option<Value>) {
        match value {
            Some(v) => {
                self.slots.insert(slot.to_string(), v);
            }
            None => {
                self.slots.remove(slot);
            }
        }
    }

    /// All set slots, sorted by name
    pub fn slots(&self) -> &BTreeMap<String, Value> {
        &self.slots
    }
}

impl Bean for DynamicBean {
    fn class_name(&self) -> &str {
        &self.class
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// Creates fresh instances of one class
pub type BeanFactory = Arc<dyn Fn() -> BeanRef + Send + Sync>;

/// Resolved constructors, keyed by class name.
///
/// Owned by a [`BindingContext`](crate::context::BindingContext) and filled
/// lazily on first instantiation of each class.
#[derive(Default)]
pub struct ConstructorCache {
    resolved: RwLock<HashMap<String, BeanFactory>>,
}

impl ConstructorCache {
    /// Creates an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the constructor of `class`, resolving it on first use with `resolve`
    pub fn get_or_resolve<F>(&self, class: &str, resolve: F) -> Result<BeanFactory>
    where
        F: FnOnce() -> Result<BeanFactory>,
    {
        if let Ok(cache) = self.resolved.read() {
            if let Some(factory) = cache.get(class) {
                return Ok(Arc::clone(factory));
            }
        }
        let factory = resolve()?;
        if let Ok(mut cache) = self.resolved.write() {
            cache.insert(class.to_string(), Arc::clone(&factory));
        }
        Ok(factory)
    }

    /// Number of resolved constructors
    pub fn len(&self) -> usize {
        self.resolved.read().map(|c| c.len()).unwrap_or(0)
    }

    /// Whether nothing was resolved yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forgets every resolved constructor
    pub fn clear(&self) {
        if let Ok(mut cache) = self.resolved.write() {
            cache.clear();
        }
    }
}

impl Debug for ConstructorCache {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "ConstructorCache({} resolved)", self.len())
    }
}

/// Constructor used for classes that declare no factory
pub(crate) fn dynamic_factory(class: &str, is_abstract: bool) -> Result<BeanFactory> {
    if is_abstract {
        return Err(Error::Instantiation {
            class: class.to_string(),
            reason: "the class is abstract".to_string(),
        });
    }
    let class = class.to_string();
    Ok(Arc::new(move || bean_ref(DynamicBean::new(class.clone()))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn identity() {
        let a = bean_ref(DynamicBean::new("A"));
        let b = bean_ref(DynamicBean::new("A"));
        assert!(same_bean(&a, &Rc::clone(&a)));
        assert!(!same_bean(&a, &b));
    }

    #[test]
    fn slots() {
        let mut bean = DynamicBean::new("Person").with("name", "Ada");
        assert_eq!(bean.get("name"), Some(&Value::String("Ada".into())));
        bean.set("name", None);
        assert_eq!(bean.get("name"), None);
    }

    #[test]
    fn cache_resolves_once() {
        let cache = ConstructorCache::new();
        let mut calls = 0;
        for _ in 0..3 {
            cache
                .get_or_resolve("A", || {
                    calls += 1;
                    dynamic_factory("A", false)
                })
                .unwrap();
        }
        assert_eq!(calls, 1);
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn abstract_classes_cannot_be_created() {
        match dynamic_factory("Shape", true) {
            Err(Error::Instantiation { class, .. }) => assert_eq!(class, "Shape"),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }
}
