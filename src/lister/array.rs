use super::{mismatched_pack, store, ListIterator, Lister, Pack, PackContext};
use crate::accessor::Accessor;
use crate::bean::BeanRef;
use crate::errors::AccessorError;
use crate::value::{PrimitiveArray, PrimitiveKind, Value};
use std::borrow::Cow;
use std::sync::Arc;

/// Initial room of a pack; doubled whenever it fills up
const INITIAL_CAPACITY: usize = 16;

/// Lister of [`Value::Array`] properties
#[derive(Debug)]
pub struct ArrayLister {
    component: String,
}

impl ArrayLister {
    /// Lister of arrays of `component`
    pub fn new<C: Into<String>>(component: C) -> Self {
        ArrayLister {
            component: component.into(),
        }
    }

    /// Name of the item type
    pub fn component(&self) -> &str {
        &self.component
    }
}

impl Lister for ArrayLister {
    fn iterator<'v>(&self, value: &'v Value) -> Result<ListIterator<'v>, AccessorError> {
        match value {
            Value::Array(items) => Ok(Box::new(items.iter().map(|v| Ok(Cow::Borrowed(v))))),
            other => Err(other.mismatch("array")),
        }
    }

    fn start_packing(
        &self,
        _bean: &BeanRef,
        _acc: &Arc<dyn Accessor>,
        _ctx: &mut dyn PackContext,
    ) -> Result<Pack, AccessorError> {
        Ok(Pack::Items(Vec::with_capacity(INITIAL_CAPACITY)))
    }

    fn add_to_pack(&self, pack: &mut Pack, item: Value) -> Result<(), AccessorError> {
        match pack {
            Pack::Items(items) => {
                if items.len() == items.capacity() {
                    items.reserve_exact(items.len());
                }
                items.push(item);
                Ok(())
            }
            other => Err(mismatched_pack(other)),
        }
    }

    fn end_packing(&self, pack: Pack, bean: &BeanRef, acc: &Arc<dyn Accessor>) -> Result<(), AccessorError> {
        match pack {
            Pack::Items(mut items) => {
                items.shrink_to_fit();
                store(bean, acc, Value::Array(items))
            }
            other => Err(mismatched_pack(&other)),
        }
    }

    fn reset(&self, bean: &BeanRef, acc: &Arc<dyn Accessor>) -> Result<(), AccessorError> {
        acc.set(&mut *bean.borrow_mut(), Some(Value::Array(Vec::new())))
    }
}

/// Lister of [`Value::PrimitiveArray`] properties of one primitive kind
#[derive(Debug)]
pub struct PrimitiveArrayLister {
    kind: PrimitiveKind,
}

impl PrimitiveArrayLister {
    /// Lister of arrays of `kind`
    pub fn new(kind: PrimitiveKind) -> Self {
        PrimitiveArrayLister { kind }
    }
}

struct PrimitiveIter<'v> {
    array: &'v PrimitiveArray,
    next: usize,
}

impl<'v> Iterator for PrimitiveIter<'v> {
    type Item = Result<Cow<'v, Value>, AccessorError>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.array.get(self.next)?;
        self.next += 1;
        Some(Ok(Cow::Owned(item)))
    }
}

impl Lister for PrimitiveArrayLister {
    fn iterator<'v>(&self, value: &'v Value) -> Result<ListIterator<'v>, AccessorError> {
        match value {
            Value::PrimitiveArray(array) if array.kind() == self.kind => {
                Ok(Box::new(PrimitiveIter { array, next: 0 }))
            }
            other => Err(other.mismatch(self.kind.name())),
        }
    }

    fn start_packing(
        &self,
        _bean: &BeanRef,
        _acc: &Arc<dyn Accessor>,
        _ctx: &mut dyn PackContext,
    ) -> Result<Pack, AccessorError> {
        Ok(Pack::Primitive(PrimitiveArray::with_capacity(self.kind, INITIAL_CAPACITY)))
    }

    fn add_to_pack(&self, pack: &mut Pack, item: Value) -> Result<(), AccessorError> {
        match pack {
            Pack::Primitive(array) => {
                if array.len() == array.capacity() {
                    let doubled = array.capacity().max(1) * 2;
                    array.grow_to(doubled);
                }
                array.push(item)
            }
            other => Err(mismatched_pack(other)),
        }
    }

    fn end_packing(&self, pack: Pack, bean: &BeanRef, acc: &Arc<dyn Accessor>) -> Result<(), AccessorError> {
        match pack {
            Pack::Primitive(mut array) => {
                array.trim();
                store(bean, acc, Value::PrimitiveArray(array))
            }
            other => Err(mismatched_pack(&other)),
        }
    }

    fn reset(&self, bean: &BeanRef, acc: &Arc<dyn Accessor>) -> Result<(), AccessorError> {
        let empty = PrimitiveArray::with_capacity(self.kind, 0);
        acc.set(&mut *bean.borrow_mut(), Some(Value::PrimitiveArray(empty)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::{slot, AdaptedAccessor, FieldAccessor, FnAdapter};
    use crate::bean::{bean_ref, DynamicBean};
    use crate::impl_bean;
    use crate::lister::tests::{pack, Recorder};
    use pretty_assertions::assert_eq;

    #[derive(Debug, Default)]
    struct Sealed;
    impl_bean!(Sealed, "Sealed");

    #[test]
    fn adapted_getter_only_arrays_are_left_alone() {
        let read_only = FieldAccessor::<Sealed>::new("items", |_| None, None).shared();
        let identity = Arc::new(FnAdapter::new("identity", Ok, Ok));
        let adapted: Arc<dyn Accessor> = Arc::new(AdaptedAccessor::new(read_only.clone(), identity));
        let bean = bean_ref(Sealed);

        let lister = ArrayLister::new("Int");
        let items = || Pack::Items(vec![Value::Int(1)]);
        assert!(lister.end_packing(items(), &bean, &adapted).is_ok());
        assert!(lister.end_packing(items(), &bean, &read_only).is_err());

        let lister = PrimitiveArrayLister::new(PrimitiveKind::Int);
        let ints = || Pack::Primitive(PrimitiveArray::Int(vec![1]));
        assert!(lister.end_packing(ints(), &bean, &adapted).is_ok());
        assert!(lister.end_packing(ints(), &bean, &read_only).is_err());
    }

    #[test]
    fn primitive_pack_grows_and_trims() {
        let lister = PrimitiveArrayLister::new(PrimitiveKind::Int);
        let bean = bean_ref(DynamicBean::new("Bag"));
        let acc = slot("items");
        let mut ctx = Recorder::default();
        let mut p = lister.start_packing(&bean, &acc, &mut ctx).unwrap();
        for i in 0..17 {
            lister.add_to_pack(&mut p, Value::Int(i)).unwrap();
        }
        match &p {
            Pack::Primitive(array) => assert!(array.capacity() >= 32),
            other => panic!("unexpected {:?}", other),
        }
        lister.end_packing(p, &bean, &acc).unwrap();
        let stored = acc.get(&*bean.borrow()).unwrap();
        match stored {
            Some(Value::PrimitiveArray(PrimitiveArray::Int(v))) => {
                assert_eq!(v, (0..17).collect::<Vec<_>>());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn primitive_pack_rejects_other_kinds() {
        let lister = PrimitiveArrayLister::new(PrimitiveKind::Short);
        let mut p = Pack::Primitive(PrimitiveArray::with_capacity(PrimitiveKind::Short, 1));
        assert!(lister.add_to_pack(&mut p, Value::Int(1)).is_err());
    }

    #[test]
    fn iterate_primitives() {
        let lister = PrimitiveArrayLister::new(PrimitiveKind::Boolean);
        let value = Value::PrimitiveArray(PrimitiveArray::Boolean(vec![true, false]));
        let items: Vec<_> = lister
            .iterator(&value)
            .unwrap()
            .map(|i| i.unwrap().into_owned())
            .collect();
        assert_eq!(items, vec![Value::Boolean(true), Value::Boolean(false)]);
    }

    #[test]
    fn reset_primitive_array() {
        let lister = PrimitiveArrayLister::new(PrimitiveKind::Double);
        let bean = bean_ref(DynamicBean::new("Bag"));
        pack(&lister, &bean, vec![Value::Double(1.0)]);
        lister.reset(&bean, &slot("items")).unwrap();
        pack(&lister, &bean, vec![Value::Double(2.0)]);
        assert_eq!(
            slot("items").get(&*bean.borrow()).unwrap(),
            Some(Value::PrimitiveArray(PrimitiveArray::Double(vec![2.0])))
        );
    }
}
