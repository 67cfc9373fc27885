use super::{mismatched_pack, store, ListIterator, Lister, Pack, PackContext};
use crate::accessor::{Accessor, XmlAdapter};
use crate::bean::BeanRef;
use crate::errors::AccessorError;
use crate::value::Value;
use std::borrow::Cow;
use std::sync::Arc;

/// Lister of [`Value::List`] properties
#[derive(Debug, Default)]
pub struct CollectionLister;

impl Lister for CollectionLister {
    fn iterator<'v>(&self, value: &'v Value) -> Result<ListIterator<'v>, AccessorError> {
        match value {
            Value::List(items) => Ok(Box::new(items.iter().map(|v| Ok(Cow::Borrowed(v))))),
            other => Err(other.mismatch("list")),
        }
    }

    fn start_packing(
        &self,
        _bean: &BeanRef,
        _acc: &Arc<dyn Accessor>,
        _ctx: &mut dyn PackContext,
    ) -> Result<Pack, AccessorError> {
        Ok(Pack::Items(Vec::new()))
    }

    fn add_to_pack(&self, pack: &mut Pack, item: Value) -> Result<(), AccessorError> {
        match pack {
            Pack::Items(items) => {
                items.push(item);
                Ok(())
            }
            other => Err(mismatched_pack(other)),
        }
    }

    fn end_packing(&self, pack: Pack, bean: &BeanRef, acc: &Arc<dyn Accessor>) -> Result<(), AccessorError> {
        let items = match pack {
            Pack::Items(items) => items,
            other => return Err(mismatched_pack(&other)),
        };
        store(bean, acc, Value::List(items))
    }

    fn reset(&self, bean: &BeanRef, acc: &Arc<dyn Accessor>) -> Result<(), AccessorError> {
        let mut bean = bean.borrow_mut();
        match acc.get(&*bean)? {
            Some(Value::List(_)) => acc.set(&mut *bean, Some(Value::List(Vec::new()))),
            _ => Ok(()),
        }
    }
}

/// Converts every item through an [`XmlAdapter`]
#[derive(Debug)]
pub struct AdaptedLister {
    core: Arc<dyn Lister>,
    adapter: Arc<dyn XmlAdapter>,
}

impl AdaptedLister {
    /// Adapts the items of `core`
    pub fn new(core: Arc<dyn Lister>, adapter: Arc<dyn XmlAdapter>) -> Self {
        AdaptedLister { core, adapter }
    }
}

impl Lister for AdaptedLister {
    fn iterator<'v>(&self, value: &'v Value) -> Result<ListIterator<'v>, AccessorError> {
        let adapter = Arc::clone(&self.adapter);
        Ok(Box::new(self.core.iterator(value)?.map(move |item| {
            adapter.marshal(item?.into_owned()).map(Cow::Owned)
        })))
    }

    fn start_packing(
        &self,
        bean: &BeanRef,
        acc: &Arc<dyn Accessor>,
        ctx: &mut dyn PackContext,
    ) -> Result<Pack, AccessorError> {
        self.core.start_packing(bean, acc, ctx)
    }

    fn add_to_pack(&self, pack: &mut Pack, item: Value) -> Result<(), AccessorError> {
        self.core.add_to_pack(pack, self.adapter.unmarshal(item)?)
    }

    fn end_packing(&self, pack: Pack, bean: &BeanRef, acc: &Arc<dyn Accessor>) -> Result<(), AccessorError> {
        self.core.end_packing(pack, bean, acc)
    }

    fn reset(&self, bean: &BeanRef, acc: &Arc<dyn Accessor>) -> Result<(), AccessorError> {
        self.core.reset(bean, acc)
    }
}
