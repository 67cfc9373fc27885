use super::{mismatched_pack, ListIterator, Lister, Pack, PackContext};
use crate::accessor::Accessor;
use crate::bean::BeanRef;
use crate::errors::AccessorError;
use crate::event::ValidationEvent;
use crate::value::Value;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

/// Lister of IDREF collections.
///
/// Items are packed as ID strings. Starting a pack schedules a patcher that
/// resolves every ID once the whole document has been read and only then
/// fills the collection through the wrapped lister. IDs without a matching
/// object are reported and skipped.
#[derive(Debug)]
pub struct IdRefsLister {
    core: Arc<dyn Lister>,
}

impl IdRefsLister {
    /// Resolves IDs into the collection handled by `core`
    pub fn new(core: Arc<dyn Lister>) -> Self {
        IdRefsLister { core }
    }
}

impl Lister for IdRefsLister {
    fn iterator<'v>(&self, value: &'v Value) -> Result<ListIterator<'v>, AccessorError> {
        self.core.iterator(value)
    }

    fn start_packing(
        &self,
        bean: &BeanRef,
        acc: &Arc<dyn Accessor>,
        ctx: &mut dyn PackContext,
    ) -> Result<Pack, AccessorError> {
        let ids: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
        let location = ctx.location();
        let core = Arc::clone(&self.core);
        let bean = BeanRef::clone(bean);
        let acc = Arc::clone(acc);
        let pending = Rc::clone(&ids);
        ctx.add_patcher(Box::new(move |ctx: &mut dyn PackContext| {
            let mut pack = match core.start_packing(&bean, &acc, ctx) {
                Ok(pack) => pack,
                Err(e) => return ctx.report(ValidationEvent::error(e.to_string()).at(location)),
            };
            for id in pending.borrow().iter() {
                match ctx.resolve_id(id) {
                    Some(target) => {
                        if let Err(e) = core.add_to_pack(&mut pack, Value::Bean(target)) {
                            ctx.report(ValidationEvent::error(e.to_string()).at(location))?;
                        }
                    }
                    None => ctx.report(
                        ValidationEvent::error(format!("undefined ID \"{}\"", id)).at(location),
                    )?,
                }
            }
            if let Err(e) = core.end_packing(pack, &bean, &acc) {
                ctx.report(ValidationEvent::error(e.to_string()).at(location))?;
            }
            Ok(())
        }));
        Ok(Pack::IdRefs(ids))
    }

    fn add_to_pack(&self, pack: &mut Pack, item: Value) -> Result<(), AccessorError> {
        match (pack, item) {
            (Pack::IdRefs(ids), Value::String(id)) => {
                ids.borrow_mut().push(id);
                Ok(())
            }
            (Pack::IdRefs(_), other) => Err(other.mismatch("ID")),
            (other, _) => Err(mismatched_pack(other)),
        }
    }

    fn end_packing(&self, _pack: Pack, _bean: &BeanRef, _acc: &Arc<dyn Accessor>) -> Result<(), AccessorError> {
        // the patcher stores the collection
        Ok(())
    }

    fn reset(&self, bean: &BeanRef, acc: &Arc<dyn Accessor>) -> Result<(), AccessorError> {
        self.core.reset(bean, acc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::slot;
    use crate::bean::{bean_ref, same_bean, DynamicBean};
    use crate::lister::tests::pack;
    use crate::lister::CollectionLister;
    use pretty_assertions::assert_eq;

    #[test]
    fn resolves_after_document_end() {
        let lister = IdRefsLister::new(Arc::new(CollectionLister));
        let holder = bean_ref(DynamicBean::new("Holder"));
        let mut ctx = pack(&lister, &holder, vec!["x1".into(), "missing".into()]);
        // nothing stored before the patchers run
        assert_eq!(slot("items").get(&*holder.borrow()).unwrap(), None);

        let target = bean_ref(DynamicBean::new("Node"));
        ctx.ids.insert("x1".into(), target.clone());
        ctx.run_patchers().unwrap();

        assert_eq!(ctx.events.len(), 1);
        assert!(ctx.events[0].message().contains("missing"));
        let stored = slot("items").get(&*holder.borrow()).unwrap();
        match stored {
            Some(Value::List(items)) => {
                assert_eq!(items.len(), 1);
                assert!(same_bean(&items[0].as_bean().unwrap(), &target));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn only_ids_can_be_packed() {
        let lister = IdRefsLister::new(Arc::new(CollectionLister));
        let mut pack = Pack::IdRefs(Default::default());
        assert!(lister.add_to_pack(&mut pack, Value::Int(1)).is_err());
        assert_eq!(pack.len(), 0);
    }
}
