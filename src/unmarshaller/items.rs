use super::context::UnmarshallingContext;
use super::loader::{unexpected_element, ChildLoader};
use super::visitor::TagName;
use crate::accessor::Accessor;
use crate::errors::Result;
use crate::lister::Lister;
use crate::name::QNameMap;
use crate::value::Value;
use std::sync::Arc;

/// Loader of the wrapper element of a collection.
///
/// The wrapper opens a one-slot scope for the collection and starts packing
/// right away, so that an empty wrapper still yields an empty collection.
/// Items are added to the bean of the enclosing element.
#[derive(Debug)]
pub(crate) struct ItemsLoader {
    pub children: QNameMap<ChildLoader>,
    pub acc: Arc<dyn Accessor>,
    pub lister: Arc<dyn Lister>,
}

impl ItemsLoader {
    pub fn start_element(&self, ctx: &mut UnmarshallingContext) -> Result<()> {
        let bean = ctx.nearest_bean(true);
        ctx.state_mut().target = bean.clone().map(Value::Bean);
        ctx.start_scope(1);
        match bean {
            Some(bean) => ctx.start_pack(0, bean, &self.acc, &self.lister),
            None => Ok(()),
        }
    }

    pub fn child_element(&self, ctx: &mut UnmarshallingContext, tag: &TagName) -> Result<ChildLoader> {
        match self.children.get(&tag.namespace, &tag.local) {
            Some(child) => Ok(child.clone()),
            None => unexpected_element(ctx, tag, self.children.keys()),
        }
    }
}
