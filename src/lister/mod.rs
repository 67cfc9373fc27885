//! One value versus many values.
//!
//! A [`Lister`] lets a collection property be handled one item at a time:
//! marshalling iterates the items, unmarshalling packs items as they are
//! parsed and stores the finished collection on the bean once the last one
//! has been read.

use crate::accessor::{Accessor, XmlAdapter};
use crate::bean::BeanRef;
use crate::errors::{AccessorError, Result};
use crate::event::{Location, ValidationEvent};
use crate::value::{PrimitiveArray, PrimitiveKind, Value};
use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Debug;
use std::rc::Rc;
use std::sync::{Arc, Mutex, OnceLock, Weak};

mod array;
mod collection;
mod idrefs;

pub use self::array::{ArrayLister, PrimitiveArrayLister};
pub use self::collection::{AdaptedLister, CollectionLister};
pub use self::idrefs::IdRefsLister;

/// Forward-only iteration over the items of a collection value
pub type ListIterator<'v> = Box<dyn Iterator<Item = std::result::Result<Cow<'v, Value>, AccessorError>> + 'v>;

/// Job run once the whole document has been read, in registration order
pub type Patcher = Box<dyn FnOnce(&mut dyn PackContext) -> Result<()>>;

/// What packing needs from the unmarshalling side
pub trait PackContext {
    /// Schedules a job for the end of the document
    fn add_patcher(&mut self, patcher: Patcher);
    /// Bean registered under `id`, if it was seen so far
    fn resolve_id(&self, id: &str) -> Option<BeanRef>;
    /// Reports a problem; returns an error when the handler refuses to continue
    fn report(&mut self, event: ValidationEvent) -> Result<()>;
    /// Current position in the document
    fn location(&self) -> Option<Location>;
}

/// Items collected so far for one property
#[derive(Debug)]
pub enum Pack {
    /// Boxed items
    Items(Vec<Value>),
    /// Unboxed primitives
    Primitive(PrimitiveArray),
    /// IDs waiting to be resolved, shared with the patcher that resolves them
    IdRefs(Rc<RefCell<Vec<String>>>),
}

impl Pack {
    /// Number of items packed
    pub fn len(&self) -> usize {
        match self {
            Pack::Items(items) => items.len(),
            Pack::Primitive(array) => array.len(),
            Pack::IdRefs(ids) => ids.borrow().len(),
        }
    }

    /// Whether nothing was packed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Collection handling for one kind of collection property
pub trait Lister: Send + Sync + Debug {
    /// Iterates the items of a property value
    fn iterator<'v>(&self, value: &'v Value) -> std::result::Result<ListIterator<'v>, AccessorError>;

    /// Starts collecting items for the property `acc` of `bean`
    fn start_packing(
        &self,
        bean: &BeanRef,
        acc: &Arc<dyn Accessor>,
        ctx: &mut dyn PackContext,
    ) -> std::result::Result<Pack, AccessorError>;

    /// Adds one parsed item
    fn add_to_pack(&self, pack: &mut Pack, item: Value) -> std::result::Result<(), AccessorError>;

    /// Stores the collected items on the bean. Called once per packing.
    fn end_packing(&self, pack: Pack, bean: &BeanRef, acc: &Arc<dyn Accessor>) -> std::result::Result<(), AccessorError>;

    /// Empties the current collection of a bean that is being reused
    fn reset(&self, bean: &BeanRef, acc: &Arc<dyn Accessor>) -> std::result::Result<(), AccessorError>;
}

/// Kinds of collection a property can hold
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CollectionType {
    /// [`Value::List`]
    List,
    /// [`Value::Array`]
    Array,
    /// [`Value::PrimitiveArray`]
    Primitive(PrimitiveKind),
}

/// Stores a finished collection on the bean
fn store(bean: &BeanRef, acc: &Arc<dyn Accessor>, value: Value) -> std::result::Result<(), AccessorError> {
    match acc.set(&mut *bean.borrow_mut(), Some(value)) {
        // an adapted getter-only property has nothing to store back into
        Err(AccessorError::ReadOnly(_)) if acc.is_adapted() => Ok(()),
        result => result,
    }
}

fn mismatched_pack(pack: &Pack) -> AccessorError {
    AccessorError::TypeMismatch {
        expected: "pack of this lister",
        found: match pack {
            Pack::Items(_) => "boxed items",
            Pack::Primitive(_) => "primitive items",
            Pack::IdRefs(_) => "IDs",
        },
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

fn collection_lister() -> Arc<dyn Lister> {
    static LISTER: OnceLock<Arc<dyn Lister>> = OnceLock::new();
    Arc::clone(LISTER.get_or_init(|| Arc::new(CollectionLister)))
}

fn primitive_lister(kind: PrimitiveKind) -> Arc<dyn Lister> {
    static LISTERS: OnceLock<HashMap<PrimitiveKind, Arc<dyn Lister>>> = OnceLock::new();
    let listers = LISTERS.get_or_init(|| {
        [
            PrimitiveKind::Boolean,
            PrimitiveKind::Byte,
            PrimitiveKind::Short,
            PrimitiveKind::Int,
            PrimitiveKind::Long,
            PrimitiveKind::Float,
            PrimitiveKind::Double,
            PrimitiveKind::Char,
        ]
        .into_iter()
        .map(|k| (k, Arc::new(PrimitiveArrayLister::new(k)) as Arc<dyn Lister>))
        .collect()
    });
    match listers.get(&kind) {
        Some(lister) => Arc::clone(lister),
        None => Arc::new(PrimitiveArrayLister::new(kind)),
    }
}

/// Array listers stay cached while some compiled property uses them
fn array_lister(component: &str) -> Arc<dyn Lister> {
    static LISTERS: OnceLock<Mutex<HashMap<String, Weak<ArrayLister>>>> = OnceLock::new();
    let cache = LISTERS.get_or_init(Default::default);
    let mut cache = match cache.lock() {
        Ok(cache) => cache,
        Err(poisoned) => poisoned.into_inner(),
    };
    if let Some(lister) = cache.get(component).and_then(Weak::upgrade) {
        return lister;
    }
    cache.retain(|_, weak| weak.strong_count() > 0);
    let lister = Arc::new(ArrayLister::new(component));
    cache.insert(component.to_string(), Arc::downgrade(&lister));
    lister
}

/// Picks the lister of a collection property.
///
/// `component` names the item type and keys the cache of array listers.
/// IDREF collections collect IDs and resolve them after the document ends;
/// an adapter converts every item.
pub fn lister_for(
    collection: CollectionType,
    component: &str,
    idref: bool,
    adapter: Option<Arc<dyn XmlAdapter>>,
) -> Arc<dyn Lister> {
    let mut lister = match collection {
        CollectionType::List => collection_lister(),
        CollectionType::Array => array_lister(component),
        CollectionType::Primitive(kind) => primitive_lister(kind),
    };
    if let Some(adapter) = adapter {
        lister = Arc::new(AdaptedLister::new(lister, adapter));
    }
    if idref {
        lister = Arc::new(IdRefsLister::new(lister));
    }
    lister
}
