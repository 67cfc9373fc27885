//! Module for handling namespace-qualified names as they appear in a binding
//! model: element and attribute names, schema type names and `xs:QName` values.

use memchr::memchr;
use std::borrow::{Borrow, Cow};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::{self, Debug, Display, Formatter};
use std::hash::{Hash, Hasher};

/// Namespace of the XML Schema built-in types (`xs:`)
pub const XS_NS: &str = "http://www.w3.org/2001/XMLSchema";
/// Namespace of the schema instance attributes (`xsi:type`, `xsi:nil`)
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
/// Namespace permanently bound to the `xml` prefix
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";
/// Namespace of namespace declarations themselves
pub const XMLNS_NS: &str = "http://www.w3.org/2000/xmlns/";
/// Namespace of XOP include elements used for binary attachments
pub const XOP_NS: &str = "http://www.w3.org/2004/08/xop/include";

/// `xsi:type`
pub const XSI_TYPE: QName = QName::from_static(XSI_NS, "type");
/// `xsi:nil`
pub const XSI_NIL: QName = QName::from_static(XSI_NS, "nil");

/// A namespace URI plus a local name, with the prefix that was (or should be)
/// used to write it.
///
/// The prefix is a hint only: equality, ordering and hashing consider the
/// namespace and the local name, like the expanded names of the Namespaces in
/// XML recommendation.
#[derive(Clone)]
#[cfg_attr(feature = "serde-types", derive(serde::Deserialize, serde::Serialize))]
pub struct QName {
    namespace: Cow<'static, str>,
    local: Cow<'static, str>,
    prefix: Option<Cow<'static, str>>,
}

impl QName {
    /// Creates a name in the given namespace. Use an empty namespace for
    /// unqualified names.
    pub fn new<N, L>(namespace: N, local: L) -> Self
    where
        N: Into<Cow<'static, str>>,
        L: Into<Cow<'static, str>>,
    {
        QName {
            namespace: namespace.into(),
            local: local.into(),
            prefix: None,
        }
    }

    /// Creates a name without allocation, usable in constants
    pub const fn from_static(namespace: &'static str, local: &'static str) -> Self {
        QName {
            namespace: Cow::Borrowed(namespace),
            local: Cow::Borrowed(local),
            prefix: None,
        }
    }

    /// Creates a name in no namespace
    pub fn unqualified<L: Into<Cow<'static, str>>>(local: L) -> Self {
        Self::new("", local)
    }

    /// Creates a name of an XML Schema built-in type
    pub fn xs<L: Into<Cow<'static, str>>>(local: L) -> Self {
        Self::new(XS_NS, local).with_prefix("xs")
    }

    /// Attaches a preferred prefix
    pub fn with_prefix<P: Into<Cow<'static, str>>>(mut self, prefix: P) -> Self {
        let prefix = prefix.into();
        self.prefix = if prefix.is_empty() { None } else { Some(prefix) };
        self
    }

    /// Namespace URI, empty for unqualified names
    #[inline]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Local part of the name
    #[inline]
    pub fn local_name(&self) -> &str {
        &self.local
    }

    /// Prefix hint, if any
    #[inline]
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Whether this name has the given namespace and local name
    #[inline]
    pub fn matches(&self, namespace: &str, local: &str) -> bool {
        self.local == local && self.namespace == namespace
    }

    /// Parses James Clark's `{namespace}local` notation, as produced by
    /// the [`Display`] implementation.
    pub fn from_clark(name: &str) -> Self {
        if let Some(rest) = name.strip_prefix('{') {
            if let Some(end) = memchr(b'}', rest.as_bytes()) {
                return Self::new(rest[..end].to_string(), rest[end + 1..].to_string());
            }
        }
        Self::unqualified(name.to_string())
    }
}

/// Splits a raw `prefix:local` name. The prefix is `None` when there is no colon.
#[inline]
pub fn split_prefixed(raw: &str) -> (Option<&str>, &str) {
    match memchr(b':', raw.as_bytes()) {
        Some(i) => (Some(&raw[..i]), &raw[i + 1..]),
        None => (None, raw),
    }
}

impl PartialEq for QName {
    fn eq(&self, other: &Self) -> bool {
        self.local == other.local && self.namespace == other.namespace
    }
}
impl Eq for QName {}

impl Hash for QName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.namespace.hash(state);
        self.local.hash(state);
    }
}

impl PartialOrd for QName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for QName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.namespace
            .cmp(&other.namespace)
            .then_with(|| self.local.cmp(&other.local))
    }
}

impl Display for QName {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if self.namespace.is_empty() {
            f.write_str(&self.local)
        } else {
            write!(f, "{{{}}}{}", self.namespace, self.local)
        }
    }
}

impl Debug for QName {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "QName(")?;
        if let Some(p) = &self.prefix {
            write!(f, "{}=", p)?;
        }
        write!(f, "{})", self)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// Map keyed by expanded names that can be queried with borrowed namespace
/// and local name strings, as they arrive from the tokenizer, without
/// allocating a [`QName`].
///
/// Iteration follows insertion order.
#[derive(Clone)]
pub struct QNameMap<V> {
    index: HashMap<String, HashMap<String, usize>>,
    entries: Vec<(QName, V)>,
}

impl<V> Default for QNameMap<V> {
    fn default() -> Self {
        QNameMap {
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }
}

impl<V> QNameMap<V> {
    /// Creates an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, replacing (and returning) the previous value for an equal name
    pub fn insert(&mut self, name: QName, value: V) -> Option<V> {
        let locals = self.index.entry(name.namespace().to_string()).or_default();
        match locals.get(name.local_name()) {
            Some(&i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
            None => {
                locals.insert(name.local_name().to_string(), self.entries.len());
                self.entries.push((name, value));
                None
            }
        }
    }

    /// Looks a value up by its namespace and local name
    pub fn get(&self, namespace: &str, local: &str) -> Option<&V> {
        let i = self.index.get(namespace)?.get(local)?;
        Some(&self.entries[*i].1)
    }

    /// Looks a value up by name
    pub fn get_name<Q: Borrow<QName>>(&self, name: Q) -> Option<&V> {
        let name: &QName = name.borrow();
        self.get(name.namespace(), name.local_name())
    }

    /// Whether the map holds the given name
    pub fn contains(&self, namespace: &str, local: &str) -> bool {
        self.get(namespace, local).is_some()
    }

    /// Removes a name, keeping the order of the other entries
    pub fn remove(&mut self, name: &QName) -> Option<V> {
        let locals = self.index.get_mut(name.namespace())?;
        let i = locals.remove(name.local_name())?;
        let (_, value) = self.entries.remove(i);
        for locals in self.index.values_mut() {
            for idx in locals.values_mut() {
                if *idx > i {
                    *idx -= 1;
                }
            }
        }
        Some(value)
    }

    /// Number of entries
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &QName> {
        self.entries.iter().map(|(k, _)| k)
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&QName, &V)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }
}

impl<V: Debug> Debug for QNameMap<V> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
