//! The event protocol driving unmarshalling.
//!
//! Any source of XML events can feed an [`UnmarshallingContext`] through
//! [`XmlVisitor`]. The quick-xml connector of this crate is one such source;
//! a DOM walker or another tokenizer can be plugged in the same way.
//!
//! [`UnmarshallingContext`]: super::UnmarshallingContext

use crate::errors::Result;
use crate::event::Location;
use crate::name::QName;

/// One attribute of a start tag, namespace already resolved
#[derive(Clone, Debug, PartialEq)]
pub struct Attribute {
    /// Expanded name, with the prefix used in the document as hint
    pub name: QName,
    /// Unescaped value
    pub value: String,
}

/// An element name as reported by the event source
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TagName {
    /// Namespace URI, empty when the element is in no namespace
    pub namespace: String,
    /// Local name
    pub local: String,
    /// Name as written in the document, with its prefix
    pub raw: String,
    /// Attributes, namespace declarations excluded. Empty on end tags.
    pub attributes: Vec<Attribute>,
}

impl TagName {
    /// Creates a tag without attributes
    pub fn new<N: Into<String>, L: Into<String>>(namespace: N, local: L) -> Self {
        let local = local.into();
        TagName {
            namespace: namespace.into(),
            raw: local.clone(),
            local,
            attributes: Vec::new(),
        }
    }

    /// Adds an attribute, builder style
    pub fn with_attribute<V: Into<String>>(mut self, name: QName, value: V) -> Self {
        self.attributes.push(Attribute {
            name,
            value: value.into(),
        });
        self
    }

    /// Expanded name of the element
    pub fn name(&self) -> QName {
        let name = QName::new(self.namespace.clone(), self.local.clone());
        match self.raw.split_once(':') {
            Some((prefix, _)) => name.with_prefix(prefix.to_string()),
            None => name,
        }
    }

    /// Whether the element has the given name
    #[inline]
    pub fn matches(&self, namespace: &str, local: &str) -> bool {
        self.local == local && self.namespace == namespace
    }

    /// Value of an attribute
    pub fn attribute(&self, namespace: &str, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.matches(namespace, local))
            .map(|a| a.value.as_str())
    }

    /// A copy without attributes, as kept for the end tag
    pub(crate) fn without_attributes(&self) -> TagName {
        TagName {
            namespace: self.namespace.clone(),
            local: self.local.clone(),
            raw: self.raw.clone(),
            attributes: Vec::new(),
        }
    }
}

/// Receiver of a stream of XML events.
///
/// Prefix mappings strictly bracket the element that declares them, and text
/// may arrive in several pieces; the receiver coalesces them.
pub trait XmlVisitor {
    /// Called once before anything else
    fn start_document(&mut self) -> Result<()>;

    /// Called once after the root element was closed
    fn end_document(&mut self) -> Result<()>;

    /// `prefix` (empty for the default namespace) is bound to `uri` for the
    /// next element and its content
    fn start_prefix_mapping(&mut self, prefix: &str, uri: &str) -> Result<()>;

    /// The binding of `prefix` goes out of scope
    fn end_prefix_mapping(&mut self, prefix: &str) -> Result<()>;

    /// A start tag
    fn start_element(&mut self, tag: &TagName) -> Result<()>;

    /// An end tag
    fn end_element(&mut self, tag: &TagName) -> Result<()>;

    /// Character data, unescaped
    fn text(&mut self, text: &str) -> Result<()>;

    /// Position of the next event, if the source knows it
    fn set_location(&mut self, _location: Location) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::XSI_NS;
    use pretty_assertions::assert_eq;

    #[test]
    fn prefix_of_raw_name_is_kept_as_hint() {
        let tag = TagName {
            namespace: "urn:a".into(),
            local: "item".into(),
            raw: "a:item".into(),
            attributes: Vec::new(),
        };
        assert_eq!(tag.name(), QName::new("urn:a", "item"));
        assert_eq!(tag.name().prefix(), Some("a"));
    }

    #[test]
    fn attribute_lookup() {
        let tag = TagName::new("", "e").with_attribute(QName::new(XSI_NS, "nil"), "true");
        assert_eq!(tag.attribute(XSI_NS, "nil"), Some("true"));
        assert_eq!(tag.attribute("", "nil"), None);
        assert!(tag.without_attributes().attributes.is_empty());
    }
}
