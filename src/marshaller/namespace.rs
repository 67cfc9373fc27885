//! Prefix bindings of the elements being written.

use crate::name::XML_NS;

/// Stack of in-scope namespace bindings.
///
/// Every open element owns a frame holding the bindings it declares. New
/// bindings can only be added to the frame of the element whose start tag
/// is still open.
#[derive(Debug)]
pub(crate) struct NamespaceContext {
    /// `(prefix, uri)`, the default namespace having the empty prefix
    bindings: Vec<(String, String)>,
    /// Index of the first binding of each open element
    frames: Vec<usize>,
    counter: usize,
}

impl NamespaceContext {
    pub fn new() -> Self {
        NamespaceContext {
            bindings: vec![("xml".to_string(), XML_NS.to_string())],
            frames: Vec::new(),
            counter: 0,
        }
    }

    /// Opens the frame of a new element
    pub fn push_frame(&mut self) {
        self.frames.push(self.bindings.len());
    }

    /// Drops the bindings of the innermost element
    pub fn pop_frame(&mut self) {
        if let Some(start) = self.frames.pop() {
            self.bindings.truncate(start);
        }
    }

    /// Bindings declared by the innermost element
    pub fn declarations(&self) -> &[(String, String)] {
        match self.frames.last() {
            Some(start) => &self.bindings[*start..],
            None => &[],
        }
    }

    /// Namespace `prefix` is bound to
    pub fn uri_of(&self, prefix: &str) -> Option<&str> {
        self.bindings
            .iter()
            .rev()
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    /// The default namespace in effect
    fn default_namespace(&self) -> &str {
        self.uri_of("").unwrap_or("")
    }

    /// A prefix currently bound to `uri`, the most recent one first
    pub fn prefix_of(&self, uri: &str) -> Option<&str> {
        self.find_prefix(uri, false)
    }

    fn find_prefix(&self, uri: &str, require_prefix: bool) -> Option<&str> {
        if uri.is_empty() {
            // no prefix can be bound to the empty namespace
            return match (require_prefix, self.default_namespace()) {
                (false, "") => Some(""),
                _ => None,
            };
        }
        self.bindings
            .iter()
            .rev()
            .filter(|(p, u)| u == uri && !(require_prefix && p.is_empty()))
            .map(|(p, _)| p.as_str())
            .find(|p| self.uri_of(p) == Some(uri))
    }

    fn bind(&mut self, prefix: &str, uri: &str) -> String {
        self.bindings.push((prefix.to_string(), uri.to_string()));
        prefix.to_string()
    }

    fn usable_hint<'h>(&self, hint: Option<&'h str>) -> Option<&'h str> {
        match hint {
            Some(h) if !h.is_empty() && h != "xml" && h != "xmlns" && self.uri_of(h).is_none() => Some(h),
            _ => None,
        }
    }

    /// Prefix for the name of the element being opened. Binds the default
    /// namespace when no prefix is available.
    pub fn declare_element(&mut self, uri: &str, hint: Option<&str>) -> String {
        if uri == XML_NS {
            return "xml".to_string();
        }
        if let Some(prefix) = self.prefix_of(uri) {
            return prefix.to_string();
        }
        if uri.is_empty() {
            // undeclares an inherited default namespace
            return self.bind("", "");
        }
        match self.usable_hint(hint) {
            Some(hint) => self.bind(hint, uri),
            None => self.bind("", uri),
        }
    }

    /// Prefix for a name used in an attribute or in content. Never changes
    /// the default namespace, which the name of the element may rely on.
    pub fn declare(&mut self, uri: &str, hint: Option<&str>, require_prefix: bool) -> String {
        if uri == XML_NS {
            return "xml".to_string();
        }
        if uri.is_empty() {
            return String::new();
        }
        if let Some(prefix) = self.find_prefix(uri, require_prefix) {
            return prefix.to_string();
        }
        if let Some(hint) = self.usable_hint(hint) {
            return self.bind(hint, uri);
        }
        loop {
            self.counter += 1;
            let prefix = format!("ns{}", self.counter);
            if self.uri_of(&prefix).is_none() {
                return self.bind(&prefix, uri);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn element_takes_default_namespace() {
        let mut ns = NamespaceContext::new();
        ns.push_frame();
        assert_eq!(ns.declare_element("urn:a", None), "");
        assert_eq!(ns.declarations(), &[("".to_string(), "urn:a".to_string())]);
        ns.push_frame();
        assert_eq!(ns.declare_element("urn:a", None), "");
        assert!(ns.declarations().is_empty());
        ns.pop_frame();
        ns.pop_frame();
        assert_eq!(ns.prefix_of("urn:a"), None);
    }

    #[test]
    fn empty_namespace_under_default() {
        let mut ns = NamespaceContext::new();
        ns.push_frame();
        ns.declare_element("urn:a", None);
        ns.push_frame();
        assert_eq!(ns.declare_element("", None), "");
        assert_eq!(ns.declarations(), &[("".to_string(), "".to_string())]);
    }

    #[test]
    fn attributes_need_a_prefix() {
        let mut ns = NamespaceContext::new();
        ns.push_frame();
        ns.declare_element("urn:a", None);
        assert_eq!(ns.declare("urn:a", None, false), "");
        assert_eq!(ns.declare("urn:a", None, true), "ns1");
        assert_eq!(ns.declare("urn:b", Some("b"), true), "b");
        assert_eq!(ns.declare("urn:c", Some("b"), true), "ns2");
        assert_eq!(ns.declare("urn:b", None, true), "b");
    }

    #[test]
    fn shadowed_prefix_is_not_reused() {
        let mut ns = NamespaceContext::new();
        ns.push_frame();
        ns.declare("urn:a", Some("p"), true);
        ns.push_frame();
        ns.declare_element("urn:x", Some("q"));
        ns.bindings.push(("p".to_string(), "urn:b".to_string()));
        assert_eq!(ns.prefix_of("urn:a"), None);
        assert_eq!(ns.prefix_of("urn:b"), Some("p"));
    }

    #[test]
    fn xml_namespace_is_predeclared() {
        let mut ns = NamespaceContext::new();
        ns.push_frame();
        assert_eq!(ns.declare(XML_NS, None, true), "xml");
        assert!(ns.declarations().is_empty());
    }
}
