//! A minimal DOM
//!
//! Holds element content that has no binding (captured by element
//! wildcards) and is the target of [`Marshaller::marshal_to_dom`].
//!
//! # Examples
//!
//! ```rust
//! use quick_bind::dom::DomElement;
//! use quick_bind::name::QName;
//!
//! let mut root = DomElement::new(QName::unqualified("a"));
//! let mut b = DomElement::new(QName::unqualified("b"));
//! b.push_text("test 1");
//! root.push_element(b);
//!
//! let texts = root.select("b").iter().map(|n| n.text()).collect::<Vec<_>>();
//! assert_eq!(texts, vec!["test 1"]);
//! ```
//!
//! [`Marshaller::marshal_to_dom`]: crate::marshaller::Marshaller::marshal_to_dom

use crate::name::QName;

/// A DOM element
///
/// Has a namespace-qualified name, attributes and children
#[derive(Debug, Clone, PartialEq)]
pub struct DomElement {
    name: QName,
    attributes: Vec<(QName, String)>,
    children: Vec<DomNode>,
}

/// Content of a [`DomElement`]
#[derive(Debug, Clone, PartialEq)]
pub enum DomNode {
    /// Nested element
    Element(DomElement),
    /// Character data, unescaped
    Text(String),
}

impl DomElement {
    /// Creates an empty element
    pub fn new(name: QName) -> DomElement {
        DomElement {
            name,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Gets element name
    pub fn name(&self) -> &QName {
        &self.name
    }

    /// Gets attributes in document order
    pub fn attributes(&self) -> &[(QName, String)] {
        &self.attributes
    }

    /// Gets the value of one attribute
    pub fn attribute(&self, namespace: &str, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n.matches(namespace, local))
            .map(|(_, v)| v.as_str())
    }

    /// Adds or replaces an attribute
    pub fn set_attribute<V: Into<String>>(&mut self, name: QName, value: V) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Gets children
    pub fn children(&self) -> &[DomNode] {
        &self.children
    }

    /// Gets mutable children
    pub fn children_mut(&mut self) -> &mut Vec<DomNode> {
        &mut self.children
    }

    /// Appends a child element
    pub fn push_element(&mut self, child: DomElement) {
        self.children.push(DomNode::Element(child));
    }

    /// Appends text, merging it with a preceding text node
    pub fn push_text(&mut self, text: &str) {
        if let Some(DomNode::Text(last)) = self.children.last_mut() {
            last.push_str(text);
        } else if !text.is_empty() {
            self.children.push(DomNode::Text(text.to_string()));
        }
    }

    /// Child elements, skipping text
    pub fn elements(&self) -> impl Iterator<Item = &DomElement> {
        self.children.iter().filter_map(|c| match c {
            DomNode::Element(e) => Some(e),
            DomNode::Text(_) => None,
        })
    }

    /// Concatenated text of the direct text children
    pub fn text(&self) -> String {
        let mut text = String::new();
        for child in &self.children {
            if let DomNode::Text(t) = child {
                text.push_str(t);
            }
        }
        text
    }

    /// Gets all descendants matching a path of local names separated by `/`
    ///
    /// An empty step or `.` matches any element.
    ///
    /// ```rust
    /// use quick_bind::dom::DomElement;
    /// use quick_bind::name::QName;
    ///
    /// let mut a = DomElement::new(QName::unqualified("a"));
    /// for text in ["test 1", "test 2"] {
    ///     let mut b = DomElement::new(QName::unqualified("b"));
    ///     let mut c = DomElement::new(QName::new("urn:c", "c"));
    ///     c.push_text(text);
    ///     b.push_element(c);
    ///     a.push_element(b);
    /// }
    ///
    /// let texts = a.select("b/c").iter().map(|n| n.text()).collect::<Vec<_>>();
    /// assert_eq!(texts, vec!["test 1", "test 2"]);
    /// ```
    pub fn select(&self, path: &str) -> Vec<&DomElement> {
        let steps: Vec<&str> = path.trim().trim_start_matches('/').split('/').map(str::trim).collect();
        let mut found = Vec::new();
        self.extend_select_all(&mut found, 0, &steps);
        found
    }

    fn extend_select_all<'a>(&'a self, found: &mut Vec<&'a DomElement>, idx: usize, steps: &[&str]) {
        let step = steps[idx];
        let matching = self
            .elements()
            .filter(|c| step.is_empty() || step == "." || c.name.local_name() == step);
        if idx == steps.len() - 1 {
            found.extend(matching);
        } else {
            for child in matching {
                child.extend_select_all(found, idx + 1, steps);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn text_nodes_are_merged() {
        let mut e = DomElement::new(QName::unqualified("e"));
        e.push_text("a");
        e.push_text("b");
        e.push_element(DomElement::new(QName::unqualified("x")));
        e.push_text("c");
        assert_eq!(e.children().len(), 3);
        assert_eq!(e.text(), "abc");
    }

    #[test]
    fn attributes() {
        let mut e = DomElement::new(QName::unqualified("e"));
        e.set_attribute(QName::new("urn:a", "k"), "1");
        e.set_attribute(QName::new("urn:a", "k"), "2");
        assert_eq!(e.attribute("urn:a", "k"), Some("2"));
        assert_eq!(e.attributes().len(), 1);
    }

    #[test]
    fn select_any_step() {
        let mut a = DomElement::new(QName::unqualified("a"));
        let mut b = DomElement::new(QName::unqualified("b"));
        b.push_element(DomElement::new(QName::unqualified("c")));
        a.push_element(b);
        let mut d = DomElement::new(QName::unqualified("d"));
        d.push_element(DomElement::new(QName::unqualified("c")));
        a.push_element(d);
        assert_eq!(a.select("./c").len(), 2);
        assert_eq!(a.select("b/c").len(), 1);
        assert_eq!(a.select("x/c").len(), 0);
    }
}
