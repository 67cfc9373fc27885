//! Destinations of the marshaller.

use super::MarshallerConfig;
use crate::dom::DomElement;
use crate::errors::Result;
use crate::name::QName;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::borrow::Cow;
use std::io::Write;

/// Receiver of the events produced by the marshaller.
///
/// Names carry the prefix chosen for them; an element without prefix is in
/// the default namespace, an attribute without prefix in no namespace.
pub trait XmlOutput {
    /// Called once before the document element
    fn start_document(&mut self) -> Result<()>;

    /// Called once after the document element
    fn end_document(&mut self) -> Result<()>;

    /// A start tag with the namespaces it declares and its attributes
    fn start_element(&mut self, name: &QName, namespaces: &[(String, String)], attributes: &[(QName, String)]) -> Result<()>;

    /// The end tag of the innermost open element
    fn end_element(&mut self, name: &QName) -> Result<()>;

    /// Character data, not escaped yet
    fn text(&mut self, text: &str) -> Result<()>;
}

/// `prefix:local`, or `local` without prefix
pub(crate) fn qualified(name: &QName) -> Cow<str> {
    match name.prefix() {
        Some(prefix) if !prefix.is_empty() => Cow::Owned(format!("{}:{}", prefix, name.local_name())),
        _ => Cow::Borrowed(name.local_name()),
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// Writes XML text through a quick-xml [`Writer`].
///
/// Start tags are held back until the next event, so that elements without
/// content come out as empty tags.
pub struct WriterOutput<W: Write> {
    writer: Writer<W>,
    pending: Option<BytesStart<'static>>,
    declaration: Option<(String, Option<&'static str>)>,
}

impl<W: Write> WriterOutput<W> {
    /// Writes to `inner` with the layout of `config`
    pub fn new(inner: W, config: &MarshallerConfig) -> Self {
        let writer = if config.formatted_output {
            Writer::new_with_indent(inner, config.indent_char as u8, config.indent_size)
        } else {
            Writer::new(inner)
        };
        let standalone = config.standalone.map(|s| if s { "yes" } else { "no" });
        WriterOutput {
            writer,
            pending: None,
            declaration: (!config.fragment).then(|| (config.encoding.clone(), standalone)),
        }
    }

    /// Consumes the output, returning the underlying writer
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn flush_pending(&mut self) -> Result<()> {
        if let Some(start) = self.pending.take() {
            self.writer.write_event(Event::Start(start))?;
        }
        Ok(())
    }
}

impl<W: Write> XmlOutput for WriterOutput<W> {
    fn start_document(&mut self) -> Result<()> {
        if let Some((encoding, standalone)) = &self.declaration {
            let decl = BytesDecl::new("1.0", Some(encoding.as_str()), *standalone);
            self.writer.write_event(Event::Decl(decl))?;
        }
        Ok(())
    }

    fn end_document(&mut self) -> Result<()> {
        self.flush_pending()?;
        self.writer.get_mut().flush()?;
        Ok(())
    }

    fn start_element(&mut self, name: &QName, namespaces: &[(String, String)], attributes: &[(QName, String)]) -> Result<()> {
        self.flush_pending()?;
        let mut start = BytesStart::new(qualified(name).into_owned());
        for (prefix, uri) in namespaces {
            let key = match prefix.as_str() {
                "" => Cow::Borrowed("xmlns"),
                p => Cow::Owned(format!("xmlns:{}", p)),
            };
            start.push_attribute((&*key, uri.as_str()));
        }
        for (name, value) in attributes {
            start.push_attribute((&*qualified(name), value.as_str()));
        }
        self.pending = Some(start);
        Ok(())
    }

    fn end_element(&mut self, name: &QName) -> Result<()> {
        match self.pending.take() {
            Some(start) => self.writer.write_event(Event::Empty(start))?,
            None => self.writer.write_event(Event::End(BytesEnd::new(qualified(name))))?,
        }
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<()> {
        self.flush_pending()?;
        if !text.is_empty() {
            self.writer.write_event(Event::Text(BytesText::new(text)))?;
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// Builds a [`DomElement`] tree. Namespace declarations are not kept: the
/// names of the tree are expanded already.
#[derive(Debug, Default)]
pub struct DomOutput {
    stack: Vec<DomElement>,
    root: Option<DomElement>,
}

impl DomOutput {
    /// An empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// The document element, once it was closed
    pub fn into_root(self) -> Option<DomElement> {
        self.root
    }
}

impl XmlOutput for DomOutput {
    fn start_document(&mut self) -> Result<()> {
        self.stack.clear();
        self.root = None;
        Ok(())
    }

    fn end_document(&mut self) -> Result<()> {
        Ok(())
    }

    fn start_element(&mut self, name: &QName, _namespaces: &[(String, String)], attributes: &[(QName, String)]) -> Result<()> {
        let mut element = DomElement::new(name.clone());
        for (name, value) in attributes {
            element.set_attribute(name.clone(), value.clone());
        }
        self.stack.push(element);
        Ok(())
    }

    fn end_element(&mut self, _name: &QName) -> Result<()> {
        if let Some(element) = self.stack.pop() {
            match self.stack.last_mut() {
                Some(parent) => parent.push_element(element),
                None => self.root = Some(element),
            }
        }
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<()> {
        if let Some(element) = self.stack.last_mut() {
            element.push_text(text);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write(config: &MarshallerConfig, events: impl FnOnce(&mut dyn XmlOutput) -> Result<()>) -> String {
        let mut out = WriterOutput::new(Vec::new(), config);
        events(&mut out).unwrap();
        String::from_utf8(out.into_inner()).unwrap()
    }

    #[test]
    fn empty_elements_collapse() {
        let mut config = MarshallerConfig::default();
        config.fragment(true);
        let root = QName::new("urn:a", "root");
        let child = QName::new("urn:a", "child").with_prefix("a");
        let xml = write(&config, |out| {
            out.start_document()?;
            out.start_element(&root, &[("a".to_string(), "urn:a".to_string())], &[])?;
            out.start_element(&child, &[], &[(QName::unqualified("k"), "1 < 2".to_string())])?;
            out.end_element(&child)?;
            out.text("x & y")?;
            out.end_element(&root)?;
            out.end_document()
        });
        assert_eq!(xml, r#"<root xmlns:a="urn:a"><a:child k="1 &lt; 2"/>x &amp; y</root>"#);
    }

    #[test]
    fn declaration() {
        let mut config = MarshallerConfig::default();
        config.standalone(Some(true));
        let root = QName::unqualified("r");
        let xml = write(&config, |out| {
            out.start_document()?;
            out.start_element(&root, &[], &[])?;
            out.end_element(&root)?;
            out.end_document()
        });
        assert_eq!(xml, r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><r/>"#);
    }

    #[test]
    fn dom_tree() {
        let mut out = DomOutput::new();
        let root = QName::unqualified("r");
        let child = QName::new("urn:c", "c");
        out.start_document().unwrap();
        out.start_element(&root, &[], &[]).unwrap();
        out.start_element(&child, &[("".to_string(), "urn:c".to_string())], &[]).unwrap();
        out.text("hi").unwrap();
        out.end_element(&child).unwrap();
        out.end_element(&root).unwrap();
        out.end_document().unwrap();
        let dom = out.into_root().unwrap();
        assert_eq!(dom.text(), "");
        let children: Vec<_> = dom.elements().collect();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].name(), &child);
        assert_eq!(children[0].text(), "hi");
    }
}
