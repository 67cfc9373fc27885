//! Feeds an [`XmlVisitor`] from a quick-xml [`NsReader`].

use super::visitor::{Attribute, TagName, XmlVisitor};
use crate::errors::{Error, Result};
use crate::event::Location;
use crate::name::QName;
use memchr::memchr_iter;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, PrefixDeclaration, ResolveResult};
use quick_xml::NsReader;
use std::io::{self, BufRead, Read};

#[cfg(feature = "async-tokio")]
use std::pin::Pin;
#[cfg(feature = "async-tokio")]
use std::task::{Context, Poll};
#[cfg(feature = "async-tokio")]
use tokio::io::{AsyncBufRead, AsyncRead, ReadBuf};

/// A reader that remembers where lines start, so that byte offsets reported
/// by the tokenizer can be turned into line and column numbers
#[derive(Debug)]
pub(crate) struct CountingReader<R> {
    inner: R,
    consumed: u64,
    scanned: u64,
    newlines: Vec<u64>,
}

impl<R> CountingReader<R> {
    pub fn new(inner: R) -> Self {
        CountingReader {
            inner,
            consumed: 0,
            scanned: 0,
            newlines: Vec::new(),
        }
    }

    /// Line and column of a byte offset already read
    pub fn location(&self, offset: u64) -> Location {
        let line = self.newlines.partition_point(|&p| p < offset);
        let line_start = match line {
            0 => 0,
            _ => self.newlines[line - 1] + 1,
        };
        Location {
            line: line + 1,
            column: (offset - line_start) as usize + 1,
            offset,
        }
    }
}

/// Records the newlines of the part of `buf` not seen yet
fn scan(newlines: &mut Vec<u64>, scanned: &mut u64, consumed: u64, buf: &[u8]) {
    let start = scanned.saturating_sub(consumed) as usize;
    if start < buf.len() {
        newlines.extend(memchr_iter(b'\n', &buf[start..]).map(|i| consumed + (start + i) as u64));
        *scanned = consumed + buf.len() as u64;
    }
}

impl<R: BufRead> Read for CountingReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let n = {
            let available = self.fill_buf()?;
            let n = available.len().min(out.len());
            out[..n].copy_from_slice(&available[..n]);
            n
        };
        self.consume(n);
        Ok(n)
    }
}

impl<R: BufRead> BufRead for CountingReader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        let buf = self.inner.fill_buf()?;
        scan(&mut self.newlines, &mut self.scanned, self.consumed, buf);
        Ok(buf)
    }

    fn consume(&mut self, amt: usize) {
        self.inner.consume(amt);
        self.consumed += amt as u64;
    }
}

#[cfg(feature = "async-tokio")]
impl<R: AsyncBufRead + Unpin> AsyncRead for CountingReader<R> {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, out: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let n = match Pin::new(&mut *this).poll_fill_buf(cx) {
            Poll::Ready(Ok(available)) => {
                let n = available.len().min(out.remaining());
                out.put_slice(&available[..n]);
                n
            }
            Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
            Poll::Pending => return Poll::Pending,
        };
        Pin::new(this).consume(n);
        Poll::Ready(Ok(()))
    }
}

#[cfg(feature = "async-tokio")]
impl<R: AsyncBufRead + Unpin> AsyncBufRead for CountingReader<R> {
    fn poll_fill_buf(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<&[u8]>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_fill_buf(cx) {
            Poll::Ready(Ok(buf)) => {
                scan(&mut this.newlines, &mut this.scanned, this.consumed, buf);
                Poll::Ready(Ok(buf))
            }
            other => other,
        }
    }

    fn consume(self: Pin<&mut Self>, amt: usize) {
        let this = self.get_mut();
        Pin::new(&mut this.inner).consume(amt);
        this.consumed += amt as u64;
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

fn namespace_of(result: ResolveResult) -> Result<String> {
    match result {
        ResolveResult::Bound(Namespace(ns)) => Ok(String::from_utf8_lossy(ns).into_owned()),
        ResolveResult::Unbound => Ok(String::new()),
        ResolveResult::Unknown(prefix) => Err(Error::UnboundPrefix(String::from_utf8_lossy(&prefix).into_owned())),
    }
}

/// Translates tokenizer events into visitor calls
#[derive(Default)]
struct Connector {
    /// Open elements with the prefixes they declare
    open: Vec<(TagName, Vec<String>)>,
}

impl Connector {
    /// Returns `false` once the end of input was reached
    fn handle<R>(
        &mut self,
        reader: &NsReader<R>,
        namespace: String,
        event: Event,
        visitor: &mut dyn XmlVisitor,
    ) -> Result<bool> {
        match event {
            Event::Start(e) => {
                let (tag, bindings) = start_tag(reader, namespace, &e)?;
                for (prefix, uri) in &bindings {
                    visitor.start_prefix_mapping(prefix, uri)?;
                }
                visitor.start_element(&tag)?;
                let prefixes = bindings.into_iter().map(|(prefix, _)| prefix).collect();
                self.open.push((tag.without_attributes(), prefixes));
            }
            Event::End(_) => {
                if let Some((tag, prefixes)) = self.open.pop() {
                    visitor.end_element(&tag)?;
                    for prefix in prefixes.iter().rev() {
                        visitor.end_prefix_mapping(prefix)?;
                    }
                }
            }
            Event::Text(text) => visitor.text(&text.unescape()?)?,
            Event::CData(cdata) => visitor.text(&cdata.decode().map_err(quick_xml::Error::from)?)?,
            Event::Eof => return Ok(false),
            _ => {}
        }
        Ok(true)
    }
}

fn start_tag<R>(reader: &NsReader<R>, namespace: String, e: &BytesStart) -> Result<(TagName, Vec<(String, String)>)> {
    let decoder = reader.decoder();
    let decode = |bytes: &[u8]| -> Result<String> {
        Ok(decoder
            .decode(bytes)
            .map_err(quick_xml::Error::from)?
            .into_owned())
    };
    let raw = decode(e.name().as_ref())?;
    let local = decode(e.local_name().as_ref())?;

    let mut attributes = Vec::new();
    let mut bindings = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let value = attr.decode_and_unescape_value(decoder)?.into_owned();
        if let Some(binding) = attr.key.as_namespace_binding() {
            let prefix = match binding {
                PrefixDeclaration::Default => String::new(),
                PrefixDeclaration::Named(prefix) => decode(prefix)?,
            };
            bindings.push((prefix, value));
            continue;
        }
        let (resolved, local_name) = reader.resolve_attribute(attr.key);
        let mut name = QName::new(namespace_of(resolved)?, decode(local_name.as_ref())?);
        if let Some(prefix) = attr.key.prefix() {
            name = name.with_prefix(decode(prefix.as_ref())?);
        }
        attributes.push(Attribute { name, value });
    }
    let tag = TagName {
        namespace,
        local,
        raw,
        attributes,
    };
    Ok((tag, bindings))
}

/// Reads a whole document from `source` into `visitor`
pub(crate) fn read_document<R: BufRead>(source: R, visitor: &mut dyn XmlVisitor) -> Result<()> {
    let mut reader = NsReader::from_reader(CountingReader::new(source));
    reader.config_mut().expand_empty_elements = true;
    let mut connector = Connector::default();
    let mut buf = Vec::new();

    visitor.start_document()?;
    loop {
        buf.clear();
        let (resolved, event) = reader.read_resolved_event_into(&mut buf)?;
        let namespace = namespace_of(resolved)?;
        let position = reader.buffer_position() as u64;
        visitor.set_location(reader.get_ref().location(position));
        if !connector.handle(&reader, namespace, event, visitor)? {
            break;
        }
    }
    visitor.end_document()
}

/// Asynchronous version of [`read_document`]
#[cfg(feature = "async-tokio")]
pub(crate) async fn read_document_async<R>(source: R, visitor: &mut dyn XmlVisitor) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut reader = NsReader::from_reader(CountingReader::new(source));
    reader.config_mut().expand_empty_elements = true;
    let mut connector = Connector::default();
    let mut buf = Vec::new();

    visitor.start_document()?;
    loop {
        buf.clear();
        let (resolved, event) = reader.read_resolved_event_into_async(&mut buf).await?;
        let namespace = namespace_of(resolved)?;
        let position = reader.buffer_position() as u64;
        visitor.set_location(reader.get_ref().location(position));
        if !connector.handle(&reader, namespace, event, visitor)? {
            break;
        }
    }
    visitor.end_document()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Records visitor calls as strings
    #[derive(Default)]
    struct Trace(Vec<String>);

    impl XmlVisitor for Trace {
        fn start_document(&mut self) -> Result<()> {
            self.0.push("start".into());
            Ok(())
        }
        fn end_document(&mut self) -> Result<()> {
            self.0.push("end".into());
            Ok(())
        }
        fn start_prefix_mapping(&mut self, prefix: &str, uri: &str) -> Result<()> {
            self.0.push(format!("xmlns:{}={}", prefix, uri));
            Ok(())
        }
        fn end_prefix_mapping(&mut self, prefix: &str) -> Result<()> {
            self.0.push(format!("-xmlns:{}", prefix));
            Ok(())
        }
        fn start_element(&mut self, tag: &TagName) -> Result<()> {
            let attributes: Vec<String> = tag
                .attributes
                .iter()
                .map(|a| format!(" {}={}", a.name, a.value))
                .collect();
            self.0.push(format!("<{{{}}}{}{}>", tag.namespace, tag.local, attributes.concat()));
            Ok(())
        }
        fn end_element(&mut self, tag: &TagName) -> Result<()> {
            self.0.push(format!("</{}>", tag.raw));
            Ok(())
        }
        fn text(&mut self, text: &str) -> Result<()> {
            self.0.push(format!("'{}'", text));
            Ok(())
        }
    }

    #[test]
    fn events_with_prefix_mappings() {
        let mut trace = Trace::default();
        let xml = r#"<a:root xmlns:a="urn:a" a:x="1"><b/>t&amp;<![CDATA[<c>]]></a:root>"#;
        read_document(xml.as_bytes(), &mut trace).unwrap();
        assert_eq!(
            trace.0,
            vec![
                "start",
                "xmlns:a=urn:a",
                "<{urn:a}root {urn:a}x=1>",
                "<{}b>",
                "</b>",
                "'t&'",
                "'<c>'",
                "</a:root>",
                "-xmlns:a",
                "end",
            ]
        );
    }

    #[test]
    fn unbound_prefix() {
        let mut trace = Trace::default();
        match read_document(r#"<p:root/>"#.as_bytes(), &mut trace) {
            Err(Error::UnboundPrefix(prefix)) => assert_eq!(prefix, "p"),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn locations() {
        let mut reader = CountingReader::new("ab\ncd\n\nef".as_bytes());
        let mut text = String::new();
        reader.read_to_string(&mut text).unwrap();
        assert_eq!(reader.location(0), Location { line: 1, column: 1, offset: 0 });
        assert_eq!(reader.location(4), Location { line: 2, column: 2, offset: 4 });
        assert_eq!(reader.location(7), Location { line: 4, column: 1, offset: 7 });
        assert_eq!(reader.location(8), Location { line: 4, column: 2, offset: 8 });
    }
}
