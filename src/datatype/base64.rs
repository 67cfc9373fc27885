//! Binary payloads that travel through the text channel.

use crate::datatype::lexical::is_xml_whitespace;
use crate::errors::ParseError;
use crate::utils::write_byte_string;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::borrow::Cow;
use std::fmt;

/// MIME type assumed when none is known
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Binary data standing in for text, printed as base64.
///
/// A `Base64Data` handed to a text callback (a transducer's `parse`, an
/// [`XmlVisitor::text`] call) borrows the payload for the duration of that
/// call only. A receiver that wants to keep it must call [`into_owned`].
///
/// [`XmlVisitor::text`]: crate::unmarshaller::XmlVisitor::text
/// [`into_owned`]: Self::into_owned
#[derive(Clone, PartialEq, Eq)]
pub struct Base64Data<'a> {
    data: Cow<'a, [u8]>,
    mime_type: Option<Cow<'a, str>>,
}

impl<'a> Base64Data<'a> {
    /// Wraps borrowed bytes
    pub fn borrowed(data: &'a [u8], mime_type: Option<&'a str>) -> Self {
        Base64Data {
            data: Cow::Borrowed(data),
            mime_type: mime_type.map(Cow::Borrowed),
        }
    }

    /// Wraps owned bytes
    pub fn owned(data: Vec<u8>, mime_type: Option<String>) -> Base64Data<'static> {
        Base64Data {
            data: Cow::Owned(data),
            mime_type: mime_type.map(Cow::Owned),
        }
    }

    /// Decodes base64 text, ignoring whitespace
    pub fn decode(text: &str) -> Result<Base64Data<'static>, ParseError> {
        Ok(Base64Data::owned(decode_base64(text)?, None))
    }

    /// The raw bytes
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Declared MIME type, if any
    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    /// Declared MIME type or `application/octet-stream`
    pub fn content_type(&self) -> &str {
        self.mime_type().unwrap_or(DEFAULT_MIME_TYPE)
    }

    /// Length of the base64 text this payload prints to
    #[inline]
    pub fn encoded_len(&self) -> usize {
        (self.data.len() + 2) / 3 * 4
    }

    /// Base64 text with `=` padding
    pub fn encode(&self) -> String {
        STANDARD.encode(&self.data)
    }

    /// Copies the payload so it can outlive the callback that received it
    pub fn into_owned(self) -> Base64Data<'static> {
        Base64Data {
            data: Cow::Owned(self.data.into_owned()),
            mime_type: self.mime_type.map(|m| Cow::Owned(m.into_owned())),
        }
    }

    /// Takes the bytes, copying them if they were borrowed
    pub fn into_bytes(self) -> Vec<u8> {
        self.data.into_owned()
    }
}

impl<'a> fmt::Debug for Base64Data<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Base64Data({}, ", self.content_type())?;
        write_byte_string(f, &self.data)?;
        write!(f, ")")
    }
}

/// Decodes `xs:base64Binary`, ignoring XML whitespace
pub fn decode_base64(text: &str) -> Result<Vec<u8>, ParseError> {
    let decoded = if text.contains(is_xml_whitespace) {
        let compact: String = text.chars().filter(|c| !is_xml_whitespace(*c)).collect();
        STANDARD.decode(compact)
    } else {
        STANDARD.decode(text)
    };
    decoded.map_err(|e| ParseError::new(format!("invalid base64 data: {}", e)))
}
