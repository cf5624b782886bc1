//! Pull-parser wrapper and small helpers for the SpreadsheetML parts of an xlsx package.

use crate::error::RustySeekError;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::BytesRef;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::borrow::Cow;
use std::io::BufRead;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum XmlError {
    #[error("Unknown XML entity '&{0};'")]
    ParseEntityError(String),
}

/// Event reader that owns its scratch buffer.
/// Empty elements are expanded into start/end pairs so callers only match `Start` and `End`.
pub(crate) struct XmlReader<R: BufRead> {
    reader: Reader<R>,
    buffer: Vec<u8>,
}

impl<R: BufRead> XmlReader<R> {
    pub(crate) fn new(buf_reader: R) -> XmlReader<R> {
        let mut reader = Reader::from_reader(buf_reader);
        let config = reader.config_mut();
        config.check_comments = false;
        config.check_end_names = false;
        config.expand_empty_elements = true;
        config.trim_text(false);

        XmlReader {
            reader,
            buffer: Vec::with_capacity(1024),
        }
    }

    /// Returns the next event, or `None` once the document ends.
    pub(crate) fn next(&'_ mut self) -> Result<Option<Event<'_>>, RustySeekError> {
        self.buffer.clear();
        match self.reader.read_event_into(&mut self.buffer)? {
            Event::Eof => Ok(None),
            event => Ok(Some(event)),
        }
    }
}

pub(crate) trait XmlAttributeHelper<'a> {
    fn get_value(&self) -> Result<Cow<'a, str>, RustySeekError>;
}

impl<'a> XmlAttributeHelper<'a> for Attribute<'a> {
    fn get_value(&self) -> Result<Cow<'a, str>, RustySeekError> {
        Ok(self.unescape_value()?)
    }
}

pub(crate) trait XmlNodeHelper<'a> {
    /// Unescaped value of the attribute with the given qualified name.
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, RustySeekError>;
}

impl<'a> XmlNodeHelper<'a> for BytesStart<'a> {
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, RustySeekError> {
        self.try_get_attribute(name)?
            .map(|attribute| attribute.get_value())
            .transpose()
    }
}

pub(crate) trait XmlTextContextHelper {
    /// Appends the character a general reference (`&amp;`, `&#233;`, `&#xE9;`) stands for.
    fn push_bytes_ref(&mut self, bytes: &BytesRef) -> Result<(), RustySeekError>;
}

impl XmlTextContextHelper for String {
    fn push_bytes_ref(&mut self, bytes: &BytesRef) -> Result<(), RustySeekError> {
        let raw = bytes.xml_content()?;
        if let Some(number) = raw.strip_prefix('#') {
            let code = match number.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16)?,
                None => number.parse::<u32>()?,
            };
            if let Some(character) = char::from_u32(code) {
                self.push(character);
            }
        } else if let Some(entity) = resolve_xml_entity(&raw) {
            self.push_str(entity);
        } else {
            Err(XmlError::ParseEntityError(raw.into_owned()))?;
        }
        Ok(())
    }
}

/// Drives an [`XmlReader`] to the end of the document, dispatching each event to the given arms.
#[macro_export]
macro_rules! xml_events {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(event) = $reader.next()? {
            match event {
                $($arms)*
                _ => (),
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use quick_xml::name::QName;

    #[test]
    fn expands_empty_elements_and_resolves_references() -> Result<(), RustySeekError> {
        let xml = r#"<root><c r="A1" t="s"/><t>caf&#233; &amp; b&#x61;r</t></root>"#;
        let mut reader = XmlReader::new(xml.as_bytes());
        let mut references = Vec::new();
        let mut closed = 0;
        let mut text = String::new();
        xml_events!(reader => {
            Event::Start(event) if event.name() == QName(b"c") => {
                references.push(event.get_attribute_value("r")?.map(|value| value.into_owned()));
            }
            Event::End(event) if event.name() == QName(b"c") => closed += 1,
            Event::Text(event) => text.push_str(&event.xml_content()?),
            Event::GeneralRef(event) => text.push_bytes_ref(&event)?,
        });

        assert_eq!(references, vec![Some("A1".to_owned())]);
        assert_eq!(closed, 1);
        assert_eq!(text, "café & bar");
        Ok(())
    }

    #[test]
    fn unknown_entity_is_an_error() {
        let mut reader = XmlReader::new("<t>&bogus;</t>".as_bytes());
        let mut text = String::new();
        let result: Result<(), RustySeekError> = (|| {
            xml_events!(reader => {
                Event::GeneralRef(event) => text.push_bytes_ref(&event)?,
            });
            Ok(())
        })();
        assert!(matches!(result, Err(RustySeekError::XmlHelperError(XmlError::ParseEntityError(_)))));
    }
}
