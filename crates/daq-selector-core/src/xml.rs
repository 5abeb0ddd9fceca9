//! Small quick-xml helpers shared by the registry bodies and synthesized fragments.

use crate::error::Result;
use quick_xml::events::{BytesDecl, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::io::Cursor;

/// Root element of every configuration document.
pub const DEFINITION_TAG: &str = "definition";

/// Look up an attribute by name, unescaping its value.
pub fn attribute(element: &BytesStart<'_>, key: &str) -> Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == key.as_bytes() {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Create an indenting writer over an in-memory buffer with the XML declaration written.
pub fn document_writer() -> Result<Writer<Cursor<Vec<u8>>>> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", None, None)))?;
    Ok(writer)
}

/// Finish a writer created by [`document_writer`] and return the document text.
pub fn finish(writer: Writer<Cursor<Vec<u8>>>) -> Result<String> {
    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).map_err(|err| crate::SelectorError::Xml(err.to_string()))
}

/// Copy the children of a `<definition>` document into `writer`.
///
/// The XML declaration and the `<definition>` root itself are dropped so that
/// a stored body can be embedded inside another element. A body without a
/// `<definition>` root is copied whole.
pub fn copy_definition_children<W: std::io::Write>(
    body: &str,
    writer: &mut Writer<W>,
) -> Result<()> {
    let mut reader = Reader::from_str(body);
    reader.trim_text(true);
    let mut depth = 0usize;
    let mut wrapped = false;
    loop {
        let event = reader.read_event()?;
        match event {
            Event::Eof => break,
            Event::Decl(_) | Event::PI(_) | Event::DocType(_) | Event::Comment(_) => {}
            Event::Start(ref e) if depth == 0 && e.name().as_ref() == DEFINITION_TAG.as_bytes() => {
                wrapped = true;
                depth += 1;
            }
            Event::Empty(ref e) if depth == 0 && e.name().as_ref() == DEFINITION_TAG.as_bytes() => {}
            Event::End(ref e)
                if wrapped && depth == 1 && e.name().as_ref() == DEFINITION_TAG.as_bytes() =>
            {
                depth -= 1;
            }
            Event::Start(_) => {
                depth += 1;
                writer.write_event(event)?;
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                writer.write_event(event)?;
            }
            other => writer.write_event(other)?,
        }
    }
    Ok(())
}
