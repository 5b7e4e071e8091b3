//! Minimal structural XML helpers on top of `quick-xml`.
//!
//! WSAA documents are small, so lookups walk the event stream while tracking
//! the element path (local names, namespace prefixes stripped).

use crate::infra::error::{WsaaError, WsaaResult};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use quick_xml::Writer;

/// Visit every text node together with the local-name path of its enclosing elements.
///
/// The callback receives the path from the document root (root included) and the
/// unescaped, trimmed text. CDATA sections are reported like text.
pub fn walk_text<F>(xml: &str, mut visit: F) -> WsaaResult<()>
where
    F: FnMut(&[String], &str),
{
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut saw_root = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| WsaaError::MalformedResponse(format!("XML parse error: {e}")))?;
        match event {
            Event::Start(start) => {
                saw_root = true;
                path.push(local_name(&start));
            }
            Event::Empty(_) => saw_root = true,
            Event::End(_) => {
                if path.pop().is_none() {
                    return Err(WsaaError::MalformedResponse(
                        "XML parse error: unbalanced end tag".to_string(),
                    ));
                }
            }
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|e| WsaaError::MalformedResponse(format!("XML parse error: {e}")))?;
                if !path.is_empty() {
                    visit(&path, text.trim());
                }
            }
            Event::CData(cdata) => {
                let text = String::from_utf8_lossy(&cdata.into_inner()).into_owned();
                if !path.is_empty() {
                    visit(&path, text.trim());
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(WsaaError::MalformedResponse(
            "XML document has no root element".to_string(),
        ));
    }
    if !path.is_empty() {
        return Err(WsaaError::MalformedResponse(format!(
            "XML document ended inside <{}>",
            path.join("/")
        )));
    }

    Ok(())
}

/// Collect every element local name appearing in the document (start or empty tags).
pub fn element_names(xml: &str) -> WsaaResult<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut names = Vec::new();
    loop {
        match reader
            .read_event()
            .map_err(|e| WsaaError::MalformedResponse(format!("XML parse error: {e}")))?
        {
            Event::Start(start) | Event::Empty(start) => names.push(local_name(&start)),
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(names)
}

fn local_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.local_name().as_ref()).into_owned()
}

/// Write one event, folding the writer's error type into ours.
pub(crate) fn write_event<'a>(
    writer: &mut Writer<Vec<u8>>,
    event: Event<'a>,
) -> WsaaResult<()> {
    writer
        .write_event(event)
        .map_err(|e| WsaaError::InvalidInput(format!("Failed to write XML: {e}")))
}
