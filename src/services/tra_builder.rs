//! TRA builder service.
//!
//! Service for rendering a [`TicketRequest`] as the `loginTicketRequest` XML
//! document that gets wrapped in the CMS envelope.

use crate::domain::constants::TRA_VERSION;
use crate::domain::ticket::TicketRequest;
use crate::domain::time::to_afip_timestamp;
use crate::infra::error::WsaaResult;
use crate::services::xml::write_event;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

/// Service for building login ticket requests.
#[derive(Debug, Default, Clone, Copy)]
pub struct TraBuilder;

impl TraBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Render the TRA as pretty-printed UTF-8 XML with an XML declaration.
    ///
    /// Element order is fixed: `header` (`source`, `destination`, `uniqueId`,
    /// `generationTime`, `expirationTime`) followed by `service`.
    pub fn build(&self, request: &TicketRequest) -> WsaaResult<Vec<u8>> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

        write_event(
            &mut writer,
            Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
        )?;
        write_event(
            &mut writer,
            Event::Start(
                BytesStart::new("loginTicketRequest").with_attributes([("version", TRA_VERSION)]),
            ),
        )?;

        write_event(&mut writer, Event::Start(BytesStart::new("header")))?;
        if let Some(source) = &request.source {
            write_text_element(&mut writer, "source", source)?;
        }
        write_text_element(&mut writer, "destination", &request.destination)?;
        write_text_element(&mut writer, "uniqueId", &request.unique_id.to_string())?;
        write_text_element(
            &mut writer,
            "generationTime",
            &to_afip_timestamp(&request.generation_time),
        )?;
        write_text_element(
            &mut writer,
            "expirationTime",
            &to_afip_timestamp(&request.expiration_time),
        )?;
        write_event(&mut writer, Event::End(BytesEnd::new("header")))?;

        write_text_element(&mut writer, "service", request.service.as_str())?;
        write_event(&mut writer, Event::End(BytesEnd::new("loginTicketRequest")))?;

        let mut tra = writer.into_inner();
        tra.push(b'\n');

        log::debug!(
            "Built TRA for {} (uniqueId {}): {} bytes",
            request.service,
            request.unique_id,
            tra.len()
        );

        Ok(tra)
    }
}

fn write_text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> WsaaResult<()> {
    write_event(writer, Event::Start(BytesStart::new(name)))?;
    write_event(writer, Event::Text(BytesText::new(text)))?;
    write_event(writer, Event::End(BytesEnd::new(name)))
}
