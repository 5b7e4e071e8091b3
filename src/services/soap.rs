//! SOAP 1.1 codec for the WSAA `loginCms` operation.
//!
//! The request envelope carries the Base64 CMS as `in0`. The reply either
//! wraps the TA document (escaped) in `loginCmsReturn`, or carries a SOAP
//! `Fault` with AFIP's code and message.

use crate::domain::constants::{SOAP_ENVELOPE_NAMESPACE, WSAA_NAMESPACE};
use crate::infra::error::{WsaaError, WsaaResult};
use crate::services::xml::{element_names, walk_text, write_event};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

/// Build the `loginCms` request envelope.
pub fn login_cms_envelope(cms_base64: &str) -> WsaaResult<String> {
    let mut writer = Writer::new(Vec::new());

    write_event(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
    )?;
    write_event(
        &mut writer,
        Event::Start(BytesStart::new("soapenv:Envelope").with_attributes([
            ("xmlns:soapenv", SOAP_ENVELOPE_NAMESPACE),
            ("xmlns:wsaa", WSAA_NAMESPACE),
        ])),
    )?;
    write_event(&mut writer, Event::Empty(BytesStart::new("soapenv:Header")))?;
    write_event(&mut writer, Event::Start(BytesStart::new("soapenv:Body")))?;
    write_event(&mut writer, Event::Start(BytesStart::new("wsaa:loginCms")))?;
    write_event(&mut writer, Event::Start(BytesStart::new("wsaa:in0")))?;
    write_event(&mut writer, Event::Text(BytesText::new(cms_base64)))?;
    write_event(&mut writer, Event::End(BytesEnd::new("wsaa:in0")))?;
    write_event(&mut writer, Event::End(BytesEnd::new("wsaa:loginCms")))?;
    write_event(&mut writer, Event::End(BytesEnd::new("soapenv:Body")))?;
    write_event(&mut writer, Event::End(BytesEnd::new("soapenv:Envelope")))?;

    String::from_utf8(writer.into_inner())
        .map_err(|e| WsaaError::InvalidInput(format!("SOAP envelope is not UTF-8: {e}")))
}

/// Decode a `loginCms` reply into the raw TA XML.
///
/// A SOAP fault becomes [`WsaaError::ProtocolFault`] with code and message
/// preserved verbatim.
pub fn parse_login_cms_response(body: &str) -> WsaaResult<String> {
    let mut ticket: Option<String> = None;
    let mut fault_code: Option<String> = None;
    let mut fault_string: Option<String> = None;

    walk_text(body, |path, text| {
        let in_fault = path.iter().any(|p| p == "Fault");
        let slot = match path.last().map(String::as_str) {
            Some("loginCmsReturn") => &mut ticket,
            Some("faultcode" | "Code" | "Value") if in_fault => &mut fault_code,
            Some("faultstring" | "Text") if in_fault => &mut fault_string,
            _ => return,
        };
        slot.get_or_insert_with(String::new).push_str(text);
    })?;

    let has_fault = element_names(body)?.iter().any(|name| name == "Fault");
    if has_fault {
        let code = fault_code.unwrap_or_else(|| "unknown".to_string());
        let message = fault_string.unwrap_or_default();
        log::warn!("WSAA returned fault {code}: {message}");
        return Err(WsaaError::ProtocolFault { code, message });
    }

    ticket.filter(|t| !t.is_empty()).ok_or_else(|| {
        WsaaError::MalformedResponse("loginCms reply carries neither a ticket nor a fault".into())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_wraps_cms_in_in0() {
        let envelope = login_cms_envelope("TUlJQ01T").unwrap();
        assert!(envelope.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(envelope.contains(r#"xmlns:wsaa="http://wsaa.view.sua.dvadac.desein.afip.gov""#));

        let mut in0 = Vec::new();
        walk_text(&envelope, |path, text| {
            in0.push((path.join("/"), text.to_string()));
        })
        .unwrap();
        assert_eq!(
            in0,
            vec![("Envelope/Body/loginCms/in0".to_string(), "TUlJQ01T".to_string())]
        );
    }

    #[test]
    fn unwraps_escaped_ticket() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/">
  <soapenv:Body>
    <loginCmsResponse xmlns="http://wsaa.view.sua.dvadac.desein.afip.gov">
      <loginCmsReturn>&lt;?xml version="1.0" encoding="UTF-8"?&gt;
&lt;loginTicketResponse version="1.0"&gt;&lt;credentials&gt;&lt;token&gt;AAA&lt;/token&gt;&lt;/credentials&gt;&lt;/loginTicketResponse&gt;</loginCmsReturn>
    </loginCmsResponse>
  </soapenv:Body>
</soapenv:Envelope>"#;
        let ticket = parse_login_cms_response(body).unwrap();
        assert!(ticket.starts_with("<?xml"));
        assert!(ticket.contains("<token>AAA</token>"));
    }

    #[test]
    fn fault_preserves_code_and_message() {
        let body = r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/">
  <soapenv:Body>
    <soapenv:Fault>
      <faultcode xmlns:ns1="http://xml.apache.org/axis/">ns1:CoeEnc</faultcode>
      <faultstring>CUIT no pertenece a la jurisdicción</faultstring>
      <detail><ns2:hostname xmlns:ns2="http://xml.apache.org/axis/">wsaaext</ns2:hostname></detail>
    </soapenv:Fault>
  </soapenv:Body>
</soapenv:Envelope>"#;
        match parse_login_cms_response(body) {
            Err(WsaaError::ProtocolFault { code, message }) => {
                assert_eq!(code, "ns1:CoeEnc");
                assert_eq!(message, "CUIT no pertenece a la jurisdicción");
            }
            other => panic!("Expected ProtocolFault, got: {other:?}"),
        }
    }

    #[test]
    fn unrelated_reply_is_malformed() {
        let body = "<Envelope><Body><somethingElse>1</somethingElse></Body></Envelope>";
        assert!(matches!(
            parse_login_cms_response(body),
            Err(WsaaError::MalformedResponse(_))
        ));
        assert!(parse_login_cms_response("<html>502 Bad Gateway").is_err());
    }
}
