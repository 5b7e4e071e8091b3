//! Shared fixtures for integration tests.

#![allow(dead_code)]

pub mod fakes;
pub mod test_env;

use chrono::{DateTime, FixedOffset, TimeDelta, TimeZone, Utc};
use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::{X509Builder, X509NameBuilder, X509};
use std::path::{Path, PathBuf};

/// Instant every deterministic test treats as "now".
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()
}

/// Argentina time, UTC-3 all year.
pub fn argentina() -> FixedOffset {
    FixedOffset::west_opt(3 * 3600).unwrap()
}

/// A TA as WSAA returns it, expiring `lifetime` after `issued_at`.
pub fn ta_xml(token: &str, sign: &str, issued_at: DateTime<Utc>, lifetime: TimeDelta) -> String {
    let generation = issued_at.with_timezone(&argentina());
    let expiration = generation + lifetime;
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<loginTicketResponse version="1.0">
    <header>
        <source>CN=wsaahomo, O=AFIP, C=AR, SERIALNUMBER=CUIT 33693450239</source>
        <destination>SERIALNUMBER=CUIT 20123456786, CN=afip-ws</destination>
        <uniqueId>3839173482</uniqueId>
        <generationTime>{}</generationTime>
        <expirationTime>{}</expirationTime>
    </header>
    <credentials>
        <token>{token}</token>
        <sign>{sign}</sign>
    </credentials>
</loginTicketResponse>"#,
        generation.to_rfc3339(),
        expiration.to_rfc3339()
    )
}

/// SOAP reply wrapping `ta` in `loginCmsReturn`.
pub fn login_cms_reply(ta: &str) -> String {
    let escaped = ta
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;");
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns:xsd="http://www.w3.org/2001/XMLSchema" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
 <soapenv:Body>
  <loginCmsResponse xmlns="http://wsaa.view.sua.dvadac.desein.afip.gov">
   <loginCmsReturn>{escaped}</loginCmsReturn>
  </loginCmsResponse>
 </soapenv:Body>
</soapenv:Envelope>"#
    )
}

/// SOAP fault as WSAA sends it (with HTTP 500).
pub fn soap_fault(code: &str, message: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/">
 <soapenv:Body>
  <soapenv:Fault>
   <faultcode xmlns:ns1="http://xml.apache.org/axis/">{code}</faultcode>
   <faultstring>{message}</faultstring>
   <detail>
    <ns2:hostname xmlns:ns2="http://xml.apache.org/axis/">wsaaext1.homo.afip.gov.ar</ns2:hostname>
   </detail>
  </soapenv:Fault>
 </soapenv:Body>
</soapenv:Envelope>"#
    )
}

/// Throwaway self-signed RSA certificate.
pub fn self_signed_certificate() -> (X509, PKey<Private>) {
    let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();

    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("CN", "afip-ws").unwrap();
    name.append_entry_by_text("serialNumber", "CUIT 20123456786")
        .unwrap();
    let name = name.build();

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(7).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(30).unwrap())
        .unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();
    (builder.build(), key)
}

/// Write a fresh certificate and key as PEM files into `dir`.
pub fn write_certificate_pair(dir: &Path) -> (PathBuf, PathBuf) {
    let (certificate, key) = self_signed_certificate();
    let cert_path = dir.join("testing.crt");
    let key_path = dir.join("private.key");
    std::fs::write(&cert_path, certificate.to_pem().unwrap()).unwrap();
    std::fs::write(&key_path, key.private_key_to_pem_pkcs8().unwrap()).unwrap();
    (cert_path, key_path)
}
