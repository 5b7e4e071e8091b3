//! Service layer module root.
//! Stateless operations over WSAA documents and the ticket cache.

pub mod soap;
pub mod ta_parser;
pub mod ticket_cache;
pub mod tra_builder;
pub mod xml;

pub use soap::{login_cms_envelope, parse_login_cms_response};
pub use ta_parser::parse_ticket_response;
pub use ticket_cache::TicketCache;
pub use tra_builder::TraBuilder;
