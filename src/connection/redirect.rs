//! Redirect interpretation
//!
//! IoT Hub answers a receive link on `messages/events/$management` with an
//! `amqp:link:redirect` error whose info map names the Event Hub namespace
//! host and an address such as
//! `amqps://ns.servicebus.windows.net:5671/myhub/$management`.

use regex::Regex;
use std::sync::OnceLock;

use super::error::{TranslateError, TranslateResult};
use super::transport::LinkFailure;

fn address_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)5671/(.*)/\$management").expect("redirect address pattern is valid")
    })
}

/// Target disclosed by a redirect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectInfo {
    pub hostname: String,
    pub entity_path: String,
}

impl RedirectInfo {
    /// Interpret the failure the management link reported.
    ///
    /// Anything other than a redirect is passed through as a protocol error.
    pub fn from_link_failure(failure: &LinkFailure) -> TranslateResult<Self> {
        if !failure.is_redirect() {
            return Err(TranslateError::Protocol(failure.to_string()));
        }

        let hostname = match failure.info.get("hostname") {
            Some(h) if !h.is_empty() => h.clone(),
            _ => return Err(TranslateError::RedirectMissingHostname),
        };

        let address = failure.info.get("address").cloned().unwrap_or_default();
        match parse_entity_path(&address) {
            Some(entity_path) => Ok(Self {
                hostname,
                entity_path,
            }),
            None => Err(TranslateError::RedirectAddressParse {
                context: format!(
                    "redirect error {}; info {:?}",
                    failure.description.as_deref().unwrap_or("<no description>"),
                    failure.info
                ),
                address,
            }),
        }
    }
}

/// Entity path between the AMQPS port and `/$management`
pub fn parse_entity_path(address: &str) -> Option<String> {
    address_pattern()
        .captures(address)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|path| !path.is_empty())
        .map(str::to_string)
}
