//! Connection Strings
//!
//! Parsing for IoT Hub connection strings and rendering/parsing for the
//! Event Hub-compatible connection strings produced by the translator.

use std::fmt;
use std::str::FromStr;

use super::error::{TranslateError, TranslateResult};

/// Fields of an IoT Hub connection string
///
/// Format: `HostName=<host>;SharedAccessKeyName=<name>;SharedAccessKey=<base64key>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IotHubConnectionString {
    /// Fully qualified hub host, e.g. `myhub.azure-devices.net`
    pub host_name: String,
    /// Shared access policy name
    pub shared_access_key_name: String,
    /// Base64 shared access key
    pub shared_access_key: String,
}

impl IotHubConnectionString {
    /// Parse a semicolon-delimited `key=value` connection string.
    ///
    /// Every part is split on its first `=`, so base64 padding in the key is
    /// kept intact. Unknown keys are ignored.
    pub fn parse(input: &str) -> TranslateResult<Self> {
        let mut host_name = None;
        let mut key_name = None;
        let mut key = None;

        for (name, value) in split_pairs(input) {
            match name {
                "HostName" => host_name = Some(value),
                "SharedAccessKeyName" => key_name = Some(value),
                "SharedAccessKey" => key = Some(value),
                _ => {}
            }
        }

        Ok(Self {
            host_name: require(host_name, "HostName")?,
            shared_access_key_name: require(key_name, "SharedAccessKeyName")?,
            shared_access_key: require(key, "SharedAccessKey")?,
        })
    }

    /// Short hub name: the first DNS label of the host name
    pub fn hub_name(&self) -> TranslateResult<&str> {
        match self.host_name.split('.').next() {
            Some(label) if !label.is_empty() => Ok(label),
            _ => Err(TranslateError::NameExtraction(self.host_name.clone())),
        }
    }

    /// SASL user name the hub expects for policy-scoped tokens
    pub fn amqp_username(&self) -> TranslateResult<String> {
        Ok(format!(
            "{}@sas.root.{}",
            self.shared_access_key_name,
            self.hub_name()?
        ))
    }

    /// Resource URI the SAS token is scoped to
    pub fn events_resource_uri(&self) -> String {
        format!("{}/messages/events", self.host_name)
    }

    /// Address of the management link that triggers the redirect
    pub fn management_address(&self) -> String {
        format!("amqps://{}/messages/events/$management", self.host_name)
    }
}

impl FromStr for IotHubConnectionString {
    type Err = TranslateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Event Hub-compatible connection string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventHubConnectionString {
    /// Namespace host, without scheme
    pub host_name: String,
    /// Event Hub name
    pub entity_path: String,
    pub shared_access_key_name: String,
    pub shared_access_key: String,
}

impl EventHubConnectionString {
    /// Endpoint URI, e.g. `sb://ns.servicebus.windows.net/`
    pub fn endpoint(&self) -> String {
        format!("sb://{}/", self.host_name)
    }
}

impl fmt::Display for EventHubConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Endpoint={};EntityPath={};SharedAccessKeyName={};SharedAccessKey={}",
            self.endpoint(),
            self.entity_path,
            self.shared_access_key_name,
            self.shared_access_key
        )
    }
}

impl FromStr for EventHubConnectionString {
    type Err = TranslateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut endpoint = None;
        let mut entity_path = None;
        let mut key_name = None;
        let mut key = None;

        for (name, value) in split_pairs(s) {
            match name {
                "Endpoint" => endpoint = Some(value),
                "EntityPath" => entity_path = Some(value),
                "SharedAccessKeyName" => key_name = Some(value),
                "SharedAccessKey" => key = Some(value),
                _ => {}
            }
        }

        let endpoint = require(endpoint, "Endpoint")?;
        let host_name = endpoint
            .strip_prefix("sb://")
            .unwrap_or(&endpoint)
            .trim_end_matches('/')
            .to_string();
        if host_name.is_empty() {
            return Err(TranslateError::InvalidConnectionString(
                "Endpoint has no host".to_string(),
            ));
        }

        Ok(Self {
            host_name,
            entity_path: require(entity_path, "EntityPath")?,
            shared_access_key_name: require(key_name, "SharedAccessKeyName")?,
            shared_access_key: require(key, "SharedAccessKey")?,
        })
    }
}

fn split_pairs(input: &str) -> impl Iterator<Item = (&str, String)> + '_ {
    input
        .split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .filter_map(|part| {
            part.split_once('=')
                .map(|(name, value)| (name.trim(), value.trim().to_string()))
        })
}

fn require(value: Option<String>, field: &str) -> TranslateResult<String> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(TranslateError::InvalidConnectionString(format!(
            "missing {}",
            field
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONN: &str = "HostName=myhub.azure-devices.net;SharedAccessKeyName=service;SharedAccessKey=c2VjcmV0a2V5MTIzNDU2Nzg5MA==";

    #[test]
    fn test_parse_recovers_fields() {
        let parsed = IotHubConnectionString::parse(CONN).unwrap();
        assert_eq!(parsed.host_name, "myhub.azure-devices.net");
        assert_eq!(parsed.shared_access_key_name, "service");
        assert_eq!(parsed.shared_access_key, "c2VjcmV0a2V5MTIzNDU2Nzg5MA==");
    }

    #[test]
    fn test_parse_ignores_order_and_unknown_keys() {
        let parsed: IotHubConnectionString =
            "SharedAccessKey=abc=;DeviceId=dev1; HostName=h.example.net ;SharedAccessKeyName=p;"
                .parse()
                .unwrap();
        assert_eq!(parsed.host_name, "h.example.net");
        assert_eq!(parsed.shared_access_key_name, "p");
        assert_eq!(parsed.shared_access_key, "abc=");
    }

    #[test]
    fn test_parse_missing_fields() {
        for input in [
            "SharedAccessKeyName=service;SharedAccessKey=abc",
            "HostName=myhub.azure-devices.net;SharedAccessKey=abc",
            "HostName=myhub.azure-devices.net;SharedAccessKeyName=service",
            "HostName=;SharedAccessKeyName=service;SharedAccessKey=abc",
            "",
        ] {
            let err = IotHubConnectionString::parse(input).unwrap_err();
            assert!(
                matches!(err, TranslateError::InvalidConnectionString(_)),
                "input {:?} gave {:?}",
                input,
                err
            );
        }
    }

    #[test]
    fn test_hub_name() {
        let parsed = IotHubConnectionString::parse(CONN).unwrap();
        assert_eq!(parsed.hub_name().unwrap(), "myhub");
        assert_eq!(
            parsed.amqp_username().unwrap(),
            "service@sas.root.myhub"
        );

        let bare = IotHubConnectionString {
            host_name: "localhub".to_string(),
            ..parsed.clone()
        };
        assert_eq!(bare.hub_name().unwrap(), "localhub");

        let dotted = IotHubConnectionString {
            host_name: ".azure-devices.net".to_string(),
            ..parsed
        };
        assert!(matches!(
            dotted.hub_name(),
            Err(TranslateError::NameExtraction(_))
        ));
    }

    #[test]
    fn test_addresses() {
        let parsed = IotHubConnectionString::parse(CONN).unwrap();
        assert_eq!(
            parsed.events_resource_uri(),
            "myhub.azure-devices.net/messages/events"
        );
        assert_eq!(
            parsed.management_address(),
            "amqps://myhub.azure-devices.net/messages/events/$management"
        );
    }

    #[test]
    fn test_event_hub_display_and_parse() {
        let conn = EventHubConnectionString {
            host_name: "eh.example.com".to_string(),
            entity_path: "myhub".to_string(),
            shared_access_key_name: "service".to_string(),
            shared_access_key: "abc=".to_string(),
        };
        let rendered = conn.to_string();
        assert_eq!(
            rendered,
            "Endpoint=sb://eh.example.com/;EntityPath=myhub;SharedAccessKeyName=service;SharedAccessKey=abc="
        );

        let parsed: EventHubConnectionString = rendered.parse().unwrap();
        assert_eq!(parsed, conn);
    }

    #[test]
    fn test_event_hub_parse_requires_entity_path() {
        let result: Result<EventHubConnectionString, _> =
            "Endpoint=sb://eh.example.com/;SharedAccessKeyName=a;SharedAccessKey=b".parse();
        assert!(matches!(
            result,
            Err(TranslateError::InvalidConnectionString(_))
        ));
    }
}
