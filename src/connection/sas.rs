//! Shared Access Signature tokens
//!
//! Generates the short-lived HMAC-SHA256 tokens used as the SASL password
//! when talking to the IoT Hub AMQP endpoint.

use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

use super::error::{TranslateError, TranslateResult};

type HmacSha256 = Hmac<Sha256>;

/// A signed SAS token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SasToken {
    /// URI-encoded resource the token grants access to
    pub resource_uri: String,
    /// Expiry as Unix seconds
    pub expiry: i64,
    /// Base64 signature, URI-encoded
    pub signature: String,
    /// Shared access policy name
    pub policy_name: String,
}

impl SasToken {
    /// Generate a token that expires `ttl_minutes` from now.
    ///
    /// The expiry rounds the current time up to the next whole second.
    pub fn generate(
        resource_uri: &str,
        signing_key: &str,
        policy_name: &str,
        ttl_minutes: u64,
    ) -> TranslateResult<Self> {
        let expiry = expiry_after(Utc::now().timestamp_millis(), ttl_minutes);
        Self::generate_at(resource_uri, signing_key, policy_name, expiry)
    }

    /// Generate a token with a fixed expiry
    pub fn generate_at(
        resource_uri: &str,
        signing_key: &str,
        policy_name: &str,
        expiry: i64,
    ) -> TranslateResult<Self> {
        let encoded_uri = urlencoding::encode(resource_uri).into_owned();
        let string_to_sign = format!("{}\n{}", encoded_uri, expiry);

        let key_bytes = general_purpose::STANDARD.decode(signing_key).map_err(|e| {
            TranslateError::InvalidConnectionString(format!(
                "SharedAccessKey is not valid base64: {}",
                e
            ))
        })?;

        let mut mac = HmacSha256::new_from_slice(&key_bytes).map_err(|e| {
            TranslateError::InvalidConnectionString(format!("Failed to create HMAC: {}", e))
        })?;
        mac.update(string_to_sign.as_bytes());
        let signature = general_purpose::STANDARD.encode(mac.finalize().into_bytes());

        Ok(Self {
            resource_uri: encoded_uri,
            expiry,
            signature: urlencoding::encode(&signature).into_owned(),
            policy_name: policy_name.to_string(),
        })
    }
}

impl fmt::Display for SasToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SharedAccessSignature sr={}&sig={}&se={}&skn={}",
            self.resource_uri, self.signature, self.expiry, self.policy_name
        )
    }
}

/// ceil(now_ms / 1000) + ttl in seconds
fn expiry_after(now_millis: i64, ttl_minutes: u64) -> i64 {
    let now_secs = (now_millis + 999).div_euclid(1000);
    now_secs + (ttl_minutes as i64) * 60
}
