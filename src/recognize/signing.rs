//! ACRCloud request signing (signature version 1).

use crate::recognize::Credentials;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::time::{SystemTime, UNIX_EPOCH};

type HmacSha1 = Hmac<Sha1>;

pub const HTTP_METHOD: &str = "POST";
pub const HTTP_URI: &str = "/v1/identify";
pub const DATA_TYPE: &str = "audio";
pub const SIGNATURE_VERSION: &str = "1";

/// The string that gets signed, fields joined by `\n` in fixed order.
pub fn canonical_string(
    method: &str,
    uri: &str,
    access_key: &str,
    data_type: &str,
    signature_version: &str,
    timestamp: &str,
) -> String {
    [method, uri, access_key, data_type, signature_version, timestamp].join("\n")
}

/// base64(HMAC-SHA1(secret, message)).
pub fn sign(access_secret: &str, message: &str) -> String {
    let mut mac = HmacSha1::new_from_slice(access_secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(message.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}

/// Current UNIX time in seconds with sub-second precision, as sent on the wire.
pub fn current_timestamp() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default();
    format!("{secs}")
}

/// Everything needed for one signed identify call.
///
/// The timestamp string is captured once and used verbatim both in the signed
/// string and in the form body; a request is never reused for another sample.
#[derive(Debug, Clone)]
pub struct IdentifyRequest {
    pub method: &'static str,
    pub uri: &'static str,
    pub access_key: String,
    pub data_type: &'static str,
    pub signature_version: &'static str,
    pub timestamp: String,
    pub signature: String,
    pub sample_bytes: usize,
}

impl IdentifyRequest {
    /// Build and sign a request stamped with the current time.
    pub fn new(credentials: &Credentials, sample_bytes: usize) -> Self {
        Self::with_timestamp(credentials, sample_bytes, current_timestamp())
    }

    /// Build and sign a request with an explicit timestamp string.
    pub fn with_timestamp(credentials: &Credentials, sample_bytes: usize, timestamp: String) -> Self {
        let string_to_sign = canonical_string(
            HTTP_METHOD,
            HTTP_URI,
            &credentials.access_key,
            DATA_TYPE,
            SIGNATURE_VERSION,
            &timestamp,
        );
        let signature = sign(&credentials.access_secret, &string_to_sign);

        Self {
            method: HTTP_METHOD,
            uri: HTTP_URI,
            access_key: credentials.access_key.clone(),
            data_type: DATA_TYPE,
            signature_version: SIGNATURE_VERSION,
            timestamp,
            signature,
            sample_bytes,
        }
    }

    /// Text fields of the multipart body, in the order the service documents.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("access_key", self.access_key.clone()),
            ("sample_bytes", self.sample_bytes.to_string()),
            ("timestamp", self.timestamp.clone()),
            ("signature", self.signature.clone()),
            ("data_type", self.data_type.to_string()),
            ("signature_version", self.signature_version.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials::new(
            "abc123".to_string(),
            "s3cr3t".to_string(),
            "identify-eu-west-1.acrcloud.com".to_string(),
        )
    }

    #[test]
    fn test_canonical_string_layout() {
        let s = canonical_string("POST", "/v1/identify", "abc123", "audio", "1", "1700000000.5");
        assert_eq!(s, "POST\n/v1/identify\nabc123\naudio\n1\n1700000000.5");
    }

    #[test]
    fn test_sign_known_vector() {
        // RFC 2202 test case 2.
        assert_eq!(
            sign("Jefe", "what do ya want for nothing?"),
            "7/zfauXrL6LSdBbV8YTfnCWafHk="
        );
    }

    #[test]
    fn test_sign_is_deterministic() {
        let message = canonical_string("POST", "/v1/identify", "abc123", "audio", "1", "1700000000.25");
        assert_eq!(sign("s3cr3t", &message), sign("s3cr3t", &message));
    }

    #[test]
    fn test_signature_changes_with_each_field() {
        let base = ["POST", "/v1/identify", "abc123", "audio", "1", "1700000000.25"];
        let reference = sign("s3cr3t", &base.join("\n"));

        for i in 0..base.len() {
            let mut fields: [&str; 6] = base;
            let altered = format!("{}x", fields[i]);
            fields[i] = &altered;
            assert_ne!(sign("s3cr3t", &fields.join("\n")), reference, "field {i}");
        }
        assert_ne!(sign("s3cr3t!", &base.join("\n")), reference);
    }

    #[test]
    fn test_request_reuses_timestamp_verbatim() {
        let request = IdentifyRequest::with_timestamp(&creds(), 321_000, "1700000000.123456".to_string());

        let expected = sign(
            "s3cr3t",
            "POST\n/v1/identify\nabc123\naudio\n1\n1700000000.123456",
        );
        assert_eq!(request.signature, expected);

        let fields = request.form_fields();
        let get = |name: &str| {
            fields
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        assert_eq!(get("timestamp"), "1700000000.123456");
        assert_eq!(get("sample_bytes"), "321000");
        assert_eq!(get("data_type"), "audio");
        assert_eq!(get("signature_version"), "1");
        assert_eq!(get("access_key"), "abc123");
        assert_eq!(get("signature"), expected);
    }

    #[test]
    fn test_current_timestamp_is_fractional_seconds() {
        let ts = current_timestamp();
        let value: f64 = ts.parse().unwrap();
        assert!(value > 1_600_000_000.0);
    }
}
