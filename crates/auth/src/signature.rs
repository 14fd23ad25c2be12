//! HMAC-SHA256 request signing shared by inbound verification and outbound
//! webhooks.
//!
//! Canonical string: `METHOD\nPATH\nTIMESTAMP\nBODY`, with the timestamp
//! exactly as sent in the header.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::CredentialError;

type HmacSha256 = Hmac<Sha256>;

pub fn canonical_string(method: &str, path: &str, timestamp: &str, body: &str) -> String {
    format!("{}\n{}\n{}\n{}", method.to_ascii_uppercase(), path, timestamp, body)
}

fn mac(secret: &[u8], canonical: &str) -> HmacSha256 {
    // HMAC accepts keys of any length, so this never fails.
    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => unreachable!("hmac key length is unrestricted"),
    };
    mac.update(canonical.as_bytes());
    mac
}

/// Lowercase hex signature of `canonical`.
pub fn sign(secret: &[u8], canonical: &str) -> String {
    hex::encode(mac(secret, canonical).finalize().into_bytes())
}

/// Constant-time comparison of a presented hex signature.
pub fn verify(secret: &[u8], canonical: &str, presented_hex: &str) -> Result<(), CredentialError> {
    let presented = hex::decode(presented_hex).map_err(|_| CredentialError::SignatureMismatch)?;
    let expected = mac(secret, canonical).finalize().into_bytes();
    if bool::from(expected.as_slice().ct_eq(&presented)) {
        Ok(())
    } else {
        Err(CredentialError::SignatureMismatch)
    }
}

/// Accepts RFC 3339 / ISO-8601 or integral Unix seconds.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, CredentialError> {
    let raw = raw.trim();
    if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
        let secs: i64 = raw
            .parse()
            .map_err(|_| CredentialError::InvalidTimestamp(raw.to_string()))?;
        return DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| CredentialError::InvalidTimestamp(raw.to_string()));
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| CredentialError::InvalidTimestamp(raw.to_string()))
}

/// `|now - timestamp| <= max_skew`, inclusive on both sides.
pub fn check_skew(
    timestamp: DateTime<Utc>,
    now: DateTime<Utc>,
    max_skew: Duration,
) -> Result<(), CredentialError> {
    let skew = if now >= timestamp {
        now - timestamp
    } else {
        timestamp - now
    };
    if skew > max_skew {
        return Err(CredentialError::ClockSkew {
            skew_seconds: skew.num_seconds(),
        });
    }
    Ok(())
}

/// The three federation headers for an outbound signed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub platform_id: String,
    pub timestamp: String,
    pub signature: String,
}

impl SignedHeaders {
    pub fn as_pairs(&self) -> [(&'static str, &str); 3] {
        [
            (crate::request::HEADER_PLATFORM_ID, self.platform_id.as_str()),
            (crate::request::HEADER_TIMESTAMP, self.timestamp.as_str()),
            (crate::request::HEADER_SIGNATURE, self.signature.as_str()),
        ]
    }
}

pub fn sign_request(
    platform_id: &str,
    secret: &[u8],
    method: &str,
    path: &str,
    body: &str,
    now: DateTime<Utc>,
) -> SignedHeaders {
    let timestamp = now.to_rfc3339_opts(SecondsFormat::Secs, true);
    let canonical = canonical_string(method, path, &timestamp, body);
    SignedHeaders {
        platform_id: platform_id.to_string(),
        signature: sign(secret, &canonical),
        timestamp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn known_vector() {
        // RFC 4231 test case 2.
        let canonical = "what do ya want for nothing?";
        assert_eq!(
            sign(b"Jefe", canonical),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn verify_rejects_tampered_body_and_bad_hex() {
        let canonical = canonical_string("post", "/federation/messages", "1700000000", "{}");
        let sig = sign(b"secret", &canonical);
        assert!(verify(b"secret", &canonical, &sig).is_ok());

        let tampered = canonical_string("POST", "/federation/messages", "1700000000", "{ }");
        assert_eq!(
            verify(b"secret", &tampered, &sig),
            Err(CredentialError::SignatureMismatch)
        );
        assert!(verify(b"secret", &canonical, "zz").is_err());
        assert!(verify(b"secret", &canonical, &sig[..10]).is_err());
    }

    #[test]
    fn timestamps_parse_in_both_formats() {
        let unix = parse_timestamp("1700000000").unwrap();
        let iso = parse_timestamp("2023-11-14T22:13:20Z").unwrap();
        assert_eq!(unix, iso);
        assert!(parse_timestamp("yesterday").is_err());
        assert!(parse_timestamp("").is_err());
    }

    #[test]
    fn skew_boundary_is_inclusive() {
        let now = Utc::now();
        let five = Duration::minutes(5);
        assert!(check_skew(now + Duration::seconds(299), now, five).is_ok());
        assert!(check_skew(now - Duration::seconds(300), now, five).is_ok());
        assert!(check_skew(now + Duration::seconds(301), now, five).is_err());
    }

    proptest! {
        #[test]
        fn skew_window_is_symmetric(offset in -900i64..900) {
            let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
            let ts = now + Duration::seconds(offset);
            let ok = check_skew(ts, now, Duration::seconds(300)).is_ok();
            prop_assert_eq!(ok, offset.abs() <= 300);
        }

        #[test]
        fn signed_requests_verify(body in ".{0,64}", path in "/[a-z/]{0,20}") {
            let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
            let headers = sign_request("partner-a", b"k", "POST", &path, &body, now);
            let canonical = canonical_string("POST", &path, &headers.timestamp, &body);
            prop_assert!(verify(b"k", &canonical, &headers.signature).is_ok());
        }
    }
}
