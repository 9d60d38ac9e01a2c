use anyhow::{Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64URL;
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use sha2::Sha256;
use thiserror::Error;
use tracing::warn;

use jtrace_types::config::SignatureConfig;

type HmacSha256 = Hmac<Sha256>;

/// Route that serves signed files.
pub const FILE_ROUTE_PREFIX: &str = "/file/";

/// Bytes escaped in the path part of a signed URL. Unreserved characters
/// and `/` pass through untouched.
const PATH_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("URL has expired")]
    Expired,
    #[error("Signature verification failed")]
    BadSignature,
}

/// Signs and verifies `(path, expires)` pairs for time-limited file access.
///
/// The MAC input is the compact JSON object `{"expires":..,"path":..}` with
/// keys in sorted order; the tag is URL-safe base64 without padding.
#[derive(Clone)]
pub struct Signer {
    keyed: HmacSha256,
    enabled: bool,
    default_expires_minutes: i64,
}

impl Signer {
    pub fn new(config: &SignatureConfig) -> Result<Self> {
        let keyed = HmacSha256::new_from_slice(config.secret_key.as_bytes())
            .map_err(|e| anyhow!("Invalid signing key: {}", e))?;
        if !config.enabled {
            warn!("File URL signing is disabled, uploads are served unsigned");
        }
        Ok(Self {
            keyed,
            enabled: config.enabled,
            default_expires_minutes: config.expires_minutes,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn default_expires_minutes(&self) -> i64 {
        self.default_expires_minutes
    }

    /// Signature for `path` valid until `expires` (unix seconds).
    pub fn sign(&self, path: &str, expires: i64) -> String {
        B64URL.encode(self.mac(path, expires).finalize().into_bytes())
    }

    pub fn verify(&self, path: &str, signature: &str, expires: i64) -> Result<(), SignatureError> {
        self.verify_at(path, signature, expires, chrono::Utc::now().timestamp())
    }

    /// `now == expires` is still valid. Expiry is checked before the MAC.
    pub fn verify_at(
        &self,
        path: &str,
        signature: &str,
        expires: i64,
        now: i64,
    ) -> Result<(), SignatureError> {
        if !self.enabled {
            return Ok(());
        }
        if now > expires {
            return Err(SignatureError::Expired);
        }

        let provided = B64URL
            .decode(signature)
            .map_err(|_| SignatureError::BadSignature)?;

        // verify_slice compares in constant time
        self.mac(path, expires)
            .verify_slice(&provided)
            .map_err(|_| SignatureError::BadSignature)
    }

    /// Access URL for a stored relative path. With signing disabled this is
    /// the bare `/{path}`.
    pub fn signed_url(&self, path: &str, expires_minutes: Option<i64>) -> String {
        self.signed_url_at(path, expires_minutes, chrono::Utc::now().timestamp())
    }

    pub fn signed_url_at(&self, path: &str, expires_minutes: Option<i64>, now: i64) -> String {
        if !self.enabled {
            return format!("/{}", path.trim_start_matches('/'));
        }

        let minutes = expires_minutes.unwrap_or(self.default_expires_minutes);
        let expires = now + minutes * 60;
        let signature = self.sign(path, expires);

        format!(
            "{}{}?signature={}&expires={}",
            FILE_ROUTE_PREFIX,
            utf8_percent_encode(path, PATH_ESCAPE),
            signature,
            expires
        )
    }

    fn mac(&self, path: &str, expires: i64) -> HmacSha256 {
        let canonical = canonical_payload(path, expires);
        let mut mac = self.keyed.clone();
        mac.update(canonical.as_bytes());
        mac
    }
}

/// Compact sorted-key JSON, ASCII only: DEL and everything above it is
/// written as lowercase `\uXXXX` UTF-16 escapes.
fn canonical_payload(path: &str, expires: i64) -> String {
    let json = serde_json::json!({ "expires": expires, "path": path }).to_string();
    let mut out = String::with_capacity(json.len());
    let mut units = [0u16; 2];
    for c in json.chars() {
        if c < '\u{7f}' {
            out.push(c);
            continue;
        }
        for unit in c.encode_utf16(&mut units) {
            out.push_str(&format!("\\u{:04x}", unit));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATH: &str = "uploads/images/2024/09/22/user_42/a.jpg";

    fn signer(enabled: bool) -> Signer {
        Signer::new(&SignatureConfig {
            enabled,
            secret_key: "test-secret".into(),
            expires_minutes: 60,
        })
        .unwrap()
    }

    #[test]
    fn canonical_payload_vector() {
        // HMAC-SHA256("test-secret", {"expires":1700000000,"path":"uploads/..."})
        assert_eq!(
            signer(true).sign(PATH, 1_700_000_000),
            "c1dTJfQ5ER9dV0kaIoPnJFWsV8o02q0YIoHpcqFV8vo"
        );
    }

    #[test]
    fn non_ascii_paths_are_escaped_before_signing() {
        assert_eq!(
            canonical_payload("uploads/照片 1.jpg", 5),
            r#"{"expires":5,"path":"uploads/\u7167\u7247 1.jpg"}"#
        );
        assert_eq!(
            canonical_payload("a\u{7f}é😀\"", 5),
            r#"{"expires":5,"path":"a\u007f\u00e9\ud83d\ude00\""}"#
        );
        assert_eq!(
            canonical_payload(PATH, 1_700_000_000),
            format!(r#"{{"expires":1700000000,"path":"{}"}}"#, PATH)
        );

        let s = signer(true);
        let sig = s.sign("uploads/照片.jpg", 100);
        assert_eq!(s.verify_at("uploads/照片.jpg", &sig, 100, 0), Ok(()));
        assert_eq!(
            s.verify_at("uploads/照片.png", &sig, 100, 0),
            Err(SignatureError::BadSignature)
        );
    }

    #[test]
    fn verify_before_and_after_expiry() {
        let s = signer(true);
        let expires = 1_700_000_000;
        let sig = s.sign(PATH, expires);

        assert_eq!(s.verify_at(PATH, &sig, expires, expires - 1), Ok(()));
        assert_eq!(s.verify_at(PATH, &sig, expires, expires), Ok(()));
        assert_eq!(
            s.verify_at(PATH, &sig, expires, expires + 1),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn any_single_char_tamper_is_bad_signature() {
        let s = signer(true);
        let expires = 1_700_000_000;
        let sig = s.sign(PATH, expires);

        for (i, c) in sig.char_indices() {
            let replacement = if c == 'A' { 'B' } else { 'A' };
            let mut tampered = sig.clone();
            tampered.replace_range(i..i + 1, &replacement.to_string());
            assert_eq!(
                s.verify_at(PATH, &tampered, expires, expires - 10),
                Err(SignatureError::BadSignature),
                "position {}",
                i
            );
        }
    }

    #[test]
    fn signature_is_bound_to_path_and_expiry() {
        let s = signer(true);
        let sig = s.sign(PATH, 100);
        assert_eq!(
            s.verify_at("uploads/images/other.jpg", &sig, 100, 0),
            Err(SignatureError::BadSignature)
        );
        assert_eq!(s.verify_at(PATH, &sig, 101, 0), Err(SignatureError::BadSignature));
        assert_eq!(s.verify_at(PATH, "", 100, 0), Err(SignatureError::BadSignature));
    }

    #[test]
    fn different_secret_rejects() {
        let other = Signer::new(&SignatureConfig {
            enabled: true,
            secret_key: "another-secret".into(),
            expires_minutes: 60,
        })
        .unwrap();
        let sig = signer(true).sign(PATH, 100);
        assert_eq!(other.verify_at(PATH, &sig, 100, 0), Err(SignatureError::BadSignature));
    }

    #[test]
    fn signed_url_shape() {
        let s = signer(true);
        let url = s.signed_url_at("uploads/images/my photo 1.jpg", None, 1_000);
        let expected_sig = s.sign("uploads/images/my photo 1.jpg", 1_000 + 3_600);
        assert_eq!(
            url,
            format!(
                "/file/uploads/images/my%20photo%201.jpg?signature={}&expires=4600",
                expected_sig
            )
        );

        let url = s.signed_url_at(PATH, Some(5), 1_000);
        assert!(url.ends_with("&expires=1300"));
    }

    #[test]
    fn disabled_mode_is_bare_and_permissive() {
        let s = signer(false);
        assert_eq!(s.signed_url(PATH, None), format!("/{}", PATH));
        assert_eq!(s.verify_at(PATH, "garbage", 0, i64::MAX), Ok(()));
    }
}
