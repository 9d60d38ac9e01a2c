use percent_encoding::percent_decode_str;
use thiserror::Error;
use tracing::warn;

use jtrace_crypto::{FILE_ROUTE_PREFIX, Signer};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("empty media path")]
    Empty,
    #[error("media path is not valid UTF-8 after decoding")]
    InvalidEncoding,
}

fn is_external(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Turns a stored media value into a URL the browser can fetch.
///
/// - external `http(s)://` URLs are returned unchanged
/// - legacy `/file/...` URLs are unwrapped (query dropped, path decoded) and
///   resolved again
/// - anything else is a relative upload path and gets a fresh signed URL
#[derive(Clone)]
pub struct MediaUrlResolver {
    signer: Signer,
}

impl MediaUrlResolver {
    pub fn new(signer: Signer) -> Self {
        Self { signer }
    }

    pub fn try_resolve(&self, stored: &str) -> Result<String, ResolveError> {
        if is_external(stored) {
            return Ok(stored.to_string());
        }

        if let Some(rest) = stored.strip_prefix(FILE_ROUTE_PREFIX) {
            let encoded = rest.split('?').next().unwrap_or_default();
            let decoded = percent_decode_str(encoded)
                .decode_utf8()
                .map_err(|_| ResolveError::InvalidEncoding)?;
            return self.try_resolve(&decoded);
        }

        let path = stored.trim_start_matches('/');
        if path.is_empty() {
            return Err(ResolveError::Empty);
        }
        Ok(self.signer.signed_url(path, None))
    }

    pub fn best_effort(&self) -> BestEffort<'_> {
        BestEffort(self)
    }
}

/// Rendering-side resolver that never fails: errors are logged and the
/// stored value is returned as-is (external) or `/`-prefixed.
pub struct BestEffort<'a>(&'a MediaUrlResolver);

impl BestEffort<'_> {
    pub fn resolve(&self, stored: &str) -> String {
        match self.0.try_resolve(stored) {
            Ok(url) => url,
            Err(e) => {
                warn!("Failed to resolve media URL {:?}: {}", stored, e);
                if is_external(stored) || stored.starts_with('/') {
                    stored.to_string()
                } else {
                    format!("/{}", stored)
                }
            }
        }
    }

    pub fn resolve_opt(&self, stored: Option<&str>) -> Option<String> {
        stored.map(|s| self.resolve(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jtrace_types::config::SignatureConfig;

    const RAW: &str = "uploads/images/2024/09/22/user_42/my photo.jpg";

    fn resolver(enabled: bool) -> MediaUrlResolver {
        MediaUrlResolver::new(
            Signer::new(&SignatureConfig {
                enabled,
                secret_key: "resolver-secret".into(),
                expires_minutes: 30,
            })
            .unwrap(),
        )
    }

    /// (path, signature, expires) of a `/file/` URL.
    fn parts(url: &str) -> (String, String, i64) {
        let rest = url.strip_prefix(FILE_ROUTE_PREFIX).unwrap();
        let (path, query) = rest.split_once('?').unwrap();
        let mut signature = String::new();
        let mut expires = 0;
        for pair in query.split('&') {
            let (k, v) = pair.split_once('=').unwrap();
            match k {
                "signature" => signature = v.to_string(),
                "expires" => expires = v.parse().unwrap(),
                _ => {}
            }
        }
        let path = percent_decode_str(path).decode_utf8().unwrap().into_owned();
        (path, signature, expires)
    }

    #[test]
    fn raw_path_gets_verifiable_signed_url() {
        let r = resolver(true);
        let url = r.try_resolve(RAW).unwrap();
        assert!(url.starts_with("/file/uploads/images/"));
        assert!(url.contains("my%20photo.jpg?signature="));

        let (path, signature, expires) = parts(&url);
        assert_eq!(path, RAW);
        assert!(r.signer.verify(&path, &signature, expires).is_ok());
    }

    #[test]
    fn resolve_is_idempotent() {
        let r = resolver(true);
        let once = r.try_resolve(RAW).unwrap();
        let twice = r.try_resolve(&once).unwrap();
        assert_eq!(parts(&twice).0, RAW);

        let plain = resolver(false);
        let once = plain.try_resolve(RAW).unwrap();
        assert_eq!(once, format!("/{}", RAW));
        assert_eq!(plain.try_resolve(&once).unwrap(), once);
    }

    #[test]
    fn external_urls_unchanged_in_both_modes() {
        for enabled in [true, false] {
            let r = resolver(enabled);
            for url in ["https://picsum.photos/800/600", "http://example.com/a.png?x=1"] {
                assert_eq!(r.try_resolve(url).unwrap(), url);
            }
        }
    }

    #[test]
    fn legacy_wrapped_external_url_is_unwrapped() {
        let r = resolver(true);
        let legacy = "/file/https%3A//picsum.photos/800/600?signature=old&expires=1";
        assert_eq!(r.try_resolve(legacy).unwrap(), "https://picsum.photos/800/600");
    }

    #[test]
    fn legacy_signed_path_is_resigned() {
        let r = resolver(true);
        let legacy = "/file/uploads/images/a.jpg?signature=stale&expires=1";
        let url = r.try_resolve(legacy).unwrap();
        let (path, signature, expires) = parts(&url);
        assert_eq!(path, "uploads/images/a.jpg");
        assert_ne!(signature, "stale");
        assert!(expires > 1);
    }

    #[test]
    fn best_effort_degrades() {
        let r = resolver(true);
        let best = r.best_effort();
        assert_eq!(best.resolve("/file/%FF%FE"), "/file/%FF%FE");
        assert_eq!(best.resolve(""), "/");
        assert!(best.resolve(RAW).starts_with("/file/"));
        assert_eq!(best.resolve_opt(None), None);
    }
}
