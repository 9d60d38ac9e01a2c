use anyhow::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use jtrace_types::config::MapConfig;

#[derive(Debug, Serialize, Deserialize)]
struct SealedClaims {
    data: Value,
    exp: usize,
    iat: usize,
}

/// Wraps the map provider keys for delivery to the browser.
///
/// With encryption enabled the payload is an HS256 JWT carrying
/// `{data, exp, iat}`; otherwise it is plain base64 of the JSON.
#[derive(Clone)]
pub struct MapConfigSealer {
    enabled: bool,
    secret: String,
    provider: Value,
}

impl MapConfigSealer {
    pub fn new(config: &MapConfig) -> Self {
        Self {
            enabled: config.encryption.enabled,
            secret: config.encryption.secret_key.clone(),
            provider: serde_json::json!({ "amap": config.amap }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The provider configuration, sealed for `expires_minutes`.
    pub fn sealed_provider_config(&self, expires_minutes: i64) -> Result<String> {
        self.seal(&self.provider, expires_minutes)
    }

    pub fn seal(&self, data: &Value, expires_minutes: i64) -> Result<String> {
        if !self.enabled {
            return Ok(B64.encode(serde_json::to_vec(data)?));
        }

        let now = chrono::Utc::now();
        let claims = SealedClaims {
            data: data.clone(),
            exp: (now + chrono::Duration::minutes(expires_minutes)).timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?;
        Ok(token)
    }

    pub fn open(&self, sealed: &str) -> Result<Value> {
        if !self.enabled {
            return Ok(serde_json::from_slice(&B64.decode(sealed)?)?);
        }

        let token_data = decode::<SealedClaims>(
            sealed,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jtrace_types::config::{AmapConfig, MapEncryptionConfig};

    fn config(enabled: bool) -> MapConfig {
        MapConfig {
            amap: AmapConfig {
                api_key: "amap-key".into(),
                security_js_code: "js-code".into(),
                ..AmapConfig::default()
            },
            encryption: MapEncryptionConfig {
                enabled,
                secret_key: "map-secret".into(),
            },
        }
    }

    #[test]
    fn sealed_config_opens_with_same_secret() {
        let sealer = MapConfigSealer::new(&config(true));
        let token = sealer.sealed_provider_config(60).unwrap();
        assert_eq!(token.split('.').count(), 3);

        let data = sealer.open(&token).unwrap();
        assert_eq!(data["amap"]["api_key"], "amap-key");
        assert_eq!(data["amap"]["version"], "2.0");
    }

    #[test]
    fn wrong_secret_fails() {
        let token = MapConfigSealer::new(&config(true))
            .sealed_provider_config(60)
            .unwrap();
        let mut other = config(true);
        other.encryption.secret_key = "another".into();
        assert!(MapConfigSealer::new(&other).open(&token).is_err());
    }

    #[test]
    fn disabled_is_plain_base64() {
        let sealer = MapConfigSealer::new(&config(false));
        let sealed = sealer.sealed_provider_config(60).unwrap();
        let raw: Value = serde_json::from_slice(&B64.decode(&sealed).unwrap()).unwrap();
        assert_eq!(raw["amap"]["security_js_code"], "js-code");
    }
}
