use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::encoding::base64_decode;
use crate::error::ConfigError;

// =============================================================================
// Proxy control endpoint config (figment: defaults / grip.toml / GRIP_* env)
// =============================================================================
//
//   grip.toml:   url = "https://api.example.com/realm/r?iss=r&key=base64:..."
//   env var:     GRIP_URL=...
//
// or the explicit form:
//
//   grip.toml:   control_uri = "https://api.example.com/realm/r"
//                control_iss = "r"
//                key = "base64:..."

/// One proxy control endpoint, with optional JWT issuer and signing key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GripConfig {
    pub control_uri: String,
    pub control_iss: Option<String>,
    pub key: Option<Vec<u8>>,
}

/// Parse a GRIP URI into a [`GripConfig`].
///
/// `iss` and `key` query parameters are lifted out; a `key` prefixed with
/// `base64:` is decoded. Remaining query parameters stay on `control_uri`.
pub fn parse_grip_uri(uri: &str) -> Result<GripConfig, ConfigError> {
    let parsed = Url::parse(uri)?;

    let mut iss = None;
    let mut key = None;
    let mut rest = url::form_urlencoded::Serializer::new(String::new());
    let mut has_rest = false;
    for (k, v) in parsed.query_pairs() {
        match &*k {
            "iss" => iss = Some(v.into_owned()),
            "key" => key = Some(v.into_owned()),
            _ => {
                rest.append_pair(&k, &v);
                has_rest = true;
            }
        }
    }

    let path = parsed.path();
    let path = path.strip_suffix('/').unwrap_or(path);
    let mut control_uri = format!("{}{}", &parsed[..url::Position::AfterPort], path);
    if has_rest {
        control_uri.push('?');
        control_uri.push_str(&rest.finish());
    }

    Ok(GripConfig {
        control_uri,
        control_iss: iss.filter(|s| !s.is_empty()),
        key: key.filter(|s| !s.is_empty()).map(decode_key).transpose()?,
    })
}

/// Keys are taken as raw text unless prefixed with `base64:`.
fn decode_key(raw: String) -> Result<Vec<u8>, ConfigError> {
    match raw.strip_prefix("base64:") {
        Some(encoded) => base64_decode(encoded).map_err(|e| ConfigError::InvalidKey(e.to_string())),
        None => Ok(raw.into_bytes()),
    }
}

/// File/env form of [`GripConfig`], deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GripFileConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub control_uri: Option<String>,
    #[serde(default)]
    pub control_iss: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
}

impl GripFileConfig {
    /// `url` wins when set; otherwise `control_uri` is required.
    pub fn resolve(&self) -> Result<GripConfig, ConfigError> {
        if let Some(url) = self.url.as_deref().filter(|s| !s.is_empty()) {
            return parse_grip_uri(url);
        }
        let control_uri = self
            .control_uri
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingControlUri)?;
        Ok(GripConfig {
            control_uri: control_uri.trim_end_matches('/').to_string(),
            control_iss: self.control_iss.clone().filter(|s| !s.is_empty()),
            key: self.key.clone().filter(|s| !s.is_empty()).map(decode_key).transpose()?,
        })
    }
}

/// Build a figment that layers: defaults → `path` (TOML) → `GRIP_*` env vars.
pub fn load_config(path: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(GripFileConfig::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("GRIP_").split("__"))
}

impl GripConfig {
    pub fn from_figment(figment: &figment::Figment) -> Result<Self, ConfigError> {
        let file: GripFileConfig = figment.extract()?;
        file.resolve()
    }
}
