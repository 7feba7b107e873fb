use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::model::RegionCode;
use crate::submission::ItemIdEncoding;
use crate::{DEFAULT_API_BASE_URL, DEFAULT_GEOGRAPHY_BASE_URL, MAX_URL_LENGTH};

#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigError {
    #[error("invalid {name} '{url}': {reason}")]
    InvalidUrl {
        name: String,
        url: String,
        reason: String,
    },
}

/// Endpoint configuration supplied by the shell before `Initialize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormConfig {
    /// Backend serving `items` and `points`.
    pub api_base_url: String,
    /// Geography source serving `estados` and `estados/{uf}/municipios`.
    pub geography_base_url: String,
    #[serde(default)]
    pub item_id_encoding: ItemIdEncoding,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            geography_base_url: DEFAULT_GEOGRAPHY_BASE_URL.into(),
            item_id_encoding: ItemIdEncoding::default(),
        }
    }
}

impl FormConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_base("api_base_url", &self.api_base_url)?;
        parse_base("geography_base_url", &self.geography_base_url)?;
        Ok(())
    }

    pub fn items_url(&self) -> Result<Url, ConfigError> {
        endpoint("api_base_url", &self.api_base_url, &["items"])
    }

    pub fn points_url(&self) -> Result<Url, ConfigError> {
        endpoint("api_base_url", &self.api_base_url, &["points"])
    }

    pub fn regions_url(&self) -> Result<Url, ConfigError> {
        endpoint("geography_base_url", &self.geography_base_url, &["estados"])
    }

    pub fn localities_url(&self, region: &RegionCode) -> Result<Url, ConfigError> {
        endpoint(
            "geography_base_url",
            &self.geography_base_url,
            &["estados", region.as_str(), "municipios"],
        )
    }
}

fn parse_base(name: &str, raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        name: name.to_string(),
        url: truncate_url(raw),
        reason,
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid("URL cannot be empty".into()));
    }
    if trimmed.len() > MAX_URL_LENGTH {
        return Err(invalid(format!(
            "URL exceeds maximum length of {MAX_URL_LENGTH} bytes"
        )));
    }

    let parsed = Url::parse(trimmed).map_err(|e| invalid(e.to_string()))?;

    let scheme = parsed.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(invalid(format!(
            "invalid scheme '{scheme}', only 'http' and 'https' are allowed"
        )));
    }
    if parsed.host_str().is_none() {
        return Err(invalid("URL must have a host".into()));
    }
    if parsed.query().is_some() || parsed.fragment().is_some() {
        return Err(invalid("base URL cannot carry a query or fragment".into()));
    }

    Ok(parsed)
}

// Url::join would replace the last path segment of a base like `/api/v1/localidades`,
// so segments are appended instead.
fn endpoint(name: &str, base: &str, segments: &[&str]) -> Result<Url, ConfigError> {
    let mut url = parse_base(name, base)?;
    url.path_segments_mut()
        .map_err(|()| ConfigError::InvalidUrl {
            name: name.to_string(),
            url: truncate_url(base),
            reason: "URL cannot be a base".into(),
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn truncate_url(url: &str) -> String {
    if url.len() <= 100 {
        url.to_string()
    } else {
        let cut = (0..=100).rev().find(|&i| url.is_char_boundary(i)).unwrap_or(0);
        format!("{}...", &url[..cut])
    }
}
