use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::RegionCode;

#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchError {
    #[error("request failed: {message}")]
    Network { message: String },

    #[error("request timed out")]
    Timeout,

    #[error("HTTP error {status}")]
    Status { status: u16 },

    #[error("response body could not be decoded: {message}")]
    Decode { message: String },

    #[error("response body was empty")]
    EmptyBody,
}

impl From<crux_http::Error> for FetchError {
    fn from(e: crux_http::Error) -> Self {
        match e {
            // crux_http turns every 4xx/5xx response into this variant.
            crux_http::Error::Http(e) => FetchError::Status {
                status: u16::from(e.code),
            },
            crux_http::Error::Json(message) => FetchError::Decode { message },
            crux_http::Error::Timeout => FetchError::Timeout,
            crux_http::Error::Io(message) | crux_http::Error::Url(message) => {
                FetchError::Network { message }
            }
        }
    }
}

pub type FetchResult<T> = Result<T, FetchError>;

/// Entry of the geography source's region list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionRecord {
    #[serde(rename = "sigla")]
    pub code: String,
}

/// Entry of the geography source's locality list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalityRecord {
    #[serde(rename = "nome")]
    pub name: String,
}

/// Records that carry the unset sentinel or a blank code are dropped.
pub fn region_codes(records: Vec<RegionRecord>) -> Vec<RegionCode> {
    records
        .into_iter()
        .filter_map(|record| RegionCode::parse(&record.code))
        .collect()
}

pub fn locality_names(records: Vec<LocalityRecord>) -> Vec<String> {
    records.into_iter().map(|record| record.name).collect()
}

/// Folds a typed crux_http response into an explicit result.
pub fn into_fetch_result<T>(result: crux_http::Result<crux_http::Response<T>>) -> FetchResult<T> {
    let mut response = result?;
    response.take_body().ok_or(FetchError::EmptyBody)
}

/// Like [`into_fetch_result`] for requests whose response body is not consumed.
pub fn into_status_result<T>(result: crux_http::Result<crux_http::Response<T>>) -> FetchResult<()> {
    result.map(|_| ()).map_err(FetchError::from)
}
