#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod capabilities;
pub mod config;
pub mod event;
pub mod image_processing;
pub mod model;
pub mod submission;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use config::FormConfig;
pub use crux_core::App as CruxApp;
pub use event::Event;
pub use model::Model;

use capabilities::FetchError;
use config::ConfigError;
use image_processing::ImageError;

/// Region/locality value meaning "nothing selected", as sent to the backend.
pub const UNSET_SENTINEL: &str = "0";
pub const ITEM_ID_DELIMITER: &str = ",";
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3333";
pub const DEFAULT_GEOGRAPHY_BASE_URL: &str = "https://servicodados.ibge.gov.br/api/v1/localidades";
pub const MAX_URL_LENGTH: usize = 2048;
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
pub const SUBMISSION_CONFIRMATION: &str = "Collection point created.";
pub const TOAST_DURATION_MS: u64 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Transient,
    Permanent,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Network,
    Timeout,
    Validation,
    NotFound,
    RateLimited,
    Deserialization,
    ImageTooLarge,
    ImageFormatUnsupported,
    Configuration,
    InvalidState,
    Internal,
    Unknown,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Network => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Validation => "VALIDATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::RateLimited => "RATE_LIMITED",
            Self::Deserialization => "DESERIALIZATION_ERROR",
            Self::ImageTooLarge => "IMAGE_TOO_LARGE",
            Self::ImageFormatUnsupported => "IMAGE_FORMAT_UNSUPPORTED",
            Self::Configuration => "CONFIGURATION_ERROR",
            Self::InvalidState => "INVALID_STATE",
            Self::Internal => "INTERNAL_ERROR",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    #[must_use]
    pub const fn default_severity(self) -> ErrorSeverity {
        match self {
            Self::Network | Self::Timeout | Self::RateLimited => {
                ErrorSeverity::Transient
            }

            Self::Configuration | Self::Internal => ErrorSeverity::Fatal,

            Self::Validation
            | Self::NotFound
            | Self::Deserialization
            | Self::ImageTooLarge
            | Self::ImageFormatUnsupported
            | Self::InvalidState
            | Self::Unknown => ErrorSeverity::Permanent,
        }
    }

    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Network | Self::Timeout | Self::RateLimited | Self::Internal
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
    pub internal_message: Option<String>,
    pub context: HashMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            internal_message: None,
            context: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable() && !matches!(self.severity, ErrorSeverity::Fatal)
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::Network => {
                "Unable to connect. Please check your internet connection and try again.".into()
            }
            ErrorKind::Timeout => "The request timed out. Please try again.".into(),
            ErrorKind::Validation | ErrorKind::InvalidState => self.message.clone(),
            ErrorKind::NotFound => "The requested resource could not be found.".into(),
            ErrorKind::RateLimited => "Too many requests. Please wait a moment and try again.".into(),
            ErrorKind::Deserialization => {
                "The server sent data we could not read. Please try again later.".into()
            }
            ErrorKind::ImageTooLarge => format!(
                "The image is too large. Please use an image smaller than {} MB.",
                MAX_IMAGE_BYTES / (1024 * 1024)
            ),
            ErrorKind::ImageFormatUnsupported => {
                "This image format is not supported. Please use JPEG, PNG, WebP or GIF.".into()
            }
            ErrorKind::Configuration => {
                "The app is misconfigured. Please contact support.".into()
            }
            ErrorKind::Internal | ErrorKind::Unknown => {
                "An unexpected error occurred. Please try again or contact support.".into()
            }
        }
    }

    #[must_use]
    pub fn from_http_status(status: u16) -> Self {
        let kind = match status {
            400 | 422 => ErrorKind::Validation,
            404 => ErrorKind::NotFound,
            408 => ErrorKind::Timeout,
            429 => ErrorKind::RateLimited,
            500..=599 => ErrorKind::Internal,
            _ => ErrorKind::Unknown,
        };

        Self::new(kind, format!("HTTP error: {status}"))
            .with_context("http_status", status.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

impl From<FetchError> for AppError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::Network { message } => {
                AppError::new(ErrorKind::Network, "Network error").with_internal(message)
            }
            FetchError::Timeout => AppError::new(ErrorKind::Timeout, "Request timed out"),
            FetchError::Status { status } => AppError::from_http_status(status),
            FetchError::Decode { message } => {
                AppError::new(ErrorKind::Deserialization, "Response body could not be decoded")
                    .with_internal(message)
            }
            FetchError::EmptyBody => {
                AppError::new(ErrorKind::Deserialization, "Response body was empty")
            }
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::new(ErrorKind::Configuration, e.to_string())
    }
}

impl From<ImageError> for AppError {
    fn from(e: ImageError) -> Self {
        let kind = match e {
            ImageError::InputTooLarge { .. } => ErrorKind::ImageTooLarge,
            ImageError::EmptyInput | ImageError::UnsupportedFormat => {
                ErrorKind::ImageFormatUnsupported
            }
        };
        AppError::new(kind, e.to_string())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToastMessage {
    pub message: String,
    pub duration_ms: u64,
}

impl ToastMessage {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            duration_ms: TOAST_DURATION_MS,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserFacingError {
    pub message: String,
    pub is_transient: bool,
    pub is_retryable: bool,
    pub error_code: String,
}

impl From<&AppError> for UserFacingError {
    fn from(e: &AppError) -> Self {
        Self {
            message: e.user_facing_message(),
            is_transient: e.severity == ErrorSeverity::Transient,
            is_retryable: e.is_retryable(),
            error_code: e.code().to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToastView {
    pub message: String,
    pub duration_ms: u64,
}

impl From<&ToastMessage> for ToastView {
    fn from(t: &ToastMessage) -> Self {
        Self {
            message: t.message.clone(),
            duration_ms: t.duration_ms,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemTile {
    pub id: u32,
    pub title: String,
    pub image_url: String,
    pub selected: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImagePreview {
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MapPoint {
    pub lat: f64,
    pub lon: f64,
}

impl From<model::GeoPosition> for MapPoint {
    fn from(p: model::GeoPosition) -> Self {
        Self { lat: p.lat, lon: p.lon }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ViewModel {
    pub items: Vec<ItemTile>,
    pub regions: Vec<String>,
    pub selected_region: String,
    pub localities: Vec<String>,
    pub selected_locality: String,
    pub is_loading_localities: bool,
    pub map_center: MapPoint,
    pub marker: MapPoint,
    pub name: String,
    pub email: String,
    pub whatsapp: String,
    pub image: Option<ImagePreview>,
    pub submission: model::SubmissionStatus,
    pub can_submit: bool,
    pub error: Option<UserFacingError>,
    pub toast: Option<ToastView>,
}

pub mod app {
    use tracing::{debug, info, warn};

    use super::{AppError, ImagePreview, ItemTile, ToastView, UserFacingError, ViewModel};
    use crate::capabilities::http::{
        into_fetch_result, into_status_result, locality_names, region_codes,
    };
    use crate::capabilities::{Capabilities, FetchError, LocalityRecord, RegionRecord};
    use crate::event::Event;
    use crate::image_processing::ImageAttachment;
    use crate::model::{Item, LocalityRequest, Model};
    use crate::submission::PointSubmission;
    use crate::UNSET_SENTINEL;

    #[derive(Default)]
    pub struct App;

    impl App {
        fn fetch_items(model: &mut Model, caps: &Capabilities) {
            let url = match model.config.items_url() {
                Ok(url) => url,
                Err(e) => {
                    warn!(error = %e, "items url invalid");
                    model.set_error(e.into());
                    return;
                }
            };

            caps.http
                .get(url.as_str())
                .expect_json::<Vec<Item>>()
                .send(|result| Event::ItemsFetched(into_fetch_result(result)));
        }

        fn fetch_regions(model: &mut Model, caps: &Capabilities) {
            let url = match model.config.regions_url() {
                Ok(url) => url,
                Err(e) => {
                    warn!(error = %e, "regions url invalid");
                    model.set_error(e.into());
                    return;
                }
            };

            caps.http
                .get(url.as_str())
                .expect_json::<Vec<RegionRecord>>()
                .send(|result| Event::RegionsFetched(into_fetch_result(result).map(region_codes)));
        }

        fn fetch_localities(request: LocalityRequest, model: &mut Model, caps: &Capabilities) {
            let url = match model.config.localities_url(&request.region) {
                Ok(url) => url,
                Err(e) => {
                    warn!(error = %e, region = %request.region, "localities url invalid");
                    model.locality_fetch_failed(&request);
                    model.set_error(e.into());
                    return;
                }
            };

            debug!(region = %request.region, generation = request.generation, "fetching localities");

            caps.http
                .get(url.as_str())
                .expect_json::<Vec<LocalityRecord>>()
                .send(move |result| Event::LocalitiesFetched {
                    request: request.clone(),
                    result: into_fetch_result(result).map(locality_names),
                });
        }

        fn send_submission(submission: &PointSubmission, model: &mut Model, caps: &Capabilities) {
            let url = match model.config.points_url() {
                Ok(url) => url,
                Err(e) => {
                    warn!(error = %e, "points url invalid");
                    model.complete_submission(Err(e.into()));
                    return;
                }
            };

            let body = submission.to_multipart();
            info!(
                items = submission.items.len(),
                has_image = submission.image.is_some(),
                body_bytes = body.bytes.len(),
                "submitting collection point"
            );

            caps.http
                .post(url.as_str())
                .body(body.bytes)
                .header("Content-Type", body.content_type.as_str())
                .send(|result| Event::SubmitCompleted(into_status_result(result)));
        }

        fn report_fetch_failure(source: &str, error: FetchError, model: &mut Model) {
            warn!(source, error = %error, "fetch failed");
            model.set_error(AppError::from(error).with_context("source", source));
        }
    }

    impl crux_core::App for App {
        type Event = Event;
        type Model = Model;
        type ViewModel = ViewModel;
        type Capabilities = Capabilities;

        fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
            let event_name = event.name();
            if event.is_user_initiated() {
                info!(event = event_name, "user action");
            } else {
                debug!(event = event_name, "update");
            }

            match event {
                Event::Noop => {}

                Event::Configure(config) => {
                    match config.validate() {
                        Ok(()) => model.config = config,
                        Err(e) => {
                            warn!(error = %e, "rejected configuration");
                            model.set_error(e.into());
                        }
                    }
                    caps.render.render();
                }

                Event::Initialize => {
                    caps.geolocation
                        .current_position(Event::InitialPositionResolved);
                    Self::fetch_items(model, caps);
                    Self::fetch_regions(model, caps);
                    caps.render.render();
                }

                Event::InitialPositionResolved(result) => {
                    match result {
                        Ok(position) => {
                            if !model.set_initial_position(position) {
                                warn!(lat = position.lat, lon = position.lon, "ignored non-finite position");
                            }
                        }
                        // The map stays centered on the origin; the user can still click a point.
                        Err(e) => warn!(error = %e, "geolocation failed"),
                    }
                    caps.render.render();
                }

                Event::ItemsFetched(result) => {
                    match result {
                        Ok(items) => {
                            debug!(count = items.len(), "catalog loaded");
                            model.set_catalog(items);
                        }
                        Err(e) => Self::report_fetch_failure("items", e, model),
                    }
                    caps.render.render();
                }

                Event::RegionsFetched(result) => {
                    match result {
                        Ok(regions) => {
                            debug!(count = regions.len(), "regions loaded");
                            model.set_regions(regions);
                        }
                        Err(e) => Self::report_fetch_failure("regions", e, model),
                    }
                    caps.render.render();
                }

                Event::RegionSelected { code } => {
                    if let Some(request) = model.select_region(&code) {
                        Self::fetch_localities(request, model, caps);
                    }
                    caps.render.render();
                }

                Event::LocalitiesFetched { request, result } => {
                    match result {
                        Ok(names) => {
                            let count = names.len();
                            if model.apply_localities(&request, names) {
                                debug!(region = %request.region, count, "localities loaded");
                            } else {
                                debug!(
                                    region = %request.region,
                                    generation = request.generation,
                                    "discarded stale localities"
                                );
                            }
                        }
                        Err(e) => {
                            if model.locality_fetch_failed(&request) {
                                Self::report_fetch_failure("localities", e, model);
                            } else {
                                debug!(region = %request.region, error = %e, "stale locality failure");
                            }
                        }
                    }
                    caps.render.render();
                }

                Event::LocalitySelected { name } => {
                    model.select_locality(&name);
                    caps.render.render();
                }

                Event::MapClicked { lat, lon } => {
                    if !model.set_map_point(lat, lon) {
                        warn!(lat, lon, "ignored non-finite map point");
                    }
                    caps.render.render();
                }

                Event::FieldChanged { field, value } => {
                    model.set_field(field, value);
                    caps.render.render();
                }

                Event::ItemToggled { id } => {
                    let selected = model.toggle_item(id);
                    debug!(%id, selected, "item toggled");
                    caps.render.render();
                }

                Event::ImageAttached { file_name, data } => {
                    match ImageAttachment::new(file_name, data) {
                        Ok(image) => {
                            debug!(?image, "image attached");
                            model.set_image(image);
                        }
                        Err(e) => {
                            warn!(error = %e, "rejected image");
                            model.set_error(e.into());
                        }
                    }
                    caps.render.render();
                }

                Event::ImageCleared => {
                    model.clear_image();
                    caps.render.render();
                }

                Event::SubmitRequested => {
                    match model.begin_submission() {
                        Ok(submission) => Self::send_submission(&submission, model, caps),
                        Err(e) => {
                            warn!(error = %e, "submission refused");
                            model.set_error(e);
                        }
                    }
                    caps.render.render();
                }

                Event::SubmitCompleted(result) => {
                    match &result {
                        Ok(()) => info!("collection point created"),
                        Err(e) => warn!(error = %e, "submission failed"),
                    }
                    model.complete_submission(result.map_err(AppError::from));
                    caps.render.render();
                }

                Event::DismissError => {
                    model.clear_error();
                    caps.render.render();
                }

                Event::DismissToast => {
                    model.clear_toast();
                    caps.render.render();
                }
            }
        }

        fn view(&self, model: &Model) -> ViewModel {
            let items = model
                .catalog
                .iter()
                .map(|item| ItemTile {
                    id: item.id.0,
                    title: item.title.clone(),
                    image_url: item.image_url.clone(),
                    selected: model.draft.items.contains(item.id),
                })
                .collect();

            let image = model.draft.image.as_ref().map(|image| ImagePreview {
                file_name: image.file_name().to_string(),
                mime_type: image.mime_type().to_string(),
                size_bytes: image.size_bytes(),
            });

            ViewModel {
                items,
                regions: model
                    .geography
                    .regions
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
                selected_region: model
                    .geography
                    .selected_region
                    .as_ref()
                    .map_or_else(|| UNSET_SENTINEL.to_string(), ToString::to_string),
                localities: model.geography.localities.clone(),
                selected_locality: model
                    .geography
                    .selected_locality
                    .clone()
                    .unwrap_or_else(|| UNSET_SENTINEL.to_string()),
                is_loading_localities: model.geography.localities_loading,
                map_center: model.initial_position.into(),
                marker: model.draft.point.into(),
                name: model.draft.contact.name.clone(),
                email: model.draft.contact.email.clone(),
                whatsapp: model.draft.contact.whatsapp.clone(),
                image,
                submission: model.submission,
                can_submit: model.can_submit(),
                error: model.active_error.as_ref().map(UserFacingError::from),
                toast: model.active_toast.as_ref().map(ToastView::from),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod error_tests {
        use super::*;

        #[test]
        fn http_status_maps_to_kind() {
            assert_eq!(AppError::from_http_status(422).kind, ErrorKind::Validation);
            assert_eq!(AppError::from_http_status(404).kind, ErrorKind::NotFound);
            assert_eq!(AppError::from_http_status(429).kind, ErrorKind::RateLimited);
            assert_eq!(AppError::from_http_status(503).kind, ErrorKind::Internal);
            assert_eq!(AppError::from_http_status(418).kind, ErrorKind::Unknown);
            assert_eq!(
                AppError::from_http_status(500).context.get("http_status").map(String::as_str),
                Some("500")
            );
        }

        #[test]
        fn fetch_errors_convert() {
            let network = AppError::from(FetchError::Network {
                message: "connection reset".into(),
            });
            assert_eq!(network.kind, ErrorKind::Network);
            assert_eq!(network.internal_message.as_deref(), Some("connection reset"));
            assert!(network.is_retryable());

            let empty = AppError::from(FetchError::EmptyBody);
            assert_eq!(empty.kind, ErrorKind::Deserialization);
            assert!(!empty.is_retryable());
        }

        #[test]
        fn image_errors_convert() {
            let too_large = AppError::from(ImageError::InputTooLarge {
                size: MAX_IMAGE_BYTES + 1,
                max_size: MAX_IMAGE_BYTES,
            });
            assert_eq!(too_large.kind, ErrorKind::ImageTooLarge);
            assert!(too_large.user_facing_message().contains("10 MB"));

            let unsupported = AppError::from(ImageError::UnsupportedFormat);
            assert_eq!(unsupported.kind, ErrorKind::ImageFormatUnsupported);
        }

        #[test]
        fn transport_failures_convert() {
            let timeout = AppError::from(FetchError::Timeout);
            assert_eq!(timeout.kind, ErrorKind::Timeout);
            assert!(timeout.is_retryable());

            let decode = AppError::from(FetchError::Decode {
                message: "expected value at line 1".into(),
            });
            assert_eq!(decode.kind, ErrorKind::Deserialization);
            assert_eq!(decode.internal_message.as_deref(), Some("expected value at line 1"));
            assert!(!decode.is_retryable());
        }

        #[test]
        fn fatal_errors_are_not_retryable() {
            // Internal is a retryable kind, but its default severity is fatal.
            let error = AppError::new(ErrorKind::Internal, "x");
            assert_eq!(error.severity, ErrorSeverity::Fatal);
            assert!(!error.is_retryable());
        }

        #[test]
        fn display_includes_code_and_internal() {
            let error = AppError::new(ErrorKind::Configuration, "bad url").with_internal("detail");
            assert_eq!(error.to_string(), "[CONFIGURATION_ERROR] bad url (internal: detail)");
        }

        #[test]
        fn user_facing_error_from_app_error() {
            let error = AppError::new(ErrorKind::Timeout, "slow");
            let facing = UserFacingError::from(&error);
            assert!(facing.is_transient);
            assert!(facing.is_retryable);
            assert_eq!(facing.error_code, "TIMEOUT");
        }
    }

    mod toast_tests {
        use super::*;

        #[test]
        fn toast_message_new() {
            let toast = ToastMessage::new("Saved");
            assert_eq!(toast.message, "Saved");
            assert_eq!(toast.duration_ms, TOAST_DURATION_MS);
        }

        #[test]
        fn toast_view_copies_message() {
            let view = ToastView::from(&ToastMessage::new(SUBMISSION_CONFIRMATION));
            assert_eq!(view.message, SUBMISSION_CONFIRMATION);
            assert_eq!(view.duration_ms, TOAST_DURATION_MS);
        }
    }
}
