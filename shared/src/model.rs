use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::FormConfig;
use crate::image_processing::ImageAttachment;
use crate::submission::PointSubmission;
use crate::{AppError, ErrorKind, ToastMessage, SUBMISSION_CONFIRMATION, UNSET_SENTINEL};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u32);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Collection item as served by the catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    pub image_url: String,
}

/// Region identifier such as `SP`. The unset sentinel never becomes a `RegionCode`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionCode(String);

impl RegionCode {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == UNSET_SENTINEL {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoPosition {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPosition {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_finite(self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactField {
    Name,
    Email,
    Whatsapp,
}

impl ContactField {
    pub const ALL: [Self; 3] = [Self::Name, Self::Email, Self::Whatsapp];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Email => "email",
            Self::Whatsapp => "whatsapp",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown contact field: {0}")]
pub struct ContactFieldError(pub String);

impl FromStr for ContactField {
    type Err = ContactFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(Self::Name),
            "email" => Ok(Self::Email),
            "whatsapp" => Ok(Self::Whatsapp),
            other => Err(ContactFieldError(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub name: String,
    pub email: String,
    pub whatsapp: String,
}

impl ContactDetails {
    pub fn get(&self, field: ContactField) -> &str {
        match field {
            ContactField::Name => &self.name,
            ContactField::Email => &self.email,
            ContactField::Whatsapp => &self.whatsapp,
        }
    }

    pub fn set(&mut self, field: ContactField, value: String) {
        match field {
            ContactField::Name => self.name = value,
            ContactField::Email => self.email = value,
            ContactField::Whatsapp => self.whatsapp = value,
        }
    }
}

/// Toggle set of item ids. Keeps first-selection order so the transmitted token is stable.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectedItems(Vec<ItemId>);

impl SelectedItems {
    /// Returns whether `id` is selected after the toggle.
    pub fn toggle(&mut self, id: ItemId) -> bool {
        if let Some(pos) = self.0.iter().position(|selected| *selected == id) {
            self.0.remove(pos);
            false
        } else {
            self.0.push(id);
            true
        }
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.0.contains(&id)
    }

    pub fn ids(&self) -> &[ItemId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Identifies one locality fetch. Responses carrying an older generation are stale.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalityRequest {
    pub region: RegionCode,
    pub generation: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GeographyState {
    pub regions: Vec<RegionCode>,
    pub selected_region: Option<RegionCode>,
    pub localities: Vec<String>,
    pub selected_locality: Option<String>,
    pub localities_loading: bool,
    generation: u64,
}

impl GeographyState {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn is_current(&self, request: &LocalityRequest) -> bool {
        request.generation == self.generation
            && self.selected_region.as_ref() == Some(&request.region)
    }

    // Any region change invalidates in-flight locality responses.
    fn reset_localities(&mut self) {
        self.localities.clear();
        self.selected_locality = None;
        self.localities_loading = false;
        self.generation = self.generation.wrapping_add(1);
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Draft {
    pub contact: ContactDetails,
    pub point: GeoPosition,
    pub items: SelectedItems,
    pub image: Option<ImageAttachment>,
}

impl Draft {
    /// Clears every part still equal to what was sent. Edits made since then survive.
    fn clear_sent(&mut self, sent: &Draft) {
        for field in ContactField::ALL {
            if self.contact.get(field) == sent.contact.get(field) {
                self.contact.set(field, String::new());
            }
        }
        if self.point == sent.point {
            self.point = GeoPosition::default();
        }
        if self.items == sent.items {
            self.items = SelectedItems::default();
        }
        if self.image == sent.image {
            self.image = None;
        }
    }
}

/// Form state captured when a submission starts.
#[derive(Clone, Debug, PartialEq)]
struct SentSnapshot {
    draft: Draft,
    region: Option<RegionCode>,
    locality: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    #[default]
    Idle,
    Submitting,
    Succeeded,
    Failed,
}

#[derive(Debug, Default)]
pub struct Model {
    pub config: FormConfig,
    pub catalog: Vec<Item>,
    pub geography: GeographyState,
    pub initial_position: GeoPosition,
    pub draft: Draft,
    pub submission: SubmissionStatus,
    pub active_error: Option<AppError>,
    pub active_toast: Option<ToastMessage>,
    sent: Option<SentSnapshot>,
}

impl Model {
    pub fn set_error(&mut self, error: AppError) {
        self.active_error = Some(error);
    }

    pub fn clear_error(&mut self) {
        self.active_error = None;
    }

    pub fn show_toast(&mut self, message: impl Into<String>) {
        self.active_toast = Some(ToastMessage::new(message));
    }

    pub fn clear_toast(&mut self) {
        self.active_toast = None;
    }

    pub fn set_catalog(&mut self, items: Vec<Item>) {
        self.catalog = items;
    }

    pub fn set_regions(&mut self, regions: Vec<RegionCode>) {
        self.geography.regions = regions;
    }

    /// Ignores non-finite fixes; the map keeps its previous center.
    pub fn set_initial_position(&mut self, position: GeoPosition) -> bool {
        if !position.is_finite() {
            return false;
        }
        self.initial_position = position;
        true
    }

    /// Selects a region and cascades the locality reset. Returns the locality fetch to issue,
    /// or `None` for the unset sentinel or an unchanged selection.
    pub fn select_region(&mut self, raw: &str) -> Option<LocalityRequest> {
        let next = RegionCode::parse(raw);
        if next == self.geography.selected_region {
            return None;
        }

        self.geography.reset_localities();
        self.geography.selected_region = next.clone();

        let region = next?;
        self.geography.localities_loading = true;
        Some(LocalityRequest {
            region,
            generation: self.geography.generation,
        })
    }

    /// Applies a locality response. Returns `false` when the response is stale.
    pub fn apply_localities(&mut self, request: &LocalityRequest, names: Vec<String>) -> bool {
        if !self.geography.is_current(request) {
            return false;
        }
        self.geography.localities = names;
        self.geography.localities_loading = false;
        true
    }

    /// Marks the current locality fetch as finished without data. Returns `false` when stale.
    pub fn locality_fetch_failed(&mut self, request: &LocalityRequest) -> bool {
        if !self.geography.is_current(request) {
            return false;
        }
        self.geography.localities_loading = false;
        true
    }

    /// No membership check against the loaded list.
    pub fn select_locality(&mut self, raw: &str) {
        let trimmed = raw.trim();
        self.geography.selected_locality = if trimmed.is_empty() || trimmed == UNSET_SENTINEL {
            None
        } else {
            Some(trimmed.to_string())
        };
    }

    /// Last click wins. Returns `false` for non-finite coordinates, which are dropped.
    pub fn set_map_point(&mut self, lat: f64, lon: f64) -> bool {
        let point = GeoPosition::new(lat, lon);
        if !point.is_finite() {
            return false;
        }
        self.draft.point = point;
        true
    }

    pub fn set_field(&mut self, field: ContactField, value: impl Into<String>) {
        self.draft.contact.set(field, value.into());
    }

    pub fn toggle_item(&mut self, id: ItemId) -> bool {
        self.draft.items.toggle(id)
    }

    pub fn set_image(&mut self, image: ImageAttachment) {
        self.draft.image = Some(image);
    }

    pub fn clear_image(&mut self) {
        self.draft.image = None;
    }

    pub fn submission(&self) -> PointSubmission {
        PointSubmission {
            name: self.draft.contact.name.clone(),
            email: self.draft.contact.email.clone(),
            whatsapp: self.draft.contact.whatsapp.clone(),
            uf: self
                .geography
                .selected_region
                .as_ref()
                .map_or_else(|| UNSET_SENTINEL.to_string(), ToString::to_string),
            city: self
                .geography
                .selected_locality
                .clone()
                .unwrap_or_else(|| UNSET_SENTINEL.to_string()),
            latitude: self.draft.point.lat,
            longitude: self.draft.point.lon,
            items: self.draft.items.ids().to_vec(),
            item_id_encoding: self.config.item_id_encoding,
            image: self.draft.image.clone(),
        }
    }

    /// Snapshots the draft for sending. Refuses while another submission is in flight.
    pub fn begin_submission(&mut self) -> Result<PointSubmission, AppError> {
        if self.submission == SubmissionStatus::Submitting {
            return Err(AppError::new(
                ErrorKind::InvalidState,
                "A submission is already in progress",
            ));
        }
        self.submission = SubmissionStatus::Submitting;
        self.clear_error();
        self.sent = Some(self.snapshot());
        Ok(self.submission())
    }

    /// On success the sent draft and geography selection are reset, loaded lists are kept,
    /// and anything edited while the request was in flight stays as the user left it.
    /// On failure the draft is kept so the user can resubmit.
    pub fn complete_submission(&mut self, result: Result<(), AppError>) {
        let sent = self.sent.take();
        match result {
            Ok(()) => {
                let sent = sent.unwrap_or_else(|| self.snapshot());
                self.submission = SubmissionStatus::Succeeded;
                self.draft.clear_sent(&sent.draft);
                if self.geography.selected_region == sent.region
                    && self.geography.selected_locality == sent.locality
                {
                    self.geography.reset_localities();
                    self.geography.selected_region = None;
                }
                self.show_toast(SUBMISSION_CONFIRMATION);
            }
            Err(error) => {
                self.submission = SubmissionStatus::Failed;
                self.set_error(error);
            }
        }
    }

    fn snapshot(&self) -> SentSnapshot {
        SentSnapshot {
            draft: self.draft.clone(),
            region: self.geography.selected_region.clone(),
            locality: self.geography.selected_locality.clone(),
        }
    }

    pub fn can_submit(&self) -> bool {
        self.submission != SubmissionStatus::Submitting
    }
}
