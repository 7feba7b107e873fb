use serde::{Deserialize, Serialize};

use crate::capabilities::{FetchResult, GeolocationResult};
use crate::config::FormConfig;
use crate::model::{ContactField, Item, ItemId, LocalityRequest, RegionCode};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    Noop,

    Configure(FormConfig),
    Initialize,

    // Responses to the initial lookups
    InitialPositionResolved(GeolocationResult),
    ItemsFetched(FetchResult<Vec<Item>>),
    RegionsFetched(FetchResult<Vec<RegionCode>>),

    RegionSelected {
        code: String,
    },
    LocalitiesFetched {
        request: LocalityRequest,
        result: FetchResult<Vec<String>>,
    },
    LocalitySelected {
        name: String,
    },

    MapClicked {
        lat: f64,
        lon: f64,
    },
    FieldChanged {
        field: ContactField,
        value: String,
    },
    ItemToggled {
        id: ItemId,
    },
    ImageAttached {
        file_name: String,
        #[serde(with = "serde_bytes")]
        data: Vec<u8>,
    },
    ImageCleared,

    SubmitRequested,
    SubmitCompleted(FetchResult<()>),

    DismissError,
    DismissToast,
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Noop => "noop",
            Self::Configure(_) => "configure",
            Self::Initialize => "initialize",
            Self::InitialPositionResolved(_) => "initial_position_resolved",
            Self::ItemsFetched(_) => "items_fetched",
            Self::RegionsFetched(_) => "regions_fetched",
            Self::RegionSelected { .. } => "region_selected",
            Self::LocalitiesFetched { .. } => "localities_fetched",
            Self::LocalitySelected { .. } => "locality_selected",
            Self::MapClicked { .. } => "map_clicked",
            Self::FieldChanged { .. } => "field_changed",
            Self::ItemToggled { .. } => "item_toggled",
            Self::ImageAttached { .. } => "image_attached",
            Self::ImageCleared => "image_cleared",
            Self::SubmitRequested => "submit_requested",
            Self::SubmitCompleted(_) => "submit_completed",
            Self::DismissError => "dismiss_error",
            Self::DismissToast => "dismiss_toast",
        }
    }

    #[must_use]
    pub const fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            Self::RegionSelected { .. }
                | Self::LocalitySelected { .. }
                | Self::MapClicked { .. }
                | Self::FieldChanged { .. }
                | Self::ItemToggled { .. }
                | Self::ImageAttached { .. }
                | Self::ImageCleared
                | Self::SubmitRequested
                | Self::DismissError
                | Self::DismissToast
        )
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::Noop
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_default() {
        assert!(matches!(Event::default(), Event::Noop));
    }

    #[test]
    fn event_name() {
        assert_eq!(Event::Initialize.name(), "initialize");
        assert_eq!(Event::SubmitRequested.name(), "submit_requested");
        assert_eq!(
            Event::RegionSelected { code: "SP".into() }.name(),
            "region_selected"
        );
    }

    #[test]
    fn event_is_user_initiated() {
        assert!(!Event::Noop.is_user_initiated());
        assert!(!Event::Initialize.is_user_initiated());
        assert!(!Event::SubmitCompleted(Ok(())).is_user_initiated());
        assert!(Event::ItemToggled { id: ItemId(3) }.is_user_initiated());
        assert!(Event::MapClicked { lat: 1.0, lon: 2.0 }.is_user_initiated());
    }

    #[test]
    fn field_changed_round_trips_through_json() {
        let event = Event::FieldChanged {
            field: ContactField::Whatsapp,
            value: "11999990000".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"whatsapp\""));
        assert_eq!(serde_json::from_str::<Event>(&json).unwrap(), event);
    }

    #[test]
    fn unknown_field_name_does_not_deserialize() {
        let json = r#"{"FieldChanged":{"field":"unknown","value":"x"}}"#;
        assert!(serde_json::from_str::<Event>(json).is_err());
    }
}
