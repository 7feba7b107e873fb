pub mod geolocation;
pub mod http;

pub use self::geolocation::{Geolocation, GeolocationError, GeolocationOperation, GeolocationResult};
pub use self::http::{FetchError, FetchResult, LocalityRecord, RegionRecord};

// We use Crux's built-in Render capability directly because it provides
// all necessary functionality for triggering view updates.
pub use crux_core::render::Render;
pub use crux_http::Http;

use crate::app::App;
use crate::event::Event;

#[derive(crux_core::macros::Effect)]
#[effect(app = "App")]
pub struct Capabilities {
    pub http: Http<Event>,
    pub render: Render<Event>,
    pub geolocation: Geolocation<Event>,
}
