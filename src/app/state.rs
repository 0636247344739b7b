//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::room::{RoomRegistry, RoomSettings};
use crate::store::MatchRecorder;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<RoomRegistry>,
}

impl AppState {
    pub fn new(config: Config, recorder: MatchRecorder) -> Self {
        let config = Arc::new(config);

        let settings = RoomSettings {
            default_points_limit: config.default_points_limit,
        };
        let registry = Arc::new(RoomRegistry::new(settings, recorder));

        Self { config, registry }
    }
}
