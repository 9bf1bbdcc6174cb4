use crate::config::ServerConfig;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use stormwatch_alert::limiter::CooldownTracker;
use stormwatch_notify::dispatcher::Dispatcher;
use stormwatch_storage::AlertStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<AlertStore>,
    pub limiter: Arc<CooldownTracker>,
    pub dispatcher: Arc<Dispatcher>,
    pub start_time: DateTime<Utc>,
    pub config: Arc<ServerConfig>,
}
