use std::sync::Arc;
use std::time::Duration;

use lobby_db::Database;
use lobby_gateway::dispatcher::Dispatcher;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub dispatcher: Dispatcher,
    pub jwt_secret: String,
    pub heartbeat: Duration,
    pub duplicate_window: Duration,
    pub max_upload_bytes: u64,
    /// Empty list means every MIME type is accepted.
    pub allowed_mime: Vec<String>,
}
