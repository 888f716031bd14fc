use crate::dashboard::Dashboard;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct AppState {
    pub dashboard: Arc<Dashboard>,
    /// Cancelled on shutdown; in-flight resolutions give up early.
    pub shutdown: CancellationToken,
}
