use crate::session::SleepTracker;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The one tracker; requests take turns on it
    pub tracker: Arc<Mutex<SleepTracker>>,
}

impl AppState {
    pub fn new(tracker: SleepTracker) -> Self {
        Self {
            tracker: Arc::new(Mutex::new(tracker)),
        }
    }
}
