use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::format::format_elapsed;
use super::session::{Session, SessionError, SessionSummary};
use super::stats::QualityBand;
use crate::clock::Clock;
use crate::sampler::{Permission, Sampler, SamplerError, SamplerState};
use crate::store::{SessionStore, StoreError};

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Sampler(#[from] SamplerError),

    #[error("a sleep session is already being tracked")]
    AlreadyTracking,

    #[error("no sleep session is being tracked")]
    NotTracking,

    #[error("session {0} not found")]
    NotFound(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Live view of the tracker
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingStatus {
    pub state: SamplerState,
    pub permission: Permission,
    pub needs_onboarding: bool,
    pub session_id: Option<String>,
    pub start_time: Option<i64>,
    pub current_level: u8,
    pub current_band: QualityBand,
    pub elapsed_ms: i64,
    pub elapsed: String,
    pub error: Option<String>,
}

/// Ties the sampler, the reducer and the store into sleep sessions.
///
/// At most one session is open at a time. It is closed and persisted when
/// tracking stops.
pub struct SleepTracker {
    sampler: Sampler,
    store: SessionStore,
    clock: Arc<dyn Clock>,
    current: Option<Session>,
}

impl SleepTracker {
    pub fn new(sampler: Sampler, store: SessionStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            sampler,
            store,
            clock,
            current: None,
        }
    }

    /// Ask for audio access; a grant is remembered across runs
    pub async fn request_access(&mut self) -> Result<bool, TrackerError> {
        let granted = self.sampler.request_access().await;

        if granted && !self.store.permission_granted() {
            self.store.set_permission_granted(true)?;
        }

        Ok(granted)
    }

    /// True until audio access has been granted once
    pub fn needs_onboarding(&self) -> bool {
        !self.store.permission_granted()
    }

    /// Open a session and start sampling
    pub async fn start_tracking(&mut self) -> Result<Session, TrackerError> {
        if self.current.is_some() {
            warn!("Tracking already started");
            return Err(TrackerError::AlreadyTracking);
        }

        let session = Session::open(Uuid::new_v4().to_string(), self.clock.now_millis());

        info!("Starting sleep session: {}", session.id());

        // A failed start leaves no open session behind
        self.sampler.start().await?;

        self.current = Some(session.clone());

        info!("Sleep session {} tracking", session.id());

        Ok(session)
    }

    /// Stop sampling, close the open session and persist it
    pub async fn stop_tracking(&mut self) -> Result<Session, TrackerError> {
        let Some(mut session) = self.current.take() else {
            warn!("Tracking not active");
            return Err(TrackerError::NotTracking);
        };

        info!("Stopping sleep session: {}", session.id());

        // Nothing is stored for a night whose sampling task died
        let readings = match self.sampler.stop().await {
            Ok(readings) => readings,
            Err(e) => {
                error!("Discarding sleep session {}: {}", session.id(), e);
                return Err(e.into());
            }
        };
        session.close(self.clock.now_millis(), readings)?;

        info!(
            "Sleep session {} complete: {} readings, avg {}, peak {}, {} spikes ({})",
            session.id(),
            session.readings().len(),
            session.average_level(),
            session.peak_level(),
            session.spike_count(),
            session.quality_band()
        );

        if let Err(e) = self.store.add(session.clone()) {
            error!("Failed to persist session {}: {}", session.id(), e);
            return Err(e.into());
        }

        Ok(session)
    }

    pub fn status(&self) -> TrackingStatus {
        let current_level = self.sampler.current_level();
        let elapsed_ms = self
            .current
            .as_ref()
            .map(|s| (self.clock.now_millis() - s.start_time()).max(0))
            .unwrap_or(0);

        TrackingStatus {
            state: self.sampler.state(),
            permission: self.sampler.permission(),
            needs_onboarding: self.needs_onboarding(),
            session_id: self.current.as_ref().map(|s| s.id().to_string()),
            start_time: self.current.as_ref().map(Session::start_time),
            current_level,
            current_band: QualityBand::for_level(current_level),
            elapsed_ms,
            elapsed: format_elapsed(elapsed_ms),
            error: self.sampler.error().map(str::to_string),
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.current.is_some()
    }

    /// The open session, if tracking
    pub fn current_session(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    pub fn current_level(&self) -> u8 {
        self.sampler.current_level()
    }

    pub fn subscribe_level(&self) -> watch::Receiver<u8> {
        self.sampler.subscribe_level()
    }

    pub fn sessions(&self) -> &[Session] {
        self.store.sessions()
    }

    pub fn summaries(&self) -> Vec<SessionSummary> {
        self.store.summaries()
    }

    pub fn session(&self, id: &str) -> Option<&Session> {
        self.store.get(id)
    }

    pub fn last_session(&self) -> Option<&Session> {
        self.store.last()
    }

    pub fn delete_session(&mut self, id: &str) -> Result<(), TrackerError> {
        if self.store.delete(id)? {
            Ok(())
        } else {
            Err(TrackerError::NotFound(id.to_string()))
        }
    }

    /// Release the audio input without recording anything further.
    ///
    /// An open session is discarded.
    pub fn shutdown(&mut self) {
        if let Some(session) = self.current.take() {
            warn!("Discarding open session {} on shutdown", session.id());
        }
        self.sampler.shutdown();
    }
}
