//! Deterministic stand-in for a camera/microphone stack.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::{LocalMedia, MediaCapture, MediaConstraints, MediaError, MediaKind, MediaTrack};

/// How the simulated devices answer an acquisition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureBehavior {
    Grant,
    Deny,
    NoDevice,
}

#[derive(Debug)]
pub struct SimulatedTrack {
    id: String,
    kind: MediaKind,
    enabled: AtomicBool,
    stopped: AtomicBool,
}

impl SimulatedTrack {
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl MediaTrack for SimulatedTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Simulated media capture with live-track accounting.
pub struct SimulatedMediaCapture {
    behavior: Mutex<CaptureBehavior>,
    latency: Duration,
    tracks: Mutex<Vec<Arc<SimulatedTrack>>>,
    next_id: AtomicU64,
}

impl SimulatedMediaCapture {
    pub fn new(behavior: CaptureBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            latency: Duration::ZERO,
            tracks: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn granting() -> Self {
        Self::new(CaptureBehavior::Grant)
    }

    pub fn denying() -> Self {
        Self::new(CaptureBehavior::Deny)
    }

    /// Delay every acquisition, as a permission prompt would.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn set_behavior(&self, behavior: CaptureBehavior) {
        *self.behavior.lock() = behavior;
    }

    /// Number of acquired tracks that have not been stopped.
    pub fn live_tracks(&self) -> usize {
        self.tracks.lock().iter().filter(|t| !t.is_stopped()).count()
    }

    /// Enabled flag of the newest live track of `kind`.
    pub fn track_enabled(&self, kind: MediaKind) -> Option<bool> {
        self.tracks
            .lock()
            .iter()
            .rev()
            .find(|t| t.kind == kind && !t.is_stopped())
            .map(|t| t.is_enabled())
    }

    fn new_track(&self, kind: MediaKind) -> Arc<SimulatedTrack> {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        Arc::new(SimulatedTrack {
            id: format!("{kind}-{n}"),
            kind,
            enabled: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
        })
    }
}

impl Default for SimulatedMediaCapture {
    fn default() -> Self {
        Self::granting()
    }
}

#[async_trait]
impl MediaCapture for SimulatedMediaCapture {
    async fn acquire_local_media(
        &self,
        constraints: MediaConstraints,
    ) -> Result<LocalMedia, MediaError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let behavior = *self.behavior.lock();
        match behavior {
            CaptureBehavior::Deny => return Err(MediaError::PermissionDenied),
            CaptureBehavior::NoDevice => {
                return Err(MediaError::DeviceUnavailable(
                    "no simulated device attached".to_string(),
                ));
            }
            CaptureBehavior::Grant => {}
        }

        let mut acquired = Vec::new();
        if constraints.audio {
            acquired.push(self.new_track(MediaKind::Audio));
        }
        if constraints.video {
            acquired.push(self.new_track(MediaKind::Video));
        }
        self.tracks.lock().extend(acquired.iter().cloned());

        let tracks = acquired
            .into_iter()
            .map(|t| t as Arc<dyn MediaTrack>)
            .collect();
        Ok(LocalMedia::new(tracks))
    }
}
