//! Local media capture port.

use std::{fmt, sync::Arc};

use async_trait::async_trait;

use super::error::MediaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Video,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => f.write_str("audio"),
            Self::Video => f.write_str("video"),
        }
    }
}

/// Whether camera and microphone should be sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaPreference {
    pub video: bool,
    pub audio: bool,
}

impl MediaPreference {
    pub fn is_enabled(&self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Audio => self.audio,
            MediaKind::Video => self.video,
        }
    }

    pub fn with(mut self, kind: MediaKind, enabled: bool) -> Self {
        match kind {
            MediaKind::Audio => self.audio = enabled,
            MediaKind::Video => self.video = enabled,
        }
        self
    }

    pub fn toggled(self, kind: MediaKind) -> Self {
        self.with(kind, !self.is_enabled(kind))
    }
}

impl Default for MediaPreference {
    fn default() -> Self {
        Self {
            video: true,
            audio: true,
        }
    }
}

/// Which devices to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub video: bool,
    pub audio: bool,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            video: true,
            audio: true,
        }
    }
}

/// A live capture track.
pub trait MediaTrack: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;
    fn kind(&self) -> MediaKind;
    fn set_enabled(&self, enabled: bool);
    fn is_enabled(&self) -> bool;
    /// Release the underlying device. Idempotent.
    fn stop(&self);
}

/// The set of tracks held for one call.
#[derive(Debug, Clone, Default)]
pub struct LocalMedia {
    tracks: Vec<Arc<dyn MediaTrack>>,
}

impl LocalMedia {
    pub fn new(tracks: Vec<Arc<dyn MediaTrack>>) -> Self {
        Self { tracks }
    }

    pub fn tracks(&self) -> &[Arc<dyn MediaTrack>] {
        &self.tracks
    }

    pub fn set_enabled(&self, kind: MediaKind, enabled: bool) {
        for track in self.tracks.iter().filter(|t| t.kind() == kind) {
            track.set_enabled(enabled);
        }
    }

    pub fn apply_preference(&self, preference: MediaPreference) {
        self.set_enabled(MediaKind::Audio, preference.audio);
        self.set_enabled(MediaKind::Video, preference.video);
    }

    pub fn stop(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaCapture: Send + Sync {
    /// Open the requested devices.
    async fn acquire_local_media(
        &self,
        constraints: MediaConstraints,
    ) -> Result<LocalMedia, MediaError>;
}
