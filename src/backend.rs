// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Playback backend abstraction.
//!
//! The synthesis engine drives playback through [`AudioBackend`], a small
//! source/buffer contract: any backend that can hold mono 16-bit PCM buffers
//! and bind them to playable sources qualifies. Handles are plain small
//! integers so the engine stays testable without real audio hardware.

use std::fmt;

pub mod cpal;
pub mod mock;

/// Handle to a backend playback source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(pub u32);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source-{}", self.0)
    }
}

/// Handle to an uploaded sample buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u32);

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buffer-{}", self.0)
    }
}

/// Error types for backend operations.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("source allocation failed: {0}")]
    SourceAllocation(String),

    #[error("buffer upload failed: {0}")]
    BufferUpload(String),

    #[error("unknown source handle {0}")]
    UnknownSource(SourceId),

    #[error("unknown buffer handle {0}")]
    UnknownBuffer(BufferId),
}

/// The contract between the synthesis engine and a playback backend.
///
/// All calls on one backend must come from a single thread; the engine's
/// command loop is that thread. Playback calls are fire-and-forget.
pub trait AudioBackend: Send {
    /// Allocates a new playback source. Sources are expected to be cheap and
    /// are retained for the life of the process.
    fn allocate_source(&mut self) -> Result<SourceId, BackendError>;

    /// Uploads a mono 16-bit sample buffer, returning its handle.
    fn upload_buffer(&mut self, samples: &[i16], sample_rate: u32) -> Result<BufferId, BackendError>;

    /// Binds a buffer to a source. The source must not be playing.
    fn bind(&mut self, source: SourceId, buffer: BufferId) -> Result<(), BackendError>;

    /// Starts playback on a source, either one-shot or looped.
    fn play(&mut self, source: SourceId, looping: bool) -> Result<(), BackendError>;

    /// Stops playback on a source.
    fn stop(&mut self, source: SourceId) -> Result<(), BackendError>;

    /// Detaches the bound buffer from a source without touching the buffer
    /// itself. Buffers are shared; their lifetime belongs to the cache.
    fn unbind(&mut self, source: SourceId) -> Result<(), BackendError>;

    /// Frees an uploaded buffer. Only valid for buffers not owned by the
    /// cache.
    fn delete_buffer(&mut self, buffer: BufferId) -> Result<(), BackendError>;

    /// Returns true if the source is currently playing.
    fn is_playing(&self, source: SourceId) -> bool;
}
