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

//! Content-addressed cache of uploaded sample buffers.

use std::collections::HashMap;

use tracing::debug;

use super::dsp;
use super::params::{BufferKind, SynthParams};
use crate::backend::{AudioBackend, BackendError, BufferId};

/// Deduplicates synthesis requests by parameter hash.
///
/// Entries are never evicted: the parameter space is bounded by the
/// instrument catalog in practice, and the buffers are shared by every voice
/// playing the same sound simultaneously.
pub struct BufferCache {
    entries: HashMap<u64, BufferId>,
    sample_rate: u32,
    fragment_seconds: f64,
    hold_seconds: f64,
    synth_count: u64,
}

impl BufferCache {
    pub fn new(sample_rate: u32, fragment_seconds: f64, hold_seconds: f64) -> BufferCache {
        BufferCache {
            entries: HashMap::new(),
            sample_rate,
            fragment_seconds,
            hold_seconds,
            synth_count: 0,
        }
    }

    /// Returns the buffer for the given parameters and kind, synthesizing
    /// and uploading it on first request.
    ///
    /// If the upload fails the error is returned and no entry is created, so
    /// a transient backend failure can't poison the cache.
    pub fn get_or_create(
        &mut self,
        backend: &mut dyn AudioBackend,
        params: &SynthParams,
        kind: BufferKind,
    ) -> Result<BufferId, BackendError> {
        let key = params.cache_key(kind);
        if let Some(&buffer) = self.entries.get(&key) {
            debug!(key = format!("{:016x}", key), %buffer, "Buffer cache hit.");
            return Ok(buffer);
        }

        let samples = match kind {
            BufferKind::Full => dsp::full_note(params, self.hold_seconds, self.sample_rate),
            BufferKind::Fragment => {
                dsp::sustain_fragment(params, self.fragment_seconds, self.sample_rate)
            }
            BufferKind::ReleaseTail => dsp::release_tail(params, self.sample_rate),
        };
        self.synth_count += 1;

        let buffer = backend.upload_buffer(&samples, self.sample_rate)?;
        self.entries.insert(key, buffer);
        debug!(
            key = format!("{:016x}", key),
            %buffer,
            samples = samples.len(),
            "Synthesized and cached buffer."
        );
        Ok(buffer)
    }

    /// The number of cached buffers.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// The number of times synthesis has actually run.
    #[cfg(test)]
    pub fn synth_count(&self) -> u64 {
        self.synth_count
    }
}
