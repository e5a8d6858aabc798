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

//! A mock backend. Doesn't actually play anything.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{AudioBackend, BackendError, BufferId, SourceId};

/// A backend operation as observed by the mock.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    AllocateSource(SourceId),
    UploadBuffer { buffer: BufferId, samples: usize, sample_rate: u32 },
    Bind { source: SourceId, buffer: BufferId },
    Play { source: SourceId, looping: bool },
    Stop(SourceId),
    Unbind(SourceId),
    DeleteBuffer(BufferId),
}

#[derive(Default)]
struct SourceState {
    bound: Option<BufferId>,
    playing: bool,
    looping: bool,
}

#[derive(Default)]
struct Inner {
    ops: Vec<Op>,
    sources: HashMap<SourceId, SourceState>,
    buffers: HashMap<BufferId, usize>,
    next_source: u32,
    next_buffer: u32,
    fail_allocate: bool,
    fail_upload: bool,
}

/// A mock audio backend that records every call and simulates source state.
/// Clones share state so tests can inspect a backend they've handed to the
/// engine.
#[derive(Clone, Default)]
pub struct MockBackend {
    inner: Arc<Mutex<Inner>>,
}

impl MockBackend {
    pub fn new() -> MockBackend {
        MockBackend::default()
    }

    /// Makes subsequent source allocations fail.
    #[cfg(test)]
    pub fn fail_allocations(&self, fail: bool) {
        self.inner.lock().fail_allocate = fail;
    }

    /// Makes subsequent buffer uploads fail.
    #[cfg(test)]
    pub fn fail_uploads(&self, fail: bool) {
        self.inner.lock().fail_upload = fail;
    }

    /// Returns every operation observed so far.
    #[cfg(test)]
    pub fn ops(&self) -> Vec<Op> {
        self.inner.lock().ops.clone()
    }

    /// Returns the number of buffer uploads observed so far.
    #[cfg(test)]
    pub fn upload_count(&self) -> usize {
        self.inner
            .lock()
            .ops
            .iter()
            .filter(|op| matches!(op, Op::UploadBuffer { .. }))
            .count()
    }

    /// Simulates a one-shot source reaching the end of its buffer.
    #[cfg(test)]
    pub fn finish(&self, source: SourceId) {
        if let Some(state) = self.inner.lock().sources.get_mut(&source) {
            state.playing = false;
        }
    }

    /// Returns true if the buffer handle is still uploaded.
    #[cfg(test)]
    pub fn has_buffer(&self, buffer: BufferId) -> bool {
        self.inner.lock().buffers.contains_key(&buffer)
    }
}

impl AudioBackend for MockBackend {
    fn allocate_source(&mut self) -> Result<SourceId, BackendError> {
        let mut inner = self.inner.lock();
        if inner.fail_allocate {
            return Err(BackendError::SourceAllocation("mock allocation failure".into()));
        }
        inner.next_source += 1;
        let id = SourceId(inner.next_source);
        inner.sources.insert(id, SourceState::default());
        inner.ops.push(Op::AllocateSource(id));
        Ok(id)
    }

    fn upload_buffer(&mut self, samples: &[i16], sample_rate: u32) -> Result<BufferId, BackendError> {
        let mut inner = self.inner.lock();
        if inner.fail_upload {
            return Err(BackendError::BufferUpload("mock upload failure".into()));
        }
        inner.next_buffer += 1;
        let id = BufferId(inner.next_buffer);
        inner.buffers.insert(id, samples.len());
        inner.ops.push(Op::UploadBuffer {
            buffer: id,
            samples: samples.len(),
            sample_rate,
        });
        Ok(id)
    }

    fn bind(&mut self, source: SourceId, buffer: BufferId) -> Result<(), BackendError> {
        let mut inner = self.inner.lock();
        if !inner.buffers.contains_key(&buffer) {
            return Err(BackendError::UnknownBuffer(buffer));
        }
        let state = inner
            .sources
            .get_mut(&source)
            .ok_or(BackendError::UnknownSource(source))?;
        state.bound = Some(buffer);
        inner.ops.push(Op::Bind { source, buffer });
        Ok(())
    }

    fn play(&mut self, source: SourceId, looping: bool) -> Result<(), BackendError> {
        let mut inner = self.inner.lock();
        let state = inner
            .sources
            .get_mut(&source)
            .ok_or(BackendError::UnknownSource(source))?;
        state.playing = true;
        state.looping = looping;
        inner.ops.push(Op::Play { source, looping });
        Ok(())
    }

    fn stop(&mut self, source: SourceId) -> Result<(), BackendError> {
        let mut inner = self.inner.lock();
        let state = inner
            .sources
            .get_mut(&source)
            .ok_or(BackendError::UnknownSource(source))?;
        state.playing = false;
        inner.ops.push(Op::Stop(source));
        Ok(())
    }

    fn unbind(&mut self, source: SourceId) -> Result<(), BackendError> {
        let mut inner = self.inner.lock();
        let state = inner
            .sources
            .get_mut(&source)
            .ok_or(BackendError::UnknownSource(source))?;
        state.bound = None;
        state.playing = false;
        inner.ops.push(Op::Unbind(source));
        Ok(())
    }

    fn delete_buffer(&mut self, buffer: BufferId) -> Result<(), BackendError> {
        let mut inner = self.inner.lock();
        if inner.buffers.remove(&buffer).is_none() {
            return Err(BackendError::UnknownBuffer(buffer));
        }
        inner.ops.push(Op::DeleteBuffer(buffer));
        Ok(())
    }

    fn is_playing(&self, source: SourceId) -> bool {
        self.inner
            .lock()
            .sources
            .get(&source)
            .map(|s| s.playing)
            .unwrap_or(false)
    }
}
