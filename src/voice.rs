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

//! Voice management for note playback.
//!
//! A voice is the playback resource for one sounding note: a backend source
//! plus the buffer currently bound to it. Voices come from a pool that never
//! deletes sources; a released voice is stopped and its source reused.

use tracing::debug;

use crate::backend::{AudioBackend, BackendError, BufferId, SourceId};

/// The playback resource for a single sounding note.
#[derive(Debug)]
pub struct Voice {
    source: SourceId,
    bound: Option<BufferId>,
    looping: bool,
}

impl Voice {
    fn new(source: SourceId) -> Voice {
        Voice {
            source,
            bound: None,
            looping: false,
        }
    }

    #[cfg(test)]
    pub fn source(&self) -> SourceId {
        self.source
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Binds `buffer` and starts one-shot playback.
    pub fn play_once(
        &mut self,
        backend: &mut dyn AudioBackend,
        buffer: BufferId,
    ) -> Result<(), BackendError> {
        self.rebind(backend, buffer)?;
        backend.play(self.source, false)?;
        self.looping = false;
        Ok(())
    }

    /// Binds `buffer` and starts looped playback.
    pub fn play_loop(
        &mut self,
        backend: &mut dyn AudioBackend,
        buffer: BufferId,
    ) -> Result<(), BackendError> {
        self.rebind(backend, buffer)?;
        backend.play(self.source, true)?;
        self.looping = true;
        Ok(())
    }

    /// Stops playback and detaches the buffer. Never frees the buffer; the
    /// cache owns buffer lifetime, not the voice.
    pub fn stop_loop(&mut self, backend: &mut dyn AudioBackend) -> Result<(), BackendError> {
        backend.stop(self.source)?;
        backend.unbind(self.source)?;
        self.bound = None;
        self.looping = false;
        Ok(())
    }

    pub fn is_playing(&self, backend: &dyn AudioBackend) -> bool {
        backend.is_playing(self.source)
    }

    // A source must never be rebound while still flagged as playing its old
    // buffer, so stop and unbind always come first.
    fn rebind(
        &mut self,
        backend: &mut dyn AudioBackend,
        buffer: BufferId,
    ) -> Result<(), BackendError> {
        if self.bound.is_some() || self.is_playing(backend) {
            backend.stop(self.source)?;
            backend.unbind(self.source)?;
        }
        backend.bind(self.source, buffer)?;
        self.bound = Some(buffer);
        Ok(())
    }
}

/// A free list of voices over retained backend sources.
pub struct VoicePool {
    free: Vec<Voice>,
    allocated: usize,
}

impl VoicePool {
    pub fn new() -> VoicePool {
        VoicePool {
            free: Vec::new(),
            allocated: 0,
        }
    }

    /// Allocates `count` sources up front so the first notes don't pay for
    /// allocation.
    pub fn prealloc(
        &mut self,
        backend: &mut dyn AudioBackend,
        count: u32,
    ) -> Result<(), BackendError> {
        for _ in 0..count {
            let source = backend.allocate_source()?;
            self.allocated += 1;
            self.free.push(Voice::new(source));
        }
        Ok(())
    }

    /// Returns a free voice, allocating a new source when the pool is empty.
    pub fn acquire(&mut self, backend: &mut dyn AudioBackend) -> Result<Voice, BackendError> {
        if let Some(voice) = self.free.pop() {
            return Ok(voice);
        }
        let source = backend.allocate_source()?;
        self.allocated += 1;
        debug!(%source, total = self.allocated, "Allocated new voice source.");
        Ok(Voice::new(source))
    }

    /// Stops the voice and returns it to the free list. The source is
    /// retained for reuse.
    pub fn release(&mut self, backend: &mut dyn AudioBackend, mut voice: Voice) {
        // Both calls only fail on an unknown handle, which would mean the
        // voice was never ours; dropping it is the safe response.
        if backend.stop(voice.source).is_err() || backend.unbind(voice.source).is_err() {
            debug!(source = %voice.source, "Discarding voice with stale source handle.");
            return;
        }
        voice.bound = None;
        voice.looping = false;
        self.free.push(voice);
    }

    #[cfg(test)]
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    #[cfg(test)]
    pub fn allocated_count(&self) -> usize {
        self.allocated
    }
}

impl Default for VoicePool {
    fn default() -> Self {
        VoicePool::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::backend::mock::{MockBackend, Op};

    #[test]
    fn test_acquire_reuses_released_sources() {
        let mut backend = MockBackend::new();
        let mut pool = VoicePool::new();

        let voice = pool.acquire(&mut backend).unwrap();
        let source = voice.source();
        pool.release(&mut backend, voice);
        assert_eq!(pool.free_count(), 1);

        let voice = pool.acquire(&mut backend).unwrap();
        assert_eq!(voice.source(), source);
        assert_eq!(pool.allocated_count(), 1);
    }

    #[test]
    fn test_prealloc() {
        let mut backend = MockBackend::new();
        let mut pool = VoicePool::new();
        pool.prealloc(&mut backend, 4).unwrap();
        assert_eq!(pool.free_count(), 4);
        assert_eq!(pool.allocated_count(), 4);
    }

    #[test]
    fn test_rebind_stops_playback_first() {
        let mut backend = MockBackend::new();
        let mut pool = VoicePool::new();
        let mut voice = pool.acquire(&mut backend).unwrap();

        let first = backend.upload_buffer(&[0i16; 8], 44100).unwrap();
        let second = backend.upload_buffer(&[0i16; 8], 44100).unwrap();

        voice.play_loop(&mut backend, first).unwrap();
        voice.play_once(&mut backend, second).unwrap();

        let ops = backend.ops();
        // The second play must stop and unbind before binding again.
        let expected_tail = vec![
            Op::Stop(voice.source()),
            Op::Unbind(voice.source()),
            Op::Bind {
                source: voice.source(),
                buffer: second,
            },
            Op::Play {
                source: voice.source(),
                looping: false,
            },
        ];
        assert_eq!(&ops[ops.len() - 4..], expected_tail.as_slice());
        assert!(!voice.is_looping());
    }

    #[test]
    fn test_stop_loop_does_not_delete_buffer() {
        let mut backend = MockBackend::new();
        let mut pool = VoicePool::new();
        let mut voice = pool.acquire(&mut backend).unwrap();

        let buffer = backend.upload_buffer(&[0i16; 8], 44100).unwrap();
        voice.play_loop(&mut backend, buffer).unwrap();
        voice.stop_loop(&mut backend).unwrap();

        assert!(backend.has_buffer(buffer));
        assert!(!backend
            .ops()
            .iter()
            .any(|op| matches!(op, Op::DeleteBuffer(_))));
    }
}
