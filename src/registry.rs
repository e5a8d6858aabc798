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

//! The note registry: maps in-flight note ids to their active voices.
//!
//! Entries are inserted on note-on and removed on note-off or when a
//! non-looping note finishes on its own. All mutations happen on the
//! engine's command thread, which is what linearizes operations for the
//! same id; the invariant is at most one live entry per id.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::backend::AudioBackend;
use crate::protocol::NoteId;
use crate::synth::SynthParams;
use crate::voice::Voice;

/// A live note: its voice plus the parameters needed to synthesize its
/// release tail later.
pub struct ActiveNote {
    pub voice: Voice,
    pub params: SynthParams,
    started: Instant,
}

impl ActiveNote {
    /// How long this note has been sounding.
    pub fn age(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Maps note ids to active voices.
#[derive(Default)]
pub struct NoteRegistry {
    notes: HashMap<NoteId, ActiveNote>,
}

impl NoteRegistry {
    pub fn new() -> NoteRegistry {
        NoteRegistry::default()
    }

    /// Records a note-on. If the id already had a live entry the displaced
    /// note is returned so the caller can force-release its voice
    /// (last-writer-wins).
    pub fn insert(&mut self, id: NoteId, voice: Voice, params: SynthParams) -> Option<ActiveNote> {
        self.notes.insert(
            id,
            ActiveNote {
                voice,
                params,
                started: Instant::now(),
            },
        )
    }

    /// Removes and returns the entry for a note-off. `None` means the note
    /// already finished, the message was duplicated, or the id was garbage;
    /// all are expected and harmless.
    pub fn remove(&mut self, id: NoteId) -> Option<ActiveNote> {
        self.notes.remove(&id)
    }

    #[cfg(test)]
    pub fn contains(&self, id: NoteId) -> bool {
        self.notes.contains_key(&id)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    /// Removes and returns every non-looping note whose voice has finished
    /// playback on its own. Without this sweep a finished note's entry would
    /// leak until process exit.
    pub fn drain_finished(&mut self, backend: &dyn AudioBackend) -> Vec<(NoteId, ActiveNote)> {
        let finished: Vec<NoteId> = self
            .notes
            .iter()
            .filter(|(_, note)| !note.voice.is_looping() && !note.voice.is_playing(backend))
            .map(|(&id, _)| id)
            .collect();
        finished
            .into_iter()
            .filter_map(|id| self.notes.remove(&id).map(|note| (id, note)))
            .collect()
    }

    /// Returns the ids of looping notes that have been held longer than
    /// `max_age`. The sender owns their release; this exists for
    /// diagnostics.
    pub fn orphans(&self, max_age: Duration) -> Vec<NoteId> {
        self.notes
            .iter()
            .filter(|(_, note)| note.voice.is_looping() && note.age() > max_age)
            .map(|(&id, _)| id)
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::backend::AudioBackend as _;
    use crate::synth::Waveform;
    use crate::voice::VoicePool;

    fn params() -> SynthParams {
        SynthParams {
            waveform: Waveform::Sine,
            frequency_hz: 440.0,
            velocity: 1.0,
            attack: 0.01,
            decay: 0.1,
            sustain_level: 0.7,
            release: 0.2,
            vibrato_rate_hz: 0.0,
            vibrato_depth_cents: 0.0,
        }
    }

    #[test]
    fn test_at_most_one_entry_per_id() {
        let mut backend = MockBackend::new();
        let mut pool = VoicePool::new();
        let mut registry = NoteRegistry::new();
        let id = NoteId::generate();

        let first = pool.acquire(&mut backend).unwrap();
        let first_source = first.source();
        assert!(registry.insert(id, first, params()).is_none());
        assert_eq!(registry.len(), 1);

        // A duplicate insert displaces the original voice.
        let second = pool.acquire(&mut backend).unwrap();
        let displaced = registry.insert(id, second, params()).unwrap();
        assert_eq!(displaced.voice.source(), first_source);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_after_insert() {
        let mut backend = MockBackend::new();
        let mut pool = VoicePool::new();
        let mut registry = NoteRegistry::new();
        let id = NoteId::generate();

        let voice = pool.acquire(&mut backend).unwrap();
        registry.insert(id, voice, params());
        assert!(registry.contains(id));

        assert!(registry.remove(id).is_some());
        assert!(!registry.contains(id));
        // A second remove is a no-op.
        assert!(registry.remove(id).is_none());
    }

    #[test]
    fn test_drain_finished_ignores_looping_and_playing() {
        let mut backend = MockBackend::new();
        let mut pool = VoicePool::new();
        let mut registry = NoteRegistry::new();

        let buffer = backend.upload_buffer(&[0i16; 8], 44100).unwrap();

        let mut looping = pool.acquire(&mut backend).unwrap();
        looping.play_loop(&mut backend, buffer).unwrap();
        let looping_id = NoteId::generate();
        registry.insert(looping_id, looping, params());

        let mut one_shot = pool.acquire(&mut backend).unwrap();
        one_shot.play_once(&mut backend, buffer).unwrap();
        let one_shot_id = NoteId::generate();
        let one_shot_source = one_shot.source();
        registry.insert(one_shot_id, one_shot, params());

        // Nothing has finished yet.
        assert!(registry.drain_finished(&backend).is_empty());

        // The one-shot runs out; only it is drained.
        backend.finish(one_shot_source);
        let finished = registry.drain_finished(&backend);
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].0, one_shot_id);
        assert!(registry.contains(looping_id));
        assert!(!registry.contains(one_shot_id));
    }

    #[test]
    fn test_orphans_only_reports_old_looping_notes() {
        let mut backend = MockBackend::new();
        let mut pool = VoicePool::new();
        let mut registry = NoteRegistry::new();

        let buffer = backend.upload_buffer(&[0i16; 8], 44100).unwrap();
        let mut voice = pool.acquire(&mut backend).unwrap();
        voice.play_loop(&mut backend, buffer).unwrap();
        let id = NoteId::generate();
        registry.insert(id, voice, params());

        assert!(registry.orphans(Duration::from_secs(60)).is_empty());
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(registry.orphans(Duration::from_millis(1)), vec![id]);
    }
}
