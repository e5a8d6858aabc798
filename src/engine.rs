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

//! The synthesis engine: consumes note events and drives playback.
//!
//! The engine owns the backend, buffer cache, voice pool, and note registry.
//! Producers on any thread hand it commands over a channel; the engine's
//! single consumer thread serializes every backend call and every registry
//! mutation, which is the ordering guarantee the whole system leans on. For
//! one note id, the note-on is always fully processed before a later
//! note-off is looked at.

use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, info, warn};

use crate::backend::AudioBackend;
use crate::config::Config;
use crate::protocol::{NoteId, NoteOnEvent};
use crate::registry::NoteRegistry;
use crate::synth::{BufferCache, BufferKind, SynthParams};
use crate::voice::{Voice, VoicePool};

/// A command for the engine's consumer thread.
#[derive(Debug)]
pub enum EngineCommand {
    NoteOn(NoteOnEvent),
    NoteOff(NoteId),
    Shutdown,
}

/// Creates the command channel for an engine.
pub fn command_channel() -> (Sender<EngineCommand>, Receiver<EngineCommand>) {
    crossbeam_channel::unbounded()
}

/// The synthesis and playback engine.
pub struct SynthEngine {
    backend: Box<dyn AudioBackend>,
    cache: BufferCache,
    pool: VoicePool,
    registry: NoteRegistry,
    /// Voices playing out a release tail after their registry entry was
    /// removed. Returned to the pool once the tail finishes.
    draining: Vec<Voice>,
    sweep_interval: Duration,
    orphan_after: Duration,
    last_orphan_report: Instant,
}

impl SynthEngine {
    /// Creates an engine over the given backend. Preallocation failures are
    /// not fatal; sources will be allocated on demand instead.
    pub fn new(mut backend: Box<dyn AudioBackend>, config: &Config) -> SynthEngine {
        let mut pool = VoicePool::new();
        if let Err(e) = pool.prealloc(backend.as_mut(), config.prealloc_voices()) {
            warn!(error = %e, "Unable to preallocate voices.");
        }
        SynthEngine {
            cache: BufferCache::new(
                config.sample_rate(),
                config.fragment_seconds(),
                config.full_note_hold_seconds(),
            ),
            backend,
            pool,
            registry: NoteRegistry::new(),
            draining: Vec::new(),
            sweep_interval: Duration::from_millis(config.sweep_interval_ms()),
            orphan_after: Duration::from_secs(config.orphan_after_seconds()),
            last_orphan_report: Instant::now(),
        }
    }

    /// Runs the engine until shutdown or until all senders are dropped.
    /// Every command is handled on this thread, with housekeeping sweeps in
    /// between.
    pub fn run(&mut self, commands: Receiver<EngineCommand>) {
        info!("Synthesis engine started.");
        loop {
            match commands.recv_timeout(self.sweep_interval) {
                Ok(EngineCommand::Shutdown) => break,
                Ok(command) => self.handle(command),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            self.sweep();
        }
        info!("Synthesis engine stopped.");
    }

    /// Handles a single command.
    pub fn handle(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::NoteOn(event) => self.note_on(event),
            EngineCommand::NoteOff(id) => self.note_off(id),
            EngineCommand::Shutdown => {}
        }
    }

    fn note_on(&mut self, event: NoteOnEvent) {
        let id = event.id;
        let params = params_from_event(&event);

        // Last-writer-wins on duplicate ids: force-release the old voice
        // rather than crash or leak it.
        if let Some(displaced) = self.registry.remove(id) {
            warn!(note = %id, "Duplicate note-on for live note, releasing previous voice.");
            self.pool.release(self.backend.as_mut(), displaced.voice);
        }

        let kind = if event.sustain_loop {
            BufferKind::Fragment
        } else {
            BufferKind::Full
        };
        let buffer = match self.cache.get_or_create(self.backend.as_mut(), &params, kind) {
            Ok(buffer) => buffer,
            Err(e) => {
                warn!(note = %id, error = %e, "Unable to synthesize note, dropping it.");
                return;
            }
        };

        let mut voice = match self.pool.acquire(self.backend.as_mut()) {
            Ok(voice) => voice,
            Err(e) => {
                warn!(note = %id, error = %e, "Unable to acquire voice, dropping note.");
                return;
            }
        };

        let started = if event.sustain_loop {
            voice.play_loop(self.backend.as_mut(), buffer)
        } else {
            voice.play_once(self.backend.as_mut(), buffer)
        };
        if let Err(e) = started {
            warn!(note = %id, error = %e, "Unable to start playback, dropping note.");
            self.pool.release(self.backend.as_mut(), voice);
            return;
        }

        debug!(
            note = %id,
            instrument = event.instrument_id,
            frequency_hz = event.frequency_hz,
            looping = event.sustain_loop,
            "Note on."
        );
        self.registry.insert(id, voice, params);
    }

    fn note_off(&mut self, id: NoteId) {
        let Some(note) = self.registry.remove(id) else {
            // Normal: the note may have finished naturally or the message
            // arrived late or duplicated.
            debug!(note = %id, "Note-off for unknown note, ignoring.");
            return;
        };
        let mut voice = note.voice;

        if !voice.is_looping() {
            debug!(note = %id, "Note off.");
            self.pool.release(self.backend.as_mut(), voice);
            return;
        }

        // A held note stops its sustain loop and plays the release tail
        // once, then drains back into the pool.
        if let Err(e) = voice.stop_loop(self.backend.as_mut()) {
            warn!(note = %id, error = %e, "Unable to stop sustain loop.");
            self.pool.release(self.backend.as_mut(), voice);
            return;
        }
        match self
            .cache
            .get_or_create(self.backend.as_mut(), &note.params, BufferKind::ReleaseTail)
        {
            Ok(tail) => {
                if let Err(e) = voice.play_once(self.backend.as_mut(), tail) {
                    warn!(note = %id, error = %e, "Unable to play release tail.");
                    self.pool.release(self.backend.as_mut(), voice);
                    return;
                }
                debug!(note = %id, "Note off, playing release tail.");
                self.draining.push(voice);
            }
            Err(e) => {
                // The note still stops; it just ends without its tail.
                warn!(note = %id, error = %e, "Unable to synthesize release tail.");
                self.pool.release(self.backend.as_mut(), voice);
            }
        }
    }

    /// Housekeeping: reclaims finished voices and reports long-held notes.
    pub fn sweep(&mut self) {
        for (id, note) in self.registry.drain_finished(self.backend.as_ref()) {
            debug!(note = %id, "Note finished naturally.");
            self.pool.release(self.backend.as_mut(), note.voice);
        }

        let mut index = 0;
        while index < self.draining.len() {
            if self.draining[index].is_playing(self.backend.as_ref()) {
                index += 1;
            } else {
                let voice = self.draining.swap_remove(index);
                self.pool.release(self.backend.as_mut(), voice);
            }
        }

        if self.last_orphan_report.elapsed() >= self.orphan_after {
            for id in self.registry.orphans(self.orphan_after) {
                warn!(note = %id, "Looping note held past the orphan threshold, still awaiting note-off.");
            }
            self.last_orphan_report = Instant::now();
        }
    }

    /// The number of notes currently registered.
    #[cfg(test)]
    pub fn active_notes(&self) -> usize {
        self.registry.len()
    }

    /// The number of voices currently draining release tails.
    #[cfg(test)]
    pub fn draining_voices(&self) -> usize {
        self.draining.len()
    }

    #[cfg(test)]
    pub fn cache(&self) -> &BufferCache {
        &self.cache
    }

    #[cfg(test)]
    pub fn pool(&self) -> &VoicePool {
        &self.pool
    }
}

/// Builds clamped synthesis parameters from a wire event. Absent vibrato
/// means none.
fn params_from_event(event: &NoteOnEvent) -> SynthParams {
    let (vibrato_rate_hz, vibrato_depth_cents) = match event.vibrato {
        Some(vibrato) => (vibrato.rate_hz as f64, vibrato.depth_cents as f64),
        None => (0.0, 0.0),
    };
    SynthParams {
        waveform: event.waveform,
        frequency_hz: event.frequency_hz as f64,
        velocity: event.velocity as f64,
        attack: event.attack as f64,
        decay: event.decay as f64,
        sustain_level: event.sustain as f64,
        release: event.release as f64,
        vibrato_rate_hz,
        vibrato_depth_cents,
    }
    .clamped()
}
