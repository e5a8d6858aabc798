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

//! Real playback through cpal.
//!
//! Sources are slots in a tiny mixer. Each slot holds a shared reference to
//! an uploaded buffer plus a play cursor; the cpal output callback sums all
//! playing slots into the device stream, fanning the mono samples out to
//! every device channel. The stream is created on a dedicated thread because
//! cpal streams aren't `Send` and the engine runs on its own thread.

use std::collections::HashMap;
use std::error::Error;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use tracing::{error, info};

use super::{AudioBackend, BackendError, BufferId, SourceId};

#[derive(Default)]
struct Slot {
    buffer: Option<Arc<Vec<i16>>>,
    position: usize,
    looping: bool,
    playing: bool,
}

#[derive(Default)]
struct MixState {
    slots: HashMap<u32, Slot>,
    buffers: HashMap<u32, Arc<Vec<i16>>>,
}

/// An [`AudioBackend`] backed by the default cpal output device.
pub struct CpalBackend {
    state: Arc<Mutex<MixState>>,
    next_source: u32,
    next_buffer: u32,
    sample_rate: u32,
}

impl CpalBackend {
    /// Opens the default output device at the given sample rate.
    pub fn open(sample_rate: u32) -> Result<CpalBackend, Box<dyn Error>> {
        let state: Arc<Mutex<MixState>> = Arc::new(Mutex::new(MixState::default()));

        let (ready_tx, ready_rx) = mpsc::channel::<Result<String, String>>();

        // The stream must be created and kept alive on its own thread.
        let state_for_stream = state.clone();
        thread::spawn(move || {
            let host = cpal::default_host();
            let device = match host.default_output_device() {
                Some(device) => device,
                None => {
                    let _ = ready_tx.send(Err("no default audio output device".to_string()));
                    return;
                }
            };
            let name = device.name().unwrap_or_else(|_| "unknown".to_string());

            let channels = match device.default_output_config() {
                Ok(config) => config.channels(),
                Err(e) => {
                    let _ = ready_tx.send(Err(format!("unable to query output config: {}", e)));
                    return;
                }
            };
            let config = cpal::StreamConfig {
                channels,
                sample_rate,
                buffer_size: cpal::BufferSize::Default,
            };

            let mut callback = mix_callback(state_for_stream, channels as usize);
            let stream = device.build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| callback(data),
                |err| error!(error = %err, "cpal output stream error"),
                None,
            );

            match stream {
                Ok(stream) => {
                    if let Err(e) = stream.play() {
                        let _ = ready_tx.send(Err(format!("unable to start stream: {}", e)));
                        return;
                    }
                    let _ = ready_tx.send(Ok(name));
                    // Keep the stream alive for the life of the process.
                    loop {
                        thread::sleep(Duration::from_millis(100));
                    }
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(format!("unable to build stream: {}", e)));
                }
            }
        });

        match ready_rx.recv()? {
            Ok(name) => {
                info!(device = name, sample_rate, "Audio output started.");
                Ok(CpalBackend {
                    state,
                    next_source: 0,
                    next_buffer: 0,
                    sample_rate,
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Builds the mixing callback: sum every playing slot, advance cursors,
/// wrap looping slots and expire finished one-shot slots.
fn mix_callback(state: Arc<Mutex<MixState>>, channels: usize) -> impl FnMut(&mut [f32]) {
    move |data: &mut [f32]| {
        let mut state = state.lock();
        for frame in data.chunks_mut(channels) {
            let mut acc = 0.0f32;
            for slot in state.slots.values_mut() {
                if !slot.playing {
                    continue;
                }
                let Some(buffer) = slot.buffer.as_ref() else {
                    continue;
                };
                // An empty buffer has nothing to play, looping or not.
                if buffer.is_empty() {
                    slot.playing = false;
                    continue;
                }
                if slot.position >= buffer.len() {
                    if slot.looping {
                        slot.position = 0;
                    } else {
                        slot.playing = false;
                        continue;
                    }
                }
                acc += buffer[slot.position] as f32 / i16::MAX as f32;
                slot.position += 1;
            }
            let mixed = acc.clamp(-1.0, 1.0);
            for sample in frame.iter_mut() {
                *sample = mixed;
            }
        }
    }
}

impl AudioBackend for CpalBackend {
    fn allocate_source(&mut self) -> Result<SourceId, BackendError> {
        self.next_source += 1;
        let id = self.next_source;
        self.state.lock().slots.insert(id, Slot::default());
        Ok(SourceId(id))
    }

    fn upload_buffer(&mut self, samples: &[i16], sample_rate: u32) -> Result<BufferId, BackendError> {
        if sample_rate != self.sample_rate {
            return Err(BackendError::BufferUpload(format!(
                "buffer sample rate {} does not match stream rate {}",
                sample_rate, self.sample_rate
            )));
        }
        self.next_buffer += 1;
        let id = self.next_buffer;
        self.state
            .lock()
            .buffers
            .insert(id, Arc::new(samples.to_vec()));
        Ok(BufferId(id))
    }

    fn bind(&mut self, source: SourceId, buffer: BufferId) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        let shared = state
            .buffers
            .get(&buffer.0)
            .cloned()
            .ok_or(BackendError::UnknownBuffer(buffer))?;
        let slot = state
            .slots
            .get_mut(&source.0)
            .ok_or(BackendError::UnknownSource(source))?;
        slot.buffer = Some(shared);
        slot.position = 0;
        Ok(())
    }

    fn play(&mut self, source: SourceId, looping: bool) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        let slot = state
            .slots
            .get_mut(&source.0)
            .ok_or(BackendError::UnknownSource(source))?;
        slot.position = 0;
        slot.looping = looping;
        slot.playing = true;
        Ok(())
    }

    fn stop(&mut self, source: SourceId) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        let slot = state
            .slots
            .get_mut(&source.0)
            .ok_or(BackendError::UnknownSource(source))?;
        slot.playing = false;
        Ok(())
    }

    fn unbind(&mut self, source: SourceId) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        let slot = state
            .slots
            .get_mut(&source.0)
            .ok_or(BackendError::UnknownSource(source))?;
        slot.playing = false;
        slot.buffer = None;
        slot.position = 0;
        Ok(())
    }

    fn delete_buffer(&mut self, buffer: BufferId) -> Result<(), BackendError> {
        // Slots holding the Arc keep the samples alive until they unbind.
        if self.state.lock().buffers.remove(&buffer.0).is_none() {
            return Err(BackendError::UnknownBuffer(buffer));
        }
        Ok(())
    }

    fn is_playing(&self, source: SourceId) -> bool {
        self.state
            .lock()
            .slots
            .get(&source.0)
            .map(|slot| slot.playing)
            .unwrap_or(false)
    }
}
