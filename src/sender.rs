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

//! The sequencer-facing sender.
//!
//! Wraps a transport writer and turns note requests into wire events,
//! generating a fresh [`NoteId`] per note-on. The sender is responsible for
//! eventually releasing every looping note it starts; there is no
//! timeout-based auto-release on the receiver.

use std::io;

use tokio::io::AsyncWrite;
use tracing::debug;

use crate::net::write_frame;
use crate::protocol::{
    Message, NoteId, NoteOffEvent, NoteOnEvent, Vibrato, MAX_INSTRUMENT_ID_LEN,
};
use crate::synth::Waveform;

/// A note-on request, before an id has been assigned.
#[derive(Debug, Clone)]
pub struct NoteRequest {
    pub instrument_id: String,
    pub waveform: Waveform,
    pub frequency_hz: f32,
    pub velocity: f32,
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
    pub sustain_loop: bool,
    pub vibrato: Option<Vibrato>,
}

impl NoteRequest {
    fn into_event(self, id: NoteId) -> NoteOnEvent {
        NoteOnEvent {
            instrument_id: self.instrument_id,
            waveform: self.waveform,
            frequency_hz: self.frequency_hz,
            velocity: self.velocity,
            attack: self.attack,
            decay: self.decay,
            sustain: self.sustain,
            release: self.release,
            sustain_loop: self.sustain_loop,
            vibrato: self.vibrato,
            id,
        }
    }
}

/// Sends note events over a reliable, ordered transport.
pub struct NoteSender<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> NoteSender<W> {
    pub fn new(writer: W) -> NoteSender<W> {
        NoteSender { writer }
    }

    /// Starts a note, returning the id to use for the eventual note-off.
    ///
    /// An over-length instrument id fails here, before anything is written;
    /// every receiver would reject the frame anyway.
    pub async fn request_note_on(&mut self, request: NoteRequest) -> io::Result<NoteId> {
        if request.instrument_id.len() > MAX_INSTRUMENT_ID_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "instrument id length {} exceeds maximum of {} bytes",
                    request.instrument_id.len(),
                    MAX_INSTRUMENT_ID_LEN
                ),
            ));
        }
        let id = NoteId::generate();
        let event = request.into_event(id);
        debug!(note = %id, instrument = event.instrument_id, "Sending note-on.");
        write_frame(&mut self.writer, &Message::NoteOn(event)).await?;
        Ok(id)
    }

    /// Releases a previously started note.
    pub async fn request_note_off(&mut self, id: NoteId) -> io::Result<()> {
        debug!(note = %id, "Sending note-off.");
        write_frame(&mut self.writer, &Message::NoteOff(NoteOffEvent { id })).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::net::read_frame;

    fn request() -> NoteRequest {
        NoteRequest {
            instrument_id: "violin".to_string(),
            waveform: Waveform::Saw,
            frequency_hz: 220.0,
            velocity: 0.8,
            attack: 0.02,
            decay: 0.05,
            sustain: 0.6,
            release: 0.3,
            sustain_loop: true,
            vibrato: Some(Vibrato {
                rate_hz: 5.0,
                depth_cents: 8.0,
            }),
        }
    }

    #[tokio::test]
    async fn test_note_on_then_off() {
        let (client, mut server) = tokio::io::duplex(1024);
        let mut sender = NoteSender::new(client);

        let id = sender.request_note_on(request()).await.unwrap();
        sender.request_note_off(id).await.unwrap();

        let payload = read_frame(&mut server).await.unwrap().unwrap();
        match Message::decode(&payload).unwrap() {
            Message::NoteOn(event) => {
                assert_eq!(event.id, id);
                assert_eq!(event.instrument_id, "violin");
                assert!(event.sustain_loop);
            }
            other => panic!("unexpected message {:?}", other),
        }

        let payload = read_frame(&mut server).await.unwrap().unwrap();
        assert_eq!(
            Message::decode(&payload).unwrap(),
            Message::NoteOff(NoteOffEvent { id })
        );
    }

    #[tokio::test]
    async fn test_rejects_over_length_instrument_id() {
        let (client, mut server) = tokio::io::duplex(1024);
        let mut sender = NoteSender::new(client);

        let mut over = request();
        over.instrument_id = "x".repeat(MAX_INSTRUMENT_ID_LEN + 1);
        let result = sender.request_note_on(over).await;
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::InvalidInput);

        // Nothing was written.
        drop(sender);
        assert!(read_frame(&mut server).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_each_note_gets_a_fresh_id() {
        let (client, _server) = tokio::io::duplex(4096);
        let mut sender = NoteSender::new(client);

        let first = sender.request_note_on(request()).await.unwrap();
        let second = sender.request_note_on(request()).await.unwrap();
        assert_ne!(first, second);
    }
}
