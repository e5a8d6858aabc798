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

//! The note event wire format.
//!
//! Two message kinds, note-on and note-off, distinguished by a tag byte
//! following a version byte. All multi-byte values are big-endian. Every
//! length-prefixed field is validated against its maximum before any
//! allocation happens, and a malformed message always yields an error rather
//! than a partial event.

use std::fmt;

use crate::synth::Waveform;

/// Current wire format version. Decoders accept anything up to this.
pub const PROTOCOL_VERSION: u8 = 1;

/// Maximum encoded length of an instrument id, in bytes.
pub const MAX_INSTRUMENT_ID_LEN: usize = 64;

const TAG_NOTE_ON: u8 = 0x01;
const TAG_NOTE_OFF: u8 = 0x02;

/// Error types for note event decoding.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),

    #[error("unknown message tag {0:#04x}")]
    UnknownTag(u8),

    #[error("instrument id length {0} exceeds maximum of {MAX_INSTRUMENT_ID_LEN} bytes")]
    InstrumentIdTooLong(usize),

    #[error("instrument id is not valid UTF-8")]
    InvalidInstrumentId,

    #[error("message truncated")]
    UnexpectedEof,

    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),
}

/// The unique correlation key linking a note-on to its later note-off.
///
/// Chosen by the sender; unique among notes simultaneously in flight. Reuse
/// after release is permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoteId(u128);

impl NoteId {
    /// Generates a fresh random id.
    pub fn generate() -> NoteId {
        NoteId(rand::random())
    }

    pub fn from_bytes(bytes: [u8; 16]) -> NoteId {
        NoteId(u128::from_be_bytes(bytes))
    }

    pub fn to_bytes(self) -> [u8; 16] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Periodic pitch modulation parameters, in Hz and cents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vibrato {
    pub rate_hz: f32,
    pub depth_cents: f32,
}

/// A note-on event: everything a receiver needs to synthesize and start one
/// note.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteOnEvent {
    /// Advisory instrument name, at most [`MAX_INSTRUMENT_ID_LEN`] bytes.
    pub instrument_id: String,
    pub waveform: Waveform,
    pub frequency_hz: f32,
    /// Note velocity in [0, 1].
    pub velocity: f32,
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
    /// When true the receiver holds a sustain loop until the note-off.
    pub sustain_loop: bool,
    /// Optional on the wire, guarded by a presence flag.
    pub vibrato: Option<Vibrato>,
    pub id: NoteId,
}

/// A note-off event: terminates the note registered under `id`, if any.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteOffEvent {
    pub id: NoteId,
}

/// A decoded note event message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    NoteOn(NoteOnEvent),
    NoteOff(NoteOffEvent),
}

impl Message {
    /// Encodes the message, including version and tag bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64);
        buf.push(PROTOCOL_VERSION);
        match self {
            Message::NoteOn(event) => {
                buf.push(TAG_NOTE_ON);
                let id_bytes = event.instrument_id.as_bytes();
                debug_assert!(id_bytes.len() <= MAX_INSTRUMENT_ID_LEN);
                buf.extend_from_slice(&(id_bytes.len() as u16).to_be_bytes());
                buf.extend_from_slice(id_bytes);
                buf.push(event.waveform.to_wire());
                buf.extend_from_slice(&event.frequency_hz.to_be_bytes());
                buf.extend_from_slice(&event.velocity.to_be_bytes());
                buf.extend_from_slice(&event.attack.to_be_bytes());
                buf.extend_from_slice(&event.decay.to_be_bytes());
                buf.extend_from_slice(&event.sustain.to_be_bytes());
                buf.extend_from_slice(&event.release.to_be_bytes());
                buf.push(event.sustain_loop as u8);
                match event.vibrato {
                    Some(vibrato) => {
                        buf.push(1);
                        buf.extend_from_slice(&vibrato.rate_hz.to_be_bytes());
                        buf.extend_from_slice(&vibrato.depth_cents.to_be_bytes());
                    }
                    None => buf.push(0),
                }
                buf.extend_from_slice(&event.id.to_bytes());
            }
            Message::NoteOff(event) => {
                buf.push(TAG_NOTE_OFF);
                buf.extend_from_slice(&event.id.to_bytes());
            }
        }
        buf
    }

    /// Decodes a message, rejecting unknown versions, unknown tags,
    /// over-length fields, truncation, and trailing bytes.
    pub fn decode(bytes: &[u8]) -> Result<Message, ProtocolError> {
        let mut reader = Reader::new(bytes);

        let version = reader.take_u8()?;
        if version > PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion(version));
        }

        let message = match reader.take_u8()? {
            TAG_NOTE_ON => {
                let id_len = reader.take_u16()? as usize;
                // Validate before allocating anything for the field.
                if id_len > MAX_INSTRUMENT_ID_LEN {
                    return Err(ProtocolError::InstrumentIdTooLong(id_len));
                }
                let instrument_id = String::from_utf8(reader.take_bytes(id_len)?.to_vec())
                    .map_err(|_| ProtocolError::InvalidInstrumentId)?;
                let waveform = Waveform::from_wire(reader.take_u8()?);
                let frequency_hz = reader.take_f32()?;
                let velocity = reader.take_f32()?;
                let attack = reader.take_f32()?;
                let decay = reader.take_f32()?;
                let sustain = reader.take_f32()?;
                let release = reader.take_f32()?;
                let sustain_loop = reader.take_u8()? != 0;
                let vibrato = if reader.take_u8()? != 0 {
                    Some(Vibrato {
                        rate_hz: reader.take_f32()?,
                        depth_cents: reader.take_f32()?,
                    })
                } else {
                    None
                };
                let id = NoteId::from_bytes(reader.take_id()?);
                Message::NoteOn(NoteOnEvent {
                    instrument_id,
                    waveform,
                    frequency_hz,
                    velocity,
                    attack,
                    decay,
                    sustain,
                    release,
                    sustain_loop,
                    vibrato,
                    id,
                })
            }
            TAG_NOTE_OFF => Message::NoteOff(NoteOffEvent {
                id: NoteId::from_bytes(reader.take_id()?),
            }),
            tag => return Err(ProtocolError::UnknownTag(tag)),
        };

        reader.finish()?;
        Ok(message)
    }
}

/// Bounds-checked reader over a message payload.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Reader<'a> {
        Reader { bytes, pos: 0 }
    }

    fn take_bytes(&mut self, len: usize) -> Result<&'a [u8], ProtocolError> {
        if self.bytes.len() - self.pos < len {
            return Err(ProtocolError::UnexpectedEof);
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn take_u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take_bytes(1)?[0])
    }

    fn take_u16(&mut self) -> Result<u16, ProtocolError> {
        let bytes = self.take_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn take_f32(&mut self) -> Result<f32, ProtocolError> {
        let bytes = self.take_bytes(4)?;
        Ok(f32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn take_id(&mut self) -> Result<[u8; 16], ProtocolError> {
        let bytes = self.take_bytes(16)?;
        let mut id = [0u8; 16];
        id.copy_from_slice(bytes);
        Ok(id)
    }

    fn finish(self) -> Result<(), ProtocolError> {
        let remaining = self.bytes.len() - self.pos;
        if remaining > 0 {
            return Err(ProtocolError::TrailingBytes(remaining));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn note_on() -> NoteOnEvent {
        NoteOnEvent {
            instrument_id: "piano".to_string(),
            waveform: Waveform::Sine,
            frequency_hz: 440.0,
            velocity: 1.0,
            attack: 0.01,
            decay: 0.1,
            sustain: 0.7,
            release: 0.2,
            sustain_loop: true,
            vibrato: Some(Vibrato {
                rate_hz: 5.0,
                depth_cents: 10.0,
            }),
            id: NoteId::generate(),
        }
    }

    #[test]
    fn test_note_on_round_trip() {
        let message = Message::NoteOn(note_on());
        assert_eq!(Message::decode(&message.encode()).unwrap(), message);
    }

    #[test]
    fn test_note_off_round_trip() {
        let message = Message::NoteOff(NoteOffEvent {
            id: NoteId::generate(),
        });
        assert_eq!(Message::decode(&message.encode()).unwrap(), message);
    }

    #[test]
    fn test_boundary_values_round_trip() {
        let boundary = NoteOnEvent {
            instrument_id: String::new(),
            waveform: Waveform::Noise,
            frequency_hz: 0.0,
            velocity: 0.0,
            attack: 0.0,
            decay: 0.0,
            sustain: 0.0,
            release: 0.0,
            sustain_loop: false,
            vibrato: None,
            id: NoteId::from_bytes([0; 16]),
        };
        let message = Message::NoteOn(boundary);
        assert_eq!(Message::decode(&message.encode()).unwrap(), message);

        let max_id = NoteOnEvent {
            instrument_id: "x".repeat(MAX_INSTRUMENT_ID_LEN),
            velocity: 1.0,
            id: NoteId::from_bytes([0xff; 16]),
            ..note_on()
        };
        let message = Message::NoteOn(max_id);
        assert_eq!(Message::decode(&message.encode()).unwrap(), message);
    }

    #[test]
    fn test_rejects_over_length_instrument_id() {
        // A hand-built message claiming the largest instrument id the u16
        // length field can express, far over the 64 byte maximum. The claim
        // must be rejected before any allocation for the field.
        let mut bytes = vec![PROTOCOL_VERSION, 0x01];
        bytes.extend_from_slice(&u16::MAX.to_be_bytes());
        bytes.extend_from_slice(&[0u8; 32]);
        assert_eq!(
            Message::decode(&bytes),
            Err(ProtocolError::InstrumentIdTooLong(u16::MAX as usize))
        );
    }

    #[test]
    fn test_rejects_truncated_message() {
        let encoded = Message::NoteOn(note_on()).encode();
        for len in 0..encoded.len() {
            let result = Message::decode(&encoded[..len]);
            assert!(result.is_err(), "decode of {} byte prefix succeeded", len);
        }
    }

    #[test]
    fn test_rejects_trailing_bytes() {
        let mut encoded = Message::NoteOff(NoteOffEvent {
            id: NoteId::generate(),
        })
        .encode();
        encoded.push(0);
        assert_eq!(
            Message::decode(&encoded),
            Err(ProtocolError::TrailingBytes(1))
        );
    }

    #[test]
    fn test_rejects_unknown_version() {
        let mut encoded = Message::NoteOff(NoteOffEvent {
            id: NoteId::generate(),
        })
        .encode();
        encoded[0] = PROTOCOL_VERSION + 1;
        assert_eq!(
            Message::decode(&encoded),
            Err(ProtocolError::UnsupportedVersion(PROTOCOL_VERSION + 1))
        );
    }

    #[test]
    fn test_rejects_unknown_tag() {
        let bytes = vec![PROTOCOL_VERSION, 0x7f];
        assert_eq!(Message::decode(&bytes), Err(ProtocolError::UnknownTag(0x7f)));
    }

    #[test]
    fn test_unknown_waveform_byte_decodes_as_silence() {
        let mut encoded = Message::NoteOn(NoteOnEvent {
            instrument_id: String::new(),
            ..note_on()
        })
        .encode();
        // With an empty instrument id the waveform byte sits right after the
        // version, tag, and length prefix.
        encoded[4] = 200;
        match Message::decode(&encoded).unwrap() {
            Message::NoteOn(event) => assert_eq!(event.waveform, Waveform::Silence),
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let mut bytes = vec![PROTOCOL_VERSION, 0x01];
        bytes.extend_from_slice(&2u16.to_be_bytes());
        bytes.extend_from_slice(&[0xff, 0xfe]);
        bytes.extend_from_slice(&[0u8; 60]);
        assert_eq!(
            Message::decode(&bytes),
            Err(ProtocolError::InvalidInstrumentId)
        );
    }
}
