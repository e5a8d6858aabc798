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

//! Length-framed transport for note events.
//!
//! Frames are a big-endian u32 length followed by an encoded message. The
//! receiver side decodes each frame and forwards the result to the engine's
//! command channel; decoding happens on the I/O task and only the decoded
//! command crosses over to the engine thread. One malformed message is
//! logged and skipped, never fatal to the connection.

use std::io;

use crossbeam_channel::Sender;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::engine::EngineCommand;
use crate::protocol::Message;

/// Maximum frame payload length. The largest legal message is well under
/// this, so anything bigger is rejected before allocation.
pub const MAX_FRAME_LEN: usize = 256;

/// Writes one message as a length-prefixed frame.
pub async fn write_frame<W>(writer: &mut W, message: &Message) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let payload = message.encode();
    writer.write_u32(payload.len() as u32).await?;
    writer.write_all(&payload).await?;
    writer.flush().await
}

/// Reads one frame, returning `None` on a clean end of stream. Frames
/// claiming more than [`MAX_FRAME_LEN`] bytes are rejected without
/// allocating for them.
pub async fn read_frame<R>(reader: &mut R) -> io::Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    // Only an end of stream before any prefix byte is a clean disconnect; a
    // stream dying partway through the prefix is an error.
    let first = match reader.read_u8().await {
        Ok(byte) => byte,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    };
    let mut rest = [0u8; 3];
    reader.read_exact(&mut rest).await?;
    let len = u32::from_be_bytes([first, rest[0], rest[1], rest[2]]) as usize;
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame length {} exceeds maximum of {}", len, MAX_FRAME_LEN),
        ));
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

/// Accepts connections and forwards their note events to the engine.
pub async fn serve(listener: TcpListener, commands: Sender<EngineCommand>) -> io::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        info!(peer = %peer, "Sequencer connected.");
        let commands = commands.clone();
        tokio::spawn(async move {
            let mut reader = BufReader::new(stream);
            loop {
                match read_frame(&mut reader).await {
                    Ok(None) => {
                        info!(peer = %peer, "Sequencer disconnected.");
                        break;
                    }
                    Ok(Some(payload)) => match Message::decode(&payload) {
                        Ok(Message::NoteOn(event)) => {
                            if commands.send(EngineCommand::NoteOn(event)).is_err() {
                                break;
                            }
                        }
                        Ok(Message::NoteOff(event)) => {
                            if commands.send(EngineCommand::NoteOff(event.id)).is_err() {
                                break;
                            }
                        }
                        // One bad message doesn't take the connection down.
                        Err(e) => warn!(peer = %peer, error = %e, "Ignoring malformed note event."),
                    },
                    Err(e) => {
                        warn!(peer = %peer, error = %e, "Connection error.");
                        break;
                    }
                }
            }
        });
    }
}
