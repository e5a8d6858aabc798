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
mod backend;
mod config;
mod engine;
mod instrument;
mod net;
mod protocol;
mod registry;
mod sender;
mod synth;
mod voice;

use std::error::Error;
use std::path::PathBuf;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use tokio::net::{TcpListener, TcpStream};
use tracing::info;

use crate::backend::cpal::CpalBackend;
use crate::backend::mock::MockBackend;
use crate::backend::AudioBackend;
use crate::config::Config;
use crate::engine::{command_channel, SynthEngine};
use crate::instrument::Instrument;
use crate::protocol::Vibrato;
use crate::sender::{NoteRequest, NoteSender};
use crate::synth::Waveform;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A distributed procedural note synthesis engine."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs a receiver: listens for note events and plays them.
    Serve {
        /// The path to an optional YAML config file.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// The address to listen on, overriding the config file.
        #[arg(short, long)]
        listen: Option<String>,
        /// Use a mock backend instead of real audio output.
        #[arg(long)]
        no_audio: bool,
    },
    /// Sends a single note to a receiver, holds it, then releases it.
    Play {
        /// The receiver address to connect to.
        address: String,
        /// The instrument to play.
        #[arg(short, long, default_value = "piano")]
        instrument: String,
        /// The waveform, overriding the instrument's default.
        /// One of: sine, square, saw, triangle, noise.
        #[arg(short, long)]
        waveform: Option<String>,
        /// The note frequency in Hz.
        #[arg(short, long, default_value_t = 440.0)]
        frequency: f32,
        /// The note velocity, 0 to 1.
        #[arg(long, default_value_t = 1.0)]
        velocity: f32,
        /// Attack time in seconds.
        #[arg(long, default_value_t = 0.01)]
        attack: f32,
        /// Decay time in seconds.
        #[arg(long, default_value_t = 0.1)]
        decay: f32,
        /// Sustain level, 0 to 1.
        #[arg(long, default_value_t = 0.7)]
        sustain: f32,
        /// Release time in seconds.
        #[arg(long, default_value_t = 0.2)]
        release: f32,
        /// How long to hold the note before releasing it, in seconds.
        #[arg(short, long, default_value_t = 1.0)]
        duration: f32,
        /// Vibrato rate in Hz.
        #[arg(long, default_value_t = 5.0)]
        vibrato_rate: f32,
        /// Vibrato depth in cents. Zero disables vibrato.
        #[arg(long, default_value_t = 0.0)]
        vibrato_depth: f32,
    },
    /// Lists the instrument catalog.
    Instruments {},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            listen,
            no_audio,
        } => {
            let mut config = Config::load(config.as_deref())?;
            if let Some(listen) = listen {
                config.set_listen(listen);
            }

            let backend: Box<dyn AudioBackend> = if no_audio {
                info!("Audio output disabled, using mock backend.");
                Box::new(MockBackend::new())
            } else {
                Box::new(CpalBackend::open(config.sample_rate())?)
            };

            let (command_tx, command_rx) = command_channel();
            let mut engine = SynthEngine::new(backend, &config);
            thread::spawn(move || engine.run(command_rx));

            let listener = TcpListener::bind(config.listen()).await?;
            info!(listen = config.listen(), "Listening for note events.");
            net::serve(listener, command_tx).await?;
        }
        Commands::Play {
            address,
            instrument,
            waveform,
            frequency,
            velocity,
            attack,
            decay,
            sustain,
            release,
            duration,
            vibrato_rate,
            vibrato_depth,
        } => {
            let instrument = Instrument::from_str(&instrument)?;
            let waveform = match waveform {
                Some(name) => parse_waveform(&name)?,
                None => instrument.default_waveform(),
            };
            let vibrato = if vibrato_depth != 0.0 {
                Some(Vibrato {
                    rate_hz: vibrato_rate,
                    depth_cents: vibrato_depth,
                })
            } else {
                None
            };

            let stream = TcpStream::connect(&address).await?;
            info!(address, "Connected to receiver.");
            let mut sender = NoteSender::new(stream);

            let id = sender
                .request_note_on(NoteRequest {
                    instrument_id: instrument.to_string(),
                    waveform,
                    frequency_hz: frequency,
                    velocity,
                    attack,
                    decay,
                    sustain,
                    release,
                    sustain_loop: true,
                    vibrato,
                })
                .await?;
            info!(note = %id, %instrument, frequency, "Note on.");

            tokio::time::sleep(Duration::from_secs_f32(duration.max(0.0))).await;

            sender.request_note_off(id).await?;
            info!(note = %id, "Note off.");

            // Give the receiver time to play the release tail before the
            // connection drops.
            tokio::time::sleep(Duration::from_secs_f32(release.max(0.0))).await;
        }
        Commands::Instruments {} => {
            println!("Instruments (count: {}):", Instrument::ALL.len());
            for instrument in Instrument::ALL {
                let (bank, program) = instrument.bank_and_program();
                println!(
                    "- {} (bank {}, program {}, {:?} fallback)",
                    instrument,
                    bank,
                    program,
                    instrument.default_waveform()
                );
            }
        }
    }

    Ok(())
}

fn parse_waveform(name: &str) -> Result<Waveform, Box<dyn Error>> {
    match name {
        "sine" => Ok(Waveform::Sine),
        "square" => Ok(Waveform::Square),
        "saw" => Ok(Waveform::Saw),
        "triangle" => Ok(Waveform::Triangle),
        "noise" => Ok(Waveform::Noise),
        _ => Err(format!("unknown waveform: {}", name).into()),
    }
}
