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

//! Runtime configuration.

use std::error::Error;
use std::fs;
use std::path::Path;

use serde::Deserialize;

/// A YAML representation of the receiver configuration. Every field has a
/// default, so the file itself is optional.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Synthesis and playback sample rate in Hz.
    #[serde(default = "default_sample_rate")]
    sample_rate: u32,

    /// Length of the sustain loop fragment, in seconds.
    #[serde(default = "default_fragment_seconds")]
    fragment_seconds: f64,

    /// Sustain hold applied to non-looping notes, whose wire events carry no
    /// duration.
    #[serde(default = "default_full_note_hold_seconds")]
    full_note_hold_seconds: f64,

    /// Number of voice sources allocated at startup.
    #[serde(default = "default_prealloc_voices")]
    prealloc_voices: u32,

    /// Age after which a held looping note is reported as a diagnostic.
    #[serde(default = "default_orphan_after_seconds")]
    orphan_after_seconds: u64,

    /// Interval between housekeeping sweeps on the engine thread.
    #[serde(default = "default_sweep_interval_ms")]
    sweep_interval_ms: u64,

    /// Address the receiver listens on.
    #[serde(default = "default_listen")]
    listen: String,
}

fn default_sample_rate() -> u32 {
    44100
}

fn default_fragment_seconds() -> f64 {
    0.25
}

fn default_full_note_hold_seconds() -> f64 {
    0.25
}

fn default_prealloc_voices() -> u32 {
    8
}

fn default_orphan_after_seconds() -> u64 {
    300
}

fn default_sweep_interval_ms() -> u64 {
    50
}

fn default_listen() -> String {
    "127.0.0.1:8620".to_string()
}

impl Default for Config {
    fn default() -> Config {
        Config {
            sample_rate: default_sample_rate(),
            fragment_seconds: default_fragment_seconds(),
            full_note_hold_seconds: default_full_note_hold_seconds(),
            prealloc_voices: default_prealloc_voices(),
            orphan_after_seconds: default_orphan_after_seconds(),
            sweep_interval_ms: default_sweep_interval_ms(),
            listen: default_listen(),
        }
    }
}

impl Config {
    /// Loads configuration from a YAML file, or defaults if no path is
    /// given.
    pub fn load(path: Option<&Path>) -> Result<Config, Box<dyn Error>> {
        match path {
            Some(path) => Ok(serde_yml::from_str(&fs::read_to_string(path)?)?),
            None => Ok(Config::default()),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn fragment_seconds(&self) -> f64 {
        self.fragment_seconds
    }

    pub fn full_note_hold_seconds(&self) -> f64 {
        self.full_note_hold_seconds
    }

    pub fn prealloc_voices(&self) -> u32 {
        self.prealloc_voices
    }

    pub fn orphan_after_seconds(&self) -> u64 {
        self.orphan_after_seconds
    }

    pub fn sweep_interval_ms(&self) -> u64 {
        self.sweep_interval_ms
    }

    pub fn listen(&self) -> &str {
        &self.listen
    }

    pub fn set_listen(&mut self, listen: String) {
        self.listen = listen;
    }

    #[cfg(test)]
    pub fn set_prealloc_voices(&mut self, prealloc_voices: u32) {
        self.prealloc_voices = prealloc_voices;
    }
}
