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

//! The static instrument catalog.
//!
//! Maps logical instrument names to a General-MIDI bank/program pair for
//! soundbank-backed playback, and to a default waveform for the
//! soundbank-less synthesis path. The instrument id on the wire is
//! advisory; an unknown name simply falls back to defaults.

use std::fmt;
use std::str::FromStr;

use crate::synth::Waveform;

/// A logical instrument timbre.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instrument {
    Piano,
    RhodesPiano,
    ChorusedPiano,
    Guitar,
    AcousticSteel,
    OverDriven,
    Distortion,
    Violin,
    Viola,
    Cello,
    Strings,
    Harp,
    Sax,
    Flute,
    PanFlute,
    Trumpet,
    MutedTrumpet,
    Trombone,
    Brass,
    LeadChiff,
    LeadBass,
}

impl Instrument {
    /// Every instrument in the catalog.
    pub const ALL: [Instrument; 21] = [
        Instrument::Piano,
        Instrument::RhodesPiano,
        Instrument::ChorusedPiano,
        Instrument::Guitar,
        Instrument::AcousticSteel,
        Instrument::OverDriven,
        Instrument::Distortion,
        Instrument::Violin,
        Instrument::Viola,
        Instrument::Cello,
        Instrument::Strings,
        Instrument::Harp,
        Instrument::Sax,
        Instrument::Flute,
        Instrument::PanFlute,
        Instrument::Trumpet,
        Instrument::MutedTrumpet,
        Instrument::Trombone,
        Instrument::Brass,
        Instrument::LeadChiff,
        Instrument::LeadBass,
    ];

    /// The General-MIDI bank and program used when a soundbank is available.
    pub fn bank_and_program(self) -> (u8, u8) {
        match self {
            Instrument::Piano => (0, 0),
            Instrument::RhodesPiano => (0, 4),
            Instrument::ChorusedPiano => (0, 5),
            Instrument::Guitar => (0, 24),
            Instrument::AcousticSteel => (0, 25),
            Instrument::OverDriven => (0, 29),
            Instrument::Distortion => (0, 30),
            Instrument::Violin => (0, 40),
            Instrument::Viola => (0, 41),
            Instrument::Cello => (0, 42),
            Instrument::Strings => (0, 45),
            Instrument::Harp => (0, 46),
            Instrument::Sax => (0, 65),
            Instrument::Flute => (0, 73),
            Instrument::PanFlute => (0, 75),
            Instrument::Trumpet => (0, 56),
            Instrument::MutedTrumpet => (0, 59),
            Instrument::Trombone => (0, 57),
            Instrument::Brass => (0, 61),
            Instrument::LeadChiff => (0, 83),
            Instrument::LeadBass => (0, 87),
        }
    }

    /// The waveform used when synthesizing this instrument without a
    /// soundbank. Rough family timbres: bowed strings lean on saw, winds on
    /// sine, brass and plucked strings on square, keys on triangle.
    pub fn default_waveform(self) -> Waveform {
        match self {
            Instrument::Piano | Instrument::RhodesPiano | Instrument::ChorusedPiano => {
                Waveform::Triangle
            }
            Instrument::Guitar | Instrument::AcousticSteel | Instrument::Harp => Waveform::Square,
            Instrument::OverDriven | Instrument::Distortion => Waveform::Saw,
            Instrument::Violin
            | Instrument::Viola
            | Instrument::Cello
            | Instrument::Strings => Waveform::Saw,
            Instrument::Sax | Instrument::Flute | Instrument::PanFlute => Waveform::Sine,
            Instrument::Trumpet
            | Instrument::MutedTrumpet
            | Instrument::Trombone
            | Instrument::Brass => Waveform::Square,
            Instrument::LeadChiff => Waveform::Sine,
            Instrument::LeadBass => Waveform::Triangle,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Instrument::Piano => "piano",
            Instrument::RhodesPiano => "rhodes-piano",
            Instrument::ChorusedPiano => "chorused-piano",
            Instrument::Guitar => "guitar",
            Instrument::AcousticSteel => "acoustic-steel",
            Instrument::OverDriven => "over-driven",
            Instrument::Distortion => "distortion",
            Instrument::Violin => "violin",
            Instrument::Viola => "viola",
            Instrument::Cello => "cello",
            Instrument::Strings => "strings",
            Instrument::Harp => "harp",
            Instrument::Sax => "sax",
            Instrument::Flute => "flute",
            Instrument::PanFlute => "pan-flute",
            Instrument::Trumpet => "trumpet",
            Instrument::MutedTrumpet => "muted-trumpet",
            Instrument::Trombone => "trombone",
            Instrument::Brass => "brass",
            Instrument::LeadChiff => "lead-chiff",
            Instrument::LeadBass => "lead-bass",
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Instrument {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Instrument::ALL
            .iter()
            .find(|instrument| instrument.name() == s)
            .copied()
            .ok_or_else(|| format!("unknown instrument: {}", s))
    }
}
