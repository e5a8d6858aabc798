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

/// The waveform shape of a synthesized note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Waveform {
    Sine,
    Square,
    Saw,
    Triangle,
    Noise,
    /// Fallback for unrecognized wire values. Synthesizes to all-zero
    /// samples rather than rejecting the note.
    Silence,
}

impl Waveform {
    /// Converts a wire byte into a waveform. Unrecognized values map to
    /// [`Waveform::Silence`] intentionally; a garbled waveform byte should
    /// mute the note, not fail the message.
    pub fn from_wire(byte: u8) -> Waveform {
        match byte {
            0 => Waveform::Sine,
            1 => Waveform::Square,
            2 => Waveform::Saw,
            3 => Waveform::Triangle,
            4 => Waveform::Noise,
            _ => Waveform::Silence,
        }
    }

    /// Converts the waveform into its wire byte.
    pub fn to_wire(self) -> u8 {
        match self {
            Waveform::Sine => 0,
            Waveform::Square => 1,
            Waveform::Saw => 2,
            Waveform::Triangle => 3,
            Waveform::Noise => 4,
            Waveform::Silence => 5,
        }
    }
}

/// Which of the three derived buffers to synthesize for a note.
///
/// Looping notes use a short sustain fragment while held and a release tail
/// once released; non-looping notes get a single full attack-to-release
/// buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Full,
    Fragment,
    ReleaseTail,
}

impl BufferKind {
    fn hash_tag(self) -> u64 {
        match self {
            BufferKind::Full => 0,
            BufferKind::Fragment => 1,
            BufferKind::ReleaseTail => 2,
        }
    }
}

/// The complete set of parameters determining a synthesized waveform.
///
/// Two equal parameter sets always produce byte-identical sample buffers,
/// which is what makes the buffer cache sound correct.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthParams {
    pub waveform: Waveform,
    pub frequency_hz: f64,
    /// Note velocity in [0, 1].
    pub velocity: f64,
    /// Attack time in seconds.
    pub attack: f64,
    /// Decay time in seconds.
    pub decay: f64,
    /// Sustain level in [0, 1].
    pub sustain_level: f64,
    /// Release time in seconds.
    pub release: f64,
    pub vibrato_rate_hz: f64,
    pub vibrato_depth_cents: f64,
}

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

impl SynthParams {
    /// Returns a copy with every field forced into its legal range.
    ///
    /// Out-of-range input is clamped rather than rejected: an audio glitch
    /// is preferable to a dropped note.
    pub fn clamped(&self) -> SynthParams {
        SynthParams {
            waveform: self.waveform,
            frequency_hz: self.frequency_hz.max(0.0),
            velocity: self.velocity.clamp(0.0, 1.0),
            attack: self.attack.max(0.0),
            decay: self.decay.max(0.0),
            sustain_level: self.sustain_level.clamp(0.0, 1.0),
            release: self.release.max(0.0),
            vibrato_rate_hz: self.vibrato_rate_hz.max(0.0),
            vibrato_depth_cents: self.vibrato_depth_cents,
        }
    }

    /// Computes the stable cache key for this parameter set and buffer kind.
    ///
    /// FNV-1a over the bit patterns of each field. The field order below is
    /// part of the cache contract and must not change between versions.
    pub fn cache_key(&self, kind: BufferKind) -> u64 {
        let mut h = FNV_OFFSET_BASIS;
        let mut mix = |v: u64| {
            h ^= v;
            h = h.wrapping_mul(FNV_PRIME);
        };
        mix(self.waveform.to_wire() as u64);
        mix(self.frequency_hz.to_bits());
        mix(self.attack.to_bits());
        mix(self.decay.to_bits());
        mix(self.sustain_level.to_bits());
        mix(self.release.to_bits());
        mix(self.vibrato_rate_hz.to_bits());
        mix(self.vibrato_depth_cents.to_bits());
        mix(self.velocity.to_bits());
        mix(kind.hash_tag());
        h
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn params() -> SynthParams {
        SynthParams {
            waveform: Waveform::Sine,
            frequency_hz: 440.0,
            velocity: 1.0,
            attack: 0.01,
            decay: 0.1,
            sustain_level: 0.7,
            release: 0.2,
            vibrato_rate_hz: 5.0,
            vibrato_depth_cents: 10.0,
        }
    }

    #[test]
    fn test_waveform_wire_round_trip() {
        for byte in 0..=4u8 {
            assert_eq!(Waveform::from_wire(byte).to_wire(), byte);
        }
        assert_eq!(Waveform::from_wire(5), Waveform::Silence);
        assert_eq!(Waveform::from_wire(255), Waveform::Silence);
        assert_eq!(Waveform::Silence.to_wire(), 5);
    }

    #[test]
    fn test_cache_key_stable() {
        assert_eq!(
            params().cache_key(BufferKind::Full),
            params().cache_key(BufferKind::Full)
        );
    }

    #[test]
    fn test_cache_key_varies_by_kind() {
        let p = params();
        let full = p.cache_key(BufferKind::Full);
        let fragment = p.cache_key(BufferKind::Fragment);
        let tail = p.cache_key(BufferKind::ReleaseTail);
        assert_ne!(full, fragment);
        assert_ne!(full, tail);
        assert_ne!(fragment, tail);
    }

    #[test]
    fn test_cache_key_varies_by_field() {
        let p = params();
        let base = p.cache_key(BufferKind::Full);

        let mut changed = p;
        changed.frequency_hz = 441.0;
        assert_ne!(base, changed.cache_key(BufferKind::Full));

        let mut changed = p;
        changed.waveform = Waveform::Square;
        assert_ne!(base, changed.cache_key(BufferKind::Full));

        let mut changed = p;
        changed.velocity = 0.5;
        assert_ne!(base, changed.cache_key(BufferKind::Full));
    }

    #[test]
    fn test_clamped() {
        let p = SynthParams {
            waveform: Waveform::Saw,
            frequency_hz: -20.0,
            velocity: 1.8,
            attack: -1.0,
            decay: -0.5,
            sustain_level: -0.2,
            release: -3.0,
            vibrato_rate_hz: -5.0,
            vibrato_depth_cents: -10.0,
        }
        .clamped();

        assert_eq!(p.frequency_hz, 0.0);
        assert_eq!(p.velocity, 1.0);
        assert_eq!(p.attack, 0.0);
        assert_eq!(p.decay, 0.0);
        assert_eq!(p.sustain_level, 0.0);
        assert_eq!(p.release, 0.0);
        assert_eq!(p.vibrato_rate_hz, 0.0);
        // Negative vibrato depth is a legal phase inversion, not an error.
        assert_eq!(p.vibrato_depth_cents, -10.0);
    }
}
