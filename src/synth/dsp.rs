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

//! Pure waveform and ADSR envelope synthesis.

use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::params::{SynthParams, Waveform};

/// Attack/decay ceiling for sustain loop fragments, in seconds. Keeps the
/// fragment nearly flat so it loops without an audible seam.
const FRAGMENT_RAMP_CAP: f64 = 0.02;

/// Minimum ramp used when a release tail is synthesized on its own.
const TAIL_RAMP: f64 = 0.001;

/// Denominator floor for degenerate zero-length envelope phases.
const EPSILON: f64 = 1e-9;

/// The noise generator is reseeded with this fixed value for every buffer so
/// identical parameters always yield identical samples. Cache correctness
/// depends on it.
const NOISE_SEED: u64 = 0;

/// Synthesizes `total_samples` of mono 16-bit audio for the given
/// parameters.
///
/// Per sample at time `t`: a vibrato-adjusted oscillator is evaluated at
/// phase `2π·f·t`, shaped by a linear ADSR envelope computed against the
/// buffer's total duration, scaled by velocity, and clamped to [-1, 1]
/// before quantization.
pub fn synthesize(params: &SynthParams, total_samples: u32, sample_rate: u32) -> Vec<i16> {
    let params = params.clamped();
    let sr = sample_rate as f64;
    let total_duration = total_samples as f64 / sr;

    let attack_end = params.attack;
    let decay_end = params.attack + params.decay;
    let release_start = total_duration - params.release;

    let mut rng = StdRng::seed_from_u64(NOISE_SEED);
    let mut out = Vec::with_capacity(total_samples as usize);

    for i in 0..total_samples {
        let t = i as f64 / sr;

        // Vibrato: sinusoidal pitch offset in cents.
        let cents = (2.0 * PI * params.vibrato_rate_hz * t).sin() * params.vibrato_depth_cents;
        let f = params.frequency_hz * (cents / 1200.0).exp2();

        let phase = 2.0 * PI * f * t;
        let wave = match params.waveform {
            Waveform::Sine => phase.sin(),
            Waveform::Square => phase.sin().signum(),
            Waveform::Saw => (2.0 / PI) * ((phase + PI).rem_euclid(2.0 * PI) - PI),
            Waveform::Triangle => (2.0 / PI) * phase.sin().asin(),
            Waveform::Noise => rng.gen::<f64>() * 2.0 - 1.0,
            Waveform::Silence => 0.0,
        };

        let env = if t < attack_end {
            t / attack_end.max(EPSILON)
        } else if t < decay_end {
            let u = (t - attack_end) / params.decay.max(EPSILON);
            1.0 + (params.sustain_level - 1.0) * u
        } else if t < release_start {
            params.sustain_level
        } else {
            let u = (t - release_start) / params.release.max(EPSILON);
            params.sustain_level * (1.0 - u)
        };

        let val = (wave * env * params.velocity).clamp(-1.0, 1.0);
        out.push((val * i16::MAX as f64) as i16);
    }

    out
}

/// Synthesizes the full attack-to-release buffer for a non-looping note.
///
/// The wire event carries no duration, so the sustain hold comes from
/// configuration.
pub fn full_note(params: &SynthParams, hold_seconds: f64, sample_rate: u32) -> Vec<i16> {
    let params = params.clamped();
    let total = params.attack + params.decay + hold_seconds.max(0.0) + params.release;
    let total_samples = ((total * sample_rate as f64) as u32).max(1);
    synthesize(&params, total_samples, sample_rate)
}

/// Synthesizes a short loop-friendly fragment of the sustain region.
///
/// Attack and decay are clamped to near zero so the bulk of the fragment
/// sits flat at the sustain level while the note is held.
pub fn sustain_fragment(params: &SynthParams, fragment_seconds: f64, sample_rate: u32) -> Vec<i16> {
    let params = SynthParams {
        attack: params.attack.min(FRAGMENT_RAMP_CAP),
        decay: params.decay.min(FRAGMENT_RAMP_CAP),
        ..*params
    };
    let fragment_samples = ((fragment_seconds * sample_rate as f64) as u32).max(1);
    synthesize(&params, fragment_samples, sample_rate)
}

/// Synthesizes the tail played once after a sustain loop stops, ramping from
/// the note's sustain toward silence over its release time.
pub fn release_tail(params: &SynthParams, sample_rate: u32) -> Vec<i16> {
    let params = SynthParams {
        attack: TAIL_RAMP,
        decay: TAIL_RAMP,
        sustain_level: 1.0,
        ..*params
    };
    let mut samples = (params.release * sample_rate as f64) as u32;
    if samples < 1 {
        samples = sample_rate / 8;
    }
    synthesize(&params, samples, sample_rate)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::synth::params::BufferKind;

    const SAMPLE_RATE: u32 = 44100;

    fn params(waveform: Waveform) -> SynthParams {
        SynthParams {
            waveform,
            frequency_hz: 440.0,
            velocity: 1.0,
            attack: 0.05,
            decay: 0.1,
            sustain_level: 0.7,
            release: 0.2,
            vibrato_rate_hz: 0.0,
            vibrato_depth_cents: 0.0,
        }
    }

    fn at(samples: &[i16], t: f64) -> i16 {
        samples[(t * SAMPLE_RATE as f64) as usize]
    }

    #[test]
    fn test_deterministic_for_all_waveforms() {
        for waveform in [
            Waveform::Sine,
            Waveform::Square,
            Waveform::Saw,
            Waveform::Triangle,
            Waveform::Noise,
            Waveform::Silence,
        ] {
            let p = params(waveform);
            let first = synthesize(&p, 4410, SAMPLE_RATE);
            let second = synthesize(&p, 4410, SAMPLE_RATE);
            assert_eq!(first, second, "waveform {:?} was not deterministic", waveform);
        }
    }

    #[test]
    fn test_envelope_shape() {
        // Square at low frequency so every early sample sits at the positive
        // peak and the envelope is directly observable.
        let p = SynthParams {
            waveform: Waveform::Square,
            frequency_hz: 1.0,
            attack: 0.1,
            decay: 0.1,
            sustain_level: 0.5,
            release: 0.1,
            ..params(Waveform::Square)
        };
        let total = (SAMPLE_RATE as f64 * 0.5) as u32;
        let samples = synthesize(&p, total, SAMPLE_RATE);

        // Start of attack is near silent.
        assert!(at(&samples, 0.0).abs() < 100);
        // End of attack is near full scale.
        assert!(at(&samples, 0.0999).abs() > i16::MAX - 200);
        // Sustain hold sits near the sustain level.
        let sustain = at(&samples, 0.3).abs() as f64 / i16::MAX as f64;
        assert!((sustain - 0.5).abs() < 0.01, "sustain was {}", sustain);
        // End of buffer is near silent.
        assert!(samples[samples.len() - 1].abs() < 200);
    }

    #[test]
    fn test_zero_length_phases_do_not_blow_up() {
        let p = SynthParams {
            attack: 0.0,
            decay: 0.0,
            release: 0.0,
            ..params(Waveform::Sine)
        };
        let samples = synthesize(&p, 1000, SAMPLE_RATE);
        assert_eq!(samples.len(), 1000);
        assert!(samples.iter().all(|s| s.abs() <= i16::MAX));
    }

    #[test]
    fn test_velocity_scales_amplitude() {
        let loud = params(Waveform::Sine);
        let quiet = SynthParams {
            velocity: 0.5,
            ..loud
        };
        let loud_peak = synthesize(&loud, 4410, SAMPLE_RATE)
            .iter()
            .map(|s| s.unsigned_abs())
            .max()
            .unwrap();
        let quiet_peak = synthesize(&quiet, 4410, SAMPLE_RATE)
            .iter()
            .map(|s| s.unsigned_abs())
            .max()
            .unwrap();
        assert!(quiet_peak < loud_peak);
        assert!((quiet_peak as f64 / loud_peak as f64 - 0.5).abs() < 0.05);
    }

    #[test]
    fn test_silence_waveform_is_silent() {
        let samples = synthesize(&params(Waveform::Silence), 4410, SAMPLE_RATE);
        assert!(samples.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_full_note_duration() {
        let p = params(Waveform::Sine);
        let samples = full_note(&p, 0.25, SAMPLE_RATE);
        let expected = ((0.05 + 0.1 + 0.25 + 0.2) * SAMPLE_RATE as f64) as usize;
        assert_eq!(samples.len(), expected);
    }

    #[test]
    fn test_fragment_loops_near_seamlessly() {
        let p = SynthParams {
            vibrato_rate_hz: 0.0,
            vibrato_depth_cents: 0.0,
            ..params(Waveform::Sine)
        };
        let samples = sustain_fragment(&p, 0.25, SAMPLE_RATE);
        assert_eq!(samples.len(), (0.25 * SAMPLE_RATE as f64) as usize);
        // The fragment's ramps are capped, so well before the end the
        // envelope is already flat at the sustain level.
        let mid = at(&samples, 0.1).abs();
        assert!(mid <= (0.7 * i16::MAX as f64) as i16 + 10);
    }

    #[test]
    fn test_release_tail_minimum_length() {
        let p = SynthParams {
            release: 0.0,
            ..params(Waveform::Sine)
        };
        let samples = release_tail(&p, SAMPLE_RATE);
        assert_eq!(samples.len(), (SAMPLE_RATE / 8) as usize);
    }

    #[test]
    fn test_release_tail_decays_to_silence() {
        let samples = release_tail(&params(Waveform::Square), SAMPLE_RATE);
        assert!(samples[samples.len() - 1].abs() < 200);
    }

    #[test]
    fn test_noise_determinism_feeds_stable_cache_keys() {
        let p = params(Waveform::Noise);
        assert_eq!(
            p.cache_key(BufferKind::Full),
            p.cache_key(BufferKind::Full)
        );
        assert_eq!(
            synthesize(&p, 2048, SAMPLE_RATE),
            synthesize(&p, 2048, SAMPLE_RATE)
        );
    }
}
