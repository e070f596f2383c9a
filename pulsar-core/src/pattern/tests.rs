//! Tests for pattern module.

use super::euclidean::{distribute, rotate, Pattern};
use super::scale::{octave_fold, quantize_to_scale, Scale};

fn cells(bits: &[u8]) -> Vec<bool> {
    bits.iter().map(|&b| b == 1).collect()
}

#[test]
fn test_distribute_canonical_five_sixteen() {
    let p = distribute(5, 16);
    assert_eq!(
        p.as_slice(),
        cells(&[1, 0, 0, 1, 0, 0, 1, 0, 0, 1, 0, 0, 1, 0, 0, 0]).as_slice()
    );
}

#[test]
fn test_distribute_pulse_count_is_exact() {
    for steps in 1..=32 {
        for pulses in 0..=steps {
            let p = distribute(pulses, steps);
            assert_eq!(p.len(), steps);
            assert_eq!(p.pulses(), pulses, "E({}, {})", pulses, steps);
        }
    }
}

#[test]
fn test_distribute_first_onset_on_downbeat() {
    for steps in 1..=24 {
        for pulses in 1..=steps {
            assert!(distribute(pulses, steps).is_active(0), "E({}, {})", pulses, steps);
        }
    }
}

#[test]
fn test_distribute_is_maximally_even() {
    // Gaps between consecutive onsets differ by at most one step
    for steps in 2..=24 {
        for pulses in 1..=steps {
            let onsets = distribute(pulses, steps).onsets();
            let gaps: Vec<usize> = onsets
                .iter()
                .enumerate()
                .map(|(i, &o)| {
                    let next = onsets[(i + 1) % onsets.len()];
                    (next + steps - o - 1) % steps + 1
                })
                .collect();
            let min = *gaps.iter().min().unwrap();
            let max = *gaps.iter().max().unwrap();
            assert!(max - min <= 1, "E({}, {}) gaps {:?}", pulses, steps, gaps);
        }
    }
}

#[test]
fn test_distribute_clamps() {
    // pulses above steps saturate
    assert_eq!(distribute(9, 4).pulses(), 4);
    // zero steps becomes one step
    let p = distribute(1, 0);
    assert_eq!(p.len(), 1);
    assert!(p.is_active(0));
    // zero pulses is all rests
    assert_eq!(distribute(0, 8).pulses(), 0);
}

#[test]
fn test_distribute_known_rhythms() {
    assert_eq!(distribute(4, 4).to_string(), "xxxx");
    assert_eq!(distribute(2, 4).to_string(), "x.x.");
    assert_eq!(distribute(4, 16).to_string(), "x...x...x...x...");
}

#[test]
fn test_rotate_by_length_is_identity() {
    let p = distribute(3, 8);
    assert_eq!(rotate(&p, 8), p);
    assert_eq!(rotate(&p, 0), p);
}

#[test]
fn test_rotate_is_left_rotation() {
    let p = Pattern::from_cells(cells(&[1, 0, 0, 0])).unwrap();
    assert_eq!(rotate(&p, 1).as_slice(), cells(&[0, 0, 0, 1]).as_slice());
    assert_eq!(rotate(&p, 3).as_slice(), cells(&[0, 1, 0, 0]).as_slice());
}

#[test]
fn test_rotate_composes() {
    let p = distribute(5, 13);
    for a in 0..30 {
        for b in 0..30 {
            assert_eq!(
                rotate(&rotate(&p, a), b),
                rotate(&p, (a + b) % p.len()),
                "a={} b={}",
                a,
                b
            );
        }
    }
}

#[test]
fn test_pattern_from_empty_cells() {
    assert!(Pattern::from_cells(vec![]).is_none());
    assert!(!Pattern::silent(0).is_empty());
}

#[test]
fn test_quantize_to_scale_major() {
    let major = Scale::Major.intervals();
    assert_eq!(quantize_to_scale(0, 60, major), 60);
    assert_eq!(quantize_to_scale(2, 60, major), 64);
    assert_eq!(quantize_to_scale(6, 60, major), 71);
    // wraps into the next octave
    assert_eq!(quantize_to_scale(7, 60, major), 72);
    assert_eq!(quantize_to_scale(9, 60, major), 76);
}

#[test]
fn test_quantize_to_scale_is_monotonic() {
    for scale in Scale::ALL {
        let mut last = 0;
        for ring in 0..40 {
            let pitch = quantize_to_scale(ring, 36, scale.intervals());
            assert!(pitch >= last, "{} ring {}", scale.name(), ring);
            last = pitch;
        }
    }
}

#[test]
fn test_quantize_to_scale_clamps_and_empty() {
    assert_eq!(quantize_to_scale(50, 120, Scale::Chromatic.intervals()), 127);
    assert_eq!(quantize_to_scale(5, 48, &[]), 48);
}

#[test]
fn test_scale_names_round_trip() {
    for scale in Scale::ALL {
        assert_eq!(Scale::from_name(scale.name()), Some(scale));
    }
    assert_eq!(Scale::from_name("Harmonic Minor"), Some(Scale::HarmonicMinor));
    assert_eq!(Scale::from_name("klingon"), None);
}

#[test]
fn test_octave_fold_triangle() {
    let shifts: Vec<i32> = (0..6).map(|i| octave_fold(i, 3)).collect();
    assert_eq!(shifts, vec![0, 12, 24, 24, 12, 0]);
    // repeats
    assert_eq!(octave_fold(6, 3), 0);
    assert_eq!(octave_fold(7, 3), 12);
}

#[test]
fn test_octave_fold_single_octave_never_shifts() {
    for i in 0..10 {
        assert_eq!(octave_fold(i, 1), 0);
        assert_eq!(octave_fold(i, 0), 0);
    }
}
