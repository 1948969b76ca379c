use super::profiles::{MAJOR_PROFILE, MINOR_PROFILE};
use super::{ChromaVector, DetectedKey, KeyError, KeyMethod, Mode, PitchClass};

/// Estimate tonic and mode with the default (reference) method.
pub fn estimate(chroma: &ChromaVector) -> Result<DetectedKey, KeyError> {
    estimate_with(chroma, KeyMethod::Reference)
}

/// Estimate tonic and mode from an aggregated chroma vector.
///
/// The vector is first scaled so its largest bin is 1.0. A vector with no
/// energy, or with negative / non-finite bins, is rejected rather than
/// producing an arbitrary key.
pub fn estimate_with(chroma: &ChromaVector, method: KeyMethod) -> Result<DetectedKey, KeyError> {
    let normalized = normalize(chroma)?;
    let key = match method {
        KeyMethod::Reference => reference_key(&normalized),
        KeyMethod::Profile => profile_key(&normalized),
    };
    log::trace!("chroma {:?} -> {} ({:?})", normalized, key, method);
    Ok(key)
}

/// Divide every bin by the maximum bin.
pub fn normalize(chroma: &ChromaVector) -> Result<ChromaVector, KeyError> {
    if let Some((index, &value)) = chroma
        .iter()
        .enumerate()
        .find(|(_, v)| !v.is_finite() || **v < 0.0)
    {
        return Err(KeyError::InvalidChroma { index, value });
    }

    let max = chroma.iter().copied().fold(0.0f64, f64::max);
    if max <= 0.0 {
        return Err(KeyError::SilentChroma);
    }
    Ok(chroma.map(|v| v / max))
}

/// Full (non-circular) cross-correlation, `numpy.correlate(a, v, "full")`.
///
/// Output has `a.len() + v.len() - 1` entries; entry `j` is the sum of
/// `a[n + j - (v.len() - 1)] * v[n]` over the overlapping `n`.
pub fn correlate_full(a: &[f64], v: &[f64]) -> Vec<f64> {
    if a.is_empty() || v.is_empty() {
        return Vec::new();
    }
    let offset = v.len() as isize - 1;
    (0..a.len() + v.len() - 1)
        .map(|j| {
            let lag = j as isize - offset;
            v.iter()
                .enumerate()
                .filter_map(|(n, &vn)| {
                    let ai = n as isize + lag;
                    (ai >= 0 && (ai as usize) < a.len()).then(|| a[ai as usize] * vn)
                })
                .sum()
        })
        .collect()
}

/// Index of the largest bin; the lowest index wins ties.
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

/// Tonic from the raw peak, mode from the larger correlation peak.
///
/// The two decisions are independent: the profiles are never rotated to the
/// chosen tonic.
fn reference_key(normalized: &ChromaVector) -> DetectedKey {
    let peak = |profile: &[f64; 12]| {
        correlate_full(normalized, profile)
            .into_iter()
            .fold(f64::NEG_INFINITY, f64::max)
    };
    let mode = if peak(&MAJOR_PROFILE) > peak(&MINOR_PROFILE) {
        Mode::Major
    } else {
        Mode::Minor
    };
    DetectedKey::new(PitchClass::from_index(argmax(normalized)), mode)
}

/// Best of the 24 rotated profiles by Pearson correlation.
/// Earlier candidates (major first, then lower tonic) win ties.
fn profile_key(normalized: &ChromaVector) -> DetectedKey {
    let mut best = DetectedKey::new(PitchClass::A, Mode::Major);
    let mut best_score = f64::NEG_INFINITY;

    for (mode, profile) in [(Mode::Major, &MAJOR_PROFILE), (Mode::Minor, &MINOR_PROFILE)] {
        for tonic in PitchClass::ALL {
            let score = pearson(normalized, &rotate(profile, tonic.index()));
            if score > best_score {
                best_score = score;
                best = DetectedKey::new(tonic, mode);
            }
        }
    }
    best
}

/// Profile re-indexed so its tonic weight sits at `tonic`.
fn rotate(profile: &[f64; 12], tonic: usize) -> [f64; 12] {
    std::array::from_fn(|pc| profile[(pc + 12 - tonic % 12) % 12])
}

fn pearson(a: &[f64; 12], b: &[f64; 12]) -> f64 {
    let mean_a = a.iter().sum::<f64>() / 12.0;
    let mean_b = b.iter().sum::<f64>() / 12.0;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for i in 0..12 {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    let denom = (var_a * var_b).sqrt();
    if denom < 1e-12 { 0.0 } else { cov / denom }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chroma_with(bins: &[(PitchClass, f64)]) -> ChromaVector {
        let mut c = [0.0; 12];
        for (pc, v) in bins {
            c[pc.index()] = *v;
        }
        c
    }

    #[test]
    fn test_correlate_full_matches_numpy() {
        let out = correlate_full(&[1.0, 2.0, 3.0], &[0.0, 1.0, 0.5]);
        let expected = [0.5, 2.0, 3.5, 3.0, 0.0];
        assert_eq!(out.len(), expected.len());
        for (o, e) in out.iter().zip(expected) {
            assert!((o - e).abs() < 1e-12, "{:?} vs {:?}", out, expected);
        }
    }

    #[test]
    fn test_correlate_full_length() {
        let out = correlate_full(&[1.0; 12], &MAJOR_PROFILE);
        assert_eq!(out.len(), 23);
    }

    #[test]
    fn test_normalize_max_is_one() {
        let n = normalize(&chroma_with(&[(PitchClass::D, 4.0), (PitchClass::E, 2.0)])).unwrap();
        assert_eq!(n[PitchClass::D.index()], 1.0);
        assert_eq!(n[PitchClass::E.index()], 0.5);
    }

    #[test]
    fn test_silent_chroma_is_rejected() {
        assert_eq!(estimate(&[0.0; 12]), Err(KeyError::SilentChroma));
        assert_eq!(
            estimate_with(&[0.0; 12], KeyMethod::Profile),
            Err(KeyError::SilentChroma)
        );
    }

    #[test]
    fn test_invalid_chroma_is_rejected() {
        let mut c = [1.0; 12];
        c[5] = f64::NAN;
        assert!(matches!(
            estimate(&c),
            Err(KeyError::InvalidChroma { index: 5, .. })
        ));
        c[5] = -0.5;
        assert!(matches!(
            estimate(&c),
            Err(KeyError::InvalidChroma { index: 5, .. })
        ));
    }

    #[test]
    fn test_dominant_pitch_class_is_tonic() {
        for pc in PitchClass::ALL {
            let mut c = [0.3; 12];
            c[pc.index()] = 1.0;
            // A minor-ish colouring elsewhere must not move the tonic
            c[(pc.index() + 3) % 12] = 0.9;
            let key = estimate(&c).unwrap();
            assert_eq!(key.tonic, pc);
        }
    }

    #[test]
    fn test_argmax_ties_pick_lowest_index() {
        assert_eq!(argmax(&[0.5, 1.0, 1.0, 0.2]), 1);
        assert_eq!(argmax(&[1.0; 12]), 0);
    }

    #[test]
    fn test_c_major_triad_is_major_and_files_under_a() {
        let c = chroma_with(&[
            (PitchClass::C, 1.0),
            (PitchClass::E, 1.0),
            (PitchClass::G, 1.0),
        ]);
        let key = estimate(&c).unwrap();
        assert_eq!(key, DetectedKey::new(PitchClass::C, Mode::Major));
        assert_eq!(key.canonical().unwrap(), PitchClass::A);
    }

    #[test]
    fn test_a_minor_triad_is_minor() {
        // minor peaks at ~15.45 (lag 0), major only reaches ~13.12
        let c = chroma_with(&[
            (PitchClass::A, 1.0),
            (PitchClass::C, 0.9),
            (PitchClass::E, 0.9),
        ]);
        let key = estimate(&c).unwrap();
        assert_eq!(key.tonic, PitchClass::A);
        assert_eq!(key.mode, Mode::Minor);
        assert_eq!(key.canonical().unwrap(), PitchClass::A);
    }

    #[test]
    fn test_scale_invariance() {
        let c = chroma_with(&[(PitchClass::F, 2.0), (PitchClass::A, 1.0), (PitchClass::C, 1.5)]);
        let scaled = c.map(|v| v * 1000.0);
        assert_eq!(estimate(&c).unwrap(), estimate(&scaled).unwrap());
    }

    #[test]
    fn test_profile_method_recovers_rotated_profiles() {
        for tonic in PitchClass::ALL {
            let major = rotate(&MAJOR_PROFILE, tonic.index());
            assert_eq!(
                estimate_with(&major, KeyMethod::Profile).unwrap(),
                DetectedKey::new(tonic, Mode::Major)
            );
            let minor = rotate(&MINOR_PROFILE, tonic.index());
            assert_eq!(
                estimate_with(&minor, KeyMethod::Profile).unwrap(),
                DetectedKey::new(tonic, Mode::Minor)
            );
        }
    }

    #[test]
    fn test_rotate_places_tonic_weight() {
        let r = rotate(&MAJOR_PROFILE, PitchClass::C.index());
        assert_eq!(r[PitchClass::C.index()], MAJOR_PROFILE[0]);
        assert_eq!(r[PitchClass::G.index()], MAJOR_PROFILE[7]);
    }
}
