use super::PitchClass;

/// Krumhansl-Schmuckler major profile, tonic first.
pub const MAJOR_PROFILE: [f64; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];

/// Krumhansl-Schmuckler minor profile, tonic first.
pub const MINOR_PROFILE: [f64; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

/// Major tonic → tonic of its relative minor.
///
/// Every major key is filed under its relative minor, so this table decides
/// which folder a major-mode track lands in.
pub static RELATIVE_MINOR: [(PitchClass, PitchClass); 12] = [
    (PitchClass::A, PitchClass::FSharp),
    (PitchClass::ASharp, PitchClass::G),
    (PitchClass::B, PitchClass::GSharp),
    (PitchClass::C, PitchClass::A),
    (PitchClass::CSharp, PitchClass::ASharp),
    (PitchClass::D, PitchClass::B),
    (PitchClass::DSharp, PitchClass::C),
    (PitchClass::E, PitchClass::CSharp),
    (PitchClass::F, PitchClass::D),
    (PitchClass::FSharp, PitchClass::DSharp),
    (PitchClass::G, PitchClass::E),
    (PitchClass::GSharp, PitchClass::F),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_minor_is_three_semitones_down() {
        for (major, minor) in RELATIVE_MINOR.iter() {
            assert_eq!(
                minor.index(),
                (major.index() + 9) % 12,
                "{} major should map three semitones down",
                major
            );
        }
    }

    #[test]
    fn relative_minor_table_covers_each_tonic_once() {
        for pc in PitchClass::ALL {
            let hits = RELATIVE_MINOR.iter().filter(|(major, _)| *major == pc).count();
            assert_eq!(hits, 1, "{} appears {} times", pc, hits);
        }
    }

    #[test]
    fn profiles_peak_at_tonic() {
        let argmax = |p: &[f64; 12]| {
            p.iter()
                .enumerate()
                .fold((0, f64::MIN), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
                .0
        };
        assert_eq!(argmax(&MAJOR_PROFILE), 0);
        assert_eq!(argmax(&MINOR_PROFILE), 0);
    }
}
