//! Music-theory primitives — scales, chord progressions, note and key
//! parsing, and equal-temperament frequency conversion.
//!
//! Shared by the procedural music generator (chord/arpeggio layers) and the
//! transition manager (key compatibility scoring).

/// Scale families as semitone offsets from the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scale {
    Major,
    Minor,
    Pentatonic,
    Blues,
}

impl Scale {
    /// Semitone offsets of one octave of the scale.
    pub fn intervals(self) -> &'static [i32] {
        match self {
            Scale::Major => &[0, 2, 4, 5, 7, 9, 11],
            Scale::Minor => &[0, 2, 3, 5, 7, 8, 10],
            Scale::Pentatonic => &[0, 2, 4, 7, 9],
            Scale::Blues => &[0, 3, 5, 6, 7, 10],
        }
    }

    /// Semitone offset of a scale degree, folding past the octave.
    /// Degree 0 is the root; degree `len` is the root an octave up.
    pub fn degree_semitones(self, degree: usize) -> i32 {
        let steps = self.intervals();
        let octave = (degree / steps.len()) as i32;
        steps[degree % steps.len()] + 12 * octave
    }
}

/// A parsed key signature: pitch class of the tonic plus mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Key {
    /// 0 = C … 11 = B.
    pub pitch_class: i32,
    pub minor: bool,
}

impl Key {
    /// The scale the key implies (major or natural minor).
    pub fn scale(self) -> Scale {
        if self.minor { Scale::Minor } else { Scale::Major }
    }
}

/// Parse a key name like `"C"`, `"F#"`, `"Bb"`, `"Am"`, `"C#m"`.
pub fn parse_key(key: &str) -> Option<Key> {
    let bytes = key.as_bytes();
    let base = match bytes.first()? {
        b'C' => 0,
        b'D' => 2,
        b'E' => 4,
        b'F' => 5,
        b'G' => 7,
        b'A' => 9,
        b'B' => 11,
        _ => return None,
    };
    let mut idx = 1;
    let mut pitch_class: i32 = base;
    match bytes.get(idx) {
        Some(b'#') => {
            pitch_class += 1;
            idx += 1;
        }
        Some(b'b') => {
            pitch_class -= 1;
            idx += 1;
        }
        _ => {}
    }
    let minor = match &key[idx..] {
        "" => false,
        "m" | "min" | "minor" => true,
        "maj" | "major" => false,
        _ => return None,
    };
    Some(Key {
        pitch_class: pitch_class.rem_euclid(12),
        minor,
    })
}

/// Parse a note name (e.g. "C4", "F#3", "Bb5") into a MIDI note number.
pub fn note_to_midi(note: &str) -> Option<i32> {
    let bytes = note.as_bytes();
    if bytes.is_empty() {
        return None;
    }

    let base_semitone = match bytes[0] as char {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    let mut idx = 1;
    let mut semitone = base_semitone;
    if idx < bytes.len() {
        match bytes[idx] as char {
            '#' => {
                semitone += 1;
                idx += 1;
            }
            'b' => {
                semitone -= 1;
                idx += 1;
            }
            _ => {}
        }
    }

    let octave: i32 = note[idx..].parse().ok()?;

    // MIDI note number: C4 = 60
    Some((octave + 1) * 12 + semitone)
}

/// Equal-temperament frequency of a MIDI note, A4 (69) = 440 Hz.
pub fn midi_to_frequency(midi: i32) -> f64 {
    440.0 * (2.0_f64).powf((midi as f64 - 69.0) / 12.0)
}

/// Frequency of a scale degree of a key, in the given octave.
/// Degrees past the scale length fold into the next octave.
pub fn degree_frequency(key: Key, degree: usize, octave: i32) -> f64 {
    let semis = key.scale().degree_semitones(degree);
    let midi = (octave + 1) * 12 + key.pitch_class + semis;
    midi_to_frequency(midi)
}

/// The three chord tones (root, third, fifth) of a progression step:
/// scale degrees at offsets {0, +2, +4} from the step's root degree.
pub fn chord_degrees(step_degree: usize) -> [usize; 3] {
    [step_degree, step_degree + 2, step_degree + 4]
}

/// Interval between two pitch classes folded into [0, 6]
/// (a fifth up and a fourth down are the same distance).
pub fn pitch_class_interval(a: i32, b: i32) -> i32 {
    let d = (a - b).rem_euclid(12);
    d.min(12 - d)
}

/// Circle-of-fifths-biased compatibility of two keys, in [0, 1].
/// Unison is perfect, fifth/fourth near-perfect, the tritone worst.
pub fn key_compatibility(a: Key, b: Key) -> f64 {
    match pitch_class_interval(a.pitch_class, b.pitch_class) {
        0 => 1.0,
        5 => 0.9, // perfect fourth/fifth
        3 | 4 => 0.7, // thirds
        2 => 0.5,
        1 => 0.3,
        _ => 0.2, // tritone
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_parsing_matches_midi() {
        assert_eq!(note_to_midi("C4"), Some(60));
        assert_eq!(note_to_midi("A4"), Some(69));
        assert_eq!(note_to_midi("F#3"), Some(54));
        assert_eq!(note_to_midi("Bb5"), Some(82));
        assert_eq!(note_to_midi("H2"), None);
        assert_eq!(note_to_midi(""), None);
    }

    #[test]
    fn a4_is_440() {
        assert!((midi_to_frequency(69) - 440.0).abs() < 1e-9);
        // One octave up doubles
        assert!((midi_to_frequency(81) - 880.0).abs() < 1e-9);
    }

    #[test]
    fn key_parsing() {
        assert_eq!(parse_key("C"), Some(Key { pitch_class: 0, minor: false }));
        assert_eq!(parse_key("Am"), Some(Key { pitch_class: 9, minor: true }));
        assert_eq!(parse_key("F#"), Some(Key { pitch_class: 6, minor: false }));
        assert_eq!(parse_key("Bb"), Some(Key { pitch_class: 10, minor: false }));
        assert_eq!(parse_key("Cb"), Some(Key { pitch_class: 11, minor: false }));
        assert_eq!(parse_key("X"), None);
    }

    #[test]
    fn scale_degrees_fold_octaves() {
        // Degree 7 of a 7-note major scale is the root an octave up.
        assert_eq!(Scale::Major.degree_semitones(7), 12);
        // Degree 2 of minor is a minor third.
        assert_eq!(Scale::Minor.degree_semitones(2), 3);
        // Pentatonic folds after five degrees.
        assert_eq!(Scale::Pentatonic.degree_semitones(5), 12);
    }

    #[test]
    fn chord_tones_are_root_third_fifth() {
        assert_eq!(chord_degrees(0), [0, 2, 4]);
        assert_eq!(chord_degrees(3), [3, 5, 7]);
        // In C major, degrees {0,2,4} are C-E-G.
        let key = parse_key("C").unwrap();
        let root = degree_frequency(key, 0, 4);
        let third = degree_frequency(key, 2, 4);
        assert!((root - 261.63).abs() < 0.1, "C4 ≈ 261.63, got {root}");
        assert!((third - 329.63).abs() < 0.1, "E4 ≈ 329.63, got {third}");
    }

    #[test]
    fn interval_folds_symmetrically() {
        assert_eq!(pitch_class_interval(0, 7), 5); // C↔G, a fifth
        assert_eq!(pitch_class_interval(7, 0), 5);
        assert_eq!(pitch_class_interval(0, 6), 6); // tritone
        assert_eq!(pitch_class_interval(3, 3), 0);
    }

    #[test]
    fn key_compatibility_ordering() {
        let c = parse_key("C").unwrap();
        let g = parse_key("G").unwrap();
        let fs = parse_key("F#").unwrap();
        assert_eq!(key_compatibility(c, c), 1.0);
        assert!(key_compatibility(c, g) > key_compatibility(c, fs));
        assert!(key_compatibility(c, fs) <= 0.2);
    }
}
