use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PitchClass {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    /// Semitones above C
    pub fn semitone(self) -> u8 {
        self as u8
    }

    pub fn is_black(self) -> bool {
        matches!(
            self,
            PitchClass::CSharp
                | PitchClass::DSharp
                | PitchClass::FSharp
                | PitchClass::GSharp
                | PitchClass::ASharp
        )
    }

    pub fn symbol(self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::CSharp => "C#",
            PitchClass::D => "D",
            PitchClass::DSharp => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::FSharp => "F#",
            PitchClass::G => "G",
            PitchClass::GSharp => "G#",
            PitchClass::A => "A",
            PitchClass::ASharp => "A#",
            PitchClass::B => "B",
        }
    }
}

/// A single piano key, e.g. C#4
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Note {
    pub octave: u8,
    pub pitch: PitchClass,
}

impl Note {
    pub const fn new(pitch: PitchClass, octave: u8) -> Self {
        Self { octave, pitch }
    }

    pub fn midi(&self) -> u8 {
        (self.octave + 1) * 12 + self.pitch.semitone()
    }

    /// Equal temperament, A4 = 440 Hz
    pub fn frequency(&self) -> f64 {
        440.0 * 2f64.powf((self.midi() as f64 - 69.0) / 12.0)
    }

    pub fn is_black(&self) -> bool {
        self.pitch.is_black()
    }

    pub fn name(&self) -> String {
        format!("{}{}", self.pitch.symbol(), self.octave)
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch.symbol(), self.octave)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not a note name: {0:?}")]
pub struct ParseNoteError(pub String);

impl FromStr for Note {
    type Err = ParseNoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let split = s
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| ParseNoteError(s.to_string()))?;
        let (symbol, octave) = s.split_at(split);
        let pitch = PitchClass::ALL
            .into_iter()
            .find(|p| p.symbol().eq_ignore_ascii_case(symbol))
            .ok_or_else(|| ParseNoteError(s.to_string()))?;
        let octave = octave
            .parse::<u8>()
            .ok()
            .filter(|o| *o <= 9)
            .ok_or_else(|| ParseNoteError(s.to_string()))?;
        Ok(Note::new(pitch, octave))
    }
}

impl Serialize for Note {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Note {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Keyboard key bound to a piano note
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyBinding {
    pub key: char,
    pub note: Note,
}

/// Static lookup from computer keyboard to piano keys
#[derive(Clone, Debug)]
pub struct PianoLayout {
    bindings: Vec<KeyBinding>,
}

impl PianoLayout {
    /// Home row plays the white keys C4..E5, the row above plays the black keys.
    pub fn standard() -> Self {
        use PitchClass::*;
        let table = [
            ('a', C, 4),
            ('w', CSharp, 4),
            ('s', D, 4),
            ('e', DSharp, 4),
            ('d', E, 4),
            ('f', F, 4),
            ('t', FSharp, 4),
            ('g', G, 4),
            ('y', GSharp, 4),
            ('h', A, 4),
            ('u', ASharp, 4),
            ('j', B, 4),
            ('k', C, 5),
            ('o', CSharp, 5),
            ('l', D, 5),
            ('p', DSharp, 5),
            (';', E, 5),
        ];

        Self {
            bindings: table
                .into_iter()
                .map(|(key, pitch, octave)| KeyBinding {
                    key,
                    note: Note::new(pitch, octave),
                })
                .collect(),
        }
    }

    pub fn note_for_key(&self, key: char) -> Option<Note> {
        let key = key.to_ascii_lowercase();
        self.bindings.iter().find(|b| b.key == key).map(|b| b.note)
    }

    pub fn key_for_note(&self, note: Note) -> Option<char> {
        self.bindings.iter().find(|b| b.note == note).map(|b| b.key)
    }

    /// Bindings in ascending pitch order
    pub fn keys(&self) -> &[KeyBinding] {
        &self.bindings
    }

    pub fn white_keys(&self) -> impl Iterator<Item = &KeyBinding> {
        self.bindings.iter().filter(|b| !b.note.is_black())
    }
}

impl Default for PianoLayout {
    fn default() -> Self {
        Self::standard()
    }
}
