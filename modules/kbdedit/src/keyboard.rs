//! Keyboard model: layers, key kinds and the physical layouts.
//!
//! Keys are identified by their ISO 9995 position code (`E01`, `C12`, ...).
//! Only codes and kinds are modelled here; geometry belongs to whatever
//! renders the board.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Layer
// ---------------------------------------------------------------------------

/// Modifier layer a key value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Layer {
    #[default]
    Default,
    Shifted,
    CapsLock,
    ShiftedCapsLock,
    Alt,
    AltShift,
    CapsAlt,
    Control,
    OsxCommand,
    OsxCommandShift,
    OsxCommandAlt,
    OsxCommandAltShift,
}

impl Layer {
    pub const ALL: [Layer; 12] = [
        Layer::Default,
        Layer::Shifted,
        Layer::CapsLock,
        Layer::ShiftedCapsLock,
        Layer::Alt,
        Layer::AltShift,
        Layer::CapsAlt,
        Layer::Control,
        Layer::OsxCommand,
        Layer::OsxCommandShift,
        Layer::OsxCommandAlt,
        Layer::OsxCommandAltShift,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Layer::Default => "default",
            Layer::Shifted => "shifted",
            Layer::CapsLock => "caps-lock",
            Layer::ShiftedCapsLock => "shifted-caps-lock",
            Layer::Alt => "alt",
            Layer::AltShift => "alt-shift",
            Layer::CapsAlt => "caps-alt",
            Layer::Control => "control",
            Layer::OsxCommand => "osx-command",
            Layer::OsxCommandShift => "osx-command-shift",
            Layer::OsxCommandAlt => "osx-command-alt",
            Layer::OsxCommandAltShift => "osx-command-alt-shift",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown layer: {0}")]
pub struct UnknownLayer(pub String);

impl FromStr for Layer {
    type Err = UnknownLayer;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Layer::ALL
            .into_iter()
            .find(|layer| layer.name() == wanted)
            .ok_or_else(|| UnknownLayer(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Keys and layouts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Normal,
    /// Toggles the shift layer instead of holding a value.
    Shift,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    pub code: String,
    pub kind: KeyKind,
}

impl Key {
    fn normal(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            kind: KeyKind::Normal,
        }
    }

    fn shift(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            kind: KeyKind::Shift,
        }
    }
}

/// Row `prefix`, positions `from..=to`, zero padded (`E00`, `E01`, ...).
fn run(prefix: char, from: u8, to: u8) -> impl Iterator<Item = Key> {
    (from..=to).map(move |i| Key::normal(format!("{prefix}{i:02}")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    #[default]
    Iso,
    Ansi,
}

impl Layout {
    /// Every key on the board, top row first.
    pub fn keys(&self) -> Vec<Key> {
        let mut keys: Vec<Key> = Vec::with_capacity(65);

        // Row E
        keys.extend(run('E', 0, 13));
        // Row D
        keys.extend(run('D', 0, 13));

        // Row C
        match self {
            Layout::Iso => keys.extend(run('C', 0, 13)),
            Layout::Ansi => keys.extend(run('C', 0, 12)),
        }

        // Row B
        keys.push(Key::shift("B99"));
        match self {
            Layout::Iso => keys.extend(run('B', 0, 10)),
            Layout::Ansi => keys.extend(run('B', 1, 10)),
        }
        keys.push(Key::shift("B11"));

        // Row A
        keys.push(Key::normal("A99"));
        keys.extend(run('A', 0, 3));
        keys.extend(run('A', 8, 12));

        keys
    }

    pub fn kind_of(&self, code: &str) -> Option<KeyKind> {
        self.keys()
            .into_iter()
            .find(|key| key.code == code)
            .map(|key| key.kind)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.kind_of(code).is_some()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Layout::Iso => "iso",
            Layout::Ansi => "ansi",
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown keyboard layout: {0} (expected iso or ansi)")]
pub struct UnknownLayout(pub String);

impl FromStr for Layout {
    type Err = UnknownLayout;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "iso" => Ok(Layout::Iso),
            "ansi" => Ok(Layout::Ansi),
            _ => Err(UnknownLayout(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_names_round_trip() {
        for layer in Layer::ALL {
            assert_eq!(layer.name().parse::<Layer>(), Ok(layer));
        }
        assert_eq!("Caps-Lock".parse::<Layer>(), Ok(Layer::CapsLock));
        assert!("hyper".parse::<Layer>().is_err());
    }

    #[test]
    fn iso_board_has_extra_key_and_c13() {
        let iso = Layout::Iso;
        assert_eq!(iso.keys().len(), 65);
        assert_eq!(iso.kind_of("B00"), Some(KeyKind::Normal));
        assert_eq!(iso.kind_of("C13"), Some(KeyKind::Normal));
        assert_eq!(iso.kind_of("B99"), Some(KeyKind::Shift));
        assert_eq!(iso.kind_of("B11"), Some(KeyKind::Shift));
        assert_eq!(iso.kind_of("A05"), None);
    }

    #[test]
    fn ansi_board_drops_iso_keys() {
        let ansi = Layout::Ansi;
        assert_eq!(ansi.keys().len(), 63);
        assert!(!ansi.contains("B00"));
        assert!(!ansi.contains("C13"));
        assert!(ansi.contains("C12"));
        assert_eq!(ansi.kind_of("B99"), Some(KeyKind::Shift));
    }

    #[test]
    fn layouts_parse_case_insensitively() {
        assert_eq!("ANSI".parse::<Layout>(), Ok(Layout::Ansi));
        assert_eq!(
            "dvorak".parse::<Layout>(),
            Err(UnknownLayout("dvorak".to_string()))
        );
    }
}
