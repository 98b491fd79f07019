//! Two-character type codes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The type of a data-block, encoded as two ASCII characters.
///
/// The same two characters prefix the ID's full name (`MAMaterial`), which is
/// what makes name order double as type order.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct IdCode(u16);

impl IdCode {
    // === Built-in codes ===

    /// External library file.
    pub const LI: Self = Self::from_chars(*b"LI");
    /// Animation action.
    pub const AC: Self = Self::from_chars(*b"AC");
    /// Shape key block.
    pub const KE: Self = Self::from_chars(*b"KE");
    /// Node tree (also used for embedded shader graphs).
    pub const NT: Self = Self::from_chars(*b"NT");
    /// Image.
    pub const IM: Self = Self::from_chars(*b"IM");
    /// Material.
    pub const MA: Self = Self::from_chars(*b"MA");
    /// Mesh geometry.
    pub const ME: Self = Self::from_chars(*b"ME");
    /// Object.
    pub const OB: Self = Self::from_chars(*b"OB");
    /// Collection (historically "group").
    pub const GR: Self = Self::from_chars(*b"GR");
    /// Scene.
    pub const SCE: Self = Self::from_chars(*b"SC");
    /// Screen layout (UI).
    pub const SCR: Self = Self::from_chars(*b"SR");

    /// Build a code from its two characters.
    #[inline]
    pub const fn from_chars(chars: [u8; 2]) -> Self {
        Self(u16::from_le_bytes(chars))
    }

    /// The two characters of this code.
    #[inline]
    pub const fn chars(self) -> [u8; 2] {
        self.0.to_le_bytes()
    }

    #[inline]
    pub const fn raw(self) -> u16 {
        self.0
    }

    #[inline]
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }
}

impl fmt::Display for IdCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b] = self.chars();
        write!(f, "{}{}", char::from(a), char::from(b))
    }
}

impl fmt::Debug for IdCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdCode({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chars_round_trip() {
        assert_eq!(IdCode::MA.chars(), *b"MA");
        assert_eq!(IdCode::from_chars(*b"OB"), IdCode::OB);
        assert_eq!(IdCode::from_raw(IdCode::ME.raw()), IdCode::ME);
    }

    #[test]
    fn display_is_two_chars() {
        assert_eq!(IdCode::SCE.to_string(), "SC");
        assert_eq!(format!("{:?}", IdCode::NT), "IdCode(NT)");
    }
}
