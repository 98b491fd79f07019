//! ID names.
//!
//! A name is stored without its type prefix; [`IdName::prefixed`] rebuilds
//! the two-character-code form used as a unique string key.
//!
//! # Numbering
//!
//! Collisions are resolved with a `.NNN` suffix (at least three digits),
//! `Material`, `Material.001`, `Material.002`... [`split_name_number`] and
//! [`join_name_number`] are the two halves of that convention.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::IdCode;

/// Size of the historic fixed name buffer: two code characters, the name and a
/// terminator.
pub const MAX_ID_NAME: usize = 66;

/// Longest name body in bytes.
pub const MAX_NAME_LEN: usize = MAX_ID_NAME - 3;

/// Longest `"Name [LibName]"` display string.
pub const MAX_ID_FULL_NAME: usize = 2 * MAX_NAME_LEN + 3;

/// Longest display string with its UI prefix (`"LF Name [LibName]"`).
pub const MAX_ID_FULL_NAME_UI: usize = MAX_ID_FULL_NAME + 3;

/// Separator between a name root and its numeric suffix.
pub const NUMBER_SEPARATOR: char = '.';

/// The name of an ID together with its type code.
#[derive(Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct IdName {
    code: IdCode,
    body: String,
}

impl IdName {
    /// Create a name, truncating it to [`MAX_NAME_LEN`] bytes.
    pub fn new(code: IdCode, name: &str) -> Self {
        Self {
            code,
            body: truncate_name(name).to_owned(),
        }
    }

    #[inline]
    pub fn code(&self) -> IdCode {
        self.code
    }

    /// The name without its type prefix.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.body
    }

    /// Replace the name body, truncating as in [`IdName::new`].
    pub fn set(&mut self, name: &str) {
        self.body.clear();
        self.body.push_str(truncate_name(name));
    }

    /// The name with its two-character type prefix (`MAMaterial`).
    pub fn prefixed(&self) -> String {
        let mut out = String::with_capacity(self.body.len() + 2);
        out.push_str(&self.code.to_string());
        out.push_str(&self.body);
        out
    }
}

impl fmt::Display for IdName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.body)
    }
}

impl fmt::Debug for IdName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:?}", self.code, self.body)
    }
}

/// Truncate `name` to at most [`MAX_NAME_LEN`] bytes on a char boundary.
pub fn truncate_name(name: &str) -> &str {
    truncate_to(name, MAX_NAME_LEN)
}

fn truncate_to(name: &str, max: usize) -> &str {
    if name.len() <= max {
        return name;
    }
    let mut end = max;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

/// Case-insensitive name order.
///
/// Names equal up to ASCII case are ordered by their bytes, so the order is
/// total and deterministic.
pub fn cmp_names(a: &str, b: &str) -> Ordering {
    let folded = a
        .bytes()
        .map(|c| c.to_ascii_lowercase())
        .cmp(b.bytes().map(|c| c.to_ascii_lowercase()));
    folded.then_with(|| a.cmp(b))
}

/// Split `Name.012` into `("Name", Some(12))`.
///
/// Only a non-empty, all-digit suffix after the last separator counts as a
/// number.
pub fn split_name_number(name: &str) -> (&str, Option<u32>) {
    if let Some(pos) = name.rfind(NUMBER_SEPARATOR) {
        let digits = &name[pos + 1..];
        if !digits.is_empty() && digits.bytes().all(|c| c.is_ascii_digit()) {
            if let Ok(number) = digits.parse::<u32>() {
                return (&name[..pos], Some(number));
            }
        }
    }
    (name, None)
}

/// Build `root.NNN`, shortening `root` so the result fits [`MAX_NAME_LEN`].
pub fn join_name_number(root: &str, number: u32) -> String {
    let suffix = format!("{NUMBER_SEPARATOR}{number:03}");
    let root = truncate_to(root, MAX_NAME_LEN.saturating_sub(suffix.len()));
    let mut out = String::with_capacity(root.len() + suffix.len());
    out.push_str(root);
    out.push_str(&suffix);
    out
}
