//! Persistent identifiers and their grammar.
//!
//! ```text
//! PID        := Prefix, '/', Suffix
//! Prefix     := digit, { PrefixChar }, { '.', PrefixChar, { PrefixChar } }
//! PrefixChar := 'a'-'z' | 'A'-'Z' | '0'-'9' | '_'
//! Suffix     := any non-empty string
//! ```

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Alphabet for randomly generated suffixes. Omits easily confused letters.
const RANDOM_ALPHABET: &[u8] = b"abcdefghkmnpqrstuvwxyz0123456789";

/// A validated persistent identifier (`prefix/suffix`).
///
/// Identifiers are case-sensitive and compared as plain strings. A `Pid`
/// can only be obtained through [`Pid::parse`] (or its `FromStr` /
/// `TryFrom<String>` equivalents), so holding one proves the string passed
/// the grammar.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pid(String);

impl Pid {
    /// Parse and validate an identifier string.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        validate_pid(s)?;
        Ok(Self(s.to_string()))
    }

    /// Build an identifier from a prefix and a suffix.
    pub fn from_parts(prefix: &str, suffix: &str) -> Result<Self, TypeError> {
        Self::parse(&format!("{prefix}/{suffix}"))
    }

    /// Generate a random identifier under `prefix`.
    ///
    /// The suffix is four dash-separated blocks of four characters, e.g.
    /// `10876/o9f9-pkmx-7q8v-d0zt`. Uniqueness is likely but not
    /// guaranteed; callers must acquire the identifier and retry on
    /// collision.
    pub fn random<R: Rng>(prefix: &str, rng: &mut R) -> Result<Self, TypeError> {
        let blocks: Vec<String> = (0..4)
            .map(|_| {
                (0..4)
                    .map(|_| RANDOM_ALPHABET[rng.gen_range(0..RANDOM_ALPHABET.len())] as char)
                    .collect()
            })
            .collect();
        Self::from_parts(prefix, &blocks.join("-"))
    }

    /// The full identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Everything before the first `/`.
    pub fn prefix(&self) -> &str {
        self.0.split_once('/').map_or(self.0.as_str(), |(p, _)| p)
    }

    /// Everything after the first `/`.
    pub fn suffix(&self) -> &str {
        self.0.split_once('/').map_or("", |(_, s)| s)
    }

    /// Insert `infix` between prefix and suffix.
    ///
    /// Returns the identifier unchanged if the suffix already starts with
    /// `infix`, so applying the same infix twice is harmless.
    pub fn with_infix(&self, infix: &str) -> Self {
        if infix.is_empty() || self.suffix().starts_with(infix) {
            return self.clone();
        }
        Self(format!("{}/{}{}", self.prefix(), infix, self.suffix()))
    }
}

impl fmt::Debug for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pid({})", self.0)
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Pid {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Pid {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        validate_pid(&s)?;
        Ok(Self(s))
    }
}

impl From<Pid> for String {
    fn from(pid: Pid) -> Self {
        pid.0
    }
}

impl AsRef<str> for Pid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Validate a full identifier string, returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use lapis_types::validate_pid;
///
/// assert!(validate_pid("10876/some-object").is_ok());
/// assert!(validate_pid("0.TYPE.SUBTYPE/TEST_TYPE").is_ok());
/// assert!(validate_pid("a12345/123").is_err());
/// assert!(validate_pid("0.TYPE/").is_err());
/// ```
pub fn validate_pid(s: &str) -> Result<(), TypeError> {
    let invalid = |reason: &str| TypeError::InvalidIdentifier {
        identifier: s.to_string(),
        reason: reason.to_string(),
    };

    let (prefix, suffix) = s
        .split_once('/')
        .ok_or_else(|| invalid("missing '/' between prefix and suffix"))?;
    validate_prefix(prefix).map_err(|e| invalid(&e.to_string()))?;
    if suffix.is_empty() {
        return Err(invalid("suffix must not be empty"));
    }
    Ok(())
}

/// Validate an identifier prefix on its own (e.g. a configured prefix).
pub fn validate_prefix(prefix: &str) -> Result<(), TypeError> {
    let invalid = |reason: String| TypeError::InvalidPrefix {
        prefix: prefix.to_string(),
        reason,
    };

    if !prefix.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(invalid("must start with a digit".into()));
    }
    for component in prefix.split('.') {
        if component.is_empty() {
            return Err(invalid("sub-prefixes must not be empty".into()));
        }
        if let Some(ch) = component.chars().find(|c| !is_prefix_char(*c)) {
            return Err(invalid(format!("contains forbidden character: {ch:?}")));
        }
    }
    Ok(())
}

/// Returns `true` if `s` is a syntactically valid identifier.
pub fn is_pid_name(s: &str) -> bool {
    validate_pid(s).is_ok()
}

fn is_prefix_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
