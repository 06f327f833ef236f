use std::borrow::Borrow;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Number of random base-36 characters appended after the time component.
pub const RANDOM_LEN: usize = 11;

const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Opaque identifier naming one stored node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Soul(String);

impl Soul {
    /// Mint a new soul: base-36 wall clock millis followed by random base-36 chars.
    ///
    /// Good enough for one process. Not suitable for distributed uniqueness.
    pub fn mint() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();

        let mut rng = rand::rng();
        let mut soul = to_base36(millis);
        soul.extend((0..RANDOM_LEN).map(|_| ALPHABET[rng.random_range(0..36)] as char));
        Self(soul)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for Soul {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Soul {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl Borrow<str> for Soul {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Soul {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Soul {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::with_capacity(13);
    while n > 0 {
        digits.push(ALPHABET[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    // Only ASCII digits and lowercase letters were pushed
    String::from_utf8_lossy(&digits).into_owned()
}
