//! Human-readable order number generation.

use chrono::Utc;
use rand::Rng;

/// Generates order numbers of the form `<prefix><base36 millis><4 hex>`.
///
/// The timestamp component keeps numbers roughly sortable; the random
/// suffix keeps concurrent checkouts apart. Collisions are still
/// possible, so callers must check uniqueness against the store and
/// regenerate, with a bounded retry count.
#[derive(Debug, Clone)]
pub struct OrderNumberGenerator {
    prefix: String,
}

impl OrderNumberGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Generates a candidate order number.
    pub fn generate(&self) -> String {
        let millis = Utc::now().timestamp_millis().max(0) as u64;
        let suffix: u16 = rand::thread_rng().r#gen();
        format!("{}{}{:04X}", self.prefix, base36(millis), suffix)
    }

    /// Returns true if `number` carries this generator's prefix followed
    /// by base36/hex characters only.
    pub fn validate(&self, number: &str) -> bool {
        match number.strip_prefix(self.prefix.as_str()) {
            Some(rest) if !rest.is_empty() => {
                rest.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
            }
            _ => false,
        }
    }
}

impl Default for OrderNumberGenerator {
    fn default() -> Self {
        Self::new("ORD")
    }
}

fn base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    if value == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::with_capacity(13);
    while value > 0 {
        buf.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    buf.reverse();
    String::from_utf8(buf).expect("base36 digits are ascii")
}
