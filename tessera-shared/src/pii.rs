use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Buyer contact data that must not show up verbatim in logs.
///
/// `Debug` and `Display` only reveal enough to correlate log lines (first
/// character and, for e-mail addresses, the domain). Serialization writes the
/// real value because the wrapped data still travels in API responses and
/// event payloads.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Masked<T>(pub T);

impl<T: AsRef<str>> Masked<T> {
    fn redacted(&self) -> String {
        let raw = self.0.as_ref();
        let first = raw.chars().next().map(String::from).unwrap_or_default();
        match raw.split_once('@') {
            Some((_, domain)) => format!("{}***@{}", first, domain),
            None if raw.is_empty() => String::new(),
            None => format!("{}***", first),
        }
    }
}

impl<T: AsRef<str>> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Masked({})", self.redacted())
    }
}

impl<T: AsRef<str>> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<T> Masked<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}
