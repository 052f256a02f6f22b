//! Identifiers

use std::fmt;

use serde::{Deserialize, Deserializer};

/// Identifier of a device, line, discountable, instrument or participant.
///
/// Collaborators identify themselves with integers, strings or nothing at all.
/// Every form is normalised to its string representation so that `7` and `"7"`
/// hash and compare equal. An absent identifier renders as the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(Option<String>);

impl Identifier {
    /// The absent identifier.
    pub const fn none() -> Self {
        Identifier(None)
    }

    /// Whether the identifier is absent.
    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    /// String key used for hashing; empty when absent.
    pub fn as_str(&self) -> &str {
        self.0.as_deref().unwrap_or_default()
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

macro_rules! identifier_from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Identifier {
                fn from(value: $t) -> Self {
                    Identifier(Some(value.to_string()))
                }
            }
        )*
    };
}

identifier_from_integer!(i32, i64, u32, u64, usize);

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Identifier(Some(value.to_string()))
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Identifier(Some(value))
    }
}

impl From<&Identifier> for Identifier {
    fn from(value: &Identifier) -> Self {
        value.clone()
    }
}

impl<T: Into<Identifier>> From<Option<T>> for Identifier {
    fn from(value: Option<T>) -> Self {
        value.map_or_else(Identifier::none, Into::into)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawIdentifier {
    Integer(i64),
    String(String),
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<RawIdentifier>::deserialize(deserializer)? {
            Some(RawIdentifier::Integer(value)) => Identifier::from(value),
            Some(RawIdentifier::String(value)) => Identifier::from(value),
            None => Identifier::none(),
        })
    }
}
