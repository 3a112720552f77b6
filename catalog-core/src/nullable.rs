//! Nullable text column value.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A text value that may be SQL `NULL`.
///
/// Serializes to a JSON string when present and to `null` when absent.
/// Deserializing `null` or a missing field yields an absent value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NullableText(Option<String>);

impl NullableText {
    /// An absent value.
    pub fn null() -> Self {
        Self(None)
    }

    /// A present value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(Some(value.into()))
    }

    pub fn is_present(&self) -> bool {
        self.0.is_some()
    }

    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn into_option(self) -> Option<String> {
        self.0
    }
}

impl From<Option<String>> for NullableText {
    fn from(value: Option<String>) -> Self {
        Self(value)
    }
}

impl From<String> for NullableText {
    fn from(value: String) -> Self {
        Self(Some(value))
    }
}

impl From<&str> for NullableText {
    fn from(value: &str) -> Self {
        Self(Some(value.to_string()))
    }
}

impl Serialize for NullableText {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.0 {
            Some(value) => serializer.serialize_str(value),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for NullableText {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<String>::deserialize(deserializer).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_encodes_null() -> Result<(), serde_json::Error> {
        assert_eq!(serde_json::to_string(&NullableText::null())?, "null");
        Ok(())
    }

    #[test]
    fn test_present_encodes_string() -> Result<(), serde_json::Error> {
        assert_eq!(serde_json::to_string(&NullableText::new("desc"))?, "\"desc\"");
        Ok(())
    }

    #[test]
    fn test_null_decodes_absent() -> Result<(), serde_json::Error> {
        let value: NullableText = serde_json::from_str("null")?;
        assert!(!value.is_present());
        Ok(())
    }

    #[test]
    fn test_empty_string_is_present() -> Result<(), serde_json::Error> {
        let value: NullableText = serde_json::from_str("\"\"")?;
        assert!(value.is_present());
        assert_eq!(value.as_deref(), Some(""));
        Ok(())
    }
}
