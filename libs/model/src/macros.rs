//! Macros for defining typed string keys.

/// Macro to define a trimmed, non-empty string key.
///
/// This generates a newtype wrapper around `String` with:
/// - A `FIELD` constant naming the storage column (used in validation errors)
/// - `parse()` to validate from raw input
/// - `as_str()` accessor
/// - `Display` and `FromStr` implementations
/// - `Serialize` and `Deserialize` implementations (deserialization validates)
///
/// # Example
///
/// ```ignore
/// define_key!(StaffNumber, "staffnumber");
///
/// let staff: StaffNumber = " S301 ".parse()?;
/// assert_eq!(staff.as_str(), "S301");
/// ```
#[macro_export]
macro_rules! define_key {
    ($name:ident, $field:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(String);

        impl $name {
            /// The storage column this key is held in.
            pub const FIELD: &'static str = $field;

            /// Parses a key from raw input, trimming surrounding whitespace.
            pub fn parse(s: &str) -> Result<Self, $crate::ValidationError> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err($crate::ValidationError::MissingField(Self::FIELD));
                }
                Ok(Self(trimmed.to_string()))
            }

            /// Returns the key as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                // Legacy rows may hold numeric keys (e.g. an integer ward column).
                let value = serde_json::Value::deserialize(deserializer)?;
                let raw = match value {
                    serde_json::Value::String(s) => s,
                    serde_json::Value::Number(n) => n.to_string(),
                    other => {
                        return Err(serde::de::Error::custom(format!(
                            "expected string for {}, got {}",
                            Self::FIELD,
                            other
                        )))
                    }
                };
                Self::parse(&raw).map_err(serde::de::Error::custom)
            }
        }
    };
}
