//! Macros for defining typed row ID types.

/// Macro to define a typed row ID backed by an i64 primary key.
///
/// This generates a newtype wrapper with:
/// - `new()` and `value()` accessors
/// - `Display` and `FromStr` implementations
/// - `Serialize` and `Deserialize` as a plain integer
/// - `From` conversions to and from `i64`
///
/// Row IDs are database surrogates (BIGSERIAL); the human-facing identifier
/// for an entity is its [`RecordNumber`](crate::RecordNumber), when it has
/// one.
///
/// # Example
///
/// ```ignore
/// define_record_id!(PatientId);
///
/// let id = PatientId::new(42);
/// assert_eq!(id.value(), 42);
/// ```
#[macro_export]
macro_rules! define_record_id {
    ($name:ident) => {
        /// A typed row ID for this entity.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(i64);

        impl $name {
            /// Creates an ID from a raw i64.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the underlying i64 value.
            #[must_use]
            pub const fn value(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse::<i64>().map(Self)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_i64(self.0)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let id = i64::deserialize(deserializer)?;
                Ok(Self(id))
            }
        }
    };
}
