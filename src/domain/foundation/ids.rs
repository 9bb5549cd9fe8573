//! Strongly-typed identifier value objects.
//!
//! Every identity in the chat domain is assigned by the backend (Mongo-style
//! object ids on the wire), so identifiers wrap opaque, non-empty strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ValidationError;

/// Defines a string-backed identifier that rejects empty values.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning error if empty.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(ValidationError::empty_field($field));
                }
                Ok(Self(id))
            }

            /// Generates a fresh backend-style identifier.
            ///
            /// Only backends call this; the client never invents identities
            /// for entities it has not seen confirmed.
            pub fn generate() -> Self {
                Self(Uuid::new_v4().simple().to_string())
            }

            /// Returns the inner string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

string_id!(
    /// Unique identifier for a one-to-one chat.
    ChatId,
    "chat_id"
);

string_id!(
    /// Globally unique, stable identifier for a chat message.
    ///
    /// Used to de-duplicate messages delivered both by snapshot and live.
    MessageId,
    "message_id"
);

string_id!(
    /// User identifier (assigned by the marketplace backend).
    UserId,
    "user_id"
);

string_id!(
    /// Identifier of a marketplace item a chat may be scoped to.
    ItemId,
    "item_id"
);
