//! Strongly-typed ID newtypes.
//!
//! Resource identities and actor identities are both UUIDs; wrapping them keeps
//! a `UserId` from being passed where a `ResourceId` is expected.
//!
//! # Example
//!
//! ```ignore
//! use campusdesk_models::ids::{ResourceId, UserId};
//!
//! fn restore(id: ResourceId, actor: Option<UserId>) { /* ... */ }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Defines a UUID newtype that binds, decodes and serializes as the bare UUID.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
        )]
        #[serde(transparent)]
        #[sqlx(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// A new random v4 id.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Fixed id for fixtures.
            pub const fn from_u128(v: u128) -> Self {
                Self(Uuid::from_u128(v))
            }

            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

define_id!(
    /// Identity of a managed resource (course, page, slider, ...).
    ResourceId
);

define_id!(
    /// Identity of the authenticated actor recorded in audit fields.
    UserId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_debug_names_the_type() {
        let id = UserId::from_u128(0x12345678_1234_1234_1234_123456789abc);
        let debug = format!("{:?}", id);
        assert!(debug.starts_with("UserId("));
        assert!(debug.contains("12345678-1234-1234-1234-123456789abc"));
    }

    #[test]
    fn test_id_displays_as_bare_uuid() {
        let id = ResourceId::from_u128(0x12345678_1234_1234_1234_123456789abc);
        assert_eq!(id.to_string(), "12345678-1234-1234-1234-123456789abc");
        assert_eq!(
            id.into_inner(),
            Uuid::from_u128(0x12345678_1234_1234_1234_123456789abc)
        );
    }

    #[test]
    fn test_id_serde_is_transparent() {
        let id = ResourceId::from_u128(0x12345678_1234_1234_1234_123456789abc);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#""12345678-1234-1234-1234-123456789abc""#);

        let back: ResourceId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_ids_order_for_sets() {
        use std::collections::BTreeSet;
        let low = ResourceId::from_u128(1);
        let high = ResourceId::from_u128(2);
        let set: BTreeSet<_> = [high, low, high].into_iter().collect();
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec![low, high]);
    }
}
