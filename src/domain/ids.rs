//! Type-safe identifiers for the core entities.
//!
//! Every identifier is a newtype over `i64` (surrogate keys are assigned
//! by the storage layer, monotonically for rows inserted over time). The
//! newtypes exist so a post id can never be confused with a member id at
//! a call site.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! entity_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw storage-assigned key.
            #[must_use]
            pub const fn from_raw(raw: i64) -> Self {
                Self(raw)
            }

            /// Returns the raw key for binding into queries.
            #[must_use]
            pub const fn as_raw(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

entity_id! {
    /// Identifier of a post aggregate.
    ///
    /// Assigned once at creation and immutable thereafter. Because keys
    /// are handed out monotonically, descending id order doubles as a
    /// recency proxy for feed pagination.
    PostId
}

entity_id! {
    /// Identifier of one immutable content snapshot.
    SnapshotId
}

entity_id! {
    /// Identifier of a member (owned by the external member system).
    MemberId
}

entity_id! {
    /// Identifier of a product advertised by posts.
    ProductId
}

entity_id! {
    /// Identifier of a canonical tag.
    TagId
}

entity_id! {
    /// Identifier of a canonical recommendation reason.
    ReasonId
}

entity_id! {
    /// Identifier of a pricing plan catalog entry.
    PlanId
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn raw_round_trip() {
        let id = PostId::from_raw(42);
        assert_eq!(id.as_raw(), 42);
        assert_eq!(i64::from(id), 42);
        assert_eq!(PostId::from(42), id);
    }

    #[test]
    fn display_is_raw_value() {
        let id = MemberId::from_raw(7);
        assert_eq!(format!("{id}"), "7");
    }

    #[test]
    fn serde_is_transparent() {
        let id = SnapshotId::from_raw(13);
        let json = serde_json::to_string(&id).ok();
        let Some(json) = json else {
            panic!("serialization failed");
        };
        assert_eq!(json, "13");
        let back: Option<SnapshotId> = serde_json::from_str(&json).ok();
        assert_eq!(back, Some(id));
    }

    #[test]
    fn ordering_follows_raw_key() {
        assert!(PostId::from_raw(2) > PostId::from_raw(1));
    }
}
