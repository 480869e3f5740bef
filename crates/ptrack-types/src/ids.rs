use std::fmt;

use serde::{Deserialize, Serialize};

/// Game world identifier.
pub type WorldId = u32;

/// Data center identifier (a group of worlds).
pub type DataCenterId = u32;

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            /// The raw row id.
            pub fn get(self) -> u32 {
                self.0
            }
        }

        impl From<u32> for $name {
            fn from(raw: u32) -> Self {
                Self(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

row_id!(
    /// Row id of a [`crate::Category`].
    CategoryId,
    "cat"
);
row_id!(
    /// Row id of a [`crate::Tag`].
    TagId,
    "tag"
);
row_id!(
    /// Row id of a [`crate::Player`].
    PlayerId,
    "player"
);
row_id!(
    /// Row id of a [`crate::SocialList`].
    SocialListId,
    "list"
);
row_id!(
    /// Row id of a [`crate::SocialListMember`].
    SocialListMemberId,
    "member"
);

/// Game-assigned character identifier.
///
/// Zero means "not known yet"; players discovered by name alone carry it
/// until a roster snapshot backfills the real value.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ContentId(pub u64);

impl ContentId {
    pub const UNKNOWN: ContentId = ContentId(0);

    /// False for [`ContentId::UNKNOWN`].
    pub fn is_known(self) -> bool {
        self.0 != 0
    }
}

impl From<u64> for ContentId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016X}", self.0)
    }
}
