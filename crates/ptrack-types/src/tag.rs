use serde::{Deserialize, Serialize};

use crate::ids::TagId;

/// A free-form player label.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    /// Palette index.
    pub color: u32,
}

impl Tag {
    /// Unsaved tag; the repository assigns the id.
    pub fn new(name: impl Into<String>, color: u32) -> Self {
        Self {
            id: TagId(0),
            name: name.into(),
            color,
        }
    }
}
