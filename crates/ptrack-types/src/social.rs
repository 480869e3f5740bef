//! Social lists: externally maintained rosters owned by a local character.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::ids::{
    CategoryId, ContentId, DataCenterId, SocialListId, SocialListMemberId, WorldId,
};
use crate::player::player_key;

/// Kinds of in-game social list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SocialListType {
    FriendList,
    BlackList,
    FreeCompany,
    LinkShell,
    CrossWorldLinkShell,
}

impl SocialListType {
    pub const ALL: [SocialListType; 5] = [
        SocialListType::FriendList,
        SocialListType::BlackList,
        SocialListType::FreeCompany,
        SocialListType::LinkShell,
        SocialListType::CrossWorldLinkShell,
    ];

    /// Rosters delivered one page at a time.
    pub fn is_paged(self) -> bool {
        matches!(self, SocialListType::FreeCompany)
    }

    /// Types where the owner can hold several numbered lists.
    pub fn is_numbered(self) -> bool {
        matches!(
            self,
            SocialListType::LinkShell | SocialListType::CrossWorldLinkShell
        )
    }

    /// Types whose lists differ per data center.
    pub fn is_data_center_scoped(self) -> bool {
        matches!(self, SocialListType::CrossWorldLinkShell)
    }

    /// Display name, e.g. `Free Company`.
    pub fn label(self) -> &'static str {
        match self {
            SocialListType::FriendList => "Friend List",
            SocialListType::BlackList => "Blacklist",
            SocialListType::FreeCompany => "Free Company",
            SocialListType::LinkShell => "Linkshell",
            SocialListType::CrossWorldLinkShell => "Cross-world Linkshell",
        }
    }

    /// Short tag used in dynamic category names, e.g. `FC`.
    pub fn abbreviation(self) -> &'static str {
        match self {
            SocialListType::FriendList => "FL",
            SocialListType::BlackList => "BL",
            SocialListType::FreeCompany => "FC",
            SocialListType::LinkShell => "LS",
            SocialListType::CrossWorldLinkShell => "CWLS",
        }
    }
}

impl fmt::Display for SocialListType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SocialListType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "friendlist" | "fl" => Ok(SocialListType::FriendList),
            "blacklist" | "bl" => Ok(SocialListType::BlackList),
            "freecompany" | "fc" => Ok(SocialListType::FreeCompany),
            "linkshell" | "ls" => Ok(SocialListType::LinkShell),
            "crossworldlinkshell" | "cwls" => Ok(SocialListType::CrossWorldLinkShell),
            _ => Err(TypeError::UnknownListType(s.to_string())),
        }
    }
}

/// Identity of a social list: owner, type, number and (for cross-world
/// linkshells) data center.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SocialListKey {
    pub content_id: ContentId,
    pub list_type: SocialListType,
    pub list_number: u16,
    pub data_center_id: Option<DataCenterId>,
}

impl SocialListKey {
    /// Build a key, dropping the parts that do not apply to `list_type`.
    pub fn new(
        content_id: ContentId,
        list_type: SocialListType,
        list_number: u16,
        data_center_id: DataCenterId,
    ) -> Self {
        Self {
            content_id,
            list_type,
            list_number: if list_type.is_numbered() { list_number } else { 0 },
            data_center_id: list_type
                .is_data_center_scoped()
                .then_some(data_center_id),
        }
    }
}

impl fmt::Display for SocialListKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.content_id, self.list_type.abbreviation())?;
        if self.list_type.is_numbered() {
            write!(f, "#{}", self.list_number)?;
        }
        if let Some(dc) = self.data_center_id {
            write!(f, "@dc{dc}")?;
        }
        Ok(())
    }
}

/// A persisted social list owned by a local character.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialList {
    pub id: SocialListId,
    pub created: i64,
    pub updated: i64,
    pub content_id: ContentId,
    pub list_type: SocialListType,
    /// 0 for non-numbered types.
    pub list_number: u16,
    /// 0 unless the type is data-center scoped.
    pub data_center_id: DataCenterId,
    pub page_count: u16,
    pub add_players: bool,
    pub sync_with_category: bool,
    pub default_category_id: Option<CategoryId>,
    /// Unix seconds each page was last refreshed.
    #[serde(default)]
    pub page_last_updated: BTreeMap<u16, i64>,
}

impl SocialList {
    /// Unsaved list for `key`; the repository assigns the id.
    pub fn new(key: SocialListKey) -> Self {
        Self {
            id: SocialListId(0),
            created: 0,
            updated: 0,
            content_id: key.content_id,
            list_type: key.list_type,
            list_number: key.list_number,
            data_center_id: key.data_center_id.unwrap_or(0),
            page_count: 0,
            add_players: false,
            sync_with_category: false,
            default_category_id: None,
            page_last_updated: BTreeMap::new(),
        }
    }

    /// Identity of this list.
    pub fn key(&self) -> SocialListKey {
        SocialListKey::new(
            self.content_id,
            self.list_type,
            self.list_number,
            self.data_center_id,
        )
    }

    /// Oldest page refresh for paged lists, else the row's update time.
    pub fn last_updated(&self) -> i64 {
        if self.list_type.is_paged() {
            return self.page_last_updated.values().copied().min().unwrap_or(0);
        }
        self.updated
    }
}

/// One member row of a social list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialListMember {
    pub id: SocialListMemberId,
    pub social_list_id: SocialListId,
    pub content_id: ContentId,
    /// Derived from name and world; see [`player_key`].
    pub key: String,
    pub name: String,
    pub world_id: WorldId,
    pub page_number: u16,
}

impl SocialListMember {
    /// Member row for `member` as seen on `page`.
    pub fn from_snapshot(social_list_id: SocialListId, member: &SnapshotMember, page: u16) -> Self {
        Self {
            id: SocialListMemberId(0),
            social_list_id,
            content_id: member.content_id,
            key: member.key(),
            name: member.name.clone(),
            world_id: member.world_id,
            page_number: page,
        }
    }
}

/// A roster entry as reported by the external source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMember {
    pub content_id: ContentId,
    /// May be empty when the source could not resolve the name.
    pub name: String,
    pub world_id: WorldId,
}

impl SnapshotMember {
    pub fn new(content_id: impl Into<ContentId>, name: impl Into<String>, world_id: WorldId) -> Self {
        Self {
            content_id: content_id.into(),
            name: name.into(),
            world_id,
        }
    }

    /// Player key for this member.
    pub fn key(&self) -> String {
        player_key(&self.name, self.world_id)
    }
}

/// One observed page of a social list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembersSnapshot {
    pub list_type: SocialListType,
    pub members: Vec<SnapshotMember>,
    #[serde(default)]
    pub list_number: u16,
    #[serde(default)]
    pub page: u16,
    #[serde(default)]
    pub page_count: u16,
}

impl MembersSnapshot {
    /// Single-page snapshot of an unnumbered list.
    pub fn new(list_type: SocialListType, members: Vec<SnapshotMember>) -> Self {
        Self {
            list_type,
            members,
            list_number: 0,
            page: 0,
            page_count: 0,
        }
    }

    /// Set the linkshell number.
    pub fn numbered(mut self, list_number: u16) -> Self {
        self.list_number = list_number;
        self
    }

    /// Set the page this snapshot covers and the list's page count.
    pub fn paged(mut self, page: u16, page_count: u16) -> Self {
        self.page = page;
        self.page_count = page_count;
        self
    }
}
