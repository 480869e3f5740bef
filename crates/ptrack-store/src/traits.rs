use ptrack_types::{
    Category, CategoryId, ContentId, Player, PlayerConfig, PlayerId, SocialList, SocialListId,
    SocialListKey, SocialListMember, SocialListMemberId, Tag, TagId, TrackerSettings,
};

use crate::error::StoreResult;

/// Category rows. The category-tier config is stored by [`PlayerConfigRepo`].
pub trait CategoryRepo: Send + Sync {
    fn list_categories(&self) -> StoreResult<Vec<Category>>;

    fn get_category(&self, id: CategoryId) -> StoreResult<Option<Category>>;

    /// Insert and return the new id. The id on `category` is ignored.
    fn create_category(&self, category: &Category) -> StoreResult<CategoryId>;

    fn update_category(&self, category: &Category) -> StoreResult<bool>;

    fn delete_category(&self, id: CategoryId) -> StoreResult<bool>;
}

/// Unordered tags.
pub trait TagRepo: Send + Sync {
    fn list_tags(&self) -> StoreResult<Vec<Tag>>;

    fn create_tag(&self, tag: &Tag) -> StoreResult<TagId>;

    fn update_tag(&self, tag: &Tag) -> StoreResult<bool>;

    fn delete_tag(&self, id: TagId) -> StoreResult<bool>;
}

/// Player rows.
///
/// Reads populate `assigned_categories` and `assigned_tags` from the link
/// tables; writes ignore both (links go through their own repositories).
pub trait PlayerRepo: Send + Sync {
    fn list_players(&self) -> StoreResult<Vec<Player>>;

    fn get_player(&self, id: PlayerId) -> StoreResult<Option<Player>>;

    fn create_player(&self, player: &Player) -> StoreResult<PlayerId>;

    fn update_player(&self, player: &Player) -> StoreResult<bool>;
}

/// Player/category link table.
pub trait PlayerCategoryRepo: Send + Sync {
    /// Returns false if the link already existed.
    fn create_player_category(&self, player: PlayerId, category: CategoryId) -> StoreResult<bool>;

    /// Insert many links, returning how many were new.
    ///
    /// Default implementation calls `create_player_category()` for each pair.
    fn create_player_categories(&self, links: &[(PlayerId, CategoryId)]) -> StoreResult<usize> {
        let mut created = 0;
        for &(player, category) in links {
            if self.create_player_category(player, category)? {
                created += 1;
            }
        }
        Ok(created)
    }

    fn delete_player_category(&self, player: PlayerId, category: CategoryId) -> StoreResult<bool>;

    /// Remove every link to `category`, returning how many were removed.
    fn delete_player_categories_by_category(&self, category: CategoryId) -> StoreResult<usize>;
}

/// Player/tag link table.
pub trait PlayerTagRepo: Send + Sync {
    fn create_player_tag(&self, player: PlayerId, tag: TagId) -> StoreResult<bool>;

    fn delete_player_tag(&self, player: PlayerId, tag: TagId) -> StoreResult<bool>;

    fn delete_player_tags_by_tag(&self, tag: TagId) -> StoreResult<usize>;
}

/// Category-tier config overrides.
pub trait PlayerConfigRepo: Send + Sync {
    fn get_category_config(&self, category: CategoryId) -> StoreResult<Option<PlayerConfig>>;

    fn save_category_config(&self, category: CategoryId, config: &PlayerConfig)
        -> StoreResult<()>;

    fn delete_category_config(&self, category: CategoryId) -> StoreResult<bool>;
}

/// Social lists, keyed by owner, type, number and data center.
pub trait SocialListRepo: Send + Sync {
    /// All lists owned by a local character.
    fn list_social_lists(&self, owner: ContentId) -> StoreResult<Vec<SocialList>>;

    fn get_social_list(&self, id: SocialListId) -> StoreResult<Option<SocialList>>;

    fn find_social_list(&self, key: &SocialListKey) -> StoreResult<Option<SocialList>>;

    fn create_social_list(&self, list: &SocialList) -> StoreResult<SocialListId>;

    fn update_social_list(&self, list: &SocialList) -> StoreResult<bool>;

    fn delete_social_list(&self, id: SocialListId) -> StoreResult<bool>;
}

/// Members of a social list, each tagged with the page it was seen on.
pub trait SocialListMemberRepo: Send + Sync {
    fn list_members(&self, list: SocialListId) -> StoreResult<Vec<SocialListMember>>;

    fn list_members_on_page(
        &self,
        list: SocialListId,
        page: u16,
    ) -> StoreResult<Vec<SocialListMember>>;

    fn create_member(&self, member: &SocialListMember) -> StoreResult<SocialListMemberId>;

    /// Insert many members and return their ids.
    ///
    /// Default implementation calls `create_member()` for each member.
    fn create_members(
        &self,
        members: &[SocialListMember],
    ) -> StoreResult<Vec<SocialListMemberId>> {
        members.iter().map(|m| self.create_member(m)).collect()
    }

    fn update_member(&self, member: &SocialListMember) -> StoreResult<bool>;

    fn delete_member(&self, id: SocialListMemberId) -> StoreResult<bool>;

    /// Delete many members, returning how many existed.
    ///
    /// Default implementation calls `delete_member()` for each id.
    fn delete_members(&self, ids: &[SocialListMemberId]) -> StoreResult<usize> {
        let mut deleted = 0;
        for &id in ids {
            if self.delete_member(id)? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    fn delete_all_members(&self, list: SocialListId) -> StoreResult<usize>;
}

/// The single persisted settings document.
pub trait SettingsRepo: Send + Sync {
    fn load_settings(&self) -> StoreResult<Option<TrackerSettings>>;

    fn save_settings(&self, settings: &TrackerSettings) -> StoreResult<()>;
}

/// Every repository the tracker needs, behind one handle.
pub trait TrackerStore:
    CategoryRepo
    + TagRepo
    + PlayerRepo
    + PlayerCategoryRepo
    + PlayerTagRepo
    + PlayerConfigRepo
    + SocialListRepo
    + SocialListMemberRepo
    + SettingsRepo
{
}

impl<T> TrackerStore for T where
    T: CategoryRepo
        + TagRepo
        + PlayerRepo
        + PlayerCategoryRepo
        + PlayerTagRepo
        + PlayerConfigRepo
        + SocialListRepo
        + SocialListMemberRepo
        + SettingsRepo
{
}
