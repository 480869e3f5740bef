//! Effective configuration for players and categories.

use std::collections::HashMap;

use ptrack_types::{
    resolve_category, resolve_player, Category, CategoryId, ConfigValue, DerivedFields,
    Effective, Player, PlayerConfig, VisibilityType,
};

/// A point-in-time view of the default config and every category config,
/// ordered by rank.
///
/// Built by [`crate::CategoryStore::resolver`]. It does not observe later
/// category edits; build a new one after a mutation.
#[derive(Clone, Debug)]
pub struct ConfigResolver {
    defaults: PlayerConfig,
    ranked: Vec<(CategoryId, u32, PlayerConfig)>,
    ranks: HashMap<CategoryId, u32>,
}

impl ConfigResolver {
    /// Snapshot of the default config and every category config.
    pub fn new<I>(defaults: PlayerConfig, categories: I) -> Self
    where
        I: IntoIterator<Item = Category>,
    {
        let mut ranked: Vec<_> = categories
            .into_iter()
            .map(|c| (c.id, c.rank, c.config))
            .collect();
        ranked.sort_by_key(|(id, rank, _)| (*rank, *id));
        let ranks = ranked.iter().map(|(id, rank, _)| (*id, *rank)).collect();
        Self {
            defaults,
            ranked,
            ranks,
        }
    }

    /// Rank of a category known to this resolver.
    pub fn rank_of(&self, category: CategoryId) -> Option<u32> {
        self.ranks.get(&category).copied()
    }

    pub fn contains(&self, category: CategoryId) -> bool {
        self.ranks.contains_key(&category)
    }

    /// The assigned category with the lowest rank. Unknown ids are ignored.
    pub fn primary_category(&self, player: &Player) -> Option<CategoryId> {
        player
            .assigned_categories
            .iter()
            .filter_map(|id| self.rank_of(*id).map(|rank| (rank, *id)))
            .min()
            .map(|(_, id)| id)
    }

    /// Effective value for a player: its own override, then its categories
    /// in rank order, then the default.
    pub fn player_value<T, F>(&self, player: &Player, select: F) -> Effective<T>
    where
        T: Clone,
        F: Fn(&PlayerConfig) -> &ConfigValue<T>,
    {
        let assigned = self
            .ranked
            .iter()
            .filter(|(id, _, _)| player.has_category(*id))
            .map(|(id, _, config)| (*id, config));
        resolve_player(&self.defaults, &player.config, assigned, select)
    }

    /// Effective value for a category. Unknown categories resolve to the
    /// default config.
    pub fn category_value<T, F>(&self, category: CategoryId, select: F) -> Effective<T>
    where
        T: Clone,
        F: Fn(&PlayerConfig) -> &ConfigValue<T>,
    {
        match self.ranked.iter().find(|(id, _, _)| *id == category) {
            Some((id, _, config)) => resolve_category(&self.defaults, *id, config, select),
            None => resolve_category(&self.defaults, category, &self.defaults, select),
        }
    }

    /// Effective visibility classification of `player`.
    pub fn visibility(&self, player: &Player) -> VisibilityType {
        self.player_value(player, |c| &c.visibility).value
    }

    /// Primary category, name colour and icon for `player`.
    pub fn derive(&self, player: &Player) -> DerivedFields {
        DerivedFields {
            primary_category_id: self.primary_category(player),
            name_color: self.player_value(player, |c| &c.list_name_color).value,
            icon: self.player_value(player, |c| &c.list_icon).value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ptrack_types::{ConfigSource, ContentId, PlayerConfigKind};

    fn category(id: u32, rank: u32) -> Category {
        let mut c = Category::new(format!("c{id}"), rank, None);
        c.id = CategoryId(id);
        c
    }

    #[test]
    fn primary_category_is_lowest_rank() {
        let resolver = ConfigResolver::new(
            PlayerConfig::default(),
            [category(1, 3), category(2, 1), category(3, 2)],
        );
        let mut player = Player::new("A B", 1, ContentId(1));
        player.assigned_categories = vec![CategoryId(1), CategoryId(3), CategoryId(99)];
        assert_eq!(resolver.primary_category(&player), Some(CategoryId(3)));

        player.assigned_categories.clear();
        assert_eq!(resolver.primary_category(&player), None);
    }

    #[test]
    fn higher_priority_category_override_wins() {
        let mut low = category(1, 2);
        low.config.list_name_color.set(10);
        let mut high = category(2, 1);
        high.config.list_name_color.set(20);
        let resolver = ConfigResolver::new(PlayerConfig::default(), [low, high]);

        let mut player = Player::new("A B", 1, ContentId(1));
        player.assigned_categories = vec![CategoryId(1), CategoryId(2)];
        let derived = resolver.derive(&player);
        assert_eq!(derived.name_color, 20);
        assert_eq!(derived.primary_category_id, Some(CategoryId(2)));
    }

    #[test]
    fn category_value_falls_back_to_defaults() {
        let mut defaults = PlayerConfig::default();
        defaults.visibility.value = VisibilityType::White;
        let resolver = ConfigResolver::new(defaults, [category(1, 1)]);

        let eff = resolver.category_value(CategoryId(1), |c| &c.visibility);
        assert_eq!(eff.value, VisibilityType::White);
        assert_eq!(eff.source, ConfigSource::Default);

        let eff = resolver.category_value(CategoryId(42), |c| &c.visibility);
        assert_eq!(eff.value, VisibilityType::White);
    }

    #[test]
    fn visibility_of_unconfigured_player_is_none() {
        let resolver = ConfigResolver::new(PlayerConfig::default(), []);
        let player = Player::new("A B", 1, ContentId(1));
        assert_eq!(resolver.visibility(&player), VisibilityType::None);
        assert_eq!(player.config.kind, PlayerConfigKind::Player);
    }
}
