use serde::{Deserialize, Serialize};

use crate::config::PlayerConfig;
use crate::ids::CategoryId;

/// Kind of zone the local character is in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocationType {
    Overworld,
    Content,
    HighEndContent,
}

/// Category automatically assigned to players met in each location type.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationDefaults {
    pub overworld: Option<CategoryId>,
    pub content: Option<CategoryId>,
    pub high_end_content: Option<CategoryId>,
}

impl LocationDefaults {
    /// Default category for `location`.
    pub fn get(&self, location: LocationType) -> Option<CategoryId> {
        match location {
            LocationType::Overworld => self.overworld,
            LocationType::Content => self.content,
            LocationType::HighEndContent => self.high_end_content,
        }
    }

    pub fn set(&mut self, location: LocationType, category: Option<CategoryId>) {
        match location {
            LocationType::Overworld => self.overworld = category,
            LocationType::Content => self.content = category,
            LocationType::HighEndContent => self.high_end_content = category,
        }
    }
}

/// Persisted user settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerSettings {
    /// Bottom tier of config inheritance.
    pub default_player_config: PlayerConfig,
    pub sync_with_visibility: bool,
    pub location_defaults: LocationDefaults,
}

impl TrackerSettings {
    /// Unset every reference to `category`. Returns true if anything changed.
    pub fn clear_category(&mut self, category: CategoryId) -> bool {
        let mut changed = false;
        for slot in [
            &mut self.location_defaults.overworld,
            &mut self.location_defaults.content,
            &mut self.location_defaults.high_end_content,
        ] {
            if *slot == Some(category) {
                *slot = None;
                changed = true;
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_category_unsets_matching_locations() {
        let mut settings = TrackerSettings::default();
        settings
            .location_defaults
            .set(LocationType::Overworld, Some(CategoryId(3)));
        settings
            .location_defaults
            .set(LocationType::HighEndContent, Some(CategoryId(3)));
        settings
            .location_defaults
            .set(LocationType::Content, Some(CategoryId(4)));

        assert!(settings.clear_category(CategoryId(3)));
        assert_eq!(settings.location_defaults.get(LocationType::Overworld), None);
        assert_eq!(
            settings.location_defaults.get(LocationType::HighEndContent),
            None
        );
        assert_eq!(
            settings.location_defaults.get(LocationType::Content),
            Some(CategoryId(4))
        );
        assert!(!settings.clear_category(CategoryId(3)));
    }
}
