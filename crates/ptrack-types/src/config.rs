//! Inherited player configuration.
//!
//! Every configurable property is stored as a [`ConfigValue`]: a value plus an
//! [`InheritOverride`] marker. A player's effective value is resolved in three
//! tiers: the player's own override, then the first overriding category (in
//! rank order), then the default configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::ids::CategoryId;

/// Whether a config value participates in resolution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InheritOverride {
    /// Used by the default tier, which has nothing to inherit from.
    #[default]
    None,
    Inherit,
    Override,
}

/// One config property and whether it inherits or overrides.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigValue<T> {
    pub inherit_override: InheritOverride,
    pub value: T,
}

impl<T> ConfigValue<T> {
    pub fn new(inherit_override: InheritOverride, value: T) -> Self {
        Self {
            inherit_override,
            value,
        }
    }

    /// A value that overrides whatever it would inherit.
    pub fn overriding(value: T) -> Self {
        Self::new(InheritOverride::Override, value)
    }

    pub fn is_override(&self) -> bool {
        self.inherit_override == InheritOverride::Override
    }

    /// Set an explicit override.
    pub fn set(&mut self, value: T) {
        self.inherit_override = InheritOverride::Override;
        self.value = value;
    }
}

/// Classification of a player against the external visibility lists.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VisibilityType {
    #[default]
    None,
    Void,
    White,
}

impl fmt::Display for VisibilityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VisibilityType::None => "none",
            VisibilityType::Void => "void",
            VisibilityType::White => "white",
        };
        f.write_str(s)
    }
}

impl FromStr for VisibilityType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(VisibilityType::None),
            "void" | "voidlist" => Ok(VisibilityType::Void),
            "white" | "whitelist" => Ok(VisibilityType::White),
            _ => Err(TypeError::UnknownVisibilityType(s.to_string())),
        }
    }
}

/// Which tier a config belongs to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerConfigKind {
    #[default]
    Default,
    Category,
    Player,
}

/// Default icon glyph for the player list.
pub const DEFAULT_LIST_ICON: char = '\u{f007}';

/// Default palette index for name colours.
pub const DEFAULT_COLOR: u32 = 1;

/// Per-property display and visibility config for a player, a category
/// or the defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerConfig {
    pub kind: PlayerConfigKind,
    pub list_name_color: ConfigValue<u32>,
    pub list_icon: ConfigValue<char>,
    pub nameplate_color: ConfigValue<u32>,
    pub nameplate_custom_title: ConfigValue<String>,
    pub alert_name_change: ConfigValue<bool>,
    pub alert_world_transfer: ConfigValue<bool>,
    pub alert_proximity: ConfigValue<bool>,
    pub visibility: ConfigValue<VisibilityType>,
}

impl PlayerConfig {
    /// Fresh config for a tier. Category and player tiers start out
    /// inheriting everything.
    pub fn new(kind: PlayerConfigKind) -> Self {
        let io = match kind {
            PlayerConfigKind::Default => InheritOverride::None,
            PlayerConfigKind::Category | PlayerConfigKind::Player => InheritOverride::Inherit,
        };
        Self {
            kind,
            list_name_color: ConfigValue::new(io, DEFAULT_COLOR),
            list_icon: ConfigValue::new(io, DEFAULT_LIST_ICON),
            nameplate_color: ConfigValue::new(io, DEFAULT_COLOR),
            nameplate_custom_title: ConfigValue::new(io, String::new()),
            alert_name_change: ConfigValue::new(io, true),
            alert_world_transfer: ConfigValue::new(io, true),
            alert_proximity: ConfigValue::new(io, false),
            visibility: ConfigValue::new(io, VisibilityType::None),
        }
    }

    /// True if any property in this config overrides its parent tier.
    pub fn has_overrides(&self) -> bool {
        self.list_name_color.is_override()
            || self.list_icon.is_override()
            || self.nameplate_color.is_override()
            || self.nameplate_custom_title.is_override()
            || self.alert_name_change.is_override()
            || self.alert_world_transfer.is_override()
            || self.alert_proximity.is_override()
            || self.visibility.is_override()
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self::new(PlayerConfigKind::Default)
    }
}

/// Where an effective value came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigSource {
    Default,
    Category(CategoryId),
    Player,
}

/// A resolved config value and its origin.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Effective<T> {
    pub source: ConfigSource,
    pub value: T,
}

/// Resolve a player property.
///
/// `categories` must be in rank order; the first overriding entry wins.
pub fn resolve_player<'a, T, F, I>(
    defaults: &PlayerConfig,
    player: &PlayerConfig,
    categories: I,
    select: F,
) -> Effective<T>
where
    T: Clone,
    F: Fn(&PlayerConfig) -> &ConfigValue<T>,
    I: IntoIterator<Item = (CategoryId, &'a PlayerConfig)>,
{
    let own = select(player);
    if own.is_override() {
        return Effective {
            source: ConfigSource::Player,
            value: own.value.clone(),
        };
    }

    for (category_id, config) in categories {
        let inherited = select(config);
        if inherited.is_override() {
            return Effective {
                source: ConfigSource::Category(category_id),
                value: inherited.value.clone(),
            };
        }
    }

    resolve_default(defaults, select)
}

/// Resolve a category property (category override, else default).
pub fn resolve_category<T, F>(
    defaults: &PlayerConfig,
    category_id: CategoryId,
    category: &PlayerConfig,
    select: F,
) -> Effective<T>
where
    T: Clone,
    F: Fn(&PlayerConfig) -> &ConfigValue<T>,
{
    let own = select(category);
    if own.is_override() {
        return Effective {
            source: ConfigSource::Category(category_id),
            value: own.value.clone(),
        };
    }
    resolve_default(defaults, select)
}

fn resolve_default<T, F>(defaults: &PlayerConfig, select: F) -> Effective<T>
where
    T: Clone,
    F: Fn(&PlayerConfig) -> &ConfigValue<T>,
{
    Effective {
        source: ConfigSource::Default,
        value: select(defaults).value.clone(),
    }
}
