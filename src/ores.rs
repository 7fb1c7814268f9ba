//! Static ore catalog.
//!
//! Every detection the parser produces takes its rarity and multiplier from
//! this table, keyed by the ore's display name.

use serde::Serialize;

/// Rarity tier of an ore as shown in the forge UI.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
    Mythical,
}

impl Rarity {
    /// Returns true for the tiers counted in progress report stats.
    pub fn is_tracked(self) -> bool {
        matches!(self, Rarity::Legendary | Rarity::Mythical)
    }
}

impl std::fmt::Display for Rarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Rarity::Common => "common",
            Rarity::Uncommon => "uncommon",
            Rarity::Rare => "rare",
            Rarity::Epic => "epic",
            Rarity::Legendary => "legendary",
            Rarity::Mythical => "mythical",
        };
        write!(f, "{}", name)
    }
}

/// One catalog entry.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OreInfo {
    pub name: &'static str,
    pub rarity: Rarity,
    pub multiplier: f64,
}

const fn ore(name: &'static str, rarity: Rarity, multiplier: f64) -> OreInfo {
    OreInfo {
        name,
        rarity,
        multiplier,
    }
}

/// Catalog in a fixed order, so parsing is deterministic.
static ORES: [OreInfo; 17] = [
    ore("Coal Ore", Rarity::Common, 1.0),
    ore("Copper Ore", Rarity::Common, 1.1),
    ore("Iron Ore", Rarity::Common, 1.2),
    ore("Tin Ore", Rarity::Uncommon, 1.3),
    ore("Silver Ore", Rarity::Uncommon, 1.4),
    ore("Gold Ore", Rarity::Uncommon, 1.5),
    ore("Topaz Ore", Rarity::Rare, 1.6),
    ore("Emerald Ore", Rarity::Rare, 1.7),
    ore("Rivalite Ore", Rarity::Rare, 1.75),
    ore("Ruby Ore", Rarity::Rare, 1.8),
    ore("Eye Ore", Rarity::Epic, 1.9),
    ore("Magmaite Ore", Rarity::Epic, 1.95),
    ore("Sapphire Ore", Rarity::Legendary, 2.0),
    ore("Titanium Ore", Rarity::Legendary, 2.2),
    ore("Orichalcum Ore", Rarity::Legendary, 2.4),
    ore("Mythril Ore", Rarity::Mythical, 2.6),
    ore("Adamantite Ore", Rarity::Mythical, 2.8),
];

/// Returns the built-in ore catalog.
pub fn catalog() -> &'static [OreInfo] {
    &ORES
}

/// Looks up a catalog entry by its exact display name.
pub fn find(name: &str) -> Option<&'static OreInfo> {
    ORES.iter().find(|o| o.name == name)
}
