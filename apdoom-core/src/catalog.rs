use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::{ApError, Result};

/// Number of key flags tracked per level.
pub const KEY_COUNT: usize = 3;

/// What a received item represents in game terms.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum ItemKind {
    /// A pickup the engine knows by its object type.
    Physical(i32),
    LevelUnlock,
    LevelComplete,
}

impl ItemKind {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            -1 => ItemKind::LevelUnlock,
            -2 => ItemKind::LevelComplete,
            t => ItemKind::Physical(t),
        }
    }

    /// Object type as the engine and the data tables spell it.
    pub fn raw(self) -> i32 {
        match self {
            ItemKind::Physical(t) => t,
            ItemKind::LevelUnlock => -1,
            ItemKind::LevelComplete => -2,
        }
    }
}

impl From<i32> for ItemKind {
    fn from(raw: i32) -> Self {
        ItemKind::from_raw(raw)
    }
}

impl From<ItemKind> for i32 {
    fn from(kind: ItemKind) -> Self {
        kind.raw()
    }
}

/// A slot inside a level's location table.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum LocationSlot {
    /// Reaching the exit. Tracked through the level's completed flag.
    Completion,
    Check(u32),
}

impl LocationSlot {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            -1 => Some(LocationSlot::Completion),
            i if i >= 0 => Some(LocationSlot::Check(i as u32)),
            _ => None,
        }
    }

    pub fn raw(self) -> i32 {
        match self {
            LocationSlot::Completion => -1,
            LocationSlot::Check(i) => i as i32,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub ep: i32,
    pub map: i32,
    #[serde(rename = "doom_type")]
    pub kind: ItemKind,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LocationRef {
    pub ep: i32,
    pub map: i32,
    pub slot: LocationSlot,
}

/// Per-title constants the state store is sized from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameProfile {
    pub episode_count: usize,
    pub map_count: usize,
    pub weapon_count: usize,
    pub ammo_count: usize,
    pub powerup_count: usize,
    pub inventory_count: usize,
    /// Base max ammo per ammo type, before the backpack doubles it.
    pub max_ammo: Vec<i32>,
    /// (object type, key slot)
    pub key_types: Vec<(i32, usize)>,
    /// (object type, weapon slot)
    pub weapon_types: Vec<(i32, usize)>,
    pub automap_type: i32,
    pub backpack_type: i32,
    /// Inventory item that only lives for the current level and is never saved.
    pub per_level_inventory_type: Option<i32>,
}

const DOOM_KEYS: &[(i32, usize)] = &[(5, 0), (40, 0), (6, 1), (39, 1), (13, 2), (38, 2)];
const HERETIC_KEYS: &[(i32, usize)] = &[(80, 0), (73, 1), (79, 2)];

const DOOM_WEAPONS: &[(i32, usize)] = &[
    (2001, 2),
    (2002, 3),
    (2003, 4),
    (2004, 5),
    (2006, 6),
    (2005, 7),
];
// Doom II adds the super shotgun.
const DOOM2_WEAPONS: &[(i32, usize)] = &[
    (2001, 2),
    (2002, 3),
    (2003, 4),
    (2004, 5),
    (2006, 6),
    (2005, 7),
    (82, 1),
];
const HERETIC_WEAPONS: &[(i32, usize)] = &[
    (2005, 7),
    (2001, 2),
    (53, 3),
    (2003, 5),
    (2002, 6),
    (2004, 4),
];

const DOOM_MAX_AMMO: &[i32] = &[200, 50, 300, 50];
const HERETIC_MAX_AMMO: &[i32] = &[100, 50, 200, 200, 20, 150];

const BACKPACK_TYPE: i32 = 8;
const HERETIC_WINGS_TYPE: i32 = 9;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Game {
    Doom,
    Doom2,
    Heretic,
}

impl Game {
    pub const ALL: [Game; 3] = [Game::Doom, Game::Doom2, Game::Heretic];

    pub fn from_title(title: &str) -> Result<Self> {
        Game::ALL
            .iter()
            .copied()
            .find(|g| g.title() == title)
            .ok_or_else(|| ApError::UnsupportedGame(title.to_string()))
    }

    /// Title string the randomizer server uses for this game.
    pub fn title(self) -> &'static str {
        match self {
            Game::Doom => "DOOM 1993",
            Game::Doom2 => "DOOM II",
            Game::Heretic => "Heretic",
        }
    }

    pub fn profile(self) -> GameProfile {
        match self {
            Game::Doom => GameProfile {
                episode_count: 4,
                map_count: 9,
                weapon_count: 9,
                ammo_count: 4,
                powerup_count: 6,
                inventory_count: 0,
                max_ammo: DOOM_MAX_AMMO.to_vec(),
                key_types: DOOM_KEYS.to_vec(),
                weapon_types: DOOM_WEAPONS.to_vec(),
                automap_type: 2026,
                backpack_type: BACKPACK_TYPE,
                per_level_inventory_type: None,
            },
            Game::Doom2 => GameProfile {
                episode_count: 1,
                map_count: 32,
                weapon_count: 9,
                ammo_count: 4,
                powerup_count: 6,
                inventory_count: 0,
                max_ammo: DOOM_MAX_AMMO.to_vec(),
                key_types: DOOM_KEYS.to_vec(),
                weapon_types: DOOM2_WEAPONS.to_vec(),
                automap_type: 2026,
                backpack_type: BACKPACK_TYPE,
                per_level_inventory_type: None,
            },
            Game::Heretic => GameProfile {
                episode_count: 5,
                map_count: 9,
                weapon_count: 9,
                ammo_count: 6,
                powerup_count: 9,
                inventory_count: 14,
                max_ammo: HERETIC_MAX_AMMO.to_vec(),
                key_types: HERETIC_KEYS.to_vec(),
                weapon_types: HERETIC_WEAPONS.to_vec(),
                automap_type: 35,
                backpack_type: BACKPACK_TYPE,
                per_level_inventory_type: Some(HERETIC_WINGS_TYPE),
            },
        }
    }
}

/// Read-only lookups the session performs against the game data.
pub trait GameCatalog {
    fn profile(&self) -> &GameProfile;

    fn item(&self, item_id: i64) -> Option<ItemRecord>;

    fn location_id(&self, ep: i32, map: i32, slot: LocationSlot) -> Option<i64>;

    /// Reverse lookup from a network location id.
    fn find_location(&self, location_id: i64) -> Option<LocationRef>;

    /// Every known location, in episode/map/slot order.
    fn locations(&self) -> Vec<(LocationRef, i64)>;

    fn level_name(&self, ep: i32, map: i32) -> Option<&str>;

    /// Notification sprite lump for an item kind, if it has one.
    fn sprite(&self, kind: ItemKind) -> Option<&str>;

    fn key_slot(&self, object_type: i32) -> Option<usize> {
        self.profile()
            .key_types
            .iter()
            .find(|(t, _)| *t == object_type)
            .map(|(_, slot)| *slot)
    }

    fn weapon_slot(&self, object_type: i32) -> Option<usize> {
        self.profile()
            .weapon_types
            .iter()
            .find(|(t, _)| *t == object_type)
            .map(|(_, slot)| *slot)
    }
}

/// Item/location/name tables for one title, usually loaded from JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogTables {
    pub items: HashMap<i64, ItemRecord>,
    /// episode -> map -> location index (-1 = completion) -> network id
    pub locations: BTreeMap<i32, BTreeMap<i32, BTreeMap<i32, i64>>>,
    /// level_names[ep - 1][map - 1]
    pub level_names: Vec<Vec<String>>,
    /// raw object type -> sprite lump
    pub sprites: HashMap<i32, String>,
}

impl CatalogTables {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

pub struct StaticCatalog {
    profile: GameProfile,
    tables: CatalogTables,
    by_location_id: HashMap<i64, LocationRef>,
}

impl StaticCatalog {
    pub fn new(profile: GameProfile, tables: CatalogTables) -> Self {
        let mut by_location_id = HashMap::new();
        for (&ep, maps) in &tables.locations {
            for (&map, indices) in maps {
                for (&index, &id) in indices {
                    let Some(slot) = LocationSlot::from_raw(index) else {
                        log::warn!("catalog: ignoring location E{ep}M{map} with index {index}");
                        continue;
                    };
                    // First entry wins when the table repeats an id.
                    by_location_id
                        .entry(id)
                        .or_insert(LocationRef { ep, map, slot });
                }
            }
        }

        Self {
            profile,
            tables,
            by_location_id,
        }
    }

    pub fn for_game(game: Game, tables: CatalogTables) -> Self {
        Self::new(game.profile(), tables)
    }
}

impl GameCatalog for StaticCatalog {
    fn profile(&self) -> &GameProfile {
        &self.profile
    }

    fn item(&self, item_id: i64) -> Option<ItemRecord> {
        self.tables.items.get(&item_id).copied()
    }

    fn location_id(&self, ep: i32, map: i32, slot: LocationSlot) -> Option<i64> {
        self.tables
            .locations
            .get(&ep)?
            .get(&map)?
            .get(&slot.raw())
            .copied()
    }

    fn find_location(&self, location_id: i64) -> Option<LocationRef> {
        self.by_location_id.get(&location_id).copied()
    }

    fn locations(&self) -> Vec<(LocationRef, i64)> {
        let mut out = Vec::new();
        for (&ep, maps) in &self.tables.locations {
            for (&map, indices) in maps {
                for (&index, &id) in indices {
                    if let Some(slot) = LocationSlot::from_raw(index) {
                        out.push((LocationRef { ep, map, slot }, id));
                    }
                }
            }
        }
        out
    }

    fn level_name(&self, ep: i32, map: i32) -> Option<&str> {
        if ep < 1 || map < 1 {
            return None;
        }
        self.tables
            .level_names
            .get(ep as usize - 1)?
            .get(map as usize - 1)
            .map(String::as_str)
    }

    fn sprite(&self, kind: ItemKind) -> Option<&str> {
        self.tables.sprites.get(&kind.raw()).map(String::as_str)
    }
}
