use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeSet, VecDeque};

use crate::catalog::{GameProfile, KEY_COUNT};
use crate::{ApError, Result};

/// Most checks a single level can record.
pub const CHECK_CAPACITY: usize = 64;

const STARTING_HEALTH: i32 = 100;
const STARTING_CLIP: i32 = 50;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct InventorySlot {
    pub kind: i32,
    pub count: i32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerState {
    pub health: i32,
    pub armor_points: i32,
    pub armor_type: i32,
    pub backpack: bool,
    pub ready_weapon: i32,
    pub kill_count: i32,
    pub item_count: i32,
    pub secret_count: i32,
    pub powers: Vec<i32>,
    pub weapon_owned: Vec<bool>,
    pub ammo: Vec<i32>,
    pub max_ammo: Vec<i32>,
    pub inventory: Vec<InventorySlot>,
}

impl PlayerState {
    /// Fresh player with the starting loadout: fist, pistol and one clip.
    pub fn new(profile: &GameProfile) -> Self {
        let mut player = Self {
            health: STARTING_HEALTH,
            armor_points: 0,
            armor_type: 0,
            backpack: false,
            ready_weapon: 1,
            kill_count: 0,
            item_count: 0,
            secret_count: 0,
            powers: vec![0; profile.powerup_count],
            weapon_owned: vec![false; profile.weapon_count],
            ammo: vec![0; profile.ammo_count],
            max_ammo: vec![0; profile.ammo_count],
            inventory: vec![InventorySlot::default(); profile.inventory_count],
        };
        for owned in player.weapon_owned.iter_mut().take(2) {
            *owned = true;
        }
        if let Some(clip) = player.ammo.first_mut() {
            *clip = STARTING_CLIP;
        }
        player.refresh_max_ammo(&profile.max_ammo);
        player
    }

    pub fn give_backpack(&mut self, base_max_ammo: &[i32]) {
        self.backpack = true;
        self.refresh_max_ammo(base_max_ammo);
    }

    /// Recomputes max ammo from the base table; the backpack doubles it.
    pub fn refresh_max_ammo(&mut self, base_max_ammo: &[i32]) {
        let factor = if self.backpack { 2 } else { 1 };
        for (max, base) in self.max_ammo.iter_mut().zip(base_max_ammo) {
            *max = base * factor;
        }
    }

    pub fn give_weapon(&mut self, slot: usize) -> bool {
        match self.weapon_owned.get_mut(slot) {
            Some(owned) => {
                *owned = true;
                true
            }
            None => false,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LevelState {
    pub completed: bool,
    pub keys: [bool; KEY_COUNT],
    checks: Vec<u32>,
    pub has_map: bool,
    pub unlocked: bool,
    pub special: bool,
    /// Mirrored geometry, decided once when the session starts.
    flipped: bool,
}

impl LevelState {
    pub fn checks(&self) -> &[u32] {
        &self.checks
    }

    pub fn is_flipped(&self) -> bool {
        self.flipped
    }

    pub fn check_count(&self) -> usize {
        self.checks.len()
    }

    pub fn is_checked(&self, index: u32) -> bool {
        self.checks.contains(&index)
    }

    /// Appends a check. Returns false for duplicates or when the level is full.
    pub fn record_check(&mut self, index: u32) -> bool {
        if self.is_checked(index) {
            return false;
        }
        if self.checks.len() >= CHECK_CAPACITY {
            log::warn!("level check list full, dropping location index {index}");
            return false;
        }
        self.checks.push(index);
        true
    }
}

/// Per-level state for every (episode, map), stored episode-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelGrid {
    episode_count: usize,
    map_count: usize,
    levels: Vec<LevelState>,
}

impl LevelGrid {
    pub fn new(episode_count: usize, map_count: usize) -> Self {
        Self {
            episode_count,
            map_count,
            levels: vec![LevelState::default(); episode_count * map_count],
        }
    }

    pub fn episode_count(&self) -> usize {
        self.episode_count
    }

    pub fn map_count(&self) -> usize {
        self.map_count
    }

    /// Arena slot of a 1-based (episode, map) pair.
    pub fn index(&self, ep: i32, map: i32) -> Result<usize> {
        let in_range = ep >= 1
            && map >= 1
            && (ep as usize) <= self.episode_count
            && (map as usize) <= self.map_count;
        if !in_range {
            return Err(ApError::LevelOutOfRange { ep, map });
        }
        Ok((ep as usize - 1) * self.map_count + (map as usize - 1))
    }

    pub fn get(&self, ep: i32, map: i32) -> Result<&LevelState> {
        let i = self.index(ep, map)?;
        Ok(&self.levels[i])
    }

    pub fn get_mut(&mut self, ep: i32, map: i32) -> Result<&mut LevelState> {
        let i = self.index(ep, map)?;
        Ok(&mut self.levels[i])
    }

    pub fn episode(&self, ep: i32) -> Result<&[LevelState]> {
        let start = self.index(ep, 1)?;
        Ok(&self.levels[start..start + self.map_count])
    }

    /// Levels with their 1-based (episode, map).
    pub fn iter(&self) -> impl Iterator<Item = ((i32, i32), &LevelState)> {
        let map_count = self.map_count;
        self.levels.iter().enumerate().map(move |(i, level)| {
            (((i / map_count) as i32 + 1, (i % map_count) as i32 + 1), level)
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut LevelState> {
        self.levels.iter_mut()
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum FlipMode {
    #[default]
    Off,
    Always,
    Seeded,
}

impl FlipMode {
    pub fn from_raw(raw: i64) -> Self {
        match raw {
            1 => FlipMode::Always,
            2 => FlipMode::Seeded,
            _ => FlipMode::Off,
        }
    }
}

/// Options delivered by the server as slot data, plus the victory flag.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionConfig {
    pub difficulty: i32,
    pub random_monsters: i32,
    pub random_items: i32,
    pub flip_levels: FlipMode,
    pub episodes: Vec<bool>,
    pub two_ways_keydoors: bool,
    pub victory: bool,
}

impl SessionConfig {
    pub fn is_episode_enabled(&self, ep: i32) -> bool {
        ep >= 1 && self.episodes.get(ep as usize - 1).copied().unwrap_or(false)
    }
}

/// Everything the randomizer tracks for one seed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApState {
    pub player: PlayerState,
    pub levels: LevelGrid,
    pub config: SessionConfig,
    /// Episode and map the player was last on.
    pub ep: i32,
    pub map: i32,
    /// Items received outside of gameplay, oldest first.
    pub item_queue: VecDeque<i64>,
    pub progressive_locations: BTreeSet<i64>,
}

impl ApState {
    pub fn new(profile: &GameProfile) -> Self {
        Self {
            player: PlayerState::new(profile),
            levels: LevelGrid::new(profile.episode_count, profile.map_count),
            config: SessionConfig {
                episodes: vec![false; profile.episode_count],
                ..SessionConfig::default()
            },
            ep: 0,
            map: 0,
            item_queue: VecDeque::new(),
            progressive_locations: BTreeSet::new(),
        }
    }

    /// Enables the first episode when the server enabled none.
    pub fn ensure_episode_enabled(&mut self) {
        if !self.config.episodes.iter().any(|&e| e) {
            if let Some(first) = self.config.episodes.first_mut() {
                *first = true;
            }
        }
    }

    pub fn apply_flips(&mut self, mode: FlipMode, seed: &str) {
        match mode {
            FlipMode::Off => {}
            FlipMode::Always => {
                for level in self.levels.iter_mut() {
                    level.flipped = true;
                }
            }
            FlipMode::Seeded => {
                let mut rng = ChaCha8Rng::seed_from_u64(hash_seed(seed));
                for level in self.levels.iter_mut() {
                    level.flipped = rng.gen_range(0..2) == 1;
                }
            }
        }
    }

    /// True when every level of every enabled episode is completed.
    pub fn all_enabled_complete(&self) -> bool {
        self.levels
            .iter()
            .filter(|((ep, _), _)| self.config.is_episode_enabled(*ep))
            .all(|(_, level)| level.completed)
    }
}

/// djb2: `hash * 33 + byte`, starting from 5381. Bytes are sign-extended
/// like a signed `char`, so non-ASCII seeds hash as the game always has.
pub fn hash_seed(seed: &str) -> u64 {
    seed.bytes().fold(5381u64, |hash, b| {
        hash.wrapping_mul(33).wrapping_add(b as i8 as i64 as u64)
    })
}
