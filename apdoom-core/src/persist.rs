//! `apstate.json` reader/writer.
//!
//! Loading is a sparse merge: any field that is missing or has the wrong
//! type leaves the in-memory value alone. Flags that were stored as 0/1
//! integers are OR-ed into the current value.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::catalog::GameProfile;
use crate::state::{ApState, LevelState};
use crate::{ApError, Result};

pub const STATE_FILE_NAME: &str = "apstate.json";

pub fn state_path(save_dir: &Path) -> PathBuf {
    save_dir.join(STATE_FILE_NAME)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveDocument {
    pub player: PlayerDoc,
    pub episodes: Vec<Vec<LevelDoc>>,
    pub item_queue: Vec<i64>,
    pub ep: i32,
    pub map: i32,
    pub enabled_episodes: Vec<bool>,
    pub progressive_locations: Vec<i64>,
    pub victory: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerDoc {
    pub health: i32,
    pub armor_points: i32,
    pub armor_type: i32,
    pub backpack: i32,
    pub ready_weapon: i32,
    pub kill_count: i32,
    pub item_count: i32,
    pub secret_count: i32,
    pub powers: Vec<i32>,
    pub weapon_owned: Vec<i32>,
    pub ammo: Vec<i32>,
    pub inventory: Vec<InventoryDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryDoc {
    #[serde(rename = "type")]
    pub kind: i32,
    pub count: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelDoc {
    pub completed: i32,
    pub keys0: i32,
    pub keys1: i32,
    pub keys2: i32,
    /// Written for older readers; the `checks` list is authoritative.
    pub check_count: i32,
    pub has_map: i32,
    pub unlocked: i32,
    pub special: i32,
    pub checks: Vec<i64>,
}

fn flag(b: bool) -> i32 {
    b as i32
}

fn level_doc(level: &LevelState) -> LevelDoc {
    LevelDoc {
        completed: flag(level.completed),
        keys0: flag(level.keys[0]),
        keys1: flag(level.keys[1]),
        keys2: flag(level.keys[2]),
        check_count: level.check_count() as i32,
        has_map: flag(level.has_map),
        unlocked: flag(level.unlocked),
        special: flag(level.special),
        checks: level.checks().iter().map(|&c| c as i64).collect(),
    }
}

pub fn to_document(state: &ApState, profile: &GameProfile) -> SaveDocument {
    let player = &state.player;
    let inventory = player
        .inventory
        .iter()
        .filter(|slot| Some(slot.kind) != profile.per_level_inventory_type)
        .map(|slot| InventoryDoc {
            kind: slot.kind,
            count: slot.count,
        })
        .collect();

    let mut episodes = Vec::with_capacity(state.levels.episode_count());
    for ep in 1..=state.levels.episode_count() as i32 {
        let levels = state
            .levels
            .episode(ep)
            .map(|levels| levels.iter().map(level_doc).collect())
            .unwrap_or_default();
        episodes.push(levels);
    }

    SaveDocument {
        player: PlayerDoc {
            health: player.health,
            armor_points: player.armor_points,
            armor_type: player.armor_type,
            backpack: flag(player.backpack),
            ready_weapon: player.ready_weapon,
            kill_count: player.kill_count,
            item_count: player.item_count,
            secret_count: player.secret_count,
            powers: player.powers.clone(),
            weapon_owned: player.weapon_owned.iter().map(|&w| flag(w)).collect(),
            ammo: player.ammo.clone(),
            inventory,
        },
        episodes,
        item_queue: state.item_queue.iter().copied().collect(),
        ep: state.ep,
        map: state.map,
        enabled_episodes: state.config.episodes.clone(),
        progressive_locations: state.progressive_locations.iter().copied().collect(),
        victory: flag(state.config.victory),
    }
}

pub fn to_json_string(state: &ApState, profile: &GameProfile) -> Result<String> {
    Ok(serde_json::to_string_pretty(&to_document(state, profile))?)
}

pub fn save(state: &ApState, profile: &GameProfile, path: &Path) -> Result<()> {
    let text = to_json_string(state, profile)?;
    fs::write(path, text).map_err(|source| ApError::PersistenceWrite {
        path: path.to_path_buf(),
        source,
    })?;
    log::debug!("saved randomizer state to {}", path.display());
    Ok(())
}

/// Merges the file at `path` into `state`. Returns `Ok(false)` when there
/// is no file yet.
pub fn load(state: &mut ApState, profile: &GameProfile, path: &Path) -> Result<bool> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    let doc: Value = serde_json::from_str(&text)?;
    merge_document(state, profile, &doc);
    Ok(true)
}

fn read_int(value: &Value, out: &mut i32) {
    if let Some(n) = value.as_i64().and_then(|n| i32::try_from(n).ok()) {
        *out = n;
    }
}

fn read_flag_or(value: &Value, out: &mut bool) {
    if let Some(n) = value.as_i64() {
        *out |= n != 0;
    }
}

fn read_bool_or_int(value: &Value, out: &mut bool) {
    match value {
        Value::Bool(b) => *out = *b,
        _ => {
            if let Some(n) = value.as_i64() {
                *out = n != 0;
            }
        }
    }
}

fn array_items(value: &Value) -> &[Value] {
    value.as_array().map(Vec::as_slice).unwrap_or(&[])
}

pub fn merge_document(state: &mut ApState, profile: &GameProfile, doc: &Value) {
    let json_player = &doc["player"];
    let player = &mut state.player;
    read_int(&json_player["health"], &mut player.health);
    read_int(&json_player["armor_points"], &mut player.armor_points);
    read_int(&json_player["armor_type"], &mut player.armor_type);
    let mut backpack = player.backpack as i32;
    read_int(&json_player["backpack"], &mut backpack);
    player.backpack = backpack != 0;
    read_int(&json_player["ready_weapon"], &mut player.ready_weapon);
    read_int(&json_player["kill_count"], &mut player.kill_count);
    read_int(&json_player["item_count"], &mut player.item_count);
    read_int(&json_player["secret_count"], &mut player.secret_count);
    for (i, power) in player.powers.iter_mut().enumerate() {
        read_int(&json_player["powers"][i], power);
    }
    for (i, owned) in player.weapon_owned.iter_mut().enumerate() {
        read_flag_or(&json_player["weapon_owned"][i], owned);
    }
    for (i, ammo) in player.ammo.iter_mut().enumerate() {
        read_int(&json_player["ammo"][i], ammo);
    }
    for (i, slot) in player.inventory.iter_mut().enumerate() {
        let json_slot = &json_player["inventory"][i];
        read_int(&json_slot["type"], &mut slot.kind);
        read_int(&json_slot["count"], &mut slot.count);
    }
    player.refresh_max_ammo(&profile.max_ammo);

    let episode_count = state.levels.episode_count() as i32;
    let map_count = state.levels.map_count() as i32;
    for ep in 1..=episode_count {
        for map in 1..=map_count {
            let json_level = &doc["episodes"][(ep - 1) as usize][(map - 1) as usize];
            let Ok(level) = state.levels.get_mut(ep, map) else {
                continue;
            };
            read_flag_or(&json_level["completed"], &mut level.completed);
            read_flag_or(&json_level["keys0"], &mut level.keys[0]);
            read_flag_or(&json_level["keys1"], &mut level.keys[1]);
            read_flag_or(&json_level["keys2"], &mut level.keys[2]);
            read_flag_or(&json_level["has_map"], &mut level.has_map);
            read_flag_or(&json_level["unlocked"], &mut level.unlocked);
            read_flag_or(&json_level["special"], &mut level.special);
            for check in array_items(&json_level["checks"]) {
                if let Some(index) = check.as_i64().and_then(|c| u32::try_from(c).ok()) {
                    level.record_check(index);
                }
            }
        }
    }

    state
        .item_queue
        .extend(array_items(&doc["item_queue"]).iter().filter_map(Value::as_i64));

    read_int(&doc["ep"], &mut state.ep);
    for (i, enabled) in state.config.episodes.iter_mut().enumerate() {
        read_bool_or_int(&doc["enabled_episodes"][i], enabled);
    }
    read_int(&doc["map"], &mut state.map);

    state.progressive_locations.extend(
        array_items(&doc["progressive_locations"])
            .iter()
            .filter_map(Value::as_i64),
    );

    read_flag_or(&doc["victory"], &mut state.config.victory);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Game;
    use crate::state::InventorySlot;
    use serde_json::json;

    fn populated(profile: &GameProfile) -> ApState {
        let mut state = ApState::new(profile);
        state.player.health = 73;
        state.player.armor_points = 120;
        state.player.armor_type = 2;
        state.player.give_backpack(&profile.max_ammo);
        state.player.kill_count = 9;
        state.player.item_count = 4;
        state.player.secret_count = 1;
        state.player.powers[2] = 350;
        state.player.give_weapon(5);
        state.player.ammo = (1..=profile.ammo_count as i32).collect();
        for (i, slot) in state.player.inventory.iter_mut().enumerate() {
            *slot = InventorySlot {
                kind: 20 + i as i32,
                count: i as i32 + 1,
            };
        }
        let level = state.levels.get_mut(2, 4).unwrap();
        level.completed = true;
        level.keys = [true, false, true];
        level.has_map = true;
        level.unlocked = true;
        level.special = true;
        level.record_check(7);
        level.record_check(2);
        state.levels.get_mut(1, 1).unwrap().unlocked = true;
        state.item_queue.extend([300, 100, 200]);
        state.ep = 2;
        state.map = 4;
        state.config.episodes = vec![true, true, false, false, true];
        state.progressive_locations.extend([371000, 371005]);
        state.config.victory = true;
        state
    }

    #[test]
    fn round_trip_restores_persisted_fields() {
        let profile = Game::Heretic.profile();
        let saved = populated(&profile);
        let dir = tempfile::tempdir().unwrap();
        let path = state_path(dir.path());
        save(&saved, &profile, &path).unwrap();

        let mut restored = ApState::new(&profile);
        assert!(load(&mut restored, &profile, &path).unwrap());
        assert_eq!(restored, saved);
        assert_eq!(
            restored.item_queue.iter().copied().collect::<Vec<_>>(),
            vec![300, 100, 200]
        );
        assert_eq!(restored.levels.get(2, 4).unwrap().checks(), &[7, 2]);
    }

    #[test]
    fn backpack_survives_round_trip_as_doubled_max_ammo() {
        let profile = Game::Doom.profile();
        let mut state = ApState::new(&profile);
        state.player.give_backpack(&profile.max_ammo);
        let doc = serde_json::to_value(to_document(&state, &profile)).unwrap();

        let mut restored = ApState::new(&profile);
        merge_document(&mut restored, &profile, &doc);
        assert!(restored.player.backpack);
        assert_eq!(restored.player.max_ammo, vec![400, 100, 600, 100]);
    }

    #[test]
    fn missing_file_keeps_defaults() {
        let profile = Game::Doom.profile();
        let dir = tempfile::tempdir().unwrap();
        let mut state = ApState::new(&profile);
        assert!(!load(&mut state, &profile, &state_path(dir.path())).unwrap());
        assert_eq!(state, ApState::new(&profile));
    }

    #[test]
    fn malformed_file_is_an_error_and_leaves_state() {
        let profile = Game::Doom.profile();
        let dir = tempfile::tempdir().unwrap();
        let path = state_path(dir.path());
        fs::write(&path, "{ not json").unwrap();
        let mut state = ApState::new(&profile);
        assert!(matches!(
            load(&mut state, &profile, &path),
            Err(ApError::Json(_))
        ));
        assert_eq!(state, ApState::new(&profile));
    }

    #[test]
    fn sparse_and_mistyped_fields_are_skipped() {
        let profile = Game::Doom.profile();
        let mut state = ApState::new(&profile);
        merge_document(
            &mut state,
            &profile,
            &json!({
                "player": { "health": "lots", "armor_points": 50, "ammo": [10, null] },
                "episodes": [[{}, { "completed": true, "unlocked": 1 }]],
                "ep": 3.5,
                "item_queue": [1, "two", 3]
            }),
        );
        assert_eq!(state.player.health, 100);
        assert_eq!(state.player.armor_points, 50);
        assert_eq!(state.player.ammo, vec![10, 0, 0, 0]);
        let level = state.levels.get(1, 2).unwrap();
        assert!(!level.completed);
        assert!(level.unlocked);
        assert_eq!(state.ep, 0);
        assert_eq!(state.item_queue, [1, 3]);
    }

    #[test]
    fn flags_merge_with_or() {
        let profile = Game::Doom.profile();
        let mut state = ApState::new(&profile);
        state.levels.get_mut(1, 1).unwrap().completed = true;
        state.config.victory = true;
        merge_document(
            &mut state,
            &profile,
            &json!({
                "player": { "weapon_owned": [0, 0, 1] },
                "episodes": [[{ "completed": 0 }]],
                "victory": 0
            }),
        );
        assert!(state.levels.get(1, 1).unwrap().completed);
        assert!(state.config.victory);
        assert_eq!(&state.player.weapon_owned[..3], &[true, true, true]);
    }

    #[test]
    fn backpack_and_counts_overwrite() {
        let profile = Game::Doom.profile();
        let mut state = ApState::new(&profile);
        state.player.give_backpack(&profile.max_ammo);
        merge_document(&mut state, &profile, &json!({ "player": { "backpack": 0 } }));
        assert!(!state.player.backpack);
        assert_eq!(state.player.max_ammo, profile.max_ammo);
    }

    #[test]
    fn checks_list_wins_over_check_count() {
        let profile = Game::Doom.profile();
        let mut state = ApState::new(&profile);
        merge_document(
            &mut state,
            &profile,
            &json!({ "episodes": [[{ "check_count": 9, "checks": [4, -1, 4, 6] }]] }),
        );
        let level = state.levels.get(1, 1).unwrap();
        assert_eq!(level.checks(), &[4, 6]);
        assert_eq!(level.check_count(), 2);
    }

    #[test]
    fn per_level_inventory_is_not_saved() {
        let profile = Game::Heretic.profile();
        let mut state = ApState::new(&profile);
        state.player.inventory[0] = InventorySlot { kind: 9, count: 1 };
        state.player.inventory[1] = InventorySlot { kind: 3, count: 2 };
        let doc = to_document(&state, &profile);
        assert!(doc.player.inventory.iter().all(|slot| slot.kind != 9));
        assert_eq!(doc.player.inventory[0].kind, 3);
    }

    #[test]
    fn document_uses_save_compatible_layout() {
        let profile = Game::Doom2.profile();
        let mut state = ApState::new(&profile);
        state.config.episodes = vec![true];
        state.levels.get_mut(1, 3).unwrap().record_check(5);
        let value = serde_json::to_value(to_document(&state, &profile)).unwrap();

        for key in [
            "player",
            "episodes",
            "item_queue",
            "ep",
            "map",
            "enabled_episodes",
            "progressive_locations",
            "victory",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert_eq!(value["episodes"][0].as_array().unwrap().len(), 32);
        assert_eq!(value["episodes"][0][2]["checks"], json!([5]));
        assert_eq!(value["episodes"][0][2]["check_count"], json!(1));
        assert_eq!(value["enabled_episodes"], json!([true]));
        assert_eq!(value["player"]["weapon_owned"][1], json!(1));
        assert!(value["episodes"][0][0].get("flipped").is_none());
    }

    #[test]
    fn enabled_episodes_accept_ints() {
        let profile = Game::Doom.profile();
        let mut state = ApState::new(&profile);
        merge_document(
            &mut state,
            &profile,
            &json!({ "enabled_episodes": [0, 1, true, "yes"] }),
        );
        assert_eq!(state.config.episodes, vec![false, true, true, false]);
    }
}
