//! Handlers for everything the server pushes. Each one tolerates being
//! delivered twice.

use crate::catalog::{ItemKind, LocationSlot};
use crate::notify::NotificationIcon;
use crate::session::{EngineHooks, Session};
use crate::state::FlipMode;
use crate::transport::{NetworkItem, ServerMessage, Transport, TransportEvent};
use crate::{ApError, Result};

impl<T: Transport, H: EngineHooks> Session<T, H> {
    pub(crate) fn dispatch(&mut self, event: TransportEvent) -> Result<()> {
        match event {
            TransportEvent::ItemsCleared => Ok(()),
            TransportEvent::ItemReceived { item_id, notify } => self.receive_item(item_id, notify),
            TransportEvent::LocationChecked(location_id) => self.location_checked(location_id),
            TransportEvent::LocationInfo(items) => {
                self.location_info(&items);
                Ok(())
            }
            TransportEvent::SlotData { key, value } => {
                self.slot_data(&key, value);
                Ok(())
            }
            TransportEvent::Message(msg) => {
                self.server_message(&msg);
                Ok(())
            }
        }
    }

    /// Applies an item to the tracked state. With `notify`, the engine is
    /// also told, or the item is queued until the player is back in game.
    pub(crate) fn receive_item(&mut self, item_id: i64, notify: bool) -> Result<()> {
        let item = self
            .catalog
            .item(item_id)
            .ok_or(ApError::UnknownItem(item_id))?;
        let profile = self.catalog.profile();
        let level = self.state.levels.get_mut(item.ep, item.map)?;
        let level_name = self.catalog.level_name(item.ep, item.map);

        let mut notif_text = None;
        match item.kind {
            ItemKind::Physical(object_type) => {
                if let Some(key) = self.catalog.key_slot(object_type) {
                    level.keys[key] = true;
                    notif_text = level_name;
                }
                if object_type == profile.automap_type {
                    level.has_map = true;
                    notif_text = level_name;
                }
                if object_type == profile.backpack_type {
                    self.state.player.give_backpack(&profile.max_ammo);
                }
                if let Some(weapon) = self.catalog.weapon_slot(object_type) {
                    if !self.state.player.give_weapon(weapon) {
                        log::warn!("weapon slot {weapon} out of range for item {item_id}");
                    }
                }
                // Inventory items are left for the engine's pickup code.
            }
            ItemKind::LevelUnlock => {
                level.unlocked = true;
                notif_text = level_name;
            }
            ItemKind::LevelComplete => level.completed = true,
        }

        if !notify {
            return Ok(());
        }
        if !self.in_game {
            self.state.item_queue.push_back(item_id);
            return Ok(());
        }

        self.hooks.give_item(item.kind, item.ep, item.map);
        if let Some(sprite) = self.catalog.sprite(item.kind) {
            self.notifications
                .push(NotificationIcon::new(sprite, notif_text));
        }
        Ok(())
    }

    /// The server confirmed a location as checked.
    fn location_checked(&mut self, location_id: i64) -> Result<()> {
        let loc = self
            .catalog
            .find_location(location_id)
            .ok_or(ApError::UnknownLocation(location_id))?;
        let LocationSlot::Check(index) = loc.slot else {
            // Completion is tracked by the level's completed flag.
            return Ok(());
        };
        let level = self.state.levels.get_mut(loc.ep, loc.map)?;
        if !level.record_check(index) {
            log::debug!("location {location_id} already recorded");
        }
        Ok(())
    }

    fn location_info(&mut self, items: &[NetworkItem]) {
        let progressive = items
            .iter()
            .filter(|item| item.is_progression())
            .map(|item| item.location);
        self.state.progressive_locations.extend(progressive);
    }

    fn slot_data(&mut self, key: &str, value: i64) {
        let config = &mut self.state.config;
        let int_option = |out: &mut i32| match i32::try_from(value) {
            Ok(v) => *out = v,
            Err(_) => log::warn!("slot data {key}={value} does not fit, ignoring"),
        };
        match key {
            "difficulty" => int_option(&mut config.difficulty),
            "random_monsters" => int_option(&mut config.random_monsters),
            "random_pickups" => int_option(&mut config.random_items),
            "flip_levels" => config.flip_levels = FlipMode::from_raw(value),
            "two_ways_keydoors" => config.two_ways_keydoors = value != 0,
            _ => match key.strip_prefix("episode").and_then(|n| n.parse::<usize>().ok()) {
                Some(n) if n >= 1 && n <= config.episodes.len() => {
                    config.episodes[n - 1] = value != 0;
                }
                Some(n) => log::debug!("slot data for episode {n} which this game lacks"),
                None => log::debug!("ignoring slot data {key}={value}"),
            },
        }
    }

    fn server_message(&mut self, msg: &ServerMessage) {
        log::info!("{}", msg.plain());
        let colored = msg.colored();
        if self.initialized {
            self.hooks.message(&colored);
        } else {
            self.cached_messages.push(colored);
        }
    }
}
