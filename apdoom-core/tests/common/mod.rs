#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::time::Duration;

use apdoom_core::{
    ApError, ApSettings, CatalogTables, ConnectionStatus, EngineHooks, Game, GameProfile,
    ItemKind, ItemRecord, NetworkItem, NetworkVersion, RoomInfo, Session, StaticCatalog,
    Transport, TransportEvent,
};

/// In-memory stand-in for the randomizer client.
pub struct ScriptedTransport {
    pub status: ConnectionStatus,
    pub room: Option<RoomInfo>,
    pub events: VecDeque<TransportEvent>,
    /// Queued as a `LocationInfo` event when scouts are sent.
    pub scout_reply: Option<Vec<NetworkItem>>,

    pub version: Option<NetworkVersion>,
    pub configured: Option<(String, String, String, String)>,
    pub deathlink_supported: bool,
    pub slot_options: Vec<String>,
    pub started: bool,
    pub sent_checks: Vec<i64>,
    pub scouts: Vec<Vec<i64>>,
    pub story_completions: usize,
    pub deaths_sent: usize,
    pub deaths_cleared: usize,
    pub death_pending: bool,
    pub raw_packets: Vec<String>,
}

impl ScriptedTransport {
    pub fn authenticated(seed_name: &str) -> Self {
        Self {
            status: ConnectionStatus::Authenticated,
            room: Some(RoomInfo {
                seed_name: seed_name.to_string(),
            }),
            ..Self::offline()
        }
    }

    pub fn offline() -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            room: None,
            events: VecDeque::new(),
            scout_reply: None,
            version: None,
            configured: None,
            deathlink_supported: false,
            slot_options: Vec::new(),
            started: false,
            sent_checks: Vec::new(),
            scouts: Vec::new(),
            story_completions: 0,
            deaths_sent: 0,
            deaths_cleared: 0,
            death_pending: false,
            raw_packets: Vec::new(),
        }
    }

    pub fn with_scout_reply(mut self, progressive: &[i64]) -> Self {
        self.scout_reply = Some(
            progressive
                .iter()
                .map(|&location| NetworkItem {
                    item: location + 1_000,
                    location,
                    player: 1,
                    flags: 1,
                })
                .collect(),
        );
        self
    }

    pub fn push(&mut self, event: TransportEvent) {
        self.events.push_back(event);
    }
}

impl Transport for ScriptedTransport {
    fn set_client_version(&mut self, version: NetworkVersion) {
        self.version = Some(version);
    }

    fn configure(&mut self, server: &str, game: &str, player_name: &str, password: &str) {
        self.configured = Some((
            server.to_string(),
            game.to_string(),
            player_name.to_string(),
            password.to_string(),
        ));
    }

    fn set_deathlink_supported(&mut self, supported: bool) {
        self.deathlink_supported = supported;
    }

    fn register_slot_option(&mut self, name: &str) {
        self.slot_options.push(name.to_string());
    }

    fn start(&mut self) {
        self.started = true;
    }

    fn status(&self) -> ConnectionStatus {
        self.status
    }

    fn room_info(&self) -> Option<RoomInfo> {
        self.room.clone()
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        self.events.pop_front()
    }

    fn send_location_check(&mut self, location_id: i64) {
        self.sent_checks.push(location_id);
    }

    fn send_location_scouts(&mut self, location_ids: &[i64], _create_hints: bool) {
        self.scouts.push(location_ids.to_vec());
        if let Some(reply) = self.scout_reply.take() {
            self.events.push_back(TransportEvent::LocationInfo(reply));
        }
    }

    fn story_complete(&mut self) {
        self.story_completions += 1;
    }

    fn deathlink_send(&mut self) {
        self.deaths_sent += 1;
    }

    fn deathlink_clear(&mut self) {
        self.deaths_cleared += 1;
        self.death_pending = false;
    }

    fn deathlink_pending(&self) -> bool {
        self.death_pending
    }

    fn send_raw(&mut self, packet: &str) {
        self.raw_packets.push(packet.to_string());
    }
}

#[derive(Default)]
pub struct RecordingHooks {
    pub given: Vec<(ItemKind, i32, i32)>,
    pub victories: usize,
    pub messages: Vec<String>,
    pub save_failures: Vec<String>,
}

impl EngineHooks for RecordingHooks {
    fn give_item(&mut self, kind: ItemKind, ep: i32, map: i32) {
        self.given.push((kind, ep, map));
    }

    fn victory(&mut self) {
        self.victories += 1;
    }

    fn message(&mut self, text: &str) {
        self.messages.push(text.to_string());
    }

    fn save_failed(&mut self, error: &ApError) {
        self.save_failures.push(error.to_string());
    }
}

pub type TestSession = Session<ScriptedTransport, RecordingHooks>;

pub const PLAYER: &str = "ABCD";

pub fn settings(save_root: &Path) -> ApSettings {
    ApSettings {
        game: "DOOM 1993".to_string(),
        player_name: PLAYER.to_string(),
        password: "hunter2".to_string(),
        save_root: save_root.to_path_buf(),
        connect_timeout: Duration::from_millis(200),
        poll_interval: Duration::from_millis(1),
        ..ApSettings::default()
    }
}

// Item ids of the small catalog.
pub const ITEM_E1M2_UNLOCK: i64 = 500;
pub const ITEM_E1M1_BLUE_KEY: i64 = 501;
pub const ITEM_BACKPACK: i64 = 502;
pub const ITEM_E1M2_COMPLETE: i64 = 503;
pub const ITEM_E1M1_COMPLETE: i64 = 504;
pub const ITEM_SHOTGUN: i64 = 505;

// Location ids of the small catalog: E1M1 has checks 0..=2, E1M2 has 0..=1.
pub const LOC_E1M1_EXIT: i64 = 600;
pub const LOC_E1M1_0: i64 = 601;
pub const LOC_E1M1_1: i64 = 602;
pub const LOC_E1M1_2: i64 = 603;
pub const LOC_E1M2_EXIT: i64 = 610;
pub const LOC_E1M2_0: i64 = 611;
pub const LOC_E1M2_1: i64 = 612;

/// One episode with two maps, Doom object types.
pub fn small_profile() -> GameProfile {
    GameProfile {
        episode_count: 1,
        map_count: 2,
        ..Game::Doom.profile()
    }
}

pub fn small_tables() -> CatalogTables {
    let mut tables = CatalogTables::default();
    for (id, map, doom_type) in [
        (ITEM_E1M2_UNLOCK, 2, -1),
        (ITEM_E1M1_BLUE_KEY, 1, 5),
        (ITEM_BACKPACK, 1, 8),
        (ITEM_E1M2_COMPLETE, 2, -2),
        (ITEM_E1M1_COMPLETE, 1, -2),
        (ITEM_SHOTGUN, 1, 2001),
    ] {
        tables.items.insert(
            id,
            ItemRecord {
                ep: 1,
                map,
                kind: ItemKind::from_raw(doom_type),
            },
        );
    }
    let mut maps = BTreeMap::new();
    maps.insert(
        1,
        BTreeMap::from([(-1, LOC_E1M1_EXIT), (0, LOC_E1M1_0), (1, LOC_E1M1_1), (2, LOC_E1M1_2)]),
    );
    maps.insert(
        2,
        BTreeMap::from([(-1, LOC_E1M2_EXIT), (0, LOC_E1M2_0), (1, LOC_E1M2_1)]),
    );
    tables.locations.insert(1, maps);
    tables.level_names = vec![vec!["Hangar".to_string(), "Nuclear Plant".to_string()]];
    tables.sprites.insert(-1, "LVLUNLK".to_string());
    tables.sprites.insert(5, "BKEYA0".to_string());
    tables
}

pub fn small_session(save_root: &Path, transport: ScriptedTransport) -> TestSession {
    Session::with_catalog(
        settings(save_root),
        Box::new(StaticCatalog::new(small_profile(), small_tables())),
        transport,
        RecordingHooks::default(),
    )
}

/// A small session that has completed its handshake.
pub fn connected_session(save_root: &Path) -> TestSession {
    let transport = ScriptedTransport::authenticated("testseed").with_scout_reply(&[LOC_E1M1_1]);
    let mut session = small_session(save_root, transport);
    session.connect().expect("handshake");
    session
}
