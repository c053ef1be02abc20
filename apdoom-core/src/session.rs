use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::Instant;

use serde_json::json;

use crate::catalog::{CatalogTables, Game, GameCatalog, ItemKind, LocationSlot, StaticCatalog};
use crate::notify::{NotificationIcon, NotificationQueue};
use crate::persist;
use crate::state::{ApState, LevelState, PlayerState, SessionConfig};
use crate::transport::{ConnectionStatus, Transport, TransportEvent, CLIENT_VERSION};
use crate::{save_dir_name, ApError, ApSettings, Result};

/// Slot data options the session asks the server for.
pub(crate) const SLOT_OPTIONS: &[&str] = &[
    "difficulty",
    "random_monsters",
    "random_pickups",
    "flip_levels",
    "episode1",
    "episode2",
    "episode3",
    "episode4",
    "two_ways_keydoors",
];

/// Callbacks into the game engine.
pub trait EngineHooks {
    /// Hand an item to the player. `ep`/`map` are the level the item
    /// belongs to.
    fn give_item(&mut self, kind: ItemKind, ep: i32, map: i32);

    fn victory(&mut self);

    /// A server message, with `~N` color escapes.
    fn message(&mut self, text: &str);

    /// Progress could not be written to disk.
    fn save_failed(&mut self, _error: &ApError) {}
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HandshakeFailure {
    AuthRefused,
    ConnectTimeout,
    ScoutTimeout,
}

impl From<HandshakeFailure> for ApError {
    fn from(failure: HandshakeFailure) -> Self {
        match failure {
            HandshakeFailure::AuthRefused => ApError::AuthRefused,
            HandshakeFailure::ConnectTimeout => ApError::ConnectTimeout,
            HandshakeFailure::ScoutTimeout => ApError::ScoutTimeout,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HandshakePhase {
    /// `start` has not been called.
    Idle,
    Connecting,
    Authenticating,
    /// Waiting for the reply to the one-time location scout.
    Scouting,
    Ready,
    Failed(HandshakeFailure),
}

/// One randomizer connection and all progress tracked for it.
pub struct Session<T: Transport, H: EngineHooks> {
    pub(crate) settings: ApSettings,
    pub(crate) catalog: Box<dyn GameCatalog>,
    pub(crate) transport: T,
    pub(crate) hooks: H,
    pub(crate) state: ApState,
    pub(crate) phase: HandshakePhase,
    phase_started: Instant,
    /// Set once the server authenticated us; only then is the state worth saving.
    pub(crate) was_connected: bool,
    pub(crate) initialized: bool,
    pub(crate) in_game: bool,
    save_dir_name: String,
    pub(crate) cached_messages: Vec<String>,
    /// Item and location events that arrived before the save was loaded.
    deferred_events: Vec<TransportEvent>,
    pub(crate) notifications: NotificationQueue,
}

/// Builds a session for `settings.game` and blocks until it is ready.
pub fn init<T: Transport, H: EngineHooks>(
    settings: ApSettings,
    tables: CatalogTables,
    transport: T,
    hooks: H,
) -> Result<Session<T, H>> {
    let mut session = Session::new(settings, tables, transport, hooks)?;
    session.connect()?;
    Ok(session)
}

impl<T: Transport, H: EngineHooks> Session<T, H> {
    pub fn new(settings: ApSettings, tables: CatalogTables, transport: T, hooks: H) -> Result<Self> {
        let game = Game::from_title(&settings.game)?;
        let catalog = StaticCatalog::for_game(game, tables);
        Ok(Self::with_catalog(settings, Box::new(catalog), transport, hooks))
    }

    pub fn with_catalog(
        settings: ApSettings,
        catalog: Box<dyn GameCatalog>,
        transport: T,
        hooks: H,
    ) -> Self {
        let state = ApState::new(catalog.profile());
        Self {
            settings,
            catalog,
            transport,
            hooks,
            state,
            phase: HandshakePhase::Idle,
            phase_started: Instant::now(),
            was_connected: false,
            initialized: false,
            in_game: false,
            save_dir_name: String::new(),
            cached_messages: Vec::new(),
            deferred_events: Vec::new(),
            notifications: NotificationQueue::new(),
        }
    }

    /// Announces the client and starts connecting. Does not wait.
    pub fn start(&mut self) {
        self.transport.set_client_version(CLIENT_VERSION);
        self.transport.configure(
            &self.settings.server,
            &self.settings.game,
            &self.settings.player_name,
            &self.settings.password,
        );
        self.transport.set_deathlink_supported(true);
        for option in SLOT_OPTIONS {
            self.transport.register_slot_option(option);
        }
        self.transport.start();
        self.enter_phase(HandshakePhase::Connecting);
    }

    /// Starts the handshake and polls it until it is ready or fails.
    pub fn connect(&mut self) -> Result<()> {
        if self.phase == HandshakePhase::Idle {
            self.start();
        }
        loop {
            if self.poll_handshake()? == HandshakePhase::Ready {
                return Ok(());
            }
            thread::sleep(self.settings.poll_interval);
        }
    }

    /// Advances the handshake by one step without sleeping.
    pub fn poll_handshake(&mut self) -> Result<HandshakePhase> {
        match self.phase {
            HandshakePhase::Idle | HandshakePhase::Ready => {}
            HandshakePhase::Failed(failure) => return Err(failure.into()),
            HandshakePhase::Connecting | HandshakePhase::Authenticating => {
                self.poll_connection()?;
            }
            HandshakePhase::Scouting => {
                self.update();
                if !self.state.progressive_locations.is_empty() {
                    self.finish_handshake();
                } else if self.phase_expired() {
                    log::error!("timed out waiting for location scouts");
                    return Err(self.fail(HandshakeFailure::ScoutTimeout));
                }
            }
        }
        Ok(self.phase)
    }

    fn poll_connection(&mut self) -> Result<()> {
        // Slot data must be in place before the flip and episode decisions.
        self.drain_events();
        match self.transport.status() {
            ConnectionStatus::Authenticated => match self.transport.room_info() {
                Some(room) => {
                    log::info!("authenticated to room {}", room.seed_name);
                    self.on_authenticated(&room.seed_name);
                    return Ok(());
                }
                None => log::debug!("authenticated, waiting for room info"),
            },
            ConnectionStatus::ConnectionRefused => {
                log::error!("failed to connect, connection refused");
                return Err(self.fail(HandshakeFailure::AuthRefused));
            }
            ConnectionStatus::Connected => {
                self.phase = HandshakePhase::Authenticating;
            }
            ConnectionStatus::Disconnected => {}
        }
        if self.phase_expired() {
            log::error!("failed to connect, timeout");
            return Err(self.fail(HandshakeFailure::ConnectTimeout));
        }
        Ok(())
    }

    fn on_authenticated(&mut self, seed_name: &str) {
        self.was_connected = true;
        self.save_dir_name = save_dir_name(seed_name, &self.settings.player_name);

        let dir = self.save_dir();
        if let Err(e) = fs::create_dir_all(&dir) {
            log::error!("could not create save directory {}: {e}", dir.display());
        }
        self.load_state();
        for event in std::mem::take(&mut self.deferred_events) {
            self.dispatch_logged(event);
        }

        self.state.ensure_episode_enabled();
        let flip_mode = self.state.config.flip_levels;
        self.state.apply_flips(flip_mode, &self.save_dir_name);

        if self.state.progressive_locations.is_empty() {
            self.send_scouts();
            self.enter_phase(HandshakePhase::Scouting);
        } else {
            self.finish_handshake();
        }
    }

    fn send_scouts(&mut self) {
        let scouts: Vec<i64> = self
            .catalog
            .locations()
            .into_iter()
            .filter(|(loc, _)| loc.slot != LocationSlot::Completion)
            .filter(|(loc, _)| self.state.config.is_episode_enabled(loc.ep))
            .map(|(_, id)| id)
            .collect();
        log::info!("scouting {} locations", scouts.len());
        self.transport.send_location_scouts(&scouts, false);
    }

    fn finish_handshake(&mut self) {
        self.initialized = true;
        self.phase = HandshakePhase::Ready;
        self.check_victory();
    }

    fn enter_phase(&mut self, phase: HandshakePhase) {
        self.phase = phase;
        self.phase_started = Instant::now();
    }

    fn phase_expired(&self) -> bool {
        self.phase_started.elapsed() >= self.settings.connect_timeout
    }

    fn fail(&mut self, failure: HandshakeFailure) -> ApError {
        self.phase = HandshakePhase::Failed(failure);
        failure.into()
    }

    fn load_state(&mut self) {
        let path = persist::state_path(&self.save_dir());
        match persist::load(&mut self.state, self.catalog.profile(), &path) {
            Ok(true) => log::info!("loaded {}", path.display()),
            Ok(false) => log::info!("no saved state at {}, starting fresh", path.display()),
            Err(e) => log::warn!("ignoring unreadable {}: {e}", path.display()),
        }
    }

    /// Writes progress to `apstate.json`. Does nothing for a session that
    /// never authenticated, so a failed connection cannot clobber a save.
    pub fn save_state(&mut self) -> Result<()> {
        if !self.was_connected {
            return Ok(());
        }
        let path = persist::state_path(&self.save_dir());
        if let Err(e) = persist::save(&self.state, self.catalog.profile(), &path) {
            log::error!("failed to save randomizer state: {e}");
            self.hooks.save_failed(&e);
            return Err(e);
        }
        Ok(())
    }

    /// Persists progress and ends the session.
    pub fn shutdown(mut self) {
        // Failures already reached the log and the engine.
        let _ = self.save_state();
    }

    /// Per-tick entry point: dispatches server events and messages, hands
    /// out queued items once in game, and animates notifications.
    pub fn update(&mut self) {
        if self.initialized && !self.cached_messages.is_empty() {
            for msg in std::mem::take(&mut self.cached_messages) {
                self.hooks.message(&msg);
            }
        }

        self.drain_events();

        if self.in_game {
            while let Some(item_id) = self.state.item_queue.pop_front() {
                if let Err(e) = self.receive_item(item_id, true) {
                    log::warn!("dropping queued item: {e}");
                }
            }
        }

        self.notifications.tick();
    }

    /// Until the save has been merged, only slot data and messages are
    /// handled; events touching progress are held back and replayed after
    /// the load.
    fn drain_events(&mut self) {
        while let Some(event) = self.transport.poll_event() {
            match event {
                TransportEvent::SlotData { .. } | TransportEvent::Message(_) => {
                    self.dispatch_logged(event)
                }
                event if !self.was_connected => self.deferred_events.push(event),
                event => self.dispatch_logged(event),
            }
        }
    }

    fn dispatch_logged(&mut self, event: TransportEvent) {
        if let Err(e) = self.dispatch(event) {
            match e {
                ApError::UnknownItem(_) => log::debug!("{e}"),
                _ => log::warn!("{e}"),
            }
        }
    }

    /// Reports a location to the server. Duplicates are still sent; the
    /// server's confirmation is what gets recorded.
    pub fn check_location(&mut self, ep: i32, map: i32, slot: LocationSlot) {
        let Some(id) = self.catalog.location_id(ep, map, slot) else {
            log::debug!("no location for E{ep}M{map} {slot:?}");
            return;
        };
        if let LocationSlot::Check(index) = slot {
            if self.is_location_checked(ep, map, index) {
                log::warn!("{}", ApError::DuplicateLocation { ep, map, index });
            }
        }
        self.transport.send_location_check(id);
    }

    pub fn complete_level(&mut self, ep: i32, map: i32) {
        match self.state.levels.get_mut(ep, map) {
            Ok(level) => level.completed = true,
            Err(e) => {
                log::warn!("{e}");
                return;
            }
        }
        self.check_location(ep, map, LocationSlot::Completion);
    }

    pub fn is_location_checked(&self, ep: i32, map: i32, index: u32) -> bool {
        self.state
            .levels
            .get(ep, map)
            .map(|level| level.is_checked(index))
            .unwrap_or(false)
    }

    pub fn is_location_progression(&self, ep: i32, map: i32, slot: LocationSlot) -> bool {
        self.catalog
            .location_id(ep, map, slot)
            .map(|id| self.state.progressive_locations.contains(&id))
            .unwrap_or(false)
    }

    /// Declares victory once every level of every enabled episode is done.
    pub fn check_victory(&mut self) {
        if self.state.config.victory || !self.state.all_enabled_complete() {
            return;
        }
        log::info!("all enabled episodes completed");
        self.state.config.victory = true;
        self.transport.story_complete();
        self.hooks.victory();
    }

    pub fn on_death(&mut self) {
        self.transport.deathlink_send();
    }

    pub fn clear_death(&mut self) {
        self.transport.deathlink_clear();
    }

    pub fn should_die(&self) -> bool {
        self.transport.deathlink_pending()
    }

    /// Sends a chat line. Fails until the handshake is done.
    pub fn send_message(&mut self, text: &str) -> Result<()> {
        if !self.initialized {
            return Err(ApError::NotConnected);
        }
        let packet = json!([{ "cmd": "Say", "text": text }]);
        self.transport.send_raw(&packet.to_string());
        Ok(())
    }

    pub fn notification_icons(&self) -> &[NotificationIcon] {
        self.notifications.icons()
    }

    pub fn set_in_game(&mut self, in_game: bool) {
        self.in_game = in_game;
    }

    pub fn is_in_game(&self) -> bool {
        self.in_game
    }

    pub fn phase(&self) -> HandshakePhase {
        self.phase
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Name of the save directory; also seeds the level flips.
    pub fn seed(&self) -> &str {
        &self.save_dir_name
    }

    pub fn save_dir(&self) -> PathBuf {
        self.settings.save_root.join(&self.save_dir_name)
    }

    /// Engine save file for one level inside the seed's directory.
    pub fn level_save_path(&self, ep: i32, map: i32) -> PathBuf {
        let file = if self.catalog.profile().episode_count > 1 {
            format!("save_E{ep}M{map}.dsg")
        } else {
            format!("save_MAP{map:02}.dsg")
        };
        self.save_dir().join(file)
    }

    /// Next enabled episode after `current` (1-based), wrapping around.
    /// Returns `current` when no other episode is enabled.
    pub fn next_enabled_episode(&self, current: i32, forward: bool) -> i32 {
        let count = self.catalog.profile().episode_count as i32;
        if count == 0 {
            return current;
        }
        let step = if forward { 1 } else { count - 1 };
        let mut ep = current;
        for _ in 0..count {
            ep = (ep - 1 + step).rem_euclid(count) + 1;
            if self.state.config.is_episode_enabled(ep) {
                return ep;
            }
        }
        current
    }

    pub fn level_state(&self, ep: i32, map: i32) -> Result<&LevelState> {
        self.state.levels.get(ep, map)
    }

    pub fn level_state_mut(&mut self, ep: i32, map: i32) -> Result<&mut LevelState> {
        self.state.levels.get_mut(ep, map)
    }

    pub fn level_name(&self, ep: i32, map: i32) -> Option<&str> {
        self.catalog.level_name(ep, map)
    }

    pub fn player(&self) -> &PlayerState {
        &self.state.player
    }

    /// The engine copies its player back here before saving.
    pub fn player_mut(&mut self) -> &mut PlayerState {
        &mut self.state.player
    }

    pub fn config(&self) -> &SessionConfig {
        &self.state.config
    }

    pub fn state(&self) -> &ApState {
        &self.state
    }

    pub fn current_level(&self) -> (i32, i32) {
        (self.state.ep, self.state.map)
    }

    pub fn set_current_level(&mut self, ep: i32, map: i32) {
        self.state.ep = ep;
        self.state.map = map;
    }

    pub fn catalog(&self) -> &dyn GameCatalog {
        self.catalog.as_ref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }
}
