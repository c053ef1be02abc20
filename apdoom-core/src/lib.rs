use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub mod catalog;
pub mod notify;
pub mod persist;
mod reconcile;
pub mod session;
pub mod state;
pub mod transport;

pub use catalog::{
    CatalogTables, Game, GameCatalog, GameProfile, ItemKind, ItemRecord, LocationRef,
    LocationSlot, StaticCatalog,
};
pub use notify::{NotificationIcon, NotificationQueue, NotifyState};
pub use session::{init, EngineHooks, HandshakeFailure, HandshakePhase, Session};
pub use state::{ApState, FlipMode, InventorySlot, LevelGrid, LevelState, PlayerState, SessionConfig};
pub use transport::{
    ConnectionStatus, NetworkItem, NetworkVersion, RoomInfo, ServerMessage, Transport,
    TransportEvent,
};

/// Connection and storage settings handed to [`init`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApSettings {
    pub server: String,
    pub game: String,
    pub player_name: String,
    pub password: String,
    /// Directory holding the per-seed `AP_<seed>_<player>` save folders.
    pub save_root: PathBuf,
    /// Upper bound for each blocking handshake phase.
    pub connect_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ApSettings {
    fn default() -> Self {
        Self {
            server: "archipelago.gg:38281".to_string(),
            game: String::new(),
            player_name: String::new(),
            password: String::new(),
            save_root: PathBuf::from("."),
            connect_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApError {
    #[error("unsupported game: {0}")]
    UnsupportedGame(String),
    #[error("connection refused by the server")]
    AuthRefused,
    #[error("timed out waiting for the server to authenticate")]
    ConnectTimeout,
    #[error("timed out waiting for location scouts")]
    ScoutTimeout,
    #[error("unknown item id {0}")]
    UnknownItem(i64),
    #[error("unknown location id {0}")]
    UnknownLocation(i64),
    #[error("location E{ep}M{map} #{index} already checked")]
    DuplicateLocation { ep: i32, map: i32, index: u32 },
    #[error("level E{ep}M{map} is out of range")]
    LevelOutOfRange { ep: i32, map: i32 },
    #[error("failed to write {}: {source}", path.display())]
    PersistenceWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("not connected to a randomizer session")]
    NotConnected,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ApError>;

/// Name of the per-seed save directory: `AP_<seed>_<HEX(player)>`.
pub fn save_dir_name(seed_name: &str, player_name: &str) -> String {
    format!("AP_{}_{}", seed_name, hex::encode_upper(player_name.as_bytes()))
}
