/// Location record flag marking progression items.
pub const FLAG_PROGRESSION: i32 = 1;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct NetworkVersion {
    pub major: i32,
    pub minor: i32,
    pub build: i32,
}

pub const CLIENT_VERSION: NetworkVersion = NetworkVersion {
    major: 0,
    minor: 4,
    build: 1,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConnectionStatus {
    Disconnected,
    /// Socket is up, waiting on the slot to authenticate.
    Connected,
    Authenticated,
    ConnectionRefused,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RoomInfo {
    pub seed_name: String,
}

/// One entry of a location scout reply.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NetworkItem {
    pub item: i64,
    pub location: i64,
    pub player: i32,
    pub flags: i32,
}

impl NetworkItem {
    pub fn is_progression(&self) -> bool {
        self.flags & FLAG_PROGRESSION != 0
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ServerMessage {
    ItemSend {
        item: String,
        recv_player: String,
    },
    ItemRecv {
        item: String,
        send_player: String,
    },
    Hint {
        item: String,
        send_player: String,
        recv_player: String,
        location: String,
        checked: bool,
    },
    Text(String),
}

impl ServerMessage {
    /// Plain text, for the log.
    pub fn plain(&self) -> String {
        match self {
            ServerMessage::ItemSend { item, recv_player } => {
                format!("{item} was sent to {recv_player}")
            }
            ServerMessage::ItemRecv { item, send_player } => {
                format!("Received {item} from {send_player}")
            }
            ServerMessage::Hint {
                item,
                send_player,
                recv_player,
                location,
                checked,
            } => format!(
                "{item} from {send_player} to {recv_player} at {location}{}",
                checked_suffix(*checked)
            ),
            ServerMessage::Text(text) => text.clone(),
        }
    }

    /// Text with the engine's `~N` color escapes: 2 = normal, 3 = location,
    /// 4 = player, 9 = item.
    pub fn colored(&self) -> String {
        match self {
            ServerMessage::ItemSend { item, recv_player } => {
                format!("~9{item}~2 was sent to ~4{recv_player}")
            }
            ServerMessage::ItemRecv { item, send_player } => {
                format!("~2Received ~9{item}~2 from ~4{send_player}")
            }
            ServerMessage::Hint {
                item,
                send_player,
                recv_player,
                location,
                checked,
            } => format!(
                "~9{item}~2 from ~4{send_player}~2 to ~4{recv_player}~2 at ~3{location}{}",
                checked_suffix(*checked)
            ),
            ServerMessage::Text(text) => format!("~2{text}"),
        }
    }
}

fn checked_suffix(checked: bool) -> &'static str {
    if checked {
        " (Checked)"
    } else {
        " (Unchecked)"
    }
}

/// Something the server pushed since the last poll.
#[derive(Clone, Debug, PartialEq)]
pub enum TransportEvent {
    ItemsCleared,
    ItemReceived { item_id: i64, notify: bool },
    LocationChecked(i64),
    LocationInfo(Vec<NetworkItem>),
    SlotData { key: String, value: i64 },
    Message(ServerMessage),
}

/// The randomizer client library. Implementations own the socket; the
/// session only calls these from its update thread, and none of them may
/// block for long.
pub trait Transport {
    fn set_client_version(&mut self, version: NetworkVersion);

    fn configure(&mut self, server: &str, game: &str, player_name: &str, password: &str);

    fn set_deathlink_supported(&mut self, supported: bool);

    /// Asks for the named integer slot option to be reported as
    /// [`TransportEvent::SlotData`].
    fn register_slot_option(&mut self, name: &str);

    fn start(&mut self);

    fn status(&self) -> ConnectionStatus;

    fn room_info(&self) -> Option<RoomInfo>;

    fn poll_event(&mut self) -> Option<TransportEvent>;

    fn send_location_check(&mut self, location_id: i64);

    fn send_location_scouts(&mut self, location_ids: &[i64], create_hints: bool);

    fn story_complete(&mut self);

    fn deathlink_send(&mut self);

    fn deathlink_clear(&mut self);

    fn deathlink_pending(&self) -> bool;

    /// Sends an already-encoded packet array.
    fn send_raw(&mut self, packet: &str);
}
