//! Remote console gateway for mc-whitelist
//!
//! Provides communication between the binding service and a Minecraft server:
//!
//! - **Session**: one Source RCON connection (`RconSession`)
//! - **Gateway**: serializes connect → send → disconnect per command
//!   (`SessionGateway`)
//! - **Translator**: whitelist intents to console commands, and best-effort
//!   classification of the free-text responses

mod rcon;
mod session;
mod translator;

pub use rcon::{MAX_PACKET_SIZE, PacketType, RconPacket, RconSession, packet_type};
pub use session::{CommandGateway, ConsoleSession, SessionGateway};
pub use translator::{
    CommandTranslator, LEGACY_REMOVAL_FAILURE_MARKERS, LIST_COMMAND,
    NATIVE_REMOVAL_FAILURE_MARKERS, OnlineList, OnlineStatus, RemovalOutcome, parse_online_list,
    say_command, strip_formatting_codes,
};
