//! Minecraft server status checker.
//!
//! Probes a server with one of the five server list ping generations, or
//! all of them in turn, and reports the answer as a [ServerStatus]:
//!
//! | [RequestType]           | Server versions        |
//! |-------------------------|------------------------|
//! | [RequestType::Beta]     | beta 1.8 to 1.3        |
//! | [RequestType::Legacy]   | 1.4 to 1.5             |
//! | [RequestType::Extended] | 1.6                    |
//! | [RequestType::Json]     | 1.7 to latest          |
//! | [RequestType::Bedrock]  | Bedrock/Pocket Edition |
//!
//! ```no_run
//! use mcstat::{Conf, ConnectionStatus};
//!
//! let status = Conf::create("www.example.com").query();
//!
//! if status.connection_status == ConnectionStatus::Success {
//!     println!("{} players online", status.current_players.unwrap_or_default());
//! }
//! ```

mod conf;
mod error;
mod server;
mod share;
mod status;
mod varint;

pub use conf::{Conf, DEFAULT_PORT, DEFAULT_TIMEOUT_SECS};
pub use error::{ProbeErr, StatErr};
pub use server::{
    process_bedrock_server_bufs, process_beta_server_bufs, process_extended_server_bufs,
    process_json_server_bufs, process_legacy_server_bufs, AUTO_DETECT_ORDER, BETA_VERSION,
};
pub use share::{Exchange, Framing, NetTransport, Transport};
pub use status::{ConnectionStatus, RequestType, ServerStatus};
