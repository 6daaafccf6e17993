//! Peer policy for one torrent swarm.
//!
//! The policy owns the set of peers ever learned for a torrent and decides
//! which of them to dial, which incoming connections to admit, which known
//! peers to forget under peer-list pressure, which blocks to request from a
//! connected peer, and how to balance the torrent's share ratio.
//!
//! Everything here is synchronous and single-threaded: the policy runs on
//! the torrent's event loop and its collaborators (the piece picker, the
//! session and the live connections) are reached through traits. Calls that
//! would suspend elsewhere (dialing, DHT pings) come back to the policy as
//! later method calls on the same thread.

mod address;
mod connection;
mod error;
mod fairness;
mod manager;
mod peer_info;
mod peer_list;
mod picker;
mod pool;
mod requester;
mod session;
mod settings;

pub use connection::{ConnectionStats, PeerConnection, PeerId, PeerSpeed};
pub use error::DisconnectReason;
pub use manager::PeerPolicy;
pub use peer_info::{
    source_rank, PeerInfo, FLAG_PREFERS_ENCRYPTION, FLAG_SEED, SOURCE_DHT, SOURCE_INCOMING,
    SOURCE_LSD, SOURCE_PEX, SOURCE_RESUME, SOURCE_TRACKER,
};
pub use picker::{PieceBlock, PieceInfo, PiecePicker};
pub use requester::request_a_block;
pub use session::{Alert, SwarmContext, FILTER_BLOCKED};
pub use settings::PolicySettings;
