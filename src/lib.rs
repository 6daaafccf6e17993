//! rswarm - BitTorrent swarm peer policy
//!
//! This library implements the peer policy core of a BitTorrent client:
//! the set of peers known for one torrent, the choice of which peer to
//! dial next, admission of incoming connections (including duplicate and
//! self-connection arbitration), block request selection for connected
//! peers, and share-ratio accounting.
//!
//! # Modules
//!
//! - [`bitfield`] - Piece availability bitmask
//! - [`constants`] - Tuning parameters
//! - [`policy`] - Peer list, admission, connect candidates, eviction,
//!   block requests and fairness accounting
//!
//! Network I/O, the piece picker and the choke scheduler live outside this
//! crate. They are reached through the [`policy::PeerConnection`],
//! [`policy::PiecePicker`] and [`policy::SwarmContext`] traits.

pub mod bitfield;
pub mod constants;
pub mod policy;

pub use bitfield::Bitfield;
pub use policy::{
    request_a_block, Alert, ConnectionStats, DisconnectReason, PeerConnection, PeerId, PeerInfo,
    PeerPolicy, PeerSpeed, PieceBlock, PieceInfo, PiecePicker, PolicySettings, SwarmContext,
};
