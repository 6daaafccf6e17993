//! Contract with live peer connections.
//!
//! The policy never owns a connection. A record holds a `Weak` handle to
//! the connection attached to it, and every connection remembers the
//! endpoint of its record ([`PeerConnection::peer_info`]) so lifecycle
//! callbacks can find their way back.

use std::fmt;
use std::net::SocketAddr;

use crate::bitfield::Bitfield;

use super::error::DisconnectReason;
use super::picker::PieceBlock;

/// Observed transfer speed class of a peer, forwarded to the piece picker
/// so fast peers are grouped onto the same pieces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerSpeed {
    Slow,
    Medium,
    Fast,
}

/// Payload counters tracked by a live connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectionStats {
    pub total_payload_download: u64,
    pub total_payload_upload: u64,
    /// Payload download rate in bytes per second.
    pub download_payload_rate: u64,
}

/// A remote client's 20-byte identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId(pub [u8; 20]);

impl PeerId {
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let id: [u8; 20] = bytes.try_into().ok()?;
        Some(Self(id))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId(")?;
        for byte in &self.0[..8] {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, "..)")
    }
}

/// A live connection to a peer, as the policy sees it.
///
/// Implementations are expected to be internally synchronized; every method
/// takes `&self` and the policy may call them at any point between its own
/// public entry points.
pub trait PeerConnection {
    // -- identity --

    /// The remote endpoint of the socket.
    fn remote(&self) -> SocketAddr;
    /// The local endpoint of the socket, if it is still open.
    fn local_endpoint(&self) -> Option<SocketAddr>;
    /// The remote client's peer id.
    fn pid(&self) -> PeerId;
    /// True if we initiated this connection.
    fn is_local(&self) -> bool;
    /// Endpoint of the policy record this connection is attached to.
    fn peer_info(&self) -> Option<SocketAddr>;

    // -- state --

    /// True while the outbound TCP connect is still in flight.
    fn is_connecting(&self) -> bool;
    /// True until the BitTorrent handshake completes.
    fn in_handshake(&self) -> bool;
    /// True if we are choking the peer.
    fn is_choked(&self) -> bool;
    /// True if the peer is choking us.
    fn has_peer_choked(&self) -> bool;
    /// True if the peer wants our data.
    fn is_peer_interested(&self) -> bool;
    /// True if the peer has data we want.
    fn is_interesting(&self) -> bool;
    /// True if the peer has the complete torrent.
    fn is_seed(&self) -> bool;
    /// True if the connection ended in failure.
    fn failed(&self) -> bool;
    /// True if this connection is a fast-reconnect attempt.
    fn fast_reconnect(&self) -> bool;
    /// True if downloading from this peer is disabled.
    fn no_download(&self) -> bool;
    /// True if this connection does not consume an unchoke slot.
    fn ignore_unchoke_slots(&self) -> bool;

    // -- transfer accounting --

    /// Bytes the peer sent us minus bytes we sent it, including extended
    /// upload credit. Positive means the peer is owed upload.
    fn share_diff(&self) -> i64;
    fn statistics(&self) -> ConnectionStats;
    fn peer_speed(&self) -> PeerSpeed;

    // -- request state --

    /// Target number of in-flight block requests.
    fn desired_queue_size(&self) -> usize;
    /// Number of whole pieces to keep this peer working on, 0 for blocks.
    fn prefer_whole_pieces(&self) -> u32;
    /// Opaque option bits forwarded to the piece picker.
    fn picker_options(&self) -> u32;
    /// The peer's piece availability.
    fn bitfield(&self) -> Bitfield;
    /// Pieces we may request while choked (fast extension).
    fn allowed_fast(&self) -> Vec<u32>;
    /// Pieces the peer suggested we fetch from it.
    fn suggested_pieces(&self) -> Vec<u32>;
    /// Blocks requested and in flight.
    fn download_queue(&self) -> Vec<PieceBlock>;
    /// Blocks queued but not yet sent.
    fn request_queue(&self) -> Vec<PieceBlock>;

    // -- mutators --

    /// Binds the connection to a policy record (or detaches it).
    fn set_peer_info(&self, endpoint: Option<SocketAddr>);
    /// Queues a block request.
    fn add_request(&self, block: PieceBlock);
    /// Flushes queued requests to the wire.
    fn send_block_requests(&self);
    /// Declares interest in the peer's data.
    fn send_interested(&self);
    /// Seeds the connection's counters with carried-over totals.
    fn add_stat(&self, downloaded: u64, uploaded: u64);
    /// Extends or revokes upload credit.
    fn add_free_upload(&self, amount: i64);
    /// Asks the connection to close.
    fn disconnect(&self, reason: DisconnectReason);
}
