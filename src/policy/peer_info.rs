//! One known peer of the torrent.
//!
//! A record is created the first time an endpoint is learned about, from
//! whatever source, and outlives any connection to it. While a connection is
//! live the record holds a non-owning handle to it; transfer totals carry
//! over into the record when the connection closes.

use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Weak};
use std::time::Instant;

use crate::constants::FAILCOUNT_CAP;

use super::connection::{PeerConnection, PeerId};

/// Peer was returned by a tracker announce.
pub const SOURCE_TRACKER: u8 = 0x01;
/// Peer was found through the DHT.
pub const SOURCE_DHT: u8 = 0x02;
/// Peer was relayed by another peer (PEX).
pub const SOURCE_PEX: u8 = 0x04;
/// Peer was seen on the local network (LSD).
pub const SOURCE_LSD: u8 = 0x08;
/// Peer was loaded from resume data.
pub const SOURCE_RESUME: u8 = 0x10;
/// Peer connected to us first.
pub const SOURCE_INCOMING: u8 = 0x20;

/// `add_peer` flag: the peer advertises encryption support.
pub const FLAG_PREFERS_ENCRYPTION: u8 = 0x01;
/// `add_peer` flag: the peer claims to be a seed.
pub const FLAG_SEED: u8 = 0x02;

/// Rank of a peer's source mix. Tracker-learned peers are dialed before
/// LSD, DHT and PEX ones, which keeps a peer list diluted by stale resume
/// data from starving fresh peers.
pub fn source_rank(source: u8) -> u32 {
    let mut rank = 0;
    if source & SOURCE_TRACKER != 0 {
        rank |= 1 << 5;
    }
    if source & SOURCE_LSD != 0 {
        rank |= 1 << 4;
    }
    if source & SOURCE_DHT != 0 {
        rank |= 1 << 3;
    }
    if source & SOURCE_PEX != 0 {
        rank |= 1 << 2;
    }
    rank
}

/// Everything the policy remembers about one endpoint.
pub struct PeerInfo {
    /// Peer address.
    pub addr: IpAddr,
    /// Listen port (for incoming peers, the source port observed).
    pub port: u16,
    /// Bytes uploaded to this peer over past connections.
    pub prev_amount_upload: u64,
    /// Bytes downloaded from this peer over past connections.
    pub prev_amount_download: u64,
    /// Session second of the most recent connect or disconnect. `None`
    /// until the first attempt completes.
    pub last_connected: Option<u32>,
    /// When the peer was last optimistically unchoked.
    pub last_optimistically_unchoked: Option<Instant>,
    /// Most recently observed peer id.
    pub peer_id: Option<PeerId>,
    /// AS number of the address, when the session has an AS database.
    pub as_number: u32,
    /// Consecutive connect failures, capped at [`FAILCOUNT_CAP`].
    pub failcount: u8,
    /// Piece-hash failures attributed to this peer.
    pub hashfails: u8,
    /// Fast reconnects used against this peer.
    pub fast_reconnects: u8,
    /// Reputation delta from protocol behavior.
    pub trust_points: i8,
    /// Bitmask of how we learned about this peer.
    pub source: u8,
    /// Whether we believe the peer accepts incoming connections.
    pub connectable: bool,
    /// Whether the peer has the complete torrent.
    pub seed: bool,
    /// Banned peers are never dialed or admitted again.
    pub banned: bool,
    /// Whether the peer currently holds the optimistic unchoke slot.
    pub optimistically_unchoked: bool,
    /// Peer is restricted to one outstanding piece until it proves honest.
    pub on_parole: bool,
    /// Peer advertises encrypted-transport support.
    pub pe_support: bool,
    /// Peer's endpoint has been handed to the DHT for a ping.
    pub added_to_dht: bool,
    connection: Option<Weak<dyn PeerConnection>>,
}

impl PeerInfo {
    /// Creates a record for `addr:port`.
    pub fn new(addr: IpAddr, port: u16, connectable: bool, source: u8) -> Self {
        Self {
            addr,
            port,
            prev_amount_upload: 0,
            prev_amount_download: 0,
            last_connected: None,
            last_optimistically_unchoked: None,
            peer_id: None,
            as_number: 0,
            failcount: 0,
            hashfails: 0,
            fast_reconnects: 0,
            trust_points: 0,
            source,
            connectable,
            seed: false,
            banned: false,
            optimistically_unchoked: false,
            on_parole: false,
            pe_support: false,
            added_to_dht: false,
            connection: None,
        }
    }

    /// The peer's endpoint.
    pub fn endpoint(&self) -> SocketAddr {
        SocketAddr::new(self.addr, self.port)
    }

    /// The live connection, if one is attached and still alive.
    pub fn connection(&self) -> Option<Arc<dyn PeerConnection>> {
        self.connection.as_ref().and_then(Weak::upgrade)
    }

    /// Returns true if a live connection is attached.
    pub fn has_connection(&self) -> bool {
        self.connection().is_some()
    }

    pub(crate) fn set_connection(&mut self, conn: &Arc<dyn PeerConnection>) {
        self.connection = Some(Arc::downgrade(conn));
    }

    pub(crate) fn clear_connection(&mut self) {
        self.connection = None;
    }

    /// Bytes we have received from this peer, live counters first.
    pub fn total_download(&self) -> u64 {
        match self.connection() {
            Some(conn) => {
                debug_assert_eq!(self.prev_amount_download, 0);
                conn.statistics().total_payload_download
            }
            None => self.prev_amount_download,
        }
    }

    /// Bytes we have sent to this peer, live counters first.
    pub fn total_upload(&self) -> u64 {
        match self.connection() {
            Some(conn) => {
                debug_assert_eq!(self.prev_amount_upload, 0);
                conn.statistics().total_payload_upload
            }
            None => self.prev_amount_upload,
        }
    }

    /// Records one more connect failure, saturating at [`FAILCOUNT_CAP`].
    pub fn register_failure(&mut self) {
        if self.failcount < FAILCOUNT_CAP {
            self.failcount += 1;
        }
    }
}

impl std::fmt::Debug for PeerInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerInfo")
            .field("endpoint", &self.endpoint())
            .field("source", &self.source)
            .field("failcount", &self.failcount)
            .field("connectable", &self.connectable)
            .field("seed", &self.seed)
            .field("banned", &self.banned)
            .field("connected", &self.has_connection())
            .finish()
    }
}
