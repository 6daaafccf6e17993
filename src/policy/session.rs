//! Contract with the owning torrent and session.
//!
//! The policy reaches every collaborator through this one trait: torrent
//! state, connection caps, the IP/port filters, the external address, the
//! DHT, the dialer, the unchoke scheduler and the alert queue.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use super::connection::PeerConnection;
use super::picker::PiecePicker;

/// Bit set in a filter access mask when the address or port is blocked.
pub const FILTER_BLOCKED: u32 = 1;

/// User-visible events emitted by the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alert {
    /// A peer was rejected or dropped because a filter blocks it.
    PeerBlocked(IpAddr),
}

/// Torrent- and session-level state the policy consults.
pub trait SwarmContext {
    // -- torrent --

    /// True once every piece is downloaded and checked.
    fn is_seed(&self) -> bool;
    /// True once all *wanted* pieces are done (seeds stop being
    /// interesting).
    fn is_finished(&self) -> bool;
    /// True while the torrent is paused.
    fn is_paused(&self) -> bool {
        false
    }
    /// Desired upload/download ratio; 0 means unlimited.
    fn share_ratio(&self) -> f32;
    /// Piece length in bytes.
    fn piece_length(&self) -> u32;
    /// Live connections of this torrent.
    fn connections(&self) -> Vec<Arc<dyn PeerConnection>>;
    /// Number of live connections of this torrent.
    fn num_connections(&self) -> usize;
    /// Connection cap of this torrent.
    fn max_connections(&self) -> usize;
    /// The tracker currently announced to, if any.
    fn current_tracker(&self) -> Option<SocketAddr>;
    /// Starts an outbound connection to `endpoint`. Returns the half-open
    /// connection, or `None` if the dial could not be started.
    fn connect_to_peer(&mut self, endpoint: SocketAddr) -> Option<Arc<dyn PeerConnection>>;
    /// True while the torrent has a piece picker (it may not before
    /// metadata arrives).
    fn has_picker(&self) -> bool {
        true
    }
    /// The torrent's piece picker.
    fn picker(&mut self) -> &mut dyn PiecePicker;

    // -- session --

    /// Live connections across the whole session.
    fn session_connections(&self) -> usize;
    /// Session-wide connection cap.
    fn session_max_connections(&self) -> usize;
    /// Unchoke slots in use across the session.
    fn num_uploads(&self) -> usize;
    /// Session-wide unchoke slot cap.
    fn max_uploads(&self) -> usize;
    /// Grants `conn` an unchoke slot.
    fn unchoke_peer(&mut self, conn: &Arc<dyn PeerConnection>);
    /// Access mask of the IP filter for `addr`.
    fn ip_filter_access(&self, addr: IpAddr) -> u32;
    /// Access mask of the port filter for `port`.
    fn port_filter_access(&self, port: u16) -> u32;
    /// Best known external address of this session, if any.
    fn external_address(&self) -> Option<IpAddr>;
    /// Hands an endpoint to the DHT for a ping.
    fn add_dht_node(&mut self, endpoint: SocketAddr);
    /// True if an AS-number database is loaded.
    fn has_asnum_db(&self) -> bool {
        false
    }
    /// AS number of `addr`, 0 if unknown.
    fn as_number(&self, addr: IpAddr) -> u32 {
        let _ = addr;
        0
    }
    /// Number of session peers in the given AS.
    fn peers_in_as(&self, asnum: u32) -> u32 {
        let _ = asnum;
        0
    }
    /// True if anyone listens for policy alerts.
    fn should_post_alerts(&self) -> bool {
        false
    }
    /// Queues an alert for the client.
    fn post_alert(&mut self, alert: Alert);
}
