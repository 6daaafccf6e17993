use crate::constants::{
    DEFAULT_MAX_FAILCOUNT, DEFAULT_MAX_PAUSED_PEERLIST_SIZE, DEFAULT_MAX_PEERLIST_SIZE,
    DEFAULT_MIN_RECONNECT_TIME, DEFAULT_WHOLE_PIECES_THRESHOLD,
};

/// Per-torrent knobs of the peer policy.
#[derive(Debug, Clone)]
pub struct PolicySettings {
    /// Bound on the number of known peers; 0 means unbounded.
    pub max_peerlist_size: usize,
    /// Bound applied instead while the torrent is paused.
    pub max_paused_peerlist_size: usize,
    /// Consecutive failures after which a peer is no longer dialed.
    pub max_failcount: u8,
    /// Base reconnect delay in seconds, scaled by `failcount + 1`.
    pub min_reconnect_time: u32,
    /// Allow several records (and connections) per IP address.
    pub allow_multiple_connections_per_ip: bool,
    /// Seconds of payload rate that must cover a piece before requests
    /// switch to whole-piece mode.
    pub whole_pieces_threshold: u32,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            max_peerlist_size: DEFAULT_MAX_PEERLIST_SIZE,
            max_paused_peerlist_size: DEFAULT_MAX_PAUSED_PEERLIST_SIZE,
            max_failcount: DEFAULT_MAX_FAILCOUNT,
            min_reconnect_time: DEFAULT_MIN_RECONNECT_TIME,
            allow_multiple_connections_per_ip: false,
            whole_pieces_threshold: DEFAULT_WHOLE_PIECES_THRESHOLD,
        }
    }
}
