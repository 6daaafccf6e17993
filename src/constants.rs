//! Tuning parameters for the peer policy.
//!
//! Defaults follow libtorrent and the popular desktop clients; every value
//! here can be overridden per torrent through
//! [`PolicySettings`](crate::policy::PolicySettings).

// ============================================================================
// Peer list bounds
// ============================================================================

/// Default bound on the number of known peers per torrent (0 = unbounded).
pub const DEFAULT_MAX_PEERLIST_SIZE: usize = 4000;

/// Peer list bound applied while the torrent is paused.
pub const DEFAULT_MAX_PAUSED_PEERLIST_SIZE: usize = 4000;

/// Fill fraction of the peer list at which eviction starts weeding.
pub const EVICTION_WATERMARK: f64 = 0.95;

/// Fill fraction above which resume-data peers are pruned as they disconnect.
pub const RESUME_PRUNE_WATERMARK: f64 = 0.9;

/// Records visited per candidate or eviction scan. Bounds the work done in
/// one call; a full sweep of a large table amortizes over many pulses.
pub const PEER_SCAN_LIMIT: usize = 300;

// ============================================================================
// Reconnect behavior
// ============================================================================

/// Consecutive failures after which a peer stops being a connect candidate.
pub const DEFAULT_MAX_FAILCOUNT: u8 = 3;

/// Hard cap on the consecutive-failure counter (5-bit field on the wire).
pub const FAILCOUNT_CAP: u8 = 31;

/// Seconds to wait before redialing a peer, scaled by `failcount + 1`.
pub const DEFAULT_MIN_RECONNECT_TIME: u32 = 60;

// ============================================================================
// Transfer policy
// ============================================================================

/// Upload credit extended to a peer in deficit before interest stops being
/// rewarded with an unchoke.
pub const FREE_UPLOAD_AMOUNT: i64 = 4 * 16 * 1024;

/// Seconds of payload download rate that must cover a whole piece before
/// block requests switch to whole-piece mode.
pub const DEFAULT_WHOLE_PIECES_THRESHOLD: u32 = 20;

// ============================================================================
// Allocation
// ============================================================================

/// Recycled record allocations kept per address-family pool.
pub const PEER_POOL_SIZE: usize = 500;
