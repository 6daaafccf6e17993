//! Share-ratio accounting.
//!
//! Surplus download from peers that are not trading with us is pooled as
//! "free upload" and redistributed as credit to peers we owe. The pool is
//! only maintained when the torrent enforces a share ratio.

use std::sync::Arc;

use super::connection::PeerConnection;

/// Collects the surplus from peers that are not interested in us. Returns
/// the total deducted from them.
pub(crate) fn collect_free_download(peers: &[Arc<dyn PeerConnection>]) -> i64 {
    let mut accumulator = 0i64;
    for peer in peers {
        // a peer interested in us may want to trade its surplus for
        // downloads itself; a non-positive diff has nothing to give
        let diff = peer.share_diff();
        if peer.is_peer_interested() || diff <= 0 {
            continue;
        }
        peer.add_free_upload(-diff);
        accumulator += diff;
    }
    accumulator
}

/// Spreads `free_upload` as credit over the interested peers we owe.
/// Returns the amount left in the pool.
pub(crate) fn distribute_free_upload(
    peers: &[Arc<dyn PeerConnection>],
    mut free_upload: i64,
) -> i64 {
    if free_upload <= 0 {
        return free_upload;
    }

    let mut num_recipients = 0i64;
    let mut total_diff = 0i64;
    for peer in peers {
        let diff = peer.share_diff();
        total_diff += diff;
        if !peer.is_peer_interested() || diff >= 0 {
            continue;
        }
        num_recipients += 1;
    }

    if num_recipients == 0 {
        return free_upload;
    }

    let upload_share = if total_diff >= 0 {
        free_upload.min(total_diff) / num_recipients
    } else {
        (free_upload + total_diff) / num_recipients
    };
    if upload_share < 0 {
        return free_upload;
    }

    for peer in peers {
        if !peer.is_peer_interested() || peer.share_diff() >= 0 {
            continue;
        }
        peer.add_free_upload(upload_share);
        free_upload -= upload_share;
    }
    free_upload
}
