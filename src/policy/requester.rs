//! Block request policy.
//!
//! Translates a connected peer's queue depth, choke state and allowed-fast
//! set into a batch of block requests against the piece picker. When only
//! blocks already requested from other peers remain, exactly one of them is
//! re-requested from the peer with the least contention.

use rand::seq::SliceRandom;
use tracing::trace;

use crate::bitfield::Bitfield;

use super::connection::PeerConnection;
use super::picker::PieceBlock;
use super::session::SwarmContext;
use super::settings::PolicySettings;

/// Queues block requests on `conn` until its request queue is full.
///
/// Requests are only queued; the caller flushes them with
/// [`PeerConnection::send_block_requests`].
pub fn request_a_block(
    ctx: &mut dyn SwarmContext,
    settings: &PolicySettings,
    conn: &dyn PeerConnection,
) {
    if ctx.is_seed() {
        return;
    }
    if conn.no_download() {
        return;
    }

    let dq = conn.download_queue();
    let rq = conn.request_queue();
    let mut num_requests =
        conn.desired_queue_size() as i64 - dq.len() as i64 - rq.len() as i64;
    trace!(peer = %conn.remote(), requests = num_requests, "block pick");
    if num_requests <= 0 {
        return;
    }

    let mut prefer_whole_pieces = conn.prefer_whole_pieces();
    if prefer_whole_pieces == 0 {
        // a peer covering a whole piece within the threshold gets
        // contiguous pieces, which keeps disk writes sequential
        let rate = conn.statistics().download_payload_rate;
        if rate.saturating_mul(settings.whole_pieces_threshold as u64)
            > ctx.piece_length() as u64
        {
            prefer_whole_pieces = 1;
        }
    }

    let bits = conn.bitfield();
    let suggested = conn.suggested_pieces();
    let speed = conn.peer_speed();
    let options = conn.picker_options();
    let peer = conn.peer_info().unwrap_or_else(|| conn.remote());

    let mut interesting: Vec<PieceBlock> = Vec::with_capacity(100);
    let picker = ctx.picker();

    if conn.has_peer_choked() {
        // while choked only the allowed-fast pieces may be requested
        let mut mask = Bitfield::new(bits.len());
        for piece in conn.allowed_fast() {
            if bits.has(piece as usize) {
                mask.set(piece as usize);
            }
        }
        picker.pick_pieces(
            &mask,
            &mut interesting,
            num_requests as usize,
            prefer_whole_pieces,
            peer,
            speed,
            options,
            &suggested,
        );
    } else {
        picker.pick_pieces(
            &bits,
            &mut interesting,
            num_requests as usize,
            prefer_whole_pieces,
            peer,
            speed,
            options,
            &suggested,
        );
    }

    // blocks other peers are already working on; touched only when no
    // fresh block is left
    let mut busy_blocks: Vec<PieceBlock> = Vec::with_capacity(num_requests.max(0) as usize);
    // the queue snapshots don't see requests queued in this pass
    let mut picked: Vec<PieceBlock> = Vec::new();

    for &block in &interesting {
        if prefer_whole_pieces == 0 && num_requests <= 0 {
            break;
        }

        if picker.is_requested(block) {
            if num_requests <= 0 {
                break;
            }
            if dq.contains(&block) || rq.contains(&block) || picked.contains(&block) {
                continue;
            }
            busy_blocks.push(block);
            continue;
        }

        if dq.contains(&block) || rq.contains(&block) || picked.contains(&block) {
            continue;
        }

        conn.add_request(block);
        picked.push(block);
        num_requests -= 1;
    }

    if busy_blocks.is_empty() || num_requests <= 0 {
        return;
    }

    // shuffle first so ties on the requester count break randomly, then
    // take the block with the fewest peers on it to bound contention
    busy_blocks.shuffle(&mut rand::rng());
    if let Some(&block) = busy_blocks
        .iter()
        .min_by_key(|block| picker.num_peers(**block))
    {
        debug_assert!(picker.is_requested(block));
        debug_assert!(picker.num_peers(block) > 0);
        debug_assert!(picker.piece_info(block.piece).requested > 0);
        conn.add_request(block);
    }
}
