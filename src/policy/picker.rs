//! Contract with the piece picker.
//!
//! The picker owns rarity and priority; the policy only asks it for
//! candidate blocks and for per-block request state. [`clear_peer`] must be
//! called before a peer record disappears so the picker drops its
//! references to it.
//!
//! [`clear_peer`]: PiecePicker::clear_peer

use std::net::SocketAddr;

use crate::bitfield::Bitfield;

use super::connection::PeerSpeed;

/// One block within a piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PieceBlock {
    pub piece: u32,
    pub block: u32,
}

impl PieceBlock {
    pub fn new(piece: u32, block: u32) -> Self {
        Self { piece, block }
    }
}

/// Download state of one piece.
#[derive(Debug, Clone, Copy, Default)]
pub struct PieceInfo {
    /// Blocks requested but not yet received.
    pub requested: u32,
    /// Blocks received and being written out.
    pub writing: u32,
    /// Blocks fully written.
    pub finished: u32,
}

/// The rarity/priority engine, seen from the policy.
pub trait PiecePicker {
    /// Fills `out` with candidate blocks available in `pieces`, at most
    /// `num_blocks` of them unless `prefer_whole_pieces` demands more.
    /// `peer` identifies the requesting record; `speed`, `options` and
    /// `suggested` steer the pick.
    #[allow(clippy::too_many_arguments)]
    fn pick_pieces(
        &self,
        pieces: &Bitfield,
        out: &mut Vec<PieceBlock>,
        num_blocks: usize,
        prefer_whole_pieces: u32,
        peer: SocketAddr,
        speed: PeerSpeed,
        options: u32,
        suggested: &[u32],
    );

    /// True if the block is requested from some peer already.
    fn is_requested(&self, block: PieceBlock) -> bool;

    /// Number of peers the block is currently requested from.
    fn num_peers(&self, block: PieceBlock) -> usize;

    /// Download state of a piece.
    fn piece_info(&self, piece: u32) -> PieceInfo;

    /// Pieces with at least one outstanding block.
    fn download_queue(&self) -> Vec<u32>;

    /// Peers a piece's blocks are requested from.
    fn downloaders(&self, piece: u32) -> Vec<SocketAddr>;

    /// Drops every reference the picker holds to `peer`.
    fn clear_peer(&mut self, peer: SocketAddr);
}
