//! Peer admission, connect-candidate selection and eviction.
//!
//! [`PeerPolicy`] owns the peer table of one torrent and every decision
//! made over it: admitting learned and incoming peers, resolving duplicate
//! and self connections, choosing the next dial target, weeding the table
//! under peer-list pressure, and the periodic fairness pulse.
//!
//! Scans over the table are bounded to [`PEER_SCAN_LIMIT`] records per
//! call. That bound is a latency guarantee, not an optimization: full-table
//! work amortizes over many calls.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use rand::Rng as _;
use tracing::debug;

use crate::constants::{
    EVICTION_WATERMARK, FREE_UPLOAD_AMOUNT, PEER_POOL_SIZE, PEER_SCAN_LIMIT,
    RESUME_PRUNE_WATERMARK,
};

use super::address::{cidr_distance, is_local_address, random_external};
use super::connection::{PeerConnection, PeerId};
use super::error::DisconnectReason;
use super::fairness::{collect_free_download, distribute_free_upload};
use super::peer_info::{
    source_rank, PeerInfo, FLAG_PREFERS_ENCRYPTION, FLAG_SEED, SOURCE_INCOMING, SOURCE_RESUME,
    SOURCE_TRACKER,
};
use super::peer_list::PeerList;
use super::pool::PeerPool;
use super::requester::request_a_block;
use super::session::{Alert, SwarmContext, FILTER_BLOCKED};
use super::settings::PolicySettings;

/// The peer policy of one torrent.
pub struct PeerPolicy {
    peers: PeerList,
    pool_v4: PeerPool,
    pool_v6: PeerPool,
    settings: PolicySettings,
    available_free_upload: i64,
    num_connect_candidates: usize,
    num_seeds: usize,
    finished: bool,
}

impl PeerPolicy {
    pub fn new(settings: PolicySettings) -> Self {
        Self {
            peers: PeerList::new(),
            pool_v4: PeerPool::new(PEER_POOL_SIZE),
            pool_v6: PeerPool::new(PEER_POOL_SIZE),
            settings,
            available_free_upload: 0,
            num_connect_candidates: 0,
            num_seeds: 0,
            finished: false,
        }
    }

    // ------------------------------------------------------------------
    // observers
    // ------------------------------------------------------------------

    pub fn settings(&self) -> &PolicySettings {
        &self.settings
    }

    /// Number of known peers.
    pub fn num_peers(&self) -> usize {
        self.peers.len()
    }

    /// Number of known peers believed to be seeds.
    pub fn num_seeds(&self) -> usize {
        self.num_seeds
    }

    /// Number of peers that could be dialed right now.
    pub fn num_connect_candidates(&self) -> usize {
        self.num_connect_candidates
    }

    /// Upload credit pooled but not yet handed out.
    pub fn available_free_upload(&self) -> i64 {
        self.available_free_upload
    }

    /// All known peers, in address order.
    pub fn peers(&self) -> impl Iterator<Item = &PeerInfo> {
        self.peers.iter()
    }

    /// The record for `endpoint`, if known.
    pub fn peer(&self, endpoint: SocketAddr) -> Option<&PeerInfo> {
        self.index_of(endpoint).map(|i| self.peers.get(i))
    }

    /// True if `peer` could legitimately be dialed right now.
    pub fn is_connect_candidate(&self, peer: &PeerInfo, ctx: &dyn SwarmContext) -> bool {
        is_connect_candidate(peer, self.finished, &self.settings, ctx)
    }

    /// True if `peer`'s slot may be reclaimed under peer-list pressure.
    pub fn is_erase_candidate(&self, peer: &PeerInfo, ctx: &dyn SwarmContext) -> bool {
        is_erase_candidate(peer, self.finished, &self.settings, ctx)
    }

    /// True if `peer` is not even worth keeping until the end of a scan.
    pub fn should_erase_immediately(&self, peer: &PeerInfo) -> bool {
        should_erase_immediately(peer)
    }

    // ------------------------------------------------------------------
    // admission
    // ------------------------------------------------------------------

    /// Records a peer learned from `source`. Returns the record, or `None`
    /// if the endpoint is invalid, filtered, or the table is full.
    pub fn add_peer(
        &mut self,
        ctx: &mut dyn SwarmContext,
        remote: SocketAddr,
        peer_id: Option<PeerId>,
        source: u8,
        flags: u8,
    ) -> Option<&PeerInfo> {
        // obviously invalid entries
        if remote.ip().is_unspecified() || remote.port() == 0 {
            return None;
        }

        if ctx.port_filter_access(remote.port()) & FILTER_BLOCKED != 0 {
            if ctx.should_post_alerts() {
                ctx.post_alert(Alert::PeerBlocked(remote.ip()));
            }
            return None;
        }
        if ctx.ip_filter_access(remote.ip()) & FILTER_BLOCKED != 0 {
            if ctx.should_post_alerts() {
                ctx.post_alert(Alert::PeerBlocked(remote.ip()));
            }
            return None;
        }

        let found = self.index_of(remote);

        let index = match found {
            None => {
                let cap = self.max_peerlist_size(&*ctx);
                if cap != 0 && self.peers.len() >= cap {
                    // resume-data peers are the stalest source there is;
                    // not worth evicting for
                    if source == SOURCE_RESUME {
                        return None;
                    }
                    self.erase_peers(ctx);
                    if self.peers.len() >= cap {
                        return None;
                    }
                }

                let mut record = PeerInfo::new(remote.ip(), remote.port(), true, source);
                record.peer_id = peer_id;
                if flags & FLAG_PREFERS_ENCRYPTION != 0 {
                    record.pe_support = true;
                }
                if flags & FLAG_SEED != 0 {
                    record.seed = true;
                }
                let index = self.insert_record(&*ctx, record);

                if self.peers.get(index).seed {
                    self.num_seeds += 1;
                }
                if is_connect_candidate(self.peers.get(index), self.finished, &self.settings, &*ctx)
                {
                    self.num_connect_candidates += 1;
                }
                index
            }
            Some(index) => {
                let was =
                    is_connect_candidate(self.peers.get(index), self.finished, &self.settings, &*ctx);
                let live = self.peers.get(index).has_connection();
                if let Some(conn) = self.peers.get(index).connection() {
                    debug!(peer = %remote, pid = ?conn.pid(), "already connected to peer");
                }
                {
                    let p = self.peers.get_mut(index);
                    p.connectable = true;
                    p.port = remote.port();
                    p.source |= source;
                    if peer_id.is_some() {
                        p.peer_id = peer_id;
                    }

                    // somebody else can reach this peer, so give it
                    // another chance; only the tracker is trusted for that
                    if p.failcount > 0 && source == SOURCE_TRACKER {
                        p.failcount -= 1;
                    }
                }

                // the port rewrite moved the record's endpoint; keep the
                // live connection's back-link pointing at it
                if let Some(conn) = self.peers.get(index).connection() {
                    conn.set_peer_info(Some(self.peers.get(index).endpoint()));
                }

                // when connected we can see for ourselves whether the
                // peer is a seed
                if flags & FLAG_SEED != 0 && !live && !self.peers.get(index).seed {
                    self.peers.get_mut(index).seed = true;
                    self.num_seeds += 1;
                }

                let now =
                    is_connect_candidate(self.peers.get(index), self.finished, &self.settings, &*ctx);
                self.adjust_candidate_count(was, now);
                index
            }
        };

        self.check_invariant(&*ctx);
        Some(self.peers.get(index))
    }

    /// Admits an incoming connection, resolving duplicate and self
    /// connections. Returns false if `conn` was turned away.
    pub fn new_incoming_connection(
        &mut self,
        ctx: &mut dyn SwarmContext,
        conn: &Arc<dyn PeerConnection>,
        session_time: u32,
    ) -> bool {
        debug_assert!(!conn.is_local());
        let remote = conn.remote();

        // a connection from the tracker is likely its NAT check; the
        // connection caps don't apply to it
        let is_tracker = ctx
            .current_tracker()
            .is_some_and(|tracker| tracker.ip() == remote.ip());
        if ctx.num_connections() >= ctx.max_connections()
            && ctx.session_connections() >= ctx.session_max_connections()
        {
            if !is_tracker {
                conn.disconnect(DisconnectReason::TooManyConnections);
                return false;
            }
            debug!(peer = %remote, "overriding connection limit for tracker NAT check");
        }

        let index = match self.index_of(remote) {
            Some(index) => {
                if self.peers.get(index).banned {
                    conn.disconnect(DisconnectReason::Banned);
                    return false;
                }

                if let Some(existing) = self.peers.get(index).connection() {
                    let Some(this_local) = conn.local_endpoint() else {
                        conn.disconnect(DisconnectReason::EndpointGone);
                        return false;
                    };
                    let other_local = existing.local_endpoint();

                    // the two sockets of one loopback connection see each
                    // other's endpoints mirrored
                    let self_connection =
                        existing.remote() == this_local || other_local == Some(remote);
                    if self_connection {
                        conn.disconnect(DisconnectReason::SelfConnection);
                        existing.disconnect(DisconnectReason::SelfConnection);
                        return false;
                    }

                    if other_local.is_none() {
                        existing.disconnect(DisconnectReason::EndpointGone);
                    } else if !existing.is_connecting() {
                        // the existing connection won the race
                        conn.disconnect(DisconnectReason::Duplicate);
                        return false;
                    } else {
                        debug!(
                            peer = %remote,
                            "dropping half-open outbound in favour of incoming duplicate"
                        );
                        existing.disconnect(DisconnectReason::DuplicateSuperseded);
                    }
                }
                index
            }
            None => {
                let cap = self.max_peerlist_size(&*ctx);
                if cap != 0 && self.peers.len() >= cap {
                    conn.disconnect(DisconnectReason::PeerListFull);
                    return false;
                }
                let record = PeerInfo::new(remote.ip(), remote.port(), false, SOURCE_INCOMING);
                self.insert_record(&*ctx, record)
            }
        };

        let was = is_connect_candidate(self.peers.get(index), self.finished, &self.settings, &*ctx);
        self.attach_connection(index, conn, Some(session_time));
        self.adjust_candidate_count(was, false);
        self.check_invariant(&*ctx);
        true
    }

    /// Rewrites the listen port of the record behind `conn` (learned from
    /// an extension handshake). Returns false if the rewrite collides with
    /// another live connection; `conn` is disconnected in that case.
    pub fn update_peer_port(
        &mut self,
        ctx: &mut dyn SwarmContext,
        conn: &Arc<dyn PeerConnection>,
        port: u16,
        source: u8,
    ) -> bool {
        let Some(endpoint) = conn.peer_info() else {
            return true;
        };
        let Some(mut index) = self.index_of(endpoint) else {
            return true;
        };
        if self.peers.get(index).port == port {
            return true;
        }

        if self.settings.allow_multiple_connections_per_ip {
            let target = SocketAddr::new(endpoint.ip(), port);
            if let Some(other) = self.peers.find_endpoint(target) {
                if other != index {
                    if self.peers.get(other).has_connection() {
                        // two live connections would collide on one endpoint
                        conn.disconnect(DisconnectReason::Duplicate);
                        return false;
                    }
                    self.erase_peer_at(ctx, other);
                    if other < index {
                        index -= 1;
                    }
                }
            }
        }

        let was = is_connect_candidate(self.peers.get(index), self.finished, &self.settings, &*ctx);
        {
            let p = self.peers.get_mut(index);
            p.port = port;
            p.source |= source;
        }
        conn.set_peer_info(Some(self.peers.get(index).endpoint()));
        let now = is_connect_candidate(self.peers.get(index), self.finished, &self.settings, &*ctx);
        self.adjust_candidate_count(was, now);
        self.check_invariant(&*ctx);
        true
    }

    /// Marks the record for `endpoint` banned. Banned peers are never
    /// dialed again and their incoming connections are refused.
    pub fn ban_peer(&mut self, ctx: &mut dyn SwarmContext, endpoint: SocketAddr) -> bool {
        let Some(index) = self.index_of(endpoint) else {
            return false;
        };
        let was = is_connect_candidate(self.peers.get(index), self.finished, &self.settings, &*ctx);
        self.peers.get_mut(index).banned = true;
        self.adjust_candidate_count(was, false);
        self.check_invariant(&*ctx);
        true
    }

    // ------------------------------------------------------------------
    // candidate selection
    // ------------------------------------------------------------------

    /// The endpoint of the best peer to dial right now, if any.
    pub fn find_connect_candidate(
        &mut self,
        ctx: &mut dyn SwarmContext,
        session_time: u32,
    ) -> Option<SocketAddr> {
        let index = self.find_connect_candidate_index(ctx, session_time)?;
        Some(self.peers.get(index).endpoint())
    }

    /// Finds the best connect candidate and asks the dialer to go. On dial
    /// failure the candidate's failcount is bumped. Returns true if a
    /// connection attempt was started.
    pub fn connect_one_peer(&mut self, ctx: &mut dyn SwarmContext, session_time: u32) -> bool {
        let Some(index) = self.find_connect_candidate_index(ctx, session_time) else {
            return false;
        };
        {
            let p = self.peers.get(index);
            debug_assert!(!p.banned);
            debug_assert!(!p.has_connection());
            debug_assert!(p.connectable);
        }
        let endpoint = self.peers.get(index).endpoint();
        let started = match ctx.connect_to_peer(endpoint) {
            Some(conn) => {
                // an attached connection is no longer dialable
                self.attach_connection(index, &conn, None);
                self.adjust_candidate_count(true, false);
                true
            }
            None => {
                self.peers.get_mut(index).register_failure();
                let now =
                    is_connect_candidate(self.peers.get(index), self.finished, &self.settings, &*ctx);
                self.adjust_candidate_count(true, now);
                false
            }
        };
        self.check_invariant(&*ctx);
        started
    }

    fn find_connect_candidate_index(
        &mut self,
        ctx: &mut dyn SwarmContext,
        session_time: u32,
    ) -> Option<usize> {
        let mut candidate: Option<usize> = None;
        let mut erase_candidate: Option<usize> = None;

        let finished = self.finished;
        let min_reconnect_time = self.settings.min_reconnect_time;

        // when seeding, or with no known external address, the proximity
        // tiebreaker is randomized so no peer is systematically favoured
        let external_ip = match ctx.external_address() {
            Some(ip) if !finished => ip,
            _ => random_external(),
        };

        let cap = self.max_peerlist_size(&*ctx);
        let mut pinged = false;

        let iterations = self.peers.len().min(PEER_SCAN_LIMIT);
        for _ in 0..iterations {
            if self.peers.is_empty() {
                break;
            }
            if self.peers.cursor() >= self.peers.len() {
                self.peers.set_cursor(0);
            }
            let current = self.peers.cursor();

            // one DHT ping per scan, to learn whether the peer runs a
            // node without it advertising one
            if !pinged && !self.peers.get(current).added_to_dht {
                let endpoint = self.peers.get(current).endpoint();
                ctx.add_dht_node(endpoint);
                self.peers.get_mut(current).added_to_dht = true;
                pinged = true;
            }

            // start weeding once the table closes in on its cap
            let mut erase_now = false;
            if above_watermark(self.peers.len(), cap) {
                let pe = self.peers.get(current);
                if is_erase_candidate(pe, finished, &self.settings, &*ctx)
                    && erase_candidate
                        .map_or(true, |e| !compare_peer_erase(self.peers.get(e), pe))
                {
                    if should_erase_immediately(pe) {
                        erase_now = true;
                    } else {
                        erase_candidate = Some(current);
                    }
                }
            }
            if erase_now {
                if let Some(e) = erase_candidate.as_mut() {
                    if *e > current {
                        *e -= 1;
                    }
                }
                if let Some(c) = candidate.as_mut() {
                    if *c > current {
                        *c -= 1;
                    }
                }
                self.erase_peer_at(ctx, current);
                self.peers.set_cursor((current + 1).min(self.peers.len()));
                continue;
            }

            self.peers.set_cursor(current + 1);

            let pe = self.peers.get(current);
            if !is_connect_candidate(pe, finished, &self.settings, &*ctx) {
                continue;
            }

            // reconnect back-off grows with the failure count
            if let Some(last) = pe.last_connected {
                if session_time.saturating_sub(last)
                    < (pe.failcount as u32 + 1) * min_reconnect_time
                {
                    continue;
                }
            }

            // keep the better of the standing candidate and this record
            if let Some(c) = candidate {
                if compare_peer(self.peers.get(c), pe, external_ip, finished, &*ctx) {
                    continue;
                }
            }

            candidate = Some(current);
        }

        if let Some(e) = erase_candidate {
            if let Some(c) = candidate.as_mut() {
                if *c > e {
                    *c -= 1;
                }
            }
            self.erase_peer_at(ctx, e);
        }

        if let Some(c) = candidate {
            let p = self.peers.get(c);
            debug!(
                peer = %p.endpoint(),
                distance = cidr_distance(external_ip, p.addr),
                "found connect candidate"
            );
        }
        candidate
    }

    // ------------------------------------------------------------------
    // eviction
    // ------------------------------------------------------------------

    /// Bounds the peer list by erasing the weakest known-but-unconnected
    /// records until the table drops below the eviction watermark.
    pub fn erase_peers(&mut self, ctx: &mut dyn SwarmContext) {
        let cap = self.max_peerlist_size(&*ctx);
        if cap == 0 || self.peers.is_empty() {
            return;
        }

        let finished = self.finished;
        let mut erase_candidate: Option<usize> = None;
        let mut round_robin = rand::rng().random_range(0..self.peers.len());

        let iterations = self.peers.len().min(PEER_SCAN_LIMIT);
        for _ in 0..iterations {
            if (self.peers.len() as f64) < cap as f64 * EVICTION_WATERMARK {
                break;
            }
            if round_robin >= self.peers.len() {
                round_robin = 0;
            }
            let current = round_robin;

            let mut erase_now = false;
            {
                let pe = self.peers.get(current);
                if is_erase_candidate(pe, finished, &self.settings, &*ctx)
                    && erase_candidate
                        .map_or(true, |e| !compare_peer_erase(self.peers.get(e), pe))
                {
                    if should_erase_immediately(pe) {
                        erase_now = true;
                    } else {
                        erase_candidate = Some(current);
                    }
                }
            }
            if erase_now {
                if let Some(e) = erase_candidate.as_mut() {
                    if *e > current {
                        *e -= 1;
                    }
                }
                self.erase_peer_at(ctx, current);
            }

            round_robin = current + 1;
        }

        if let Some(e) = erase_candidate {
            self.erase_peer_at(ctx, e);
        }
        self.check_invariant(&*ctx);
    }

    /// Disconnects and forgets every peer the updated IP filter now
    /// blocks.
    pub fn ip_filter_updated(&mut self, ctx: &mut dyn SwarmContext) {
        let mut index = 0;
        while index < self.peers.len() {
            let addr = self.peers.get(index).addr;
            if ctx.ip_filter_access(addr) & FILTER_BLOCKED == 0 {
                index += 1;
                continue;
            }
            if let Some(conn) = self.peers.get(index).connection() {
                conn.disconnect(DisconnectReason::Filtered);
            }
            if ctx.should_post_alerts() {
                ctx.post_alert(Alert::PeerBlocked(addr));
            }
            self.erase_peer_at(ctx, index);
        }
        self.check_invariant(&*ctx);
    }

    // ------------------------------------------------------------------
    // lifecycle hooks
    // ------------------------------------------------------------------

    /// Periodic tick: shifts surplus download into the free-upload pool,
    /// spreads the pool over peers we owe, and weeds the peer list.
    pub fn pulse(&mut self, ctx: &mut dyn SwarmContext) {
        // the pool only matters when the torrent enforces a share ratio
        if ctx.share_ratio() != 0.0 {
            let connections = ctx.connections();
            self.available_free_upload += collect_free_download(&connections);
            self.available_free_upload =
                distribute_free_upload(&connections, self.available_free_upload);
        }
        self.erase_peers(ctx);
        self.check_invariant(&*ctx);
    }

    /// Called when a connection closes, however it closed. Carries the
    /// transfer totals over into the record and re-arms candidacy.
    pub fn connection_closed(
        &mut self,
        ctx: &mut dyn SwarmContext,
        conn: &Arc<dyn PeerConnection>,
        session_time: u32,
    ) {
        let Some(endpoint) = conn.peer_info() else {
            return;
        };
        let Some(index) = self.index_of(endpoint) else {
            return;
        };

        // detach only if the record is still bound to this very
        // connection; a superseded duplicate may already have replaced it
        let bound = self
            .peers
            .get(index)
            .connection()
            .is_some_and(|c| Arc::ptr_eq(&c, conn));
        if !bound {
            return;
        }

        {
            let p = self.peers.get_mut(index);
            p.clear_connection();
            p.optimistically_unchoked = false;

            // a fast reconnect keeps the original timestamp so the
            // reconnect window is measured from the first attempt
            if !conn.fast_reconnect() {
                p.last_connected = Some(session_time);
            }
            if conn.failed() {
                p.register_failure();
            }

            let stats = conn.statistics();
            debug_assert_eq!(p.prev_amount_download, 0);
            debug_assert_eq!(p.prev_amount_upload, 0);
            p.prev_amount_download += stats.total_payload_download;
            p.prev_amount_upload += stats.total_payload_upload;
        }

        if is_connect_candidate(self.peers.get(index), self.finished, &self.settings, &*ctx) {
            self.num_connect_candidates += 1;
        }

        if ctx.share_ratio() != 0.0 {
            self.available_free_upload += conn.share_diff();
        }

        // when seeding, or with the table nearly full, peers only known
        // from resume data are not worth remembering once they disconnect
        let cap = self.settings.max_peerlist_size;
        if (ctx.is_seed()
            || (cap != 0 && self.peers.len() as f64 >= cap as f64 * RESUME_PRUNE_WATERMARK))
            && self.peers.get(index).source == SOURCE_RESUME
        {
            self.erase_peer_at(ctx, index);
        }
        self.check_invariant(&*ctx);
    }

    /// Called when a peer unchokes us.
    pub fn unchoked(&mut self, ctx: &mut dyn SwarmContext, conn: &Arc<dyn PeerConnection>) {
        if conn.is_interesting() {
            request_a_block(ctx, &self.settings, conn.as_ref());
            conn.send_block_requests();
        }
    }

    /// Called when a peer declares interest in us.
    pub fn interested(&mut self, ctx: &mut dyn SwarmContext, conn: &Arc<dyn PeerConnection>) {
        // reward interest with an unchoke while slots are free, unless the
        // peer is deep in our debt; once we're finished nobody can pay
        // anyway
        if conn.is_choked()
            && ctx.num_uploads() < ctx.max_uploads()
            && !conn.ignore_unchoke_slots()
            && (ctx.share_ratio() == 0.0
                || conn.share_diff() >= -FREE_UPLOAD_AMOUNT
                || ctx.is_finished())
        {
            ctx.unchoke_peer(conn);
        }
    }

    /// Called when a peer withdraws its interest in us.
    pub fn not_interested(&mut self, ctx: &mut dyn SwarmContext, conn: &Arc<dyn PeerConnection>) {
        if ctx.share_ratio() == 0.0 {
            return;
        }
        let diff = conn.share_diff();
        if diff > 0 && conn.is_seed() {
            // a seed sent us more than we returned and wants nothing
            // back; bank the surplus
            self.available_free_upload += diff;
            conn.add_free_upload(-diff);
        }
    }

    /// Called when a peer turns out to have data we want.
    pub fn peer_is_interesting(
        &mut self,
        ctx: &mut dyn SwarmContext,
        conn: &Arc<dyn PeerConnection>,
    ) {
        debug_assert!(!ctx.is_finished());
        if conn.in_handshake() {
            return;
        }
        conn.send_interested();
        if conn.has_peer_choked() && conn.allowed_fast().is_empty() {
            return;
        }
        request_a_block(ctx, &self.settings, conn.as_ref());
        conn.send_block_requests();
    }

    /// Re-derives the candidate count after the torrent's finished state
    /// flipped (finishing disqualifies seeds from being dialed).
    pub fn recalculate_connect_candidates(&mut self, ctx: &mut dyn SwarmContext) {
        let finished = ctx.is_finished();
        if finished == self.finished {
            return;
        }
        self.finished = finished;
        let ctx_ref: &dyn SwarmContext = &*ctx;
        let count = self
            .peers
            .iter()
            .filter(|p| is_connect_candidate(p, finished, &self.settings, ctx_ref))
            .count();
        self.num_connect_candidates = count;
        self.check_invariant(&*ctx);
    }

    // ------------------------------------------------------------------
    // internals
    // ------------------------------------------------------------------

    fn index_of(&self, endpoint: SocketAddr) -> Option<usize> {
        if self.settings.allow_multiple_connections_per_ip {
            self.peers.find_endpoint(endpoint)
        } else {
            self.peers.find_address(endpoint.ip())
        }
    }

    fn max_peerlist_size(&self, ctx: &dyn SwarmContext) -> usize {
        if ctx.is_paused() {
            self.settings.max_paused_peerlist_size
        } else {
            self.settings.max_peerlist_size
        }
    }

    fn adjust_candidate_count(&mut self, was: bool, now: bool) {
        if was && !now {
            self.num_connect_candidates = self.num_connect_candidates.saturating_sub(1);
        } else if !was && now {
            self.num_connect_candidates += 1;
        }
    }

    fn insert_record(&mut self, ctx: &dyn SwarmContext, mut record: PeerInfo) -> usize {
        if ctx.has_asnum_db() {
            record.as_number = ctx.as_number(record.addr);
        }
        let index = self.peers.lower_bound(record.addr);
        let boxed = if record.addr.is_ipv6() {
            self.pool_v6.alloc(record)
        } else {
            self.pool_v4.alloc(record)
        };
        self.peers.insert_at(index, boxed);
        index
    }

    fn attach_connection(
        &mut self,
        index: usize,
        conn: &Arc<dyn PeerConnection>,
        connected_at: Option<u32>,
    ) {
        let p = self.peers.get_mut(index);
        conn.set_peer_info(Some(p.endpoint()));
        conn.add_stat(p.prev_amount_download, p.prev_amount_upload);
        p.prev_amount_download = 0;
        p.prev_amount_upload = 0;
        p.set_connection(conn);
        if let Some(session_time) = connected_at {
            if !conn.fast_reconnect() {
                p.last_connected = Some(session_time);
            }
        }
    }

    /// Every record leaves the table through here, so the picker and the
    /// counters stay consistent with it.
    fn erase_peer_at(&mut self, ctx: &mut dyn SwarmContext, index: usize) {
        let (endpoint, seed, was_candidate, v6) = {
            let p = self.peers.get(index);
            (
                p.endpoint(),
                p.seed,
                is_connect_candidate(p, self.finished, &self.settings, &*ctx),
                p.addr.is_ipv6(),
            )
        };
        if ctx.has_picker() {
            ctx.picker().clear_peer(endpoint);
        }
        if let Some(conn) = self.peers.get(index).connection() {
            conn.set_peer_info(None);
        }
        if seed {
            self.num_seeds = self.num_seeds.saturating_sub(1);
        }
        if was_candidate {
            self.num_connect_candidates = self.num_connect_candidates.saturating_sub(1);
        }
        let record = self.peers.remove(index);
        if v6 {
            self.pool_v6.release(record);
        } else {
            self.pool_v4.release(record);
        }
    }

    #[cfg(test)]
    pub(crate) fn peer_mut(&mut self, endpoint: SocketAddr) -> Option<&mut PeerInfo> {
        self.index_of(endpoint).map(|i| self.peers.get_mut(i))
    }

    #[cfg(test)]
    pub(crate) fn recount(&mut self, ctx: &dyn SwarmContext) {
        self.num_seeds = self.peers.iter().filter(|p| p.seed).count();
        let finished = self.finished;
        let count = self
            .peers
            .iter()
            .filter(|p| is_connect_candidate(p, finished, &self.settings, ctx))
            .count();
        self.num_connect_candidates = count;
    }

    fn check_invariant(&self, ctx: &dyn SwarmContext) {
        #[cfg(debug_assertions)]
        {
            use crate::constants::FAILCOUNT_CAP;

            assert!(self.peers.is_sorted());
            assert!(self.peers.cursor() <= self.peers.len());
            if !self.settings.allow_multiple_connections_per_ip {
                let mut prev: Option<IpAddr> = None;
                for p in self.peers.iter() {
                    if let Some(q) = prev {
                        assert!(q < p.addr);
                    }
                    prev = Some(p.addr);
                }
            }
            assert_eq!(self.num_seeds, self.peers.iter().filter(|p| p.seed).count());
            assert_eq!(
                self.num_connect_candidates,
                self.peers
                    .iter()
                    .filter(|p| is_connect_candidate(p, self.finished, &self.settings, ctx))
                    .count()
            );
            for p in self.peers.iter() {
                assert!(p.failcount <= FAILCOUNT_CAP);
                if let Some(conn) = p.connection() {
                    assert_eq!(p.prev_amount_download, 0);
                    assert_eq!(p.prev_amount_upload, 0);
                    assert_eq!(conn.peer_info(), Some(p.endpoint()));
                }
            }
        }
        #[cfg(not(debug_assertions))]
        let _ = ctx;
    }
}

impl Default for PeerPolicy {
    fn default() -> Self {
        Self::new(PolicySettings::default())
    }
}

fn above_watermark(len: usize, cap: usize) -> bool {
    cap > 0 && len as f64 >= cap as f64 * EVICTION_WATERMARK
}

fn is_connect_candidate(
    p: &PeerInfo,
    finished: bool,
    settings: &PolicySettings,
    ctx: &dyn SwarmContext,
) -> bool {
    if p.has_connection()
        || p.banned
        || !p.connectable
        || (p.seed && finished)
        || p.failcount >= settings.max_failcount
    {
        return false;
    }
    ctx.port_filter_access(p.port) & FILTER_BLOCKED == 0
}

fn is_erase_candidate(
    p: &PeerInfo,
    finished: bool,
    settings: &PolicySettings,
    ctx: &dyn SwarmContext,
) -> bool {
    !p.has_connection()
        && p.last_connected.is_some()
        && !p.banned
        && !is_connect_candidate(p, finished, settings, ctx)
}

fn should_erase_immediately(p: &PeerInfo) -> bool {
    p.source == SOURCE_RESUME && p.failcount > 0 && !p.banned
}

/// True if `lhs` is the better record to erase.
pub(crate) fn compare_peer_erase(lhs: &PeerInfo, rhs: &PeerInfo) -> bool {
    // records only known from resume data go first
    let lhs_resume = lhs.source == SOURCE_RESUME;
    let rhs_resume = rhs.source == SOURCE_RESUME;
    if lhs_resume != rhs_resume {
        return lhs_resume;
    }
    lhs.failcount > rhs.failcount
}

/// True if `lhs` is the better peer to dial.
pub(crate) fn compare_peer(
    lhs: &PeerInfo,
    rhs: &PeerInfo,
    external_ip: IpAddr,
    finished: bool,
    ctx: &dyn SwarmContext,
) -> bool {
    if lhs.failcount != rhs.failcount {
        return lhs.failcount < rhs.failcount;
    }
    // local peers always go first
    let lhs_local = is_local_address(lhs.addr);
    let rhs_local = is_local_address(rhs.addr);
    if lhs_local != rhs_local {
        return lhs_local;
    }
    // prefer the peer left alone longest
    if lhs.last_connected != rhs.last_connected {
        return lhs.last_connected < rhs.last_connected;
    }
    let lhs_rank = source_rank(lhs.source);
    let rhs_rank = source_rank(rhs.source);
    if lhs_rank != rhs_rank {
        return lhs_rank > rhs_rank;
    }
    // prefer well-represented ASes, but not while seeding
    if !finished && ctx.has_asnum_db() {
        let lhs_as = ctx.peers_in_as(lhs.as_number);
        let rhs_as = ctx.peers_in_as(rhs.as_number);
        if lhs_as != rhs_as {
            return lhs_as > rhs_as;
        }
    }
    cidr_distance(external_ip, lhs.addr) < cidr_distance(external_ip, rhs.addr)
}
