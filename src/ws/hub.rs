//! Real-time hub: connection arena, room membership, and event fan-out.
//!
//! The hub tracks every admitted WebSocket session in a flat table keyed
//! by [`ConnectionId`], with the user→sessions and auction→room indexes
//! held as sets of IDs. Delivery goes through a bounded per-connection
//! queue; the socket task on the other end drains it onto the wire.
//!
//! The hub is independent of the transactional path: services publish to
//! it after commit, best-effort. A full queue drops the event for that
//! session (the client recovers via a fresh snapshot read); a closed
//! queue prunes the session.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Duration, interval};

use super::messages::ServerMessage;
use crate::domain::{Auction, AuctionEvent, AuctionId, Bid, ExtendReason, UserId};

/// Stable handle for one admitted WebSocket session.
///
/// Allocated from a process-local counter; never reused within a process
/// lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-connection metadata kept for diagnostics.
#[derive(Debug, Clone, Default)]
pub struct ConnectionMeta {
    /// Client-reported device identifier, when provided.
    pub device_id: Option<String>,
    /// Client user agent, when provided.
    pub user_agent: Option<String>,
}

/// Diagnostic view of one admitted session.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    /// The authenticated user.
    pub user_id: UserId,
    /// Client-reported device identifier, when provided.
    pub device_id: Option<String>,
    /// Client user agent, when provided.
    pub user_agent: Option<String>,
    /// When the session was admitted.
    pub connected_at: DateTime<Utc>,
    /// Most recent heartbeat reply, if any.
    pub last_pong_at: Option<DateTime<Utc>>,
}

/// Counters surfaced on the health endpoint.
#[derive(Debug, Clone, Copy, Serialize, utoipa::ToSchema)]
pub struct HubStats {
    /// Admitted sessions.
    pub connections: usize,
    /// Distinct users with at least one session.
    pub users: usize,
    /// Auction rooms with at least one subscriber.
    pub rooms: usize,
}

struct ConnectionEntry {
    user_id: UserId,
    meta: ConnectionMeta,
    connected_at: DateTime<Utc>,
    last_pong_at: Option<DateTime<Utc>>,
    tx: Sender<ServerMessage>,
}

#[derive(Default)]
struct HubState {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    user_sessions: HashMap<UserId, HashSet<ConnectionId>>,
    rooms: HashMap<AuctionId, HashSet<UserId>>,
    memberships: HashMap<UserId, HashSet<AuctionId>>,
}

impl HubState {
    /// Removes one session; if it was the user's last, removes the user
    /// from every room so stale entries never accumulate.
    fn remove_connection(&mut self, id: ConnectionId) {
        let Some(entry) = self.connections.remove(&id) else {
            return;
        };
        let user_id = entry.user_id;

        let last_session = match self.user_sessions.get_mut(&user_id) {
            Some(sessions) => {
                sessions.remove(&id);
                sessions.is_empty()
            }
            None => true,
        };

        if last_session {
            self.user_sessions.remove(&user_id);
            if let Some(auctions) = self.memberships.remove(&user_id) {
                for auction_id in auctions {
                    if let Some(room) = self.rooms.get_mut(&auction_id) {
                        room.remove(&user_id);
                        if room.is_empty() {
                            self.rooms.remove(&auction_id);
                        }
                    }
                }
            }
        }
    }
}

/// Per-auction subscriber rooms and per-user device sets with push-style
/// fan-out. All maps live behind one `RwLock`; fan-out takes the read
/// side, connection lifecycle the write side.
#[derive(Debug)]
pub struct RealtimeHub {
    state: RwLock<HubState>,
    queue_capacity: usize,
    next_id: AtomicU64,
}

impl fmt::Debug for HubState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubState")
            .field("connections", &self.connections.len())
            .field("rooms", &self.rooms.len())
            .finish()
    }
}

impl RealtimeHub {
    /// Creates an empty hub. `queue_capacity` bounds each session's
    /// outbound queue.
    #[must_use]
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            state: RwLock::new(HubState::default()),
            queue_capacity: queue_capacity.max(1),
            next_id: AtomicU64::new(1),
        }
    }

    // ── Connection lifecycle ────────────────────────────────────────────

    /// Admits an authenticated session and returns its handle plus the
    /// outbound message queue. The `connected` greeting is already queued
    /// when this returns.
    pub async fn register(
        &self,
        user_id: UserId,
        meta: ConnectionMeta,
    ) -> (ConnectionId, Receiver<ServerMessage>) {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.queue_capacity);

        // Queue the greeting before the session is visible to fan-out.
        let _ = tx
            .try_send(ServerMessage::Connected {
                user_id,
                socket_id: id,
            });

        let mut state = self.state.write().await;
        state.connections.insert(
            id,
            ConnectionEntry {
                user_id,
                meta,
                connected_at: Utc::now(),
                last_pong_at: None,
                tx,
            },
        );
        state.user_sessions.entry(user_id).or_default().insert(id);
        drop(state);

        tracing::debug!(%user_id, socket_id = %id, "ws session admitted");
        (id, rx)
    }

    /// Removes a session and, if it was the user's last, their room
    /// memberships.
    pub async fn unregister(&self, id: ConnectionId) {
        let mut state = self.state.write().await;
        state.remove_connection(id);
        drop(state);
        tracing::debug!(socket_id = %id, "ws session removed");
    }

    /// Subscribes a user to an auction's room.
    pub async fn join(&self, auction_id: AuctionId, user_id: UserId) {
        let mut state = self.state.write().await;
        state.rooms.entry(auction_id).or_default().insert(user_id);
        state
            .memberships
            .entry(user_id)
            .or_default()
            .insert(auction_id);
    }

    /// Unsubscribes a user from an auction's room.
    pub async fn leave(&self, auction_id: AuctionId, user_id: UserId) {
        let mut state = self.state.write().await;
        if let Some(room) = state.rooms.get_mut(&auction_id) {
            room.remove(&user_id);
            if room.is_empty() {
                state.rooms.remove(&auction_id);
            }
        }
        if let Some(auctions) = state.memberships.get_mut(&user_id) {
            auctions.remove(&auction_id);
            if auctions.is_empty() {
                state.memberships.remove(&user_id);
            }
        }
    }

    /// Records a heartbeat reply for diagnostics.
    pub async fn record_pong(&self, id: ConnectionId) {
        let mut state = self.state.write().await;
        if let Some(entry) = state.connections.get_mut(&id) {
            entry.last_pong_at = Some(Utc::now());
        }
    }

    // ── Notifications ───────────────────────────────────────────────────

    /// Routes a committed domain event to its audience: targeted events go
    /// to one user's sessions, everything else to the auction's room. An
    /// [`AuctionEvent::AuctionEnded`] additionally drops the room — no
    /// further events are deliverable for a closed auction.
    pub async fn publish(&self, event: AuctionEvent) {
        let auction_id = event.auction_id();
        let ended = matches!(event, AuctionEvent::AuctionEnded { .. });

        match event.target_user() {
            Some(user_id) => self.deliver_user(user_id, ServerMessage::from(event)).await,
            None => {
                self.deliver_room(auction_id, ServerMessage::from(event))
                    .await;
            }
        }

        if ended {
            self.drop_room(auction_id).await;
        }
    }

    /// Fans a new accepted bid out to the auction's room.
    pub async fn notify_new_bid(&self, bid: &Bid) {
        self.publish(AuctionEvent::NewBid {
            auction_id: bid.auction_id,
            bid: bid.clone(),
            timestamp: Utc::now(),
        })
        .await;
    }

    /// Tells one displaced bidder, on all their devices, that a higher bid
    /// stands.
    pub async fn notify_outbid(&self, user_id: UserId, bid: &Bid) {
        self.publish(AuctionEvent::Outbid {
            auction_id: bid.auction_id,
            user_id,
            bid: bid.clone(),
            timestamp: Utc::now(),
        })
        .await;
    }

    /// Fans a changed auction row out to its room.
    pub async fn notify_auction_updated(&self, auction: &Auction) {
        self.publish(AuctionEvent::AuctionUpdated {
            auction_id: auction.id,
            auction: auction.clone(),
            timestamp: Utc::now(),
        })
        .await;
    }

    /// Fans a deadline extension out to the auction's room.
    pub async fn notify_auction_extended(
        &self,
        auction_id: AuctionId,
        new_end_time: DateTime<Utc>,
        reason: ExtendReason,
    ) {
        self.publish(AuctionEvent::AuctionExtended {
            auction_id,
            new_end_time,
            reason,
            timestamp: Utc::now(),
        })
        .await;
    }

    /// Announces the auction's end to its room, then drops the room.
    pub async fn notify_auction_ended(&self, auction: &Auction) {
        self.publish(AuctionEvent::AuctionEnded {
            auction_id: auction.id,
            auction: auction.clone(),
            winner_id: auction.winner_id,
            timestamp: Utc::now(),
        })
        .await;
    }

    /// Forgets a room and the matching membership entries.
    async fn drop_room(&self, auction_id: AuctionId) {
        let mut state = self.state.write().await;
        if let Some(members) = state.rooms.remove(&auction_id) {
            for user_id in members {
                if let Some(auctions) = state.memberships.get_mut(&user_id) {
                    auctions.remove(&auction_id);
                    if auctions.is_empty() {
                        state.memberships.remove(&user_id);
                    }
                }
            }
        }
    }

    // ── Heartbeat ───────────────────────────────────────────────────────

    /// Sends a ping to every session and prunes the ones whose queue is
    /// closed. Returns the number of live sessions.
    pub async fn broadcast_ping(&self) -> usize {
        let state = self.state.read().await;
        let mut dead = Vec::new();
        for (id, entry) in &state.connections {
            if matches!(
                entry.tx.try_send(ServerMessage::Ping),
                Err(TrySendError::Closed(_))
            ) {
                dead.push(*id);
            }
        }
        let live = state.connections.len() - dead.len();
        drop(state);

        if !dead.is_empty() {
            let mut state = self.state.write().await;
            for id in dead {
                state.remove_connection(id);
            }
        }
        live
    }

    /// Spawns the periodic heartbeat loop.
    pub fn spawn_heartbeat(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let hub = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                let live = hub.broadcast_ping().await;
                tracing::trace!(connections = live, "heartbeat");
            }
        })
    }

    // ── Diagnostics ─────────────────────────────────────────────────────

    /// Current connection/user/room counts.
    pub async fn stats(&self) -> HubStats {
        let state = self.state.read().await;
        HubStats {
            connections: state.connections.len(),
            users: state.user_sessions.len(),
            rooms: state.rooms.len(),
        }
    }

    /// Returns a session's metadata and timing, when it exists.
    pub async fn connection_info(&self, id: ConnectionId) -> Option<ConnectionInfo> {
        let state = self.state.read().await;
        state.connections.get(&id).map(|e| ConnectionInfo {
            user_id: e.user_id,
            device_id: e.meta.device_id.clone(),
            user_agent: e.meta.user_agent.clone(),
            connected_at: e.connected_at,
            last_pong_at: e.last_pong_at,
        })
    }

    // ── Delivery ────────────────────────────────────────────────────────

    async fn deliver_room(&self, auction_id: AuctionId, msg: ServerMessage) {
        let state = self.state.read().await;
        let Some(room) = state.rooms.get(&auction_id) else {
            return;
        };
        let mut dead = Vec::new();
        for user_id in room {
            let Some(sessions) = state.user_sessions.get(user_id) else {
                continue;
            };
            for id in sessions {
                if let Some(entry) = state.connections.get(id) {
                    Self::push(entry, *id, msg.clone(), &mut dead);
                }
            }
        }
        drop(state);
        self.prune(dead).await;
    }

    async fn deliver_user(&self, user_id: UserId, msg: ServerMessage) {
        let state = self.state.read().await;
        let Some(sessions) = state.user_sessions.get(&user_id) else {
            return;
        };
        let mut dead = Vec::new();
        for id in sessions {
            if let Some(entry) = state.connections.get(id) {
                Self::push(entry, *id, msg.clone(), &mut dead);
            }
        }
        drop(state);
        self.prune(dead).await;
    }

    fn push(
        entry: &ConnectionEntry,
        id: ConnectionId,
        msg: ServerMessage,
        dead: &mut Vec<ConnectionId>,
    ) {
        match entry.tx.try_send(msg) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(socket_id = %id, "ws queue full, dropping event");
            }
            Err(TrySendError::Closed(_)) => dead.push(id),
        }
    }

    async fn prune(&self, dead: Vec<ConnectionId>) {
        if dead.is_empty() {
            return;
        }
        let mut state = self.state.write().await;
        for id in dead {
            state.remove_connection(id);
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{AuctionStatus, BidId, ItemId};

    fn make_bid(auction_id: AuctionId, bidder_id: UserId, amount: i64) -> Bid {
        Bid {
            id: BidId::new(),
            auction_id,
            bidder_id,
            amount,
            is_winning: true,
            is_retracted: false,
            rejected_at: None,
            rejected_by: None,
            read_by_owner_at: None,
            ip_address: None,
            user_agent: None,
            created_at: Utc::now(),
        }
    }

    fn make_auction(id: AuctionId, seller_id: UserId) -> Auction {
        let now = Utc::now();
        Auction {
            id,
            item_id: ItemId::new(),
            seller_id,
            start_price: 100_000,
            current_price: 100_000,
            bid_increment: 5_000,
            min_bid_amount: 100_000,
            start_time: now,
            end_time: now + chrono::Duration::hours(1),
            status: AuctionStatus::Active,
            winner_id: None,
            auto_extend: false,
            extend_minutes: 5,
            views: 0,
            total_bids: 0,
            version: 1,
            last_bid_at: None,
            deleted_at: None,
            created_at: now,
        }
    }

    #[tokio::test]
    async fn register_queues_connected_greeting() {
        let hub = RealtimeHub::new(16);
        let user = UserId::new();
        let (id, mut rx) = hub.register(user, ConnectionMeta::default()).await;

        let Some(ServerMessage::Connected { user_id, socket_id }) = rx.recv().await else {
            panic!("expected connected greeting");
        };
        assert_eq!(user_id, user);
        assert_eq!(socket_id, id);
    }

    #[tokio::test]
    async fn room_members_receive_new_bid() {
        let hub = RealtimeHub::new(16);
        let auction_id = AuctionId::new();
        let member = UserId::new();
        let outsider = UserId::new();

        let (_, mut member_rx) = hub.register(member, ConnectionMeta::default()).await;
        let (_, mut outsider_rx) = hub.register(outsider, ConnectionMeta::default()).await;
        hub.join(auction_id, member).await;

        // Drain greetings.
        let _ = member_rx.recv().await;
        let _ = outsider_rx.recv().await;

        hub.notify_new_bid(&make_bid(auction_id, UserId::new(), 110_000))
            .await;

        let Some(ServerMessage::NewBid { auction_id: got, .. }) = member_rx.recv().await else {
            panic!("member should receive the bid");
        };
        assert_eq!(got, auction_id);
        assert!(outsider_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn outbid_reaches_all_devices_of_one_user() {
        let hub = RealtimeHub::new(16);
        let auction_id = AuctionId::new();
        let displaced = UserId::new();
        let other = UserId::new();

        let (_, mut phone_rx) = hub.register(displaced, ConnectionMeta::default()).await;
        let (_, mut laptop_rx) = hub.register(displaced, ConnectionMeta::default()).await;
        let (_, mut other_rx) = hub.register(other, ConnectionMeta::default()).await;
        hub.join(auction_id, other).await;

        let _ = phone_rx.recv().await;
        let _ = laptop_rx.recv().await;
        let _ = other_rx.recv().await;

        hub.notify_outbid(displaced, &make_bid(auction_id, other, 120_000))
            .await;

        assert!(matches!(
            phone_rx.recv().await,
            Some(ServerMessage::Outbid { .. })
        ));
        assert!(matches!(
            laptop_rx.recv().await,
            Some(ServerMessage::Outbid { .. })
        ));
        assert!(other_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn last_session_disconnect_clears_room_membership() {
        let hub = RealtimeHub::new(16);
        let auction_id = AuctionId::new();
        let user = UserId::new();

        let (id, _rx) = hub.register(user, ConnectionMeta::default()).await;
        hub.join(auction_id, user).await;
        assert_eq!(hub.stats().await.rooms, 1);

        hub.unregister(id).await;

        let stats = hub.stats().await;
        assert_eq!(stats.connections, 0);
        assert_eq!(stats.users, 0);
        assert_eq!(stats.rooms, 0);
    }

    #[tokio::test]
    async fn ended_auction_room_is_dropped() {
        let hub = RealtimeHub::new(16);
        let auction_id = AuctionId::new();
        let user = UserId::new();
        let auction = make_auction(auction_id, UserId::new());

        let (_, mut rx) = hub.register(user, ConnectionMeta::default()).await;
        hub.join(auction_id, user).await;
        let _ = rx.recv().await;

        hub.notify_auction_ended(&auction).await;
        assert!(matches!(
            rx.recv().await,
            Some(ServerMessage::AuctionEnded { .. })
        ));
        assert_eq!(hub.stats().await.rooms, 0);

        // Events for the closed auction no longer reach anyone.
        hub.notify_new_bid(&make_bid(auction_id, UserId::new(), 130_000))
            .await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn heartbeat_prunes_dropped_sessions() {
        let hub = RealtimeHub::new(16);
        let user = UserId::new();
        let (_, rx) = hub.register(user, ConnectionMeta::default()).await;
        drop(rx);

        assert_eq!(hub.broadcast_ping().await, 0);
        assert_eq!(hub.stats().await.connections, 0);
    }
}
