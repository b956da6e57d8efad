//! Connected clients and message fan-out.
//!
//! The hub maps each user to the outbound channel of their live connection.
//! Delivery is fire-and-forget: a closed channel is skipped and never undoes
//! the state change that produced the message.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::game::game_match::EndReason;
use crate::server::dispatch::{self, Outcome, Services};
use crate::server::protocol::{Outbound, Recipient};
use crate::server::sync::spawn_match_sync;
use crate::session::identity::{Identity, UserId};

/// Identifies one socket, so a stale socket closing cannot evict a newer one
/// opened by the same user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

#[derive(Debug)]
struct ClientHandle {
    connection: ConnectionId,
    tx: UnboundedSender<String>,
}

pub struct Hub {
    services: Services,
    clients: Mutex<HashMap<UserId, ClientHandle>>,
    next_connection: AtomicU64,
}

impl Hub {
    pub fn new(services: Services) -> Arc<Self> {
        Arc::new(Self {
            services,
            clients: Mutex::new(HashMap::new()),
            next_connection: AtomicU64::new(1),
        })
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn connected_count(&self) -> usize {
        self.clients.lock().len()
    }

    /// Register a verified connection and greet it with the leaderboard.
    pub fn connect(&self, identity: &Identity, tx: UnboundedSender<String>) -> ConnectionId {
        let connection = ConnectionId(self.next_connection.fetch_add(1, Ordering::Relaxed));
        let replaced = self
            .clients
            .lock()
            .insert(identity.id.clone(), ClientHandle { connection, tx })
            .is_some();
        info!(user_id = %identity.id, replaced, "client connected");
        self.deliver(vec![Outbound::to_user(&identity.id, self.services.leaderboard())]);
        connection
    }

    /// Forget a connection and treat it as leaving. A connection that was
    /// already replaced by a newer one is ignored.
    pub fn disconnect(self: &Arc<Self>, identity: &Identity, connection: ConnectionId) {
        {
            let mut clients = self.clients.lock();
            match clients.get(&identity.id) {
                Some(handle) if handle.connection == connection => {
                    clients.remove(&identity.id);
                }
                _ => return,
            }
        }
        info!(user_id = %identity.id, "client disconnected");
        let outcome = dispatch::leave(&self.services, &identity.id, EndReason::OpponentDisconnected);
        self.apply(outcome);
    }

    /// Handle one inbound text frame from `identity`. Returns the sync tasks
    /// started for matches that began a run.
    pub fn handle_text(self: &Arc<Self>, identity: &Identity, text: &str) -> Vec<JoinHandle<()>> {
        let now = Instant::now().into_std();
        let outcome = dispatch::handle_text(&self.services, identity, text, now);
        self.apply(outcome)
    }

    /// Send the messages and start sync tasks for matches that began a run.
    pub fn apply(self: &Arc<Self>, outcome: Outcome) -> Vec<JoinHandle<()>> {
        self.deliver(outcome.outbound);
        outcome
            .started
            .iter()
            .map(|game| spawn_match_sync(Arc::clone(self), game))
            .collect()
    }

    pub fn deliver(&self, outbound: Vec<Outbound>) {
        if outbound.is_empty() {
            return;
        }
        let clients = self.clients.lock();
        for Outbound { to, message } in outbound {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(err) => {
                    warn!(kind = message.kind(), error = %err, "failed to encode message");
                    continue;
                }
            };
            match &to {
                Recipient::Everyone => {
                    for handle in clients.values() {
                        let _ = handle.tx.send(text.clone());
                    }
                }
                recipient => {
                    for (user, handle) in clients.iter() {
                        if recipient.includes(user) && handle.tx.send(text.clone()).is_err() {
                            debug!(user_id = %user, kind = message.kind(), "dropped message for closed connection");
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::time::Duration;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    use crate::game::game_match::MatchStatus;
    use crate::game_state::chess_types::Color;

    use crate::server::config::ServerConfig;
    use crate::session::identity::MemoryIdentityProvider;

    fn hub() -> Arc<Hub> {
        Hub::new(Services::new(
            ServerConfig::default(),
            Arc::new(MemoryIdentityProvider::new(600)),
        ))
    }

    fn join(hub: &Arc<Hub>, name: &str) -> (Identity, ConnectionId, UnboundedReceiver<String>) {
        let identity = hub
            .services()
            .identities
            .verify(name)
            .expect("test token should verify");
        let (tx, rx) = unbounded_channel();
        let connection = hub.connect(&identity, tx);
        (identity, connection, rx)
    }

    fn drain_types(rx: &mut UnboundedReceiver<String>) -> Vec<String> {
        let mut types = Vec::new();
        while let Ok(text) = rx.try_recv() {
            let value: Value = serde_json::from_str(&text).expect("hub sends JSON");
            types.push(value["type"].as_str().unwrap_or_default().to_owned());
        }
        types
    }

    #[tokio::test]
    async fn connecting_sends_the_leaderboard() {
        let hub = hub();
        let (_, _, mut rx) = join(&hub, "ann");
        assert_eq!(drain_types(&mut rx), vec!["leaderboard_update"]);
        assert_eq!(hub.connected_count(), 1);
    }

    #[tokio::test]
    async fn disconnect_mid_game_forfeits_to_the_opponent() {
        let hub = hub();
        let (ann, ann_conn, mut ann_rx) = join(&hub, "ann");
        let (ben, _, mut ben_rx) = join(&hub, "ben");
        hub.handle_text(&ann, r#"{"type":"join_game","timeControl":"rapid"}"#);
        hub.handle_text(&ben, r#"{"type":"join_game","timeControl":"rapid"}"#);
        drain_types(&mut ann_rx);
        let ben_seen = drain_types(&mut ben_rx);
        assert!(ben_seen.contains(&"game_start".to_owned()));

        hub.disconnect(&ann, ann_conn);
        let ben_seen = drain_types(&mut ben_rx);
        assert!(ben_seen.contains(&"game_end".to_owned()));
        assert!(ben_seen.contains(&"elo_update".to_owned()));
        assert!(!ben_seen.contains(&"player_disconnected".to_owned()));
        assert_eq!(hub.connected_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn bullet_flag_ends_the_match_once_and_stops_sync() {
        let hub = hub();
        let (ann, _, mut ann_rx) = join(&hub, "ann");
        let (ben, _, mut ben_rx) = join(&hub, "ben");
        assert!(hub
            .handle_text(&ann, r#"{"type":"join_game","timeControl":"bullet"}"#)
            .is_empty());
        let tasks = hub.handle_text(&ben, r#"{"type":"join_game","timeControl":"bullet"}"#);
        assert_eq!(tasks.len(), 1);
        drain_types(&mut ann_rx);
        drain_types(&mut ben_rx);

        for task in tasks {
            tokio::time::timeout(Duration::from_secs(120), task)
                .await
                .expect("sync task should stop after the flag falls")
                .expect("sync task should not panic");
        }

        for rx in [&mut ann_rx, &mut ben_rx] {
            let seen = drain_types(rx);
            assert_eq!(seen.iter().filter(|kind| *kind == "game_end").count(), 1);
            assert_eq!(seen.iter().filter(|kind| *kind == "elo_update").count(), 1);
            assert!(seen.iter().any(|kind| kind == "timer_update"));
        }

        let game = hub.services().registry.lock().match_of(&ann.id).expect("match still registered");
        let game = game.lock();
        assert_eq!(game.status(), MatchStatus::Timeout);
        assert_eq!(game.winner(), Some(Color::Black));
        let ben_profile = hub.services().identities.identity(&ben.id).expect("profile exists");
        assert_eq!(ben_profile.games_played, 1);
        assert_eq!(ben_profile.wins, 1);
    }

    #[tokio::test]
    async fn stale_connection_cannot_evict_a_newer_one() {
        let hub = hub();
        let (ann, first, _old_rx) = join(&hub, "ann");
        let (_, _second, mut new_rx) = join(&hub, "ann");
        hub.disconnect(&ann, first);
        assert_eq!(hub.connected_count(), 1);

        hub.handle_text(&ann, r#"{"type":"get_leaderboard"}"#);
        assert_eq!(drain_types(&mut new_rx), vec!["leaderboard_update", "leaderboard_update"]);
    }
}
