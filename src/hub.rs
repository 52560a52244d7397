//! Per-workflow event fan-out and presence tracking.
//!
//! The hub owns a registry mapping workflow ids to rooms. A room holds
//! the live subscriber handles and the set of connected user ids for
//! one workflow. Request handlers publish lifecycle events into a room;
//! each subscriber's SSE stream drains its own channel.
//!
//! Locking: the outer map is only touched to create or drop rooms; all
//! per-room mutation and delivery iteration happens under the room's own
//! mutex. Publishing to one workflow therefore never blocks another,
//! and a publish can never interleave with a subscribe or unsubscribe
//! on the same workflow. Senders are unbounded mpsc channels, so
//! delivery under the lock never blocks and per-subscriber FIFO order
//! follows from the channel.

use crate::events::WorkflowEvent;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Default interval between liveness pulses.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

/// One live connection to a workflow's event stream.
struct Subscriber {
    id: u64,
    user_id: Option<String>,
    tx: mpsc::UnboundedSender<WorkflowEvent>,
}

/// Subscribers and presence for a single workflow.
#[derive(Default)]
struct Room {
    subscribers: Vec<Subscriber>,
    connected_users: HashSet<String>,
}

impl Room {
    /// Deliver an event to every subscriber, evicting handles whose
    /// receiver is gone. Returns true when an eviction removed a user
    /// from the presence set.
    fn deliver(&mut self, workflow_id: &str, event: &WorkflowEvent) -> bool {
        let mut dropped_users: Vec<Option<String>> = Vec::new();
        self.subscribers.retain(|sub| {
            match sub.tx.send(event.clone()) {
                Ok(()) => true,
                Err(_) => {
                    // Receiver dropped mid-delivery; clean up, keep going.
                    warn!(
                        workflow_id,
                        subscriber = sub.id,
                        event = event.kind(),
                        "dropping disconnected subscriber"
                    );
                    dropped_users.push(sub.user_id.clone());
                    false
                }
            }
        });
        let mut presence_changed = false;
        for user in dropped_users.into_iter().flatten() {
            presence_changed |= self.connected_users.remove(&user);
        }
        presence_changed
    }

    fn presence_event(&self) -> WorkflowEvent {
        let mut user_ids: Vec<String> = self.connected_users.iter().cloned().collect();
        user_ids.sort();
        WorkflowEvent::ConnectedUsers { user_ids }
    }
}

/// Handle returned by [`BroadcastHub::subscribe`]. Dropping it promptly
/// removes the connection from the registry, so a transport abort
/// cleans up as soon as the stream is released.
pub struct Subscription {
    hub: Arc<BroadcastHub>,
    workflow_id: String,
    id: u64,
}

impl Subscription {
    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.unsubscribe(&self.workflow_id, self.id);
    }
}

/// Process-wide broadcast hub. One instance lives for the lifetime of
/// the server.
pub struct BroadcastHub {
    rooms: RwLock<HashMap<String, Arc<Mutex<Room>>>>,
    next_id: AtomicU64,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a connection for a workflow.
    ///
    /// The new handle immediately receives a `connected` acknowledgment,
    /// then every handle in the room (the new one included) receives the
    /// updated presence list.
    pub fn subscribe(
        self: &Arc<Self>,
        workflow_id: &str,
        user_id: Option<String>,
    ) -> (Subscription, mpsc::UnboundedReceiver<WorkflowEvent>) {
        let room = self.room_or_create(workflow_id);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();

        {
            let mut room = room.lock().unwrap();
            // Ack the new handle before it becomes visible to broadcasts
            // so `connected` is always its first event.
            let _ = tx.send(WorkflowEvent::Connected {
                workflow_id: workflow_id.to_string(),
            });
            if let Some(ref user) = user_id {
                room.connected_users.insert(user.clone());
            }
            room.subscribers.push(Subscriber { id, user_id, tx });
            let presence = room.presence_event();
            room.deliver(workflow_id, &presence);
        }

        debug!(workflow_id, subscriber = id, "subscriber registered");
        (
            Subscription {
                hub: Arc::clone(self),
                workflow_id: workflow_id.to_string(),
                id,
            },
            rx,
        )
    }

    /// Deliver an event to every live handle of the workflow. A missing
    /// room (no subscribers) is a no-op; failed handles are evicted and
    /// never surface an error to the publisher.
    pub fn publish(&self, workflow_id: &str, event: WorkflowEvent) {
        let Some(room) = self.room(workflow_id) else {
            return;
        };
        let emptied = {
            let mut room = room.lock().unwrap();
            let mut presence_changed = room.deliver(workflow_id, &event);
            // Evictions change presence; keep the survivors current.
            // Bounded: each round strictly shrinks the subscriber list.
            while presence_changed {
                let presence = room.presence_event();
                presence_changed = room.deliver(workflow_id, &presence);
            }
            room.subscribers.is_empty()
        };
        if emptied {
            self.drop_room_if_empty(workflow_id);
        }
    }

    /// Send a liveness pulse to every handle of every workflow. Pulse
    /// failures take the same eviction path as publish failures.
    pub fn pulse(&self) {
        let workflow_ids: Vec<String> = {
            let rooms = self.rooms.read().unwrap();
            rooms.keys().cloned().collect()
        };
        let timestamp = chrono::Utc::now().timestamp_millis();
        for workflow_id in workflow_ids {
            self.publish(&workflow_id, WorkflowEvent::Heartbeat { timestamp });
        }
    }

    /// Spawn the periodic heartbeat task. Runs until the returned handle
    /// is aborted (the hub lives for the process lifetime).
    pub fn start_heartbeat(
        self: &Arc<Self>,
        interval: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let hub = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; skip it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                hub.pulse();
            }
        })
    }

    /// User ids currently holding a live subscription to the workflow.
    pub fn connected_users(&self, workflow_id: &str) -> Vec<String> {
        match self.room(workflow_id) {
            Some(room) => {
                let room = room.lock().unwrap();
                let mut users: Vec<String> = room.connected_users.iter().cloned().collect();
                users.sort();
                users
            }
            None => Vec::new(),
        }
    }

    /// Number of live handles for the workflow.
    pub fn subscriber_count(&self, workflow_id: &str) -> usize {
        match self.room(workflow_id) {
            Some(room) => room.lock().unwrap().subscribers.len(),
            None => 0,
        }
    }

    fn unsubscribe(&self, workflow_id: &str, subscriber_id: u64) {
        let Some(room) = self.room(workflow_id) else {
            return;
        };
        let emptied = {
            let mut room = room.lock().unwrap();
            let Some(pos) = room.subscribers.iter().position(|s| s.id == subscriber_id) else {
                // Already evicted by a failed delivery.
                return;
            };
            let removed = room.subscribers.remove(pos);
            if let Some(user) = removed.user_id {
                room.connected_users.remove(&user);
            }
            if room.subscribers.is_empty() {
                true
            } else {
                let presence = room.presence_event();
                room.deliver(workflow_id, &presence);
                room.subscribers.is_empty()
            }
        };
        debug!(workflow_id, subscriber = subscriber_id, "subscriber removed");
        if emptied {
            self.drop_room_if_empty(workflow_id);
        }
    }

    fn room(&self, workflow_id: &str) -> Option<Arc<Mutex<Room>>> {
        let rooms = self.rooms.read().unwrap();
        rooms.get(workflow_id).cloned()
    }

    fn room_or_create(&self, workflow_id: &str) -> Arc<Mutex<Room>> {
        {
            let rooms = self.rooms.read().unwrap();
            if let Some(room) = rooms.get(workflow_id) {
                return Arc::clone(room);
            }
        }
        let mut rooms = self.rooms.write().unwrap();
        Arc::clone(rooms.entry(workflow_id.to_string()).or_default())
    }

    /// Discard the registry entry once its last handle is gone. Checked
    /// again under the write lock: a new subscriber may have arrived
    /// between releasing the room lock and acquiring the map lock.
    fn drop_room_if_empty(&self, workflow_id: &str) {
        let mut rooms = self.rooms.write().unwrap();
        let still_empty = rooms
            .get(workflow_id)
            .is_some_and(|room| room.lock().unwrap().subscribers.is_empty());
        if still_empty {
            rooms.remove(workflow_id);
        }
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}
