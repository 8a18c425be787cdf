//! Fan-out of server messages to every connection in a room.

use std::collections::{BTreeMap, HashMap};

use reelroom_protocol::{RoomId, RoomStatus, ServerMessage};
use reelroom_transport::ConnectionId;
use tokio::sync::{Mutex, mpsc};

/// Queue feeding one connection's writer task.
pub(crate) type Outbox = mpsc::UnboundedSender<ServerMessage>;

/// Which members of a room receive a broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Recipient {
    /// Every connection in the room.
    Room,
    /// Every connection except this one, usually the requester.
    RoomExcept(ConnectionId),
}

/// Connections grouped by the room they are a member of.
///
/// Keyed by [`RoomId`] rather than code: codes are reused once a room is
/// destroyed, ids never are.
#[derive(Default)]
pub(crate) struct RoomBroadcaster {
    rooms: Mutex<HashMap<RoomId, RoomMembers>>,
}

#[derive(Default)]
struct RoomMembers {
    conns: BTreeMap<ConnectionId, Outbox>,
    /// `RoomFinished` went out. Snapshots taken earlier are dropped.
    finished: bool,
}

impl RoomMembers {
    /// Snapshots are built under the room lock but sent after it, so a
    /// swipe that lost the race can arrive with a pre-finish snapshot.
    fn is_stale(&self, message: &ServerMessage) -> bool {
        match message {
            ServerMessage::RoomUpdated { room } => {
                self.finished && room.status != RoomStatus::Finished
            }
            _ => false,
        }
    }
}

impl RoomBroadcaster {
    pub(crate) async fn register(&self, room_id: RoomId, conn_id: ConnectionId, outbox: Outbox) {
        self.rooms
            .lock()
            .await
            .entry(room_id)
            .or_default()
            .conns
            .insert(conn_id, outbox);
    }

    pub(crate) async fn unregister(&self, room_id: RoomId, conn_id: ConnectionId) {
        let mut rooms = self.rooms.lock().await;
        if let Some(members) = rooms.get_mut(&room_id) {
            members.conns.remove(&conn_id);
            if members.conns.is_empty() {
                rooms.remove(&room_id);
            }
        }
    }

    /// Queues `message` for the selected members. Connections whose writer
    /// already stopped are skipped; their handler cleans them up.
    pub(crate) async fn send(&self, room_id: RoomId, to: Recipient, message: ServerMessage) {
        let mut rooms = self.rooms.lock().await;
        let Some(members) = rooms.get_mut(&room_id) else {
            return;
        };
        if members.is_stale(&message) {
            tracing::debug!(%room_id, "dropping snapshot older than the final one");
            return;
        }
        if matches!(message, ServerMessage::RoomFinished { .. }) {
            members.finished = true;
        }
        for (conn_id, outbox) in &members.conns {
            if to == Recipient::RoomExcept(*conn_id) {
                continue;
            }
            if outbox.send(message.clone()).is_err() {
                tracing::debug!(%conn_id, %room_id, "dropping message for closed connection");
            }
        }
    }

    #[cfg(test)]
    pub(crate) async fn member_count(&self, room_id: RoomId) -> usize {
        self.rooms
            .lock()
            .await
            .get(&room_id)
            .map_or(0, |members| members.conns.len())
    }
}
