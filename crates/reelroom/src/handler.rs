//! Per-connection handler: handshake and message routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive Handshake → validate version → send HandshakeAck
//!   2. Spawn a writer task that drains the connection's outbox
//!   3. Loop: receive envelopes → dispatch to the session coordinator
//!
//! A connection is a member of at most one room. Whatever ends the loop,
//! the [`ConnectionGuard`] takes the player out of that room.

use std::sync::Arc;

use reelroom_catalog::MovieCatalog;
use reelroom_protocol::{
    ClientMessage, Codec, Envelope, MovieId, PlayerId, ProtocolError, RoomCode, RoomId,
    ServerMessage,
};
use reelroom_room::{LeaveOutcome, RoomError, SwipeOutcome};
use reelroom_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::sync::mpsc;

use crate::ReelroomError;
use crate::broadcast::{Outbox, Recipient};
use crate::server::{PROTOCOL_VERSION, ServerState};

/// The room and player a connection currently plays as.
#[derive(Debug, Clone, Copy)]
struct Membership {
    room_id: RoomId,
    player_id: PlayerId,
}

/// Whether the read loop keeps going after a message.
enum Flow {
    Continue,
    Close,
}

/// Owns a connection's outbox and room membership.
///
/// Dropping it leaves the room, so a closed socket, an error, an idle
/// timeout, or a panic all behave like `LeaveRoom`. `Drop` is synchronous,
/// so the leave runs in a spawned task.
struct ConnectionGuard<M: MovieCatalog, C: Codec> {
    conn_id: ConnectionId,
    outbox: Outbox,
    membership: Option<Membership>,
    state: Arc<ServerState<M, C>>,
}

impl<M: MovieCatalog, C: Codec> ConnectionGuard<M, C> {
    /// Queues a message for this connection only.
    fn reply(&self, message: ServerMessage) {
        // Only fails once the writer has stopped; the read loop ends soon after.
        let _ = self.outbox.send(message);
    }

    fn reply_error(&self, code: u16, message: impl Into<String>) {
        self.reply(ServerMessage::Error {
            code,
            message: message.into(),
        });
    }

    fn require_membership(&self) -> Option<Membership> {
        if self.membership.is_none() {
            self.reply_error(404, "not in a room");
        }
        self.membership
    }
}

impl<M: MovieCatalog, C: Codec> Drop for ConnectionGuard<M, C> {
    fn drop(&mut self) {
        let Some(membership) = self.membership.take() else {
            return;
        };
        let conn_id = self.conn_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            leave_room(&state, conn_id, membership).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<M, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<M, C>>,
) -> Result<(), ReelroomError>
where
    M: MovieCatalog,
    C: Codec,
{
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    perform_handshake(&conn, &state).await?;
    tracing::info!(%conn_id, "client connected");

    let (outbox, inbox) = mpsc::unbounded_channel();
    tokio::spawn(write_loop(Arc::clone(&conn), Arc::clone(&state), inbox));

    let mut guard = ConnectionGuard {
        conn_id,
        outbox,
        membership: None,
        state: Arc::clone(&state),
    };

    loop {
        let data = match tokio::time::timeout(state.config.idle_timeout, conn.recv()).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::info!(%conn_id, "connection closed cleanly");
                break;
            }
            Ok(Err(e)) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
            Err(_) => {
                tracing::info!(%conn_id, "connection timed out");
                break;
            }
        };

        let envelope: Envelope<ClientMessage> = match state.codec.decode(&data) {
            Ok(env) => env,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "failed to decode envelope");
                guard.reply_error(400, format!("invalid message: {e}"));
                continue;
            }
        };

        if let Flow::Close = dispatch(&mut guard, envelope).await {
            break;
        }
    }

    // guard drops here → leave fires, outbox closes, writer stops.
    Ok(())
}

/// Receives the handshake, validates the version, and acknowledges it.
async fn perform_handshake<M, C>(
    conn: &WebSocketConnection,
    state: &ServerState<M, C>,
) -> Result<(), ReelroomError>
where
    M: MovieCatalog,
    C: Codec,
{
    let data = match tokio::time::timeout(state.config.handshake_timeout, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage(
                "connection closed before handshake".into(),
            )
            .into());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            return Err(ProtocolError::InvalidMessage("handshake timed out".into()).into());
        }
    };

    let envelope: Envelope<ClientMessage> = state.codec.decode(&data)?;

    let version = match envelope.message {
        ClientMessage::Handshake { version } => version,
        _ => {
            send_direct(conn, state, 400, "expected Handshake").await?;
            return Err(
                ProtocolError::InvalidMessage("first message must be Handshake".into()).into(),
            );
        }
    };

    if version != PROTOCOL_VERSION {
        let message = format!("version mismatch: expected {PROTOCOL_VERSION}, got {version}");
        send_direct(conn, state, 400, &message).await?;
        return Err(ProtocolError::InvalidMessage("protocol version mismatch".into()).into());
    }

    let ack = Envelope::new(
        0,
        state.server_time(),
        ServerMessage::HandshakeAck {
            server_time: state.server_time(),
        },
    );
    conn.send(&state.codec.encode(&ack)?).await?;
    Ok(())
}

/// Sends an error before the writer task exists.
async fn send_direct<M, C>(
    conn: &WebSocketConnection,
    state: &ServerState<M, C>,
    code: u16,
    message: &str,
) -> Result<(), ReelroomError>
where
    M: MovieCatalog,
    C: Codec,
{
    let envelope = Envelope::new(
        0,
        state.server_time(),
        ServerMessage::Error {
            code,
            message: message.to_string(),
        },
    );
    conn.send(&state.codec.encode(&envelope)?).await?;
    Ok(())
}

/// Drains the outbox onto the socket, numbering envelopes from 1.
async fn write_loop<M, C>(
    conn: Arc<WebSocketConnection>,
    state: Arc<ServerState<M, C>>,
    mut inbox: mpsc::UnboundedReceiver<ServerMessage>,
) where
    M: MovieCatalog,
    C: Codec,
{
    let conn_id = conn.id();
    let mut seq: u64 = 1;

    while let Some(message) = inbox.recv().await {
        let envelope = Envelope::new(next_seq(&mut seq), state.server_time(), message);
        let bytes = match state.codec.encode(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(%conn_id, error = %e, "failed to encode outbound message");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(%conn_id, error = %e, "send failed, stopping writer");
            break;
        }
    }

    let _ = conn.close().await;
}

async fn dispatch<M, C>(
    guard: &mut ConnectionGuard<M, C>,
    envelope: Envelope<ClientMessage>,
) -> Flow
where
    M: MovieCatalog,
    C: Codec,
{
    let request_seq = envelope.seq;
    let state = Arc::clone(&guard.state);

    match envelope.message {
        ClientMessage::Heartbeat { client_time } => {
            guard.reply(ServerMessage::HeartbeatAck {
                client_time,
                server_time: state.server_time(),
            });
        }

        ClientMessage::CreateRoom { player_name } => {
            leave_current(guard).await;
            match state.coordinator.create_room(&player_name).await {
                Ok((room, player_id)) => {
                    enter_room(guard, room.id, player_id).await;
                    guard.reply(ServerMessage::RoomJoined { player_id, room });
                }
                Err(e) => reply_room_error(guard, &e),
            }
        }

        ClientMessage::JoinRoom {
            room_code,
            player_name,
        } => {
            leave_current(guard).await;
            let code = RoomCode::new(&room_code);
            let conn_id = guard.conn_id;
            let outbox = guard.outbox.clone();
            let broadcaster = &state.broadcaster;
            // Subscribe while the room is still locked so a start that
            // commits right after this join reaches the new player too.
            let joined = state
                .coordinator
                .join_with(&code, &player_name, move |room, player_id| async move {
                    let room_id = room.id;
                    let _ = outbox.send(ServerMessage::RoomJoined { player_id, room });
                    broadcaster.register(room_id, conn_id, outbox).await;
                })
                .await;
            match joined {
                Ok((room, player_id)) => {
                    guard.membership = Some(Membership {
                        room_id: room.id,
                        player_id,
                    });
                    if let Some(player) = room.player(player_id).cloned() {
                        broadcaster
                            .send(
                                room.id,
                                Recipient::RoomExcept(conn_id),
                                ServerMessage::PlayerJoined { player },
                            )
                            .await;
                    }
                }
                Err(e) => reply_room_error(guard, &e),
            }
        }

        ClientMessage::StartRoom => {
            let Some(member) = guard.require_membership() else {
                return Flow::Continue;
            };
            match state.coordinator.start(member.room_id).await {
                Ok(outcome) => {
                    guard.reply(ServerMessage::Ack {
                        request_seq,
                        success: true,
                    });
                    if outcome.started {
                        state
                            .broadcaster
                            .send(
                                member.room_id,
                                Recipient::Room,
                                ServerMessage::RoomStarted { room: outcome.room },
                            )
                            .await;
                    }
                }
                Err(e) => reply_room_error(guard, &e),
            }
        }

        ClientMessage::SetGenres { genres } => {
            let Some(member) = guard.require_membership() else {
                return Flow::Continue;
            };
            let updated = state
                .coordinator
                .set_genres(member.room_id, member.player_id, genres)
                .await;
            guard.reply(ServerMessage::Ack {
                request_seq,
                success: updated.is_some(),
            });
            if let Some(room) = updated {
                state
                    .broadcaster
                    .send(member.room_id, Recipient::Room, ServerMessage::RoomUpdated { room })
                    .await;
            }
        }

        ClientMessage::Swipe { movie_id, liked } => {
            let Some(member) = guard.require_membership() else {
                return Flow::Continue;
            };
            swipe(guard, member, movie_id, liked, request_seq).await;
        }

        ClientMessage::LeaveRoom => {
            let left = leave_current(guard).await;
            guard.reply(ServerMessage::Ack {
                request_seq,
                success: left,
            });
        }

        ClientMessage::ListGenres => {
            guard.reply(ServerMessage::Genres {
                genres: state.coordinator.config().available_genres.clone(),
            });
        }

        ClientMessage::MovieDetails { movie_id } => {
            match state.coordinator.catalog().movie_details(movie_id).await {
                Some(movie) => guard.reply(ServerMessage::MovieDetails { movie }),
                None => guard.reply_error(404, format!("movie {} not found", movie_id.0)),
            }
        }

        ClientMessage::Disconnect { reason } => {
            tracing::info!(conn_id = %guard.conn_id, %reason, "client disconnected");
            return Flow::Close;
        }

        ClientMessage::Handshake { .. } => {
            tracing::debug!(conn_id = %guard.conn_id, "ignoring repeated handshake");
        }
    }

    Flow::Continue
}

async fn swipe<M, C>(
    guard: &ConnectionGuard<M, C>,
    member: Membership,
    movie_id: MovieId,
    liked: bool,
    request_seq: u64,
) where
    M: MovieCatalog,
    C: Codec,
{
    let state = &guard.state;
    let outcome = state
        .coordinator
        .record_swipe(member.room_id, member.player_id, movie_id, liked)
        .await;

    guard.reply(ServerMessage::Ack {
        request_seq,
        success: outcome.success(),
    });

    let SwipeOutcome::Recorded(recorded) = outcome else {
        return;
    };
    let broadcaster = &state.broadcaster;
    let room_id = member.room_id;

    broadcaster
        .send(
            room_id,
            Recipient::Room,
            ServerMessage::PlayerSwiped {
                player_id: recorded.player_id,
                swipe: recorded.swipe,
            },
        )
        .await;
    if recorded.player_finished {
        broadcaster
            .send(
                room_id,
                Recipient::Room,
                ServerMessage::PlayerFinished {
                    player_id: recorded.player_id,
                },
            )
            .await;
    }
    if !recorded.room_finished {
        broadcaster
            .send(
                room_id,
                Recipient::Room,
                ServerMessage::RoomUpdated { room: recorded.room },
            )
            .await;
    } else {
        let top_picks = recorded.room.top_picks.clone().unwrap_or_default();
        tracing::info!(%room_id, picks = top_picks.len(), "game finished");
        broadcaster
            .send(
                room_id,
                Recipient::Room,
                ServerMessage::RoomFinished {
                    room: recorded.room,
                    top_picks,
                },
            )
            .await;
    }
}

/// Records a new membership and subscribes the connection to its room.
async fn enter_room<M, C>(guard: &mut ConnectionGuard<M, C>, room_id: RoomId, player_id: PlayerId)
where
    M: MovieCatalog,
    C: Codec,
{
    guard.membership = Some(Membership { room_id, player_id });
    guard
        .state
        .broadcaster
        .register(room_id, guard.conn_id, guard.outbox.clone())
        .await;
}

/// Leaves the connection's current room, if any. Returns `true` if the
/// player was removed.
async fn leave_current<M, C>(guard: &mut ConnectionGuard<M, C>) -> bool
where
    M: MovieCatalog,
    C: Codec,
{
    let Some(membership) = guard.membership.take() else {
        return false;
    };
    leave_room(&guard.state, guard.conn_id, membership).await
}

async fn leave_room<M, C>(
    state: &ServerState<M, C>,
    conn_id: ConnectionId,
    membership: Membership,
) -> bool
where
    M: MovieCatalog,
    C: Codec,
{
    let Membership { room_id, player_id } = membership;
    state.broadcaster.unregister(room_id, conn_id).await;

    match state.coordinator.leave(room_id, player_id).await {
        LeaveOutcome::Left { room } => {
            state
                .broadcaster
                .send(room_id, Recipient::Room, ServerMessage::PlayerLeft { player_id })
                .await;
            state
                .broadcaster
                .send(room_id, Recipient::Room, ServerMessage::RoomUpdated { room })
                .await;
            true
        }
        LeaveOutcome::Destroyed { code, .. } => {
            tracing::debug!(%conn_id, room_code = %code, "last player left");
            true
        }
        LeaveOutcome::NotFound => {
            tracing::debug!(%conn_id, %room_id, %player_id, "leave for unknown room or player");
            false
        }
    }
}

fn reply_room_error<M, C>(guard: &ConnectionGuard<M, C>, err: &RoomError)
where
    M: MovieCatalog,
    C: Codec,
{
    tracing::debug!(conn_id = %guard.conn_id, error = %err, "room operation failed");
    guard.reply_error(error_code(err), err.to_string());
}

/// Maps a room failure to the status code sent to the client.
fn error_code(err: &RoomError) -> u16 {
    match err {
        RoomError::RoomNotFound(_) | RoomError::PlayerNotFound(..) => 404,
        RoomError::RoomAlreadyStarted(_) | RoomError::RoomFull(_) | RoomError::InvalidState(_) => {
            409
        }
        RoomError::RegistryExhausted => 503,
    }
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(error_code(&RoomError::RoomNotFound("ABCD".into())), 404);
        assert_eq!(error_code(&RoomError::RoomFull(RoomCode::new("ABCD"))), 409);
        assert_eq!(
            error_code(&RoomError::RoomAlreadyStarted(RoomCode::new("ABCD"))),
            409
        );
        assert_eq!(error_code(&RoomError::InvalidState("done".into())), 409);
        assert_eq!(error_code(&RoomError::RegistryExhausted), 503);
    }

    #[test]
    fn test_next_seq_increments() {
        let mut seq = 1;
        assert_eq!(next_seq(&mut seq), 1);
        assert_eq!(next_seq(&mut seq), 2);
        assert_eq!(seq, 3);
    }
}
