//! Wire messages exchanged between clients and the server.
//!
//! Both directions use internally tagged JSON:
//!
//! ```text
//! { "seq": 4, "timestamp": 1200, "message": { "type": "Swipe", "movie_id": 550, "liked": true } }
//! ```

use serde::{Deserialize, Serialize};

use crate::{Movie, Player, PlayerId, RoomSnapshot, Swipe, TopPick};

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The top-level wrapper every frame carries.
///
/// `seq` is maintained independently by each side. Replies that answer a
/// specific request ([`ServerMessage::Ack`]) echo the request's `seq`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<M> {
    /// Auto-incrementing per-connection sequence number.
    pub seq: u64,
    /// Milliseconds since the sender's connection started.
    pub timestamp: u64,
    pub message: M,
}

impl<M> Envelope<M> {
    pub fn new(seq: u64, timestamp: u64, message: M) -> Self {
        Self {
            seq,
            timestamp,
            message,
        }
    }
}

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// Requests a client can send.
///
/// Room-scoped requests (`StartRoom`, `SetGenres`, `Swipe`, `LeaveRoom`)
/// carry no room or player id: the server resolves them from the room the
/// connection created or joined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    // -- Connection lifecycle --
    /// Must be the first message on a connection.
    Handshake { version: u32 },

    /// Keep-alive. Answered with [`ServerMessage::HeartbeatAck`].
    Heartbeat { client_time: u64 },

    /// The client is going away; the server closes the connection.
    Disconnect { reason: String },

    // -- Rooms --
    CreateRoom { player_name: String },

    JoinRoom {
        room_code: String,
        player_name: String,
    },

    StartRoom,

    SetGenres { genres: Vec<String> },

    Swipe { movie_id: crate::MovieId, liked: bool },

    LeaveRoom,

    /// Asks for the list of genres players may choose from.
    ListGenres,

    /// Asks for one movie's full record, including its trailer. Needs no
    /// room.
    MovieDetails { movie_id: crate::MovieId },
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// Replies and notifications the server sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    // -- Connection lifecycle --
    HandshakeAck { server_time: u64 },

    HeartbeatAck { client_time: u64, server_time: u64 },

    // -- Direct replies --
    /// Sent to the creator/joiner only: who they are and where they are.
    RoomJoined {
        player_id: PlayerId,
        room: RoomSnapshot,
    },

    /// Boolean outcome of `StartRoom`, `SetGenres` or `Swipe`.
    Ack { request_seq: u64, success: bool },

    Genres { genres: Vec<String> },

    /// Answer to [`ClientMessage::MovieDetails`]. Unknown ids get a 404
    /// `Error` instead.
    MovieDetails { movie: Movie },

    /// `code` follows HTTP conventions (404 not found, 409 conflict, ...).
    Error { code: u16, message: String },

    // -- Room broadcasts --
    /// Sent to everyone already in the room when someone joins.
    PlayerJoined { player: Player },

    RoomUpdated { room: RoomSnapshot },

    RoomStarted { room: RoomSnapshot },

    RoomFinished {
        room: RoomSnapshot,
        top_picks: Vec<TopPick>,
    },

    PlayerLeft { player_id: PlayerId },

    PlayerSwiped { player_id: PlayerId, swipe: Swipe },

    PlayerFinished { player_id: PlayerId },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MovieId, RoomCode, RoomId, RoomStatus};

    fn snapshot() -> RoomSnapshot {
        RoomSnapshot {
            id: RoomId(1),
            room_code: RoomCode::new("QWER"),
            players: vec![Player::new(PlayerId(1), "Ann")],
            movies: vec![],
            status: RoomStatus::Waiting,
            created_at: 100,
            started_at: None,
            ended_at: None,
            top_picks: None,
        }
    }

    #[test]
    fn test_client_message_join_room_json_format() {
        let msg = ClientMessage::JoinRoom {
            room_code: "ABCD".into(),
            player_name: "Bo".into(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "JoinRoom");
        assert_eq!(json["room_code"], "ABCD");
        assert_eq!(json["player_name"], "Bo");
    }

    #[test]
    fn test_client_message_unit_variant_json_format() {
        let json = serde_json::to_value(&ClientMessage::StartRoom).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "StartRoom" }));
    }

    #[test]
    fn test_client_message_swipe_from_json() {
        let raw = r#"{"type": "Swipe", "movie_id": 550, "liked": true}"#;
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Swipe {
                movie_id: MovieId(550),
                liked: true,
            }
        );
    }

    #[test]
    fn test_unknown_client_message_type_is_rejected() {
        let raw = r#"{"type": "FlyToMoon", "speed": 9000}"#;
        assert!(serde_json::from_str::<ClientMessage>(raw).is_err());
    }

    #[test]
    fn test_server_message_room_joined_json_format() {
        let msg = ServerMessage::RoomJoined {
            player_id: PlayerId(1),
            room: snapshot(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "RoomJoined");
        assert_eq!(json["player_id"], 1);
        assert_eq!(json["room"]["room_code"], "QWER");
        assert_eq!(json["room"]["status"], "waiting");
        assert!(json["room"]["top_picks"].is_null());
    }

    #[test]
    fn test_server_message_player_swiped_json_format() {
        let msg = ServerMessage::PlayerSwiped {
            player_id: PlayerId(2),
            swipe: Swipe {
                movie_id: MovieId(11),
                liked: false,
                timestamp: 99,
            },
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "PlayerSwiped");
        assert_eq!(json["swipe"]["movie_id"], 11);
        assert_eq!(json["swipe"]["liked"], false);
    }

    #[test]
    fn test_server_message_error_json_format() {
        let msg = ServerMessage::Error {
            code: 404,
            message: "room ZZZZ not found".into(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "Error");
        assert_eq!(json["code"], 404);
    }

    #[test]
    fn test_envelope_requires_message() {
        let raw = r#"{"seq": 1, "timestamp": 0}"#;
        assert!(serde_json::from_str::<Envelope<ClientMessage>>(raw).is_err());
    }

    #[test]
    fn test_movie_details_request_and_reply_json_format() {
        let raw = r#"{"type": "MovieDetails", "movie_id": 550}"#;
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg, ClientMessage::MovieDetails {
            movie_id: MovieId(550),
        });

        let movie = Movie {
            id: MovieId(550),
            title: "Fight Club".into(),
            overview: String::new(),
            poster_path: String::new(),
            backdrop_path: String::new(),
            release_date: "1999-10-15".into(),
            vote_average: 8.4,
            genres: vec!["Drama".into()],
            trailer_url: Some("https://www.youtube.com/watch?v=qtRKdVHc-cE".into()),
        };
        let json = serde_json::to_value(ServerMessage::MovieDetails { movie }).unwrap();
        assert_eq!(json["type"], "MovieDetails");
        assert_eq!(json["movie"]["id"], 550);
        assert_eq!(
            json["movie"]["trailer_url"],
            "https://www.youtube.com/watch?v=qtRKdVHc-cE"
        );
    }
}
