//! Core data types shared by the engine and its clients.
//!
//! Every type here travels on the wire: a room snapshot is what each client
//! renders, so field names are part of the protocol contract.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a player.
///
/// Allocated when a player is admitted to a room and only meaningful for
/// the lifetime of the connection that owns it. Serialized as a plain
/// number (`#[serde(transparent)]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// The internal identifier of a room. Clients join by [`RoomCode`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

/// A catalog movie id (TMDB ids are plain integers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovieId(pub u64);

impl fmt::Display for MovieId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M-{}", self.0)
    }
}

/// The short human-shareable code players type to join a room.
///
/// Codes are stored upper case; [`RoomCode::new`] normalizes whatever the
/// player typed so `abcd` and ` ABCD ` find the same room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Number of characters in a room code.
    pub const LEN: usize = 4;

    /// Creates a code from user input, trimming whitespace and upper-casing.
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_ascii_uppercase())
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Movies
// ---------------------------------------------------------------------------

/// A movie record as provided by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: MovieId,
    pub title: String,
    pub overview: String,
    /// Poster image URL; empty when the catalog has none.
    pub poster_path: String,
    #[serde(default)]
    pub backdrop_path: String,
    #[serde(default)]
    pub release_date: String,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub genres: Vec<String>,
    /// YouTube trailer link. Only detail lookups fill it in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trailer_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

/// One like/pass decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Swipe {
    pub movie_id: MovieId,
    pub liked: bool,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

/// A player inside a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    /// Display name. Not required to be unique within a room.
    pub name: String,
    pub genres: Vec<String>,
    /// Append-only, in the order the player swiped.
    pub swipes: Vec<Swipe>,
    pub has_finished: bool,
}

impl Player {
    /// A freshly admitted player: no genres, no swipes.
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            genres: Vec::new(),
            swipes: Vec::new(),
            has_finished: false,
        }
    }

    /// Returns the player's swipe for `movie_id`, if any.
    pub fn swipe_for(&self, movie_id: MovieId) -> Option<&Swipe> {
        self.swipes.iter().find(|s| s.movie_id == movie_id)
    }
}

// ---------------------------------------------------------------------------
// RoomStatus
// ---------------------------------------------------------------------------

/// The lifecycle state of a room.
///
/// Transitions are strictly ordered and never go backwards:
///
/// ```text
/// Waiting → Playing → Finished
/// ```
///
/// - **Waiting**: accepting joins and genre picks; no movies yet.
/// - **Playing**: movies assigned and frozen; players are swiping.
/// - **Finished**: every player swiped every movie; top picks are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Playing,
    Finished,
}

impl RoomStatus {
    /// Returns `true` if the room is accepting new players.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Waiting)
    }

    /// Returns the only state this one may move to, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Waiting => Some(Self::Playing),
            Self::Playing => Some(Self::Finished),
            Self::Finished => None,
        }
    }

    /// Returns `true` if transitioning to `target` is valid.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target)
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Playing => write!(f, "playing"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

// ---------------------------------------------------------------------------
// Results and snapshots
// ---------------------------------------------------------------------------

/// A movie in the final ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopPick {
    pub movie: Movie,
    /// Number of players who liked the movie.
    pub score: usize,
    /// Names of the players who liked it, in aggregation order.
    pub players: Vec<String>,
}

/// A full, owned copy of a room's state at one point in time.
///
/// Snapshots are what operations return and what gets broadcast; they are
/// taken while the room is locked and sent after the lock is released.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub id: RoomId,
    pub room_code: RoomCode,
    /// Join order; index 0 is the host.
    pub players: Vec<Player>,
    pub movies: Vec<Movie>,
    pub status: RoomStatus,
    pub created_at: u64,
    pub started_at: Option<u64>,
    pub ended_at: Option<u64>,
    pub top_picks: Option<Vec<TopPick>>,
}

impl RoomSnapshot {
    /// The player at index 0, by convention the room's creator.
    pub fn host(&self) -> Option<&Player> {
        self.players.first()
    }

    /// Looks up a player by id.
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }
}
