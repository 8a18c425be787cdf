//! The room aggregate and the shared handle that guards it.

use std::sync::Arc;

use reelroom_protocol::{
    Movie, MovieId, Player, PlayerId, RoomCode, RoomId, RoomSnapshot, RoomStatus, Swipe,
    TopPick,
};
use tokio::sync::{Mutex, MutexGuard};

use crate::RoomError;
use crate::ranking::rank;

/// One room: its players, frozen movie list, and lifecycle state.
///
/// All mutation goes through `pub(crate)` methods called by the
/// [`SessionCoordinator`](crate::SessionCoordinator) while it holds the
/// room's lock, so every invariant is checked in one place:
///
/// - `movies` is empty while waiting and never changes once playing
/// - a player swipes each movie at most once
/// - `has_finished` implies one swipe per movie
/// - `top_picks` is set exactly when the status becomes `Finished`
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    code: RoomCode,
    players: Vec<Player>,
    movies: Vec<Movie>,
    status: RoomStatus,
    created_at: u64,
    started_at: Option<u64>,
    ended_at: Option<u64>,
    top_picks: Option<Vec<TopPick>>,
    /// Set when the room is removed from the registry. A closed room
    /// rejects everything as if it didn't exist.
    closed: bool,
}

/// What happened to a swipe.
#[derive(Debug, Clone)]
pub enum SwipeOutcome {
    /// Unknown room, player, or movie, or the room has no movies yet.
    Rejected,
    /// Accepted without effect: the player already finished or already
    /// swiped this movie.
    Ignored,
    Recorded(RecordedSwipe),
}

impl SwipeOutcome {
    /// The boolean result reported to the client.
    pub fn success(&self) -> bool {
        !matches!(self, Self::Rejected)
    }
}

/// A swipe that changed the room.
#[derive(Debug, Clone)]
pub struct RecordedSwipe {
    pub player_id: PlayerId,
    pub swipe: Swipe,
    /// This swipe was the player's last one.
    pub player_finished: bool,
    /// This swipe finished the whole room; `room.top_picks` is set.
    pub room_finished: bool,
    pub room: RoomSnapshot,
}

impl Room {
    pub(crate) fn new(id: RoomId, code: RoomCode, host: Player, now: u64) -> Self {
        Self {
            id,
            code,
            players: vec![host],
            movies: Vec::new(),
            status: RoomStatus::Waiting,
            created_at: now,
            started_at: None,
            ended_at: None,
            top_picks: None,
            closed: false,
        }
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn status(&self) -> RoomStatus {
        self.status
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn movies(&self) -> &[Movie] {
        &self.movies
    }

    pub fn top_picks(&self) -> Option<&[TopPick]> {
        self.top_picks.as_deref()
    }

    pub fn host(&self) -> Option<&Player> {
        self.players.first()
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Owned copy of the room for returning or broadcasting.
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            id: self.id,
            room_code: self.code.clone(),
            players: self.players.clone(),
            movies: self.movies.clone(),
            status: self.status,
            created_at: self.created_at,
            started_at: self.started_at,
            ended_at: self.ended_at,
            top_picks: self.top_picks.clone(),
        }
    }

    pub(crate) fn ensure_open(&self) -> Result<(), RoomError> {
        if self.closed {
            return Err(RoomError::not_found(self.code.as_str()));
        }
        Ok(())
    }

    /// Appends a player. Checks are ordered: closed, started, then full.
    pub(crate) fn admit(&mut self, player: Player, max_players: usize) -> Result<(), RoomError> {
        self.ensure_open()?;
        if !self.status.is_joinable() {
            return Err(RoomError::RoomAlreadyStarted(self.code.clone()));
        }
        if self.players.len() >= max_players {
            return Err(RoomError::RoomFull(self.code.clone()));
        }
        self.players.push(player);
        Ok(())
    }

    /// Replaces a player's genre picks, last write wins. Returns `false` only
    /// for an unknown player. After the start the picks are stored but the
    /// movie list stays as it is.
    pub(crate) fn set_genres(&mut self, player_id: PlayerId, genres: Vec<String>) -> bool {
        if self.closed {
            return false;
        }
        let Some(player) = self.players.iter_mut().find(|p| p.id == player_id) else {
            return false;
        };

        let mut picked: Vec<String> = Vec::with_capacity(genres.len());
        for genre in genres {
            let genre = genre.trim();
            if !genre.is_empty() && !picked.iter().any(|g| g == genre) {
                picked.push(genre.to_string());
            }
        }
        player.genres = picked;
        true
    }

    /// Every genre any player picked, first occurrence wins, in join order.
    pub(crate) fn genre_union(&self) -> Vec<String> {
        let mut union: Vec<String> = Vec::new();
        for genre in self.players.iter().flat_map(|p| &p.genres) {
            if !union.contains(genre) {
                union.push(genre.clone());
            }
        }
        union
    }

    /// Freezes the movie list and moves to `Playing`.
    pub(crate) fn begin_playing(&mut self, movies: Vec<Movie>, now: u64) -> Result<(), RoomError> {
        self.ensure_open()?;
        if !self.status.can_transition_to(RoomStatus::Playing) {
            return Err(RoomError::InvalidState(format!(
                "cannot start a room that is {}",
                self.status
            )));
        }
        if movies.is_empty() {
            return Err(RoomError::InvalidState("no movies available".into()));
        }
        self.movies = movies;
        self.status = RoomStatus::Playing;
        self.started_at = Some(now);
        Ok(())
    }

    /// Applies one swipe and, if it was the last one outstanding in the
    /// room, finishes the game.
    pub(crate) fn record_swipe(
        &mut self,
        player_id: PlayerId,
        movie_id: MovieId,
        liked: bool,
        now: u64,
        top_picks_limit: usize,
    ) -> SwipeOutcome {
        if self.closed || self.movies.is_empty() {
            return SwipeOutcome::Rejected;
        }
        let total = self.movies.len();
        if !self.movies.iter().any(|m| m.id == movie_id) {
            return SwipeOutcome::Rejected;
        }
        let Some(player) = self.players.iter_mut().find(|p| p.id == player_id) else {
            return SwipeOutcome::Rejected;
        };
        if player.has_finished || player.swipe_for(movie_id).is_some() {
            return SwipeOutcome::Ignored;
        }

        let swipe = Swipe {
            movie_id,
            liked,
            timestamp: now,
        };
        player.swipes.push(swipe);
        let player_finished = player.swipes.len() >= total;
        if player_finished {
            player.has_finished = true;
        }

        let room_finished = player_finished
            && self.status == RoomStatus::Playing
            && self.players.iter().all(|p| p.has_finished);
        if room_finished {
            self.finish(now, top_picks_limit);
        }

        SwipeOutcome::Recorded(RecordedSwipe {
            player_id,
            swipe,
            player_finished,
            room_finished,
            room: self.snapshot(),
        })
    }

    fn finish(&mut self, now: u64, top_picks_limit: usize) {
        self.top_picks = Some(rank(&self.players, &self.movies, top_picks_limit));
        self.status = RoomStatus::Finished;
        self.ended_at = Some(now);
    }

    /// Removes a player, keeping the join order of everyone else.
    pub(crate) fn remove_player(&mut self, player_id: PlayerId) -> Option<Player> {
        let index = self.players.iter().position(|p| p.id == player_id)?;
        Some(self.players.remove(index))
    }

    pub(crate) fn close(&mut self) {
        self.closed = true;
    }
}

// ---------------------------------------------------------------------------
// RoomHandle
// ---------------------------------------------------------------------------

struct RoomCell {
    room: Mutex<Room>,
    /// Serializes `start` per room so the catalog is queried once.
    start_gate: Mutex<()>,
}

/// A cheap, cloneable reference to a room held by the registry.
///
/// Holding a handle does not keep a room alive in the registry: once it is
/// removed the room is closed and every operation through a stale handle
/// reports it as not found.
#[derive(Clone)]
pub struct RoomHandle {
    id: RoomId,
    code: RoomCode,
    cell: Arc<RoomCell>,
}

impl RoomHandle {
    pub(crate) fn new(room: Room) -> Self {
        Self {
            id: room.id,
            code: room.code.clone(),
            cell: Arc::new(RoomCell {
                room: Mutex::new(room),
                start_gate: Mutex::new(()),
            }),
        }
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    /// Locks the room. Do not hold the guard across a catalog call.
    pub async fn lock(&self) -> MutexGuard<'_, Room> {
        self.cell.room.lock().await
    }

    pub async fn snapshot(&self) -> RoomSnapshot {
        self.lock().await.snapshot()
    }

    pub(crate) async fn start_gate(&self) -> MutexGuard<'_, ()> {
        self.cell.start_gate.lock().await
    }
}

impl std::fmt::Debug for RoomHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomHandle")
            .field("id", &self.id)
            .field("code", &self.code)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie(id: u64) -> Movie {
        Movie {
            id: MovieId(id),
            title: format!("Movie {id}"),
            overview: String::new(),
            poster_path: String::new(),
            backdrop_path: String::new(),
            release_date: String::new(),
            vote_average: 0.0,
            genres: Vec::new(),
            trailer_url: None,
        }
    }

    fn room_with(names: &[&str]) -> Room {
        let mut players = names
            .iter()
            .enumerate()
            .map(|(i, name)| Player::new(PlayerId(i as u64 + 1), *name));
        let host = players.next().unwrap();
        let mut room = Room::new(RoomId(1), RoomCode::new("ABCD"), host, 1_000);
        for player in players {
            room.admit(player, 8).unwrap();
        }
        room
    }

    #[test]
    fn test_new_room_is_waiting_with_host() {
        let room = room_with(&["Ann"]);
        assert_eq!(room.status(), RoomStatus::Waiting);
        assert_eq!(room.host().unwrap().name, "Ann");
        assert!(room.movies().is_empty());
        assert!(room.top_picks().is_none());
    }

    #[test]
    fn test_admit_rejects_full_room() {
        let mut room = room_with(&["Ann", "Bo"]);
        let err = room.admit(Player::new(PlayerId(3), "Cy"), 2).unwrap_err();
        assert!(matches!(err, RoomError::RoomFull(_)));
        assert_eq!(room.players().len(), 2);
    }

    #[test]
    fn test_admit_rejects_started_room_before_full() {
        let mut room = room_with(&["Ann"]);
        room.begin_playing(vec![movie(1)], 2_000).unwrap();
        let err = room.admit(Player::new(PlayerId(2), "Bo"), 1).unwrap_err();
        assert!(matches!(err, RoomError::RoomAlreadyStarted(_)));
    }

    #[test]
    fn test_set_genres_dedups_and_keeps_order() {
        let mut room = room_with(&["Ann"]);
        let genres = vec!["Horror".into(), " Comedy ".into(), "Horror".into(), "".into()];
        assert!(room.set_genres(PlayerId(1), genres));
        assert_eq!(room.player(PlayerId(1)).unwrap().genres, vec!["Horror", "Comedy"]);
    }

    #[test]
    fn test_set_genres_after_start_keeps_movies() {
        let mut room = room_with(&["Ann"]);
        assert!(!room.set_genres(PlayerId(99), vec!["Action".into()]));
        room.begin_playing(vec![movie(1)], 2_000).unwrap();

        assert!(room.set_genres(PlayerId(1), vec!["Horror".into()]));
        assert_eq!(room.player(PlayerId(1)).unwrap().genres, vec!["Horror"]);
        assert_eq!(room.movies().len(), 1);
        assert_eq!(room.movies()[0].id, MovieId(1));
        assert_eq!(room.status(), RoomStatus::Playing);
    }

    #[test]
    fn test_genre_union_first_occurrence_wins() {
        let mut room = room_with(&["Ann", "Bo"]);
        room.set_genres(PlayerId(1), vec!["Drama".into(), "Action".into()]);
        room.set_genres(PlayerId(2), vec!["Action".into(), "Horror".into()]);
        assert_eq!(room.genre_union(), vec!["Drama", "Action", "Horror"]);
    }

    #[test]
    fn test_begin_playing_twice_is_invalid() {
        let mut room = room_with(&["Ann"]);
        room.begin_playing(vec![movie(1)], 2_000).unwrap();
        let err = room.begin_playing(vec![movie(2)], 3_000).unwrap_err();
        assert!(matches!(err, RoomError::InvalidState(_)));
        assert_eq!(room.movies()[0].id, MovieId(1));
        assert_eq!(room.snapshot().started_at, Some(2_000));
    }

    #[test]
    fn test_swipe_rejected_before_start() {
        let mut room = room_with(&["Ann"]);
        let outcome = room.record_swipe(PlayerId(1), MovieId(1), true, 2_000, 10);
        assert!(!outcome.success());
    }

    #[test]
    fn test_swipe_on_unknown_movie_or_player_rejected() {
        let mut room = room_with(&["Ann"]);
        room.begin_playing(vec![movie(1), movie(2)], 2_000).unwrap();
        assert!(matches!(
            room.record_swipe(PlayerId(1), MovieId(3), true, 3_000, 10),
            SwipeOutcome::Rejected
        ));
        assert!(matches!(
            room.record_swipe(PlayerId(7), MovieId(1), true, 3_000, 10),
            SwipeOutcome::Rejected
        ));
    }

    #[test]
    fn test_duplicate_swipe_ignored() {
        let mut room = room_with(&["Ann"]);
        room.begin_playing(vec![movie(1), movie(2)], 2_000).unwrap();
        assert!(matches!(
            room.record_swipe(PlayerId(1), MovieId(1), true, 3_000, 10),
            SwipeOutcome::Recorded(_)
        ));
        let again = room.record_swipe(PlayerId(1), MovieId(1), false, 3_001, 10);
        assert!(matches!(again, SwipeOutcome::Ignored));
        assert!(again.success());
        let ann = room.player(PlayerId(1)).unwrap();
        assert_eq!(ann.swipes.len(), 1);
        assert!(ann.swipes[0].liked);
    }

    #[test]
    fn test_last_swipe_finishes_room() {
        let mut room = room_with(&["Ann"]);
        room.begin_playing(vec![movie(1), movie(2)], 2_000).unwrap();
        room.record_swipe(PlayerId(1), MovieId(2), true, 3_000, 10);
        let SwipeOutcome::Recorded(last) = room.record_swipe(PlayerId(1), MovieId(1), false, 4_000, 10)
        else {
            panic!("expected recorded swipe");
        };
        assert!(last.player_finished);
        assert!(last.room_finished);
        assert_eq!(last.room.status, RoomStatus::Finished);
        assert_eq!(last.room.ended_at, Some(4_000));
        let picks = last.room.top_picks.unwrap();
        assert_eq!(picks.len(), 1);
        assert_eq!(picks[0].movie.id, MovieId(2));
    }

    #[test]
    fn test_closed_room_rejects_everything() {
        let mut room = room_with(&["Ann"]);
        room.close();
        assert!(room.is_closed());
        assert!(matches!(
            room.admit(Player::new(PlayerId(2), "Bo"), 8),
            Err(RoomError::RoomNotFound(_))
        ));
        assert!(!room.set_genres(PlayerId(1), vec!["Action".into()]));
        assert!(room.begin_playing(vec![movie(1)], 2_000).is_err());
    }

    #[test]
    fn test_remove_player_keeps_order() {
        let mut room = room_with(&["Ann", "Bo", "Cy"]);
        let removed = room.remove_player(PlayerId(1)).unwrap();
        assert_eq!(removed.name, "Ann");
        let names: Vec<_> = room.players().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Bo", "Cy"]);
        assert_eq!(room.host().unwrap().name, "Bo");
        assert!(room.remove_player(PlayerId(1)).is_none());
    }
}
