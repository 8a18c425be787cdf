//! Session coordination: every player-facing room operation.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::join_all;
use rand::seq::SliceRandom;
use reelroom_catalog::{MockCatalog, MovieCatalog};
use reelroom_protocol::{Movie, MovieId, PlayerId, RoomCode, RoomId, RoomSnapshot, RoomStatus};

use crate::room::SwipeOutcome;
use crate::{GameConfig, RoomError, RoomRegistry, now_millis};

/// Result of [`SessionCoordinator::start`].
#[derive(Debug, Clone)]
pub struct StartOutcome {
    pub room: RoomSnapshot,
    /// `false` when the room had already started; nothing changed.
    pub started: bool,
}

/// Result of [`SessionCoordinator::leave`].
#[derive(Debug, Clone)]
pub enum LeaveOutcome {
    /// Room or player unknown.
    NotFound,
    /// The player left; others remain.
    Left { room: RoomSnapshot },
    /// The last player left and the room was removed.
    Destroyed { room_id: RoomId, code: RoomCode },
}

/// Runs room operations against a [`RoomRegistry`] and a movie catalog.
///
/// Each room is guarded by its own lock, so operations on different rooms
/// never wait on each other. The catalog is queried with no room lock held;
/// `start` re-validates the room before committing the fetched movies.
pub struct SessionCoordinator<C: MovieCatalog> {
    registry: Arc<RoomRegistry>,
    catalog: C,
    config: GameConfig,
}

impl<C: MovieCatalog> SessionCoordinator<C> {
    pub fn new(registry: Arc<RoomRegistry>, catalog: C, config: GameConfig) -> Self {
        Self {
            registry,
            catalog,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Creates a room with `host_name` as host. Returns the room and the
    /// host's player id.
    pub async fn create_room(&self, host_name: &str) -> Result<(RoomSnapshot, PlayerId), RoomError> {
        let handle = self.registry.create_room(host_name).await?;
        let room = handle.lock().await;
        let host_id = room
            .host()
            .map(|p| p.id)
            .ok_or_else(|| RoomError::InvalidState("room created without a host".into()))?;
        Ok((room.snapshot(), host_id))
    }

    /// Adds a player to a waiting room.
    pub async fn join(
        &self,
        code: &RoomCode,
        player_name: &str,
    ) -> Result<(RoomSnapshot, PlayerId), RoomError> {
        self.join_with(code, player_name, |_, _| std::future::ready(()))
            .await
    }

    /// Like [`join`](Self::join), but runs `on_admit` while the room is
    /// still locked.
    ///
    /// Anything `on_admit` does happens before any later operation on the
    /// room, e.g. a start that commits right after the join. The server uses
    /// it to subscribe the joining connection so no broadcast is missed.
    pub async fn join_with<F, Fut>(
        &self,
        code: &RoomCode,
        player_name: &str,
        on_admit: F,
    ) -> Result<(RoomSnapshot, PlayerId), RoomError>
    where
        F: FnOnce(RoomSnapshot, PlayerId) -> Fut,
        Fut: Future<Output = ()>,
    {
        let handle = self
            .registry
            .find_by_code(code)
            .await
            .ok_or_else(|| RoomError::not_found(code))?;

        let mut room = handle.lock().await;
        let player = reelroom_protocol::Player::new(self.registry.next_player_id(), player_name);
        let player_id = player.id;
        room.admit(player, self.config.max_players)?;

        tracing::info!(
            room_code = %code,
            %player_id,
            players = room.players().len(),
            "player joined"
        );
        let snapshot = room.snapshot();
        on_admit(snapshot.clone(), player_id).await;
        Ok((snapshot, player_id))
    }

    /// Replaces a player's genre picks while the room is waiting.
    ///
    /// Returns `None` for an unknown room or player. Picks made after the
    /// start are kept but don't change the movie list.
    pub async fn set_genres(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
        genres: Vec<String>,
    ) -> Option<RoomSnapshot> {
        let handle = self.registry.find_by_id(room_id).await?;
        let mut room = handle.lock().await;
        if !room.set_genres(player_id, genres) {
            return None;
        }
        tracing::debug!(%room_id, %player_id, genres = ?room.player(player_id).map(|p| &p.genres), "genres set");
        Some(room.snapshot())
    }

    /// Starts the game: fetches movies for the players' genres, freezes
    /// the list, and moves the room to playing.
    ///
    /// Idempotent: starting a playing room returns it with
    /// `started == false`. Concurrent starts of one room fetch once.
    pub async fn start(&self, room_id: RoomId) -> Result<StartOutcome, RoomError> {
        let handle = self
            .registry
            .find_by_id(room_id)
            .await
            .ok_or_else(|| RoomError::not_found(room_id))?;
        let _gate = handle.start_gate().await;

        let genres = {
            let room = handle.lock().await;
            room.ensure_open()?;
            match room.status() {
                RoomStatus::Waiting => {}
                RoomStatus::Playing => {
                    return Ok(StartOutcome {
                        room: room.snapshot(),
                        started: false,
                    });
                }
                RoomStatus::Finished => {
                    return Err(RoomError::InvalidState(
                        "cannot start a finished room".into(),
                    ));
                }
            }
            let union = room.genre_union();
            if union.is_empty() {
                self.config.default_genres.clone()
            } else {
                union
            }
        };

        let movies = self.fetch_movies(&genres).await;

        let mut room = handle.lock().await;
        if room.players().is_empty() {
            return Err(RoomError::not_found(room_id));
        }
        room.begin_playing(movies, now_millis())?;
        tracing::info!(
            %room_id,
            movies = room.movies().len(),
            players = room.players().len(),
            ?genres,
            "room started"
        );
        Ok(StartOutcome {
            room: room.snapshot(),
            started: true,
        })
    }

    /// Records one like/pass. See [`SwipeOutcome`] for the possible results.
    pub async fn record_swipe(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
        movie_id: MovieId,
        liked: bool,
    ) -> SwipeOutcome {
        let Some(handle) = self.registry.find_by_id(room_id).await else {
            return SwipeOutcome::Rejected;
        };
        let mut room = handle.lock().await;
        let outcome = room.record_swipe(
            player_id,
            movie_id,
            liked,
            now_millis(),
            self.config.top_picks_limit,
        );
        match &outcome {
            SwipeOutcome::Recorded(recorded) if recorded.room_finished => {
                tracing::info!(%room_id, "all players finished, room finished");
            }
            SwipeOutcome::Recorded(recorded) if recorded.player_finished => {
                tracing::debug!(%room_id, %player_id, "player finished swiping");
            }
            SwipeOutcome::Rejected => {
                tracing::debug!(%room_id, %player_id, %movie_id, "swipe rejected");
            }
            _ => {}
        }
        outcome
    }

    /// Removes a player. The last player out destroys the room and frees
    /// its code.
    pub async fn leave(&self, room_id: RoomId, player_id: PlayerId) -> LeaveOutcome {
        let Some(handle) = self.registry.find_by_id(room_id).await else {
            return LeaveOutcome::NotFound;
        };

        {
            let mut room = handle.lock().await;
            if room.is_closed() || room.remove_player(player_id).is_none() {
                return LeaveOutcome::NotFound;
            }
            tracing::info!(%room_id, %player_id, remaining = room.players().len(), "player left");
            if !room.players().is_empty() {
                return LeaveOutcome::Left {
                    room: room.snapshot(),
                };
            }
            room.close();
        }

        self.registry.remove(room_id).await;
        LeaveOutcome::Destroyed {
            room_id,
            code: handle.code().clone(),
        }
    }

    /// Fetches movies for all genres concurrently, then collapses
    /// duplicates, shuffles, and trims to `movies_per_game`.
    async fn fetch_movies(&self, genres: &[String]) -> Vec<Movie> {
        let per_genre = self.config.movies_per_game.div_ceil(genres.len().max(1));

        let batches = join_all(
            genres
                .iter()
                .map(|genre| self.catalog.fetch_by_genre(genre, per_genre)),
        )
        .await;
        let mut movies = distinct(batches.into_iter().flatten());

        if movies.is_empty() {
            tracing::warn!(?genres, "catalog returned no movies, using mock data");
            movies = distinct(
                genres
                    .iter()
                    .flat_map(|genre| MockCatalog.movies(genre, per_genre)),
            );
        }

        shuffled(movies, self.config.movies_per_game)
    }
}

/// Keeps the first movie seen for each id.
fn distinct(movies: impl IntoIterator<Item = Movie>) -> Vec<Movie> {
    let mut seen = HashSet::new();
    movies.into_iter().filter(|m| seen.insert(m.id)).collect()
}

fn shuffled(mut movies: Vec<Movie>, limit: usize) -> Vec<Movie> {
    movies.shuffle(&mut rand::rng());
    movies.truncate(limit);
    movies
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinator() -> SessionCoordinator<MockCatalog> {
        SessionCoordinator::new(
            Arc::new(RoomRegistry::default()),
            MockCatalog,
            GameConfig::default(),
        )
    }

    #[test]
    fn test_distinct_keeps_first() {
        let mut a = MockCatalog.movies("Action", 2);
        let mut dup = a[0].clone();
        dup.title = "Copy".into();
        a.push(dup);
        let out = distinct(a);
        assert_eq!(out.len(), 2);
        assert_ne!(out[0].title, "Copy");
    }

    #[tokio::test]
    async fn test_fetch_movies_trims_to_config() {
        let c = coordinator();
        let genres = vec!["Action".to_string(), "Comedy".to_string(), "Drama".to_string()];
        let movies = c.fetch_movies(&genres).await;
        assert_eq!(movies.len(), 20);
        let ids: HashSet<_> = movies.iter().map(|m| m.id).collect();
        assert_eq!(ids.len(), 20);
    }

    #[tokio::test]
    async fn test_start_uses_default_genres_without_picks() {
        let c = coordinator();
        let (room, _) = c.create_room("Ann").await.unwrap();
        let started = c.start(room.id).await.unwrap();
        assert!(started.started);

        let genres: HashSet<&str> = started
            .room
            .movies
            .iter()
            .flat_map(|m| m.genres.iter().map(String::as_str))
            .collect();
        assert!(genres.iter().all(|g| ["Action", "Comedy", "Drama"].contains(g)));
    }

    #[tokio::test]
    async fn test_join_with_runs_callback_under_room_lock() {
        let c = coordinator();
        let (room, _) = c.create_room("Ann").await.unwrap();
        let handle = c.registry().find_by_id(room.id).await.unwrap();

        let mut seen = None;
        let slot = &mut seen;
        let (joined, bo) = c
            .join_with(&room.room_code, "Bo", move |snapshot, player_id| {
                async move {
                    let locked = tokio::time::timeout(
                        std::time::Duration::from_millis(20),
                        handle.lock(),
                    )
                    .await
                    .is_err();
                    *slot = Some((snapshot.players.len(), player_id, locked));
                }
            })
            .await
            .unwrap();

        assert_eq!(seen, Some((2, bo, true)));
        assert_eq!(joined.players.len(), 2);
    }

    #[tokio::test]
    async fn test_join_with_skips_callback_on_error() {
        let c = coordinator();
        let mut called = false;
        let err = c
            .join_with(&RoomCode::new("ZZZZ"), "Bo", |_, _| {
                called = true;
                std::future::ready(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RoomError::RoomNotFound(_)));
        assert!(!called);
    }

    #[tokio::test]
    async fn test_set_genres_unknown_room() {
        let c = coordinator();
        assert!(c.set_genres(RoomId(404), PlayerId(1), vec![]).await.is_none());
    }

    #[tokio::test]
    async fn test_leave_unknown_player() {
        let c = coordinator();
        let (room, _) = c.create_room("Ann").await.unwrap();
        assert!(matches!(
            c.leave(room.id, PlayerId(999)).await,
            LeaveOutcome::NotFound
        ));
    }
}
