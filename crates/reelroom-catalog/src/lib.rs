//! Movie catalog sources for Reelroom.
//!
//! The room engine only needs one thing from a catalog: "give me up to `n`
//! movies for this genre". That contract is the [`MovieCatalog`] trait.
//! Catalogs can also look up a single movie with its trailer.
//!
//! - [`TmdbCatalog`]: The Movie Database discover API
//! - [`MockCatalog`]: deterministic offline data, also the fallback
//!   whenever TMDB is unconfigured or unavailable

mod mock;
mod tmdb;

pub use mock::MockCatalog;
pub use tmdb::{TmdbCatalog, TmdbConfig};

use std::future::Future;

use reelroom_protocol::{Movie, MovieId};

/// TMDB's movie genres, by display name.
pub const TMDB_GENRES: [&str; 19] = [
    "Action",
    "Adventure",
    "Animation",
    "Comedy",
    "Crime",
    "Documentary",
    "Drama",
    "Family",
    "Fantasy",
    "History",
    "Horror",
    "Music",
    "Mystery",
    "Romance",
    "Science Fiction",
    "TV Movie",
    "Thriller",
    "War",
    "Western",
];

/// A source of movies, queried per genre when a room starts.
///
/// Implementations must not fail the session: return fewer movies (or
/// none) instead of an error. The engine tolerates short lists.
pub trait MovieCatalog: Send + Sync + 'static {
    /// Returns up to `count` movies for `genre`, best first.
    fn fetch_by_genre(&self, genre: &str, count: usize)
    -> impl Future<Output = Vec<Movie>> + Send;

    /// Looks up one movie, with `trailer_url` filled in when the source
    /// knows one. `None` if the id is unknown.
    fn movie_details(&self, id: MovieId) -> impl Future<Output = Option<Movie>> + Send {
        let _ = id;
        std::future::ready(None)
    }
}

impl<T: MovieCatalog> MovieCatalog for std::sync::Arc<T> {
    fn fetch_by_genre(&self, genre: &str, count: usize) -> impl Future<Output = Vec<Movie>> + Send {
        (**self).fetch_by_genre(genre, count)
    }

    fn movie_details(&self, id: MovieId) -> impl Future<Output = Option<Movie>> + Send {
        (**self).movie_details(id)
    }
}
