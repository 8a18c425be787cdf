//! Offline movie source.

use reelroom_protocol::{Movie, MovieId};

use crate::{MovieCatalog, TMDB_GENRES};

const PLACEHOLDER_POSTER: &str =
    "https://via.placeholder.com/500x750/666666/FFFFFF?text=Mock+Movie";
const PLACEHOLDER_BACKDROP: &str =
    "https://via.placeholder.com/1920x1080/666666/FFFFFF?text=Mock+Backdrop";

/// (title, overview, poster, release date, rating)
const CLASSICS: [(&str, &str, &str, &str, f64); 3] = [
    (
        "The Shawshank Redemption",
        "Two imprisoned men bond over a number of years, finding solace and eventual redemption through acts of common decency.",
        "https://image.tmdb.org/t/p/w500/q6y0Go1tsGEsmtFryDOJo3dEmqu.jpg",
        "1994-09-22",
        9.3,
    ),
    (
        "The Godfather",
        "The aging patriarch of an organized crime dynasty transfers control of his clandestine empire to his reluctant son.",
        "https://image.tmdb.org/t/p/w500/3bhkrj58Vtu7enYsRolD1fZdja1.jpg",
        "1972-03-14",
        9.2,
    ),
    (
        "The Dark Knight",
        "When the menace known as the Joker wreaks havoc and chaos on the people of Gotham, Batman must accept one of the greatest psychological and physical tests of his ability to fight injustice.",
        "https://image.tmdb.org/t/p/w500/qJ2tW6WMUDux911r6m7haRef0WH.jpg",
        "2008-07-18",
        9.0,
    ),
];

/// Movies per genre before ids could collide with the next genre's block.
const GENRE_BLOCK: u64 = 1000;

/// Deterministic movie data that needs no network.
///
/// Every genre gets its own id block, so movies fetched for different
/// genres never share an id. The same `(genre, count)` always yields the
/// same list.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockCatalog;

impl MockCatalog {
    /// Synchronous form of [`MovieCatalog::fetch_by_genre`].
    pub fn movies(&self, genre: &str, count: usize) -> Vec<Movie> {
        (0..count.min(GENRE_BLOCK as usize - 1))
            .map(|i| mock_movie(genre, i))
            .collect()
    }

    /// Synchronous form of [`MovieCatalog::movie_details`].
    ///
    /// Finds ids handed out for any of [`TMDB_GENRES`]; mock movies carry
    /// no trailer.
    pub fn details(&self, id: MovieId) -> Option<Movie> {
        TMDB_GENRES.iter().find_map(|genre| {
            let offset = id.0.checked_sub(genre_block(genre))?;
            (1..GENRE_BLOCK)
                .contains(&offset)
                .then(|| mock_movie(genre, offset as usize - 1))
        })
    }
}

impl MovieCatalog for MockCatalog {
    async fn fetch_by_genre(&self, genre: &str, count: usize) -> Vec<Movie> {
        self.movies(genre, count)
    }

    async fn movie_details(&self, id: MovieId) -> Option<Movie> {
        self.details(id)
    }
}

/// The `index`-th movie of `genre`'s block.
fn mock_movie(genre: &str, index: usize) -> Movie {
    let id = MovieId(genre_block(genre) + index as u64 + 1);
    match CLASSICS.get(index) {
        Some((title, overview, poster, released, rating)) => Movie {
            id,
            title: (*title).to_string(),
            overview: (*overview).to_string(),
            poster_path: (*poster).to_string(),
            backdrop_path: PLACEHOLDER_BACKDROP.to_string(),
            release_date: (*released).to_string(),
            vote_average: *rating,
            genres: vec![genre.to_string()],
            trailer_url: None,
        },
        None => Movie {
            id,
            title: format!("Mock Movie {}", index + 1),
            overview: format!("This is a mock movie for testing purposes. Genre: {genre}"),
            poster_path: PLACEHOLDER_POSTER.to_string(),
            backdrop_path: PLACEHOLDER_BACKDROP.to_string(),
            release_date: "2023-01-01".to_string(),
            vote_average: 5.0 + (index % 5) as f64,
            genres: vec![genre.to_string()],
            trailer_url: None,
        },
    }
}

/// Stable per-genre id offset (FNV-1a over the lower-cased name).
fn genre_block(genre: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in genre.to_ascii_lowercase().bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    (hash % 1_000_000 + 1) * GENRE_BLOCK
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_mock_returns_requested_count() {
        assert_eq!(MockCatalog.movies("Comedy", 7).len(), 7);
        assert!(MockCatalog.movies("Comedy", 0).is_empty());
    }

    #[test]
    fn test_mock_is_deterministic() {
        assert_eq!(MockCatalog.movies("Drama", 5), MockCatalog.movies("Drama", 5));
    }

    #[test]
    fn test_mock_ids_distinct_across_genres() {
        let mut ids = HashSet::new();
        for genre in ["Action", "Comedy", "Drama", "Horror"] {
            for movie in MockCatalog.movies(genre, 20) {
                assert!(ids.insert(movie.id), "duplicate id {}", movie.id);
            }
        }
        assert_eq!(ids.len(), 80);
    }

    #[test]
    fn test_mock_genre_lookup_ignores_case() {
        let a = MockCatalog.movies("comedy", 2);
        let b = MockCatalog.movies("Comedy", 2);
        assert_eq!(a[0].id, b[0].id);
    }

    #[test]
    fn test_mock_starts_with_classics_then_placeholders() {
        let movies = MockCatalog.movies("Crime", 4);
        assert_eq!(movies[0].title, "The Shawshank Redemption");
        assert_eq!(movies[3].title, "Mock Movie 4");
        assert!(movies.iter().all(|m| m.genres == vec!["Crime".to_string()]));
    }

    #[tokio::test]
    async fn test_mock_catalog_trait_matches_sync_form() {
        let fetched = MockCatalog.fetch_by_genre("War", 3).await;
        assert_eq!(fetched, MockCatalog.movies("War", 3));
    }

    #[tokio::test]
    async fn test_mock_details_finds_fetched_movies() {
        let fetched = MockCatalog.movies("Science Fiction", 5);
        for movie in &fetched {
            assert_eq!(MockCatalog.movie_details(movie.id).await.as_ref(), Some(movie));
        }
    }

    #[test]
    fn test_mock_details_unknown_ids() {
        assert!(MockCatalog.details(MovieId(0)).is_none());
        assert!(MockCatalog.details(MovieId(42)).is_none());

        let first = MockCatalog.movies("Western", 1)[0].id;
        assert!(MockCatalog.details(MovieId(first.0 - 1)).is_none());
        // Custom genres are outside the lookup table.
        let custom = MockCatalog.movies("Kaiju", 1)[0].id;
        assert!(MockCatalog.details(custom).is_none());
    }
}
