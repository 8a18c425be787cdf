//! The Movie Database (TMDB) client.

use std::collections::HashMap;
use std::time::Duration;

use futures_util::future::try_join;
use reelroom_protocol::{Movie, MovieId};
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;

use crate::{MockCatalog, MovieCatalog};

/// Default TMDB API base URL.
pub const DEFAULT_TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";

const POSTER_BASE: &str = "https://image.tmdb.org/t/p/w500";
const BACKDROP_BASE: &str = "https://image.tmdb.org/t/p/original";
const YOUTUBE_WATCH: &str = "https://www.youtube.com/watch?v=";

#[derive(Debug, thiserror::Error)]
enum CatalogError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("genre {0:?} is not known to TMDB")]
    UnknownGenre(String),
}

/// Connection settings for TMDB.
#[derive(Debug, Clone)]
pub struct TmdbConfig {
    /// API key. Empty means "not configured": every request is served by
    /// the mock catalog.
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_TMDB_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl TmdbConfig {
    /// Reads `TMDB_API_KEY` and `TMDB_BASE_URL`, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: std::env::var("TMDB_API_KEY").unwrap_or(defaults.api_key),
            base_url: std::env::var("TMDB_BASE_URL").unwrap_or(defaults.base_url),
            timeout: defaults.timeout,
        }
    }
}

/// A [`MovieCatalog`] backed by TMDB's discover endpoint.
///
/// Never fails: without an API key, on any HTTP error, or for a genre TMDB
/// doesn't know, it serves [`MockCatalog`] data instead.
pub struct TmdbCatalog {
    /// `None` when there is no API key or the HTTP client could not be
    /// built; every request then goes to the mock data.
    client: Option<Client>,
    base_url: String,
    api_key: String,
    /// Lower-cased genre name → TMDB genre id, fetched once.
    genre_ids: OnceCell<HashMap<String, u64>>,
    fallback: MockCatalog,
}

impl TmdbCatalog {
    pub fn new(config: TmdbConfig) -> Self {
        let client = if config.api_key.is_empty() {
            tracing::warn!("TMDB_API_KEY not set, using mock movie data");
            None
        } else {
            match Client::builder().timeout(config.timeout).build() {
                Ok(client) => Some(client),
                Err(e) => {
                    tracing::error!(error = %e, "failed to build HTTP client, using mock movie data");
                    None
                }
            }
        };

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            genre_ids: OnceCell::new(),
            fallback: MockCatalog,
        }
    }

    pub fn from_env() -> Self {
        Self::new(TmdbConfig::from_env())
    }

    /// Returns `true` if requests go to TMDB rather than the mock data.
    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    /// GETs `{base_url}/{path}` with the API key and `en-US`, plus `query`.
    async fn get_json<T: DeserializeOwned>(
        &self,
        client: &Client,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, CatalogError> {
        Ok(client
            .get(format!("{}/{path}", self.base_url))
            .query(&[("api_key", self.api_key.as_str()), ("language", "en-US")])
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }

    async fn discover(
        &self,
        client: &Client,
        genre: &str,
        count: usize,
    ) -> Result<Vec<Movie>, CatalogError> {
        let genre_id = self
            .genre_id(client, genre)
            .await?
            .ok_or_else(|| CatalogError::UnknownGenre(genre.to_string()))?;

        let with_genres = genre_id.to_string();
        let page: DiscoverPage = self
            .get_json(client, "discover/movie", &[
                ("with_genres", with_genres.as_str()),
                ("sort_by", "popularity.desc"),
                ("include_adult", "false"),
                ("include_video", "false"),
                ("page", "1"),
            ])
            .await?;

        Ok(page
            .results
            .into_iter()
            .take(count)
            .map(|m| m.into_movie(vec![genre.to_string()]))
            .collect())
    }

    /// Fetches the movie and its videos concurrently.
    async fn details(&self, client: &Client, id: MovieId) -> Result<Movie, CatalogError> {
        let movie_path = format!("movie/{}", id.0);
        let videos_path = format!("movie/{}/videos", id.0);
        let (raw, videos): (TmdbMovie, VideoList) = try_join(
            self.get_json(client, &movie_path, &[]),
            self.get_json(client, &videos_path, &[]),
        )
        .await?;

        let genres = raw.genres.iter().map(|g| g.name.clone()).collect();
        let mut movie = raw.into_movie(genres);
        movie.trailer_url = videos.trailer_url();
        Ok(movie)
    }

    async fn genre_id(&self, client: &Client, genre: &str) -> Result<Option<u64>, CatalogError> {
        let ids = self
            .genre_ids
            .get_or_try_init(|| async {
                let list: GenreList = self.get_json(client, "genre/movie/list", &[]).await?;
                Ok::<_, CatalogError>(
                    list.genres
                        .into_iter()
                        .map(|g| (g.name.to_lowercase(), g.id))
                        .collect(),
                )
            })
            .await?;
        Ok(ids.get(&genre.to_lowercase()).copied())
    }
}

impl MovieCatalog for TmdbCatalog {
    async fn fetch_by_genre(&self, genre: &str, count: usize) -> Vec<Movie> {
        let Some(client) = &self.client else {
            return self.fallback.movies(genre, count);
        };
        match self.discover(client, genre, count).await {
            Ok(movies) if !movies.is_empty() => movies,
            Ok(_) => {
                tracing::warn!(genre, "TMDB returned no movies, using mock data");
                self.fallback.movies(genre, count)
            }
            Err(e) => {
                tracing::warn!(genre, error = %e, "TMDB request failed, using mock data");
                self.fallback.movies(genre, count)
            }
        }
    }

    async fn movie_details(&self, id: MovieId) -> Option<Movie> {
        let Some(client) = &self.client else {
            return self.fallback.details(id);
        };
        match self.details(client, id).await {
            Ok(movie) => Some(movie),
            Err(e) => {
                tracing::warn!(%id, error = %e, "TMDB details failed, using mock data");
                self.fallback.details(id)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// TMDB response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GenreList {
    genres: Vec<TmdbGenre>,
}

#[derive(Debug, Deserialize)]
struct TmdbGenre {
    id: u64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct DiscoverPage {
    results: Vec<TmdbMovie>,
}

#[derive(Debug, Deserialize)]
struct TmdbMovie {
    id: u64,
    title: String,
    #[serde(default)]
    overview: String,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    #[serde(default)]
    release_date: String,
    #[serde(default)]
    vote_average: f64,
    /// Only present on `movie/{id}`; discover results carry `genre_ids`.
    #[serde(default)]
    genres: Vec<TmdbGenre>,
}

impl TmdbMovie {
    fn into_movie(self, genres: Vec<String>) -> Movie {
        Movie {
            id: MovieId(self.id),
            title: self.title,
            overview: self.overview,
            poster_path: image_url(POSTER_BASE, self.poster_path),
            backdrop_path: image_url(BACKDROP_BASE, self.backdrop_path),
            release_date: self.release_date,
            vote_average: self.vote_average,
            genres,
            trailer_url: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct VideoList {
    results: Vec<TmdbVideo>,
}

#[derive(Debug, Deserialize)]
struct TmdbVideo {
    key: String,
    site: String,
    #[serde(rename = "type")]
    kind: String,
}

impl VideoList {
    /// The first YouTube trailer, as a watch link.
    fn trailer_url(&self) -> Option<String> {
        self.results
            .iter()
            .find(|v| v.kind == "Trailer" && v.site == "YouTube")
            .map(|v| format!("{YOUTUBE_WATCH}{}", v.key))
    }
}

fn image_url(base: &str, path: Option<String>) -> String {
    match path {
        Some(p) if !p.is_empty() => format!("{base}{p}"),
        _ => String::new(),
    }
}
