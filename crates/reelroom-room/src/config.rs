//! Game and registry configuration.

use reelroom_catalog::TMDB_GENRES;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// GameConfig
// ---------------------------------------------------------------------------

/// Per-deployment game settings.
///
/// The engine never hard-codes these; the server builder passes one
/// `GameConfig` to the [`SessionCoordinator`](crate::SessionCoordinator).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Maximum players allowed in a room.
    pub max_players: usize,

    /// How many movies every player swipes through.
    pub movies_per_game: usize,

    /// Genres used when no player picked any.
    pub default_genres: Vec<String>,

    /// Genres offered to players on the selection screen.
    pub available_genres: Vec<String>,

    /// Length of the final ranking.
    pub top_picks_limit: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_players: 8,
            movies_per_game: 20,
            default_genres: strings(&["Action", "Comedy", "Drama"]),
            available_genres: strings(&TMDB_GENRES),
            top_picks_limit: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// RegistryConfig
// ---------------------------------------------------------------------------

/// How room codes are generated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Characters a code is drawn from. Upper case only: codes are matched
    /// after upper-casing user input.
    pub code_alphabet: String,

    /// Random draws to try before falling back to scanning the code space.
    pub random_attempts: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            code_alphabet: "ABCDEFGHIJKLMNOPQRSTUVWXYZ".to_string(),
            random_attempts: 32,
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}
