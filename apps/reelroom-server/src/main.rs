//! Reelroom server binary.
//!
//! Environment:
//!
//! | Variable                   | Default        |
//! |----------------------------|----------------|
//! | `REELROOM_BIND`            | `0.0.0.0:3001` |
//! | `REELROOM_MAX_PLAYERS`     | `8`            |
//! | `REELROOM_MOVIES_PER_GAME` | `20`           |
//! | `TMDB_API_KEY`             | unset (mock)   |
//! | `TMDB_BASE_URL`            | TMDB v3        |
//! | `RUST_LOG`                 | `info`         |

use std::str::FromStr;

use reelroom::prelude::*;
use reelroom::DEFAULT_BIND_ADDR;

#[tokio::main]
async fn main() -> Result<(), ReelroomError> {
    init_tracing("info");

    let bind = std::env::var("REELROOM_BIND").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    let game = game_config_from(|key| std::env::var(key).ok())?;

    let catalog = TmdbCatalog::from_env();
    tracing::info!(
        %bind,
        max_players = game.max_players,
        movies_per_game = game.movies_per_game,
        tmdb = catalog.is_configured(),
        "starting Reelroom server"
    );

    let server = ReelroomServerBuilder::new()
        .bind(&bind)
        .game_config(game)
        .build(catalog)
        .await?;

    server.run().await
}

/// Builds the game config from defaults plus environment overrides.
fn game_config_from(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<GameConfig, ReelroomError> {
    let mut config = GameConfig::default();
    if let Some(n) = parse_var(&lookup, "REELROOM_MAX_PLAYERS")? {
        config.max_players = n;
    }
    if let Some(n) = parse_var(&lookup, "REELROOM_MOVIES_PER_GAME")? {
        config.movies_per_game = n;
    }
    if config.max_players == 0 || config.movies_per_game == 0 {
        return Err(ReelroomError::Config(
            "player and movie counts must be at least 1".into(),
        ));
    }
    Ok(config)
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ReelroomError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ReelroomError::Config(format!("{key}={raw:?} is not a valid number"))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_overrides() {
        let config = game_config_from(env(&[])).unwrap();
        assert_eq!(config.max_players, 8);
        assert_eq!(config.movies_per_game, 20);
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = game_config_from(env(&[
            ("REELROOM_MAX_PLAYERS", "4"),
            ("REELROOM_MOVIES_PER_GAME", " 12 "),
        ]))
        .unwrap();
        assert_eq!(config.max_players, 4);
        assert_eq!(config.movies_per_game, 12);
    }

    #[test]
    fn test_bad_values_are_rejected() {
        let err = game_config_from(env(&[("REELROOM_MAX_PLAYERS", "lots")])).unwrap_err();
        assert!(err.to_string().contains("REELROOM_MAX_PLAYERS"));

        assert!(game_config_from(env(&[("REELROOM_MOVIES_PER_GAME", "0")])).is_err());
    }
}
