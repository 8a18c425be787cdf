//! Top-pick ranking.

use std::collections::{HashMap, HashSet};

use reelroom_protocol::{Movie, MovieId, Player, PlayerId, TopPick};

/// Ranks movies by how many distinct players liked them.
///
/// Likes are gathered in player join order, then each player's swipe
/// order; that first-seen order breaks ties because the sort is stable.
/// Movies nobody liked, and liked ids missing from `movies`, are left out.
pub fn rank(players: &[Player], movies: &[Movie], limit: usize) -> Vec<TopPick> {
    let mut order: Vec<MovieId> = Vec::new();
    let mut likers: HashMap<MovieId, Vec<String>> = HashMap::new();
    let mut counted: HashSet<(MovieId, PlayerId)> = HashSet::new();

    for player in players {
        for swipe in player.swipes.iter().filter(|s| s.liked) {
            if !counted.insert((swipe.movie_id, player.id)) {
                continue;
            }
            likers
                .entry(swipe.movie_id)
                .or_insert_with(|| {
                    order.push(swipe.movie_id);
                    Vec::new()
                })
                .push(player.name.clone());
        }
    }

    let mut picks: Vec<TopPick> = order
        .into_iter()
        .filter_map(|id| {
            let movie = movies.iter().find(|m| m.id == id)?;
            let players = likers.remove(&id)?;
            Some(TopPick {
                movie: movie.clone(),
                score: players.len(),
                players,
            })
        })
        .collect();

    picks.sort_by(|a, b| b.score.cmp(&a.score));
    picks.truncate(limit);
    picks
}

#[cfg(test)]
mod tests {
    use reelroom_protocol::Swipe;

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

    fn player(id: u64, name: &str, swipes: &[(u64, bool)]) -> Player {
        let mut p = Player::new(PlayerId(id), name);
        p.swipes = swipes
            .iter()
            .map(|&(movie, liked)| Swipe {
                movie_id: MovieId(movie),
                liked,
                timestamp: 0,
            })
            .collect();
        p
    }

    #[test]
    fn test_rank_two_players() {
        let movies = vec![movie(1), movie(2), movie(3)];
        let players = vec![
            player(1, "Ann", &[(1, true), (2, true), (3, false)]),
            player(2, "Bo", &[(1, false), (2, true), (3, true)]),
        ];

        let picks = rank(&players, &movies, 10);
        let ids: Vec<u64> = picks.iter().map(|p| p.movie.id.0).collect();
        assert_eq!(ids, vec![2, 1, 3]);
        assert_eq!(picks[0].score, 2);
        assert_eq!(picks[0].players, vec!["Ann", "Bo"]);
        assert_eq!(picks[1].players, vec!["Ann"]);
        assert_eq!(picks[2].players, vec!["Bo"]);
    }

    #[test]
    fn test_rank_excludes_unliked_and_unknown_movies() {
        let movies = vec![movie(1), movie(2)];
        let players = vec![player(1, "Ann", &[(1, false), (2, false), (99, true)])];
        assert!(rank(&players, &movies, 10).is_empty());
    }

    #[test]
    fn test_rank_ties_keep_first_seen_order() {
        let movies = vec![movie(1), movie(2), movie(3)];
        let players = vec![
            player(1, "Ann", &[(3, true), (1, true)]),
            player(2, "Bo", &[(2, true)]),
        ];
        let ids: Vec<u64> = rank(&players, &movies, 10)
            .iter()
            .map(|p| p.movie.id.0)
            .collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn test_rank_truncates_to_limit() {
        let movies: Vec<Movie> = (1..=15).map(movie).collect();
        let swipes: Vec<(u64, bool)> = (1..=15).map(|id| (id, true)).collect();
        let players = vec![player(1, "Ann", &swipes)];
        let picks = rank(&players, &movies, 10);
        assert_eq!(picks.len(), 10);
        assert_eq!(picks[9].movie.id, MovieId(10));
    }

    #[test]
    fn test_rank_counts_each_player_once() {
        let movies = vec![movie(1)];
        let players = vec![player(1, "Ann", &[(1, true), (1, true)])];
        let picks = rank(&players, &movies, 10);
        assert_eq!(picks[0].score, 1);
    }
}
