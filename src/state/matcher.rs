//! Typo-tolerant text similarity used for autocomplete suggestions.

use std::cmp::Ordering;

use crate::state::game::Song;

/// Candidates scoring below this value are never suggested.
pub const SUGGESTION_THRESHOLD: f64 = 50.0;
/// Maximum number of suggestions returned for a query.
pub const MAX_SUGGESTIONS: usize = 5;

const SCORE_CONTAINED_IN_TARGET: f64 = 100.0;
const SCORE_CONTAINS_TARGET: f64 = 90.0;
const SCORE_TOKEN_MATCH: f64 = 80.0;
const CHAR_OVERLAP_SCALE: f64 = 70.0;
const MAX_SCORE: f64 = 100.0;

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Score in `[0, 100]` describing how close `guess` is to `target`.
///
/// The score is the best of three signals: whole-string containment, containment
/// between any pair of whitespace-separated tokens, and a Dice-like character
/// overlap scaled into the low range.
pub fn similarity(guess: &str, target: &str) -> f64 {
    let a = normalize(guess);
    let b = normalize(target);

    if b.contains(a.as_str()) {
        return SCORE_CONTAINED_IN_TARGET;
    }
    if a.contains(b.as_str()) {
        return SCORE_CONTAINS_TARGET;
    }

    let token_score = if tokens_overlap(&a, &b) {
        SCORE_TOKEN_MATCH
    } else {
        0.0
    };

    token_score.max(char_overlap(&a, &b))
}

fn tokens_overlap(a: &str, b: &str) -> bool {
    a.split_whitespace().any(|left| {
        b.split_whitespace()
            .any(|right| right.contains(left) || left.contains(right))
    })
}

fn char_overlap(a: &str, b: &str) -> f64 {
    let total = a.chars().count() + b.chars().count();
    if total == 0 {
        return 0.0;
    }
    let shared = a.chars().filter(|c| b.contains(*c)).count();
    let score = (2.0 * shared as f64 / total as f64) * CHAR_OVERLAP_SCALE;
    score.min(MAX_SCORE)
}

/// Best score of `query` against the title, the artist, and `"artist title"`.
pub fn song_score(query: &str, song: &Song) -> f64 {
    let combined = format!("{} {}", song.artist, song.title);
    similarity(query, &song.title)
        .max(similarity(query, &song.artist))
        .max(similarity(query, &combined))
}

/// Rank `candidates` against `query`, keeping at most five songs scoring at least 50.
///
/// Ties keep their input order. An empty query yields no suggestions.
pub fn rank_suggestions(query: &str, candidates: &[Song]) -> Vec<Song> {
    if query.trim().is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(f64, &Song)> = candidates
        .iter()
        .map(|song| (song_score(query, song), song))
        .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
        .collect();

    scored.sort_by(|(left, _), (right, _)| right.partial_cmp(left).unwrap_or(Ordering::Equal));

    scored
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|(_, song)| song.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use uuid::Uuid;

    use super::*;
    use crate::state::game::{Difficulty, Genre};

    fn song(title: &str, artist: &str) -> Song {
        Song {
            id: Uuid::new_v4(),
            title: title.into(),
            artist: artist.into(),
            track_id: "dQw4w9WgXcQ".into(),
            genre: Genre::Rock,
            difficulty: Difficulty::Easy,
            created_at: SystemTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn identical_strings_score_full_marks() {
        for text in ["", "queen", "Bohemian Rhapsody", "  AC/DC  "] {
            assert_eq!(similarity(text, text), 100.0);
        }
    }

    #[test]
    fn containment_prefers_guess_inside_target() {
        assert_eq!(similarity("bohemian", "Bohemian Rhapsody"), 100.0);
        assert_eq!(similarity("Bohemian Rhapsody live", "bohemian rhapsody"), 90.0);
    }

    #[test]
    fn token_containment_scores_eighty() {
        assert_eq!(similarity("rhapsody in blue", "bohemian rhapsody"), 80.0);
    }

    #[test]
    fn char_overlap_stays_in_low_range() {
        let score = similarity("xyz", "abc");
        assert_eq!(score, 0.0);
        let partial = similarity("qeen", "queen rocks");
        assert!(partial > 0.0 && partial <= 70.0, "got {partial}");
    }

    #[test]
    fn scores_are_bounded() {
        let samples = ["aaaaaab", "ba", "", "queen", "q u e e n", "Ünïcödé", "zz top"];
        for a in samples {
            for b in samples {
                let score = similarity(a, b);
                assert!((0.0..=100.0).contains(&score), "{a:?} vs {b:?} = {score}");
            }
        }
    }

    #[test]
    fn empty_query_returns_no_suggestions() {
        let songs = vec![song("Bohemian Rhapsody", "Queen")];
        assert!(rank_suggestions("", &songs).is_empty());
        assert!(rank_suggestions("   ", &songs).is_empty());
    }

    #[test]
    fn suggestions_are_capped_and_thresholded() {
        let songs: Vec<Song> = (0..8)
            .map(|i| song(&format!("Queen Song {i}"), "Queen"))
            .chain(std::iter::once(song("xyz", "wvu")))
            .collect();

        let ranked = rank_suggestions("queen", &songs);
        assert_eq!(ranked.len(), MAX_SUGGESTIONS);
        assert!(ranked.iter().all(|s| song_score("queen", s) >= SUGGESTION_THRESHOLD));
        assert!(ranked.iter().all(|s| s.title != "xyz"));
    }

    #[test]
    fn ties_preserve_input_order() {
        let first = song("Under Pressure", "Queen");
        let second = song("Radio Ga Ga", "Queen");
        let ranked = rank_suggestions("queen", &[first.clone(), second.clone()]);
        assert_eq!(ranked, vec![first, second]);
    }

    #[test]
    fn better_matches_rank_first() {
        let weak = song("Smoke on the Water", "Deep Purple");
        let strong = song("Paint It Black", "The Rolling Stones");
        let ranked = rank_suggestions("paint it", &[weak, strong.clone()]);
        assert_eq!(ranked.first(), Some(&strong));
    }
}
