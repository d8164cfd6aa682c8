//! Fold per-segment matches into a single answer.

use crate::recognize::MatchCandidate;

/// Collapse candidates that name the same `(title, artist)`, keeping the
/// higher-confidence instance. First-seen order is preserved.
pub fn unique_songs<I>(candidates: I) -> Vec<MatchCandidate>
where
    I: IntoIterator<Item = MatchCandidate>,
{
    let mut songs: Vec<MatchCandidate> = Vec::new();

    for candidate in candidates {
        match songs
            .iter_mut()
            .find(|existing| existing.song_key() == candidate.song_key())
        {
            Some(existing) => {
                if candidate.confidence > existing.confidence {
                    *existing = candidate;
                }
            }
            None => songs.push(candidate),
        }
    }

    songs
}

/// The highest-confidence candidate after de-duplication, if any.
pub fn best_of<I>(candidates: I) -> Option<MatchCandidate>
where
    I: IntoIterator<Item = MatchCandidate>,
{
    unique_songs(candidates)
        .into_iter()
        .reduce(|best, next| if next.confidence > best.confidence { next } else { best })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(title: &str, artist: &str, confidence: f64, segment: usize) -> MatchCandidate {
        MatchCandidate {
            title: title.to_string(),
            artist: artist.to_string(),
            album: "Album".to_string(),
            genre: "Pop".to_string(),
            confidence,
            segment,
        }
    }

    #[test]
    fn test_best_of_empty() {
        assert!(best_of(Vec::new()).is_none());
        assert!(unique_songs(Vec::new()).is_empty());
    }

    #[test]
    fn test_best_of_prefers_highest_duplicate() {
        let candidates = vec![
            candidate("A", "X", 0.7, 1),
            candidate("A", "X", 0.9, 2),
            candidate("B", "Y", 0.5, 3),
        ];

        let best = best_of(candidates).unwrap();
        assert_eq!(best.title, "A");
        assert_eq!(best.confidence, 0.9);
        assert_eq!(best.segment, 2);
    }

    #[test]
    fn test_unique_songs_dedups_by_title_and_artist() {
        let songs = unique_songs(vec![
            candidate("A", "X", 80.0, 0),
            candidate("A", "Z", 60.0, 1),
            candidate("A", "X", 70.0, 2),
            candidate("B", "Y", 90.0, 3),
        ]);

        assert_eq!(songs.len(), 3);
        assert_eq!(songs[0].song_key(), ("A", "X"));
        assert_eq!(songs[0].segment, 0);
        assert_eq!(songs[1].song_key(), ("A", "Z"));
        assert_eq!(songs[2].song_key(), ("B", "Y"));
    }

    #[test]
    fn test_best_of_is_order_independent() {
        let forward = vec![
            candidate("A", "X", 0.7, 1),
            candidate("B", "Y", 0.95, 2),
            candidate("A", "X", 0.9, 3),
        ];
        let mut backward = forward.clone();
        backward.reverse();

        assert_eq!(best_of(forward), best_of(backward));
    }
}
