//! Typing metrics, recomputed server-side from raw typed text. Clients
//! never get to report their own numbers.

/// Percent of the reference text covered by the typed snapshot, capped
/// at 100 once the snapshot is at least as long as the reference.
pub fn progress_percent(typed_len: usize, reference_len: usize) -> f64 {
    (typed_len as f64 / reference_len as f64 * 100.0).min(100.0)
}

/// Words per minute: whitespace-separated word count over elapsed
/// minutes, rounded to the nearest integer. Returns 0 before the clock
/// has meaningfully started.
pub fn words_per_minute(typed_text: &str, elapsed_seconds: f64) -> u32 {
    if elapsed_seconds <= 0.0 {
        return 0;
    }
    let words = typed_text.split_whitespace().count() as f64;
    (words / (elapsed_seconds / 60.0)).round() as u32
}

/// Positional character-match ratio over the typed snapshot.
///
/// Characters are compared pairwise up to the shorter of the two
/// strings and divided by the typed length, so a single dropped
/// character makes every following position count as wrong. That is the
/// intended scoring, not a diff.
pub fn accuracy_percent(typed_text: &str, reference_text: &str) -> u32 {
    let typed_len = typed_text.chars().count();
    if typed_len == 0 {
        return 100;
    }
    let matches = typed_text
        .chars()
        .zip(reference_text.chars())
        .filter(|(typed, reference)| typed == reference)
        .count();
    (100 * matches / typed_len) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_basic() {
        assert_eq!(progress_percent(0, 10), 0.0);
        assert_eq!(progress_percent(5, 10), 50.0);
        assert_eq!(progress_percent(10, 10), 100.0);
    }

    #[test]
    fn test_progress_saturates_at_100() {
        assert_eq!(progress_percent(11, 10), 100.0);
        assert_eq!(progress_percent(1000, 10), 100.0);
    }

    #[test]
    fn test_progress_monotonic() {
        let reference_len = 37;
        let mut previous = 0.0;
        for typed_len in 0..50 {
            let current = progress_percent(typed_len, reference_len);
            assert!(current >= previous);
            previous = current;
        }
    }

    #[test]
    fn test_wpm_basic() {
        // 3 words in 30 seconds = 6 wpm
        assert_eq!(words_per_minute("the quick brown", 30.0), 6);
        // 12 words in 60 seconds = 12 wpm
        assert_eq!(
            words_per_minute("one two three four five six seven eight nine ten eleven twelve", 60.0),
            12
        );
    }

    #[test]
    fn test_wpm_zero_elapsed_guard() {
        assert_eq!(words_per_minute("some words here", 0.0), 0);
        assert_eq!(words_per_minute("some words here", -1.0), 0);
    }

    #[test]
    fn test_wpm_empty_input() {
        assert_eq!(words_per_minute("", 30.0), 0);
        assert_eq!(words_per_minute("   ", 30.0), 0);
    }

    #[test]
    fn test_accuracy_empty_typed_is_100() {
        assert_eq!(accuracy_percent("", "the quick brown fox"), 100);
    }

    #[test]
    fn test_accuracy_prefix_match_ratio() {
        // 2 of 3 positions match
        assert_eq!(accuracy_percent("abc", "abx"), 66);
        // 1 of 2 positions match
        assert_eq!(accuracy_percent("ab", "xbc"), 50);
    }

    #[test]
    fn test_accuracy_perfect_match() {
        assert_eq!(accuracy_percent("cat", "cat"), 100);
    }

    #[test]
    fn test_accuracy_dropped_character_cascades() {
        // Dropping the first character misaligns every later position.
        assert_eq!(accuracy_percent("at", "cat"), 0);
    }

    #[test]
    fn test_accuracy_typed_longer_than_reference() {
        // Extra characters past the reference all count as wrong.
        assert_eq!(accuracy_percent("cats", "cat"), 75);
    }
}
