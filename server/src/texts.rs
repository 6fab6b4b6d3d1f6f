use rand::Rng;

/// Fixed corpus of reference sentences. One is picked uniformly at
/// random when a race starts.
pub const REFERENCE_TEXTS: [&str; 5] = [
    "The quick brown fox jumps over the lazy dog near the riverbank.",
    "Programming is the art of telling another human what one wants the computer to do.",
    "In the middle of difficulty lies opportunity for those who persist.",
    "Success is not final failure is not fatal it is the courage to continue that counts.",
    "The only way to do great work is to love what you do and pursue excellence.",
];

pub fn pick() -> &'static str {
    let index = rand::rng().random_range(0..REFERENCE_TEXTS.len());
    REFERENCE_TEXTS[index]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_returns_corpus_sentence() {
        for _ in 0..20 {
            let text = pick();
            assert!(REFERENCE_TEXTS.contains(&text));
            assert!(!text.is_empty());
        }
    }
}
