//! Guess evaluation
//!
//! A guess is correct when, after trimming and lowercasing, either string
//! contains the other. This keeps partial guesses like "bohemian" valid for
//! "Bohemian Rhapsody" while also accepting over-specified guesses like
//! "bohemian rhapsody by queen".

/// Check whether `guess` matches `title`.
///
/// Case-insensitive, bidirectional substring containment. Whitespace-only
/// input never matches; callers should reject it before it costs a stage.
pub fn guess_matches(guess: &str, title: &str) -> bool {
    let guess = guess.trim().to_lowercase();
    let title = title.trim().to_lowercase();

    if guess.is_empty() || title.is_empty() {
        return false;
    }

    guess.contains(&title) || title.contains(&guess)
}
