//! String similarity scores on a 0-100 integer scale.
//!
//! `ratio` is a normalized Levenshtein score. `partial_ratio` and
//! `token_sort_ratio` loosen it for substring and word-order variants and are
//! only used by regimen matching. Apart from `token_sort_ratio`, case folding
//! is the caller's job.

/// Whole-string similarity.
///
/// Symmetric, 100 only for identical strings, 0 if either side is empty.
pub fn ratio(a: &str, b: &str) -> u8 {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    if a == b {
        return 100;
    }
    let score = (strsim::normalized_levenshtein(a, b).clamp(0.0, 1.0) * 100.0).round() as u8;
    // Very long strings one edit apart would otherwise round up to 100.
    score.min(99)
}

/// Best `ratio` of the shorter string against every equal-length window of
/// the longer one.
pub fn partial_ratio(a: &str, b: &str) -> u8 {
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let (shorter, longer) = if a_chars.len() <= b_chars.len() {
        (a_chars, b_chars)
    } else {
        (b_chars, a_chars)
    };

    if shorter.len() == longer.len() {
        return ratio(a, b);
    }

    let needle: String = shorter.iter().collect();
    let mut best = 0;
    for window in longer.windows(shorter.len()) {
        let candidate: String = window.iter().collect();
        let score = ratio(&needle, &candidate);
        if score > best {
            best = score;
            if best == 100 {
                break;
            }
        }
    }
    best
}

/// `ratio` after lowercasing, replacing non-alphanumerics with spaces and
/// sorting the resulting tokens.
pub fn token_sort_ratio(a: &str, b: &str) -> u8 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

fn sorted_tokens(s: &str) -> String {
    let cleaned: String = s
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let mut tokens: Vec<&str> = cleaned.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn identical_strings_score_100() {
        assert_eq!(ratio("vincristine", "vincristine"), 100);
    }

    #[test]
    fn empty_input_scores_zero() {
        assert_eq!(ratio("", "vincristine"), 0);
        assert_eq!(ratio("vincristine", ""), 0);
        assert_eq!(ratio("", ""), 0);
        assert_eq!(partial_ratio("", "chop"), 0);
        assert_eq!(token_sort_ratio("", "chop"), 0);
    }

    #[test]
    fn single_typo_scores_high() {
        let score = ratio("vincristin", "vincristine");
        assert!(score >= 85, "got {score}");
        assert!(score < 100);
    }

    #[test]
    fn unrelated_strings_score_low() {
        assert!(ratio("cisplatin", "rituximab") < 50);
    }

    #[test]
    fn more_edits_never_score_higher() {
        let one = ratio("methotrexate", "methotrxate");
        let two = ratio("methotrexate", "methtrxate");
        let three = ratio("methotrexate", "mthtrxate");
        assert!(one >= two && two >= three, "{one} {two} {three}");
    }

    #[test]
    fn long_strings_one_edit_apart_stay_below_100() {
        let a = "a".repeat(300);
        let mut b = a.clone();
        b.push('b');
        assert_eq!(ratio(&a, &b), 99);
    }

    #[test]
    fn partial_ratio_finds_substring() {
        assert_eq!(partial_ratio("chop", "r-chop"), 100);
        assert_eq!(partial_ratio("r-chop", "chop"), 100);
    }

    #[test]
    fn partial_ratio_equal_length_falls_back_to_ratio() {
        assert_eq!(partial_ratio("abvd", "abvp"), ratio("abvd", "abvp"));
    }

    #[test]
    fn token_sort_ignores_word_order_and_punctuation() {
        assert_eq!(token_sort_ratio("Cisplatin + Etoposide", "etoposide cisplatin"), 100);
    }

    #[test]
    fn token_sort_of_punctuation_only_is_zero() {
        assert_eq!(token_sort_ratio("---", "chop"), 0);
    }

    proptest! {
        #[test]
        fn ratio_is_symmetric_and_bounded(a in "[a-z ]{0,20}", b in "[a-z ]{0,20}") {
            let ab = ratio(&a, &b);
            prop_assert_eq!(ab, ratio(&b, &a));
            prop_assert!(ab <= 100);
            if !a.is_empty() && !b.is_empty() {
                prop_assert_eq!(ab == 100, a == b);
            }
        }

        #[test]
        fn partial_ratio_is_symmetric(a in "[a-z]{1,12}", b in "[a-z]{1,12}") {
            prop_assert_eq!(partial_ratio(&a, &b), partial_ratio(&b, &a));
        }
    }
}
