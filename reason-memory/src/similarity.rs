//! Problem-text normalization and similarity (§4.8 "Lookup").

use std::collections::HashSet;

/// Normalize a problem statement for hashing/exact-match lookup: lowercase,
/// then collapse runs of whitespace to single spaces.
#[must_use]
pub fn normalize(problem: &str) -> String {
    problem.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Jaccard-style token similarity between two (already arbitrary-case)
/// problem texts: `|intersection| / |union|` over the normalized token
/// sets. Two empty texts are considered identical (similarity 1.0).
#[must_use]
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let set_a: HashSet<&str> = normalize(a).split(' ').filter(|s| !s.is_empty()).collect();
    let set_b: HashSet<&str> = normalize(b).split(' ').filter(|s| !s.is_empty()).collect();

    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }

    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_lowercases_and_collapses_whitespace() {
        assert_eq!(normalize("What   IS\n2+2?"), "what is 2+2?");
    }

    #[test]
    fn identical_after_normalization_is_similarity_one() {
        assert_eq!(jaccard_similarity("Hello World", "hello   world"), 1.0);
    }

    #[test]
    fn disjoint_texts_have_zero_similarity() {
        assert_eq!(jaccard_similarity("apple banana", "car truck"), 0.0);
    }

    #[test]
    fn partial_overlap_is_between_zero_and_one() {
        let sim = jaccard_similarity("sequence 2 6 12 20 30", "sequence 2 6 12 20 30 42");
        assert!(sim > 0.5 && sim < 1.0, "{sim}");
    }

    #[test]
    fn threshold_boundary_case() {
        // "a b" vs "a c": intersection={a}=1, union={a,b,c}=3 -> 1/3, below 0.5.
        assert!(jaccard_similarity("a b", "a c") < 0.5);
        // "a b" vs "a b c": intersection=2, union=3 -> 2/3, above 0.5.
        assert!(jaccard_similarity("a b", "a b c") >= 0.5);
    }
}
