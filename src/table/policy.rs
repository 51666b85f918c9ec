//! Confidence policy: when does a cell need human review.
//!
//! The flag is derived, never stored. Callers recompute it from the
//! current confidence on every render, so a manual edit (which forces the
//! confidence to 1.0) clears the flag with no cache to invalidate.

/// Cells below this extraction confidence are flagged for review.
pub const REVIEW_THRESHOLD: f32 = 0.6;

/// Whether a cell at the given confidence needs human review.
pub fn needs_review(confidence: f32) -> bool {
    confidence < REVIEW_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_threshold_is_flagged() {
        assert!(needs_review(0.55));
        assert!(needs_review(0.0));
        assert!(needs_review(0.3));
    }

    #[test]
    fn at_or_above_threshold_is_not_flagged() {
        assert!(!needs_review(0.6));
        assert!(!needs_review(0.99));
        assert!(!needs_review(1.0));
    }
}
