//! Recognition decision: which enrolled face, if any, a fresh encoding belongs to.
//!
//! A false match suppresses a legitimate frame and names the wrong person;
//! a false negative stores and alerts for someone already known. Both are
//! governed by one number, [`MATCH_DISTANCE_THRESHOLD`].

/// Largest Euclidean distance between two encodings that still counts as the
/// same person. Encodings are unit length, so this corresponds to a cosine
/// similarity of at least `1 - 0.6^2 / 2 = 0.82`.
pub const MATCH_DISTANCE_THRESHOLD: f32 = 0.6;

/// Euclidean distance, or `None` when the encodings are not comparable
/// (different length or empty).
pub fn face_distance(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.is_empty() || a.len() != b.len() {
        return None;
    }
    let sum: f32 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
    Some(sum.sqrt())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceMatcher {
    threshold: f32,
}

impl Default for FaceMatcher {
    fn default() -> Self {
        Self::new(MATCH_DISTANCE_THRESHOLD)
    }
}

impl FaceMatcher {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn is_match(&self, reference: &[f32], candidate: &[f32]) -> bool {
        face_distance(reference, candidate).is_some_and(|distance| distance <= self.threshold)
    }

    /// Index of the first reference within the threshold, in enumeration order.
    pub fn compare<E: AsRef<[f32]>>(&self, references: &[E], candidate: &[f32]) -> Option<usize> {
        references
            .iter()
            .position(|reference| self.is_match(reference.as_ref(), candidate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_euclidean() {
        assert_eq!(face_distance(&[0.0, 0.0], &[3.0, 4.0]), Some(5.0));
        assert_eq!(face_distance(&[1.0], &[1.0, 2.0]), None);
        assert_eq!(face_distance(&[], &[]), None);
    }

    #[test]
    fn threshold_is_inclusive() {
        let matcher = FaceMatcher::new(5.0);
        assert!(matcher.is_match(&[0.0, 0.0], &[3.0, 4.0]));
        assert!(!matcher.is_match(&[0.0, 0.0], &[3.0, 4.1]));
    }

    #[test]
    fn first_matching_reference_wins() {
        let matcher = FaceMatcher::default();
        let references = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.9, 0.1],
        ];
        assert_eq!(matcher.compare(&references, &[0.0, 0.95, 0.05]), Some(1));
        assert_eq!(matcher.compare(&references, &[0.0, 0.0, 1.0]), None);
    }

    #[test]
    fn no_references_never_match() {
        let references: Vec<Vec<f32>> = Vec::new();
        assert_eq!(FaceMatcher::default().compare(&references, &[0.1, 0.2]), None);
    }

    #[test]
    fn mismatched_lengths_never_match() {
        let references = vec![vec![0.1, 0.2]];
        assert_eq!(FaceMatcher::default().compare(&references, &[0.1, 0.2, 0.0]), None);
    }

    #[test]
    fn comparison_is_deterministic() {
        let references = vec![vec![0.6, 0.8], vec![0.8, 0.6]];
        let candidate = [0.7, 0.7];
        let first = FaceMatcher::default().compare(&references, &candidate);
        for _ in 0..100 {
            assert_eq!(FaceMatcher::default().compare(&references, &candidate), first);
        }
        assert_eq!(first, Some(0));
    }
}
