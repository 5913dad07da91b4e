//! Cosine kernel and top-k selection shared by the exact store and the IVF index.

use std::cmp::Ordering;

use bookrec_core::{Result, RetrievalError};

/// Accumulates in f64; squares of large f32 components stay finite.
pub fn dot(a: &[f32], b: &[f32]) -> f64 { a.iter().zip(b).map(|(&x, &y)| f64::from(x) * f64::from(y)).sum() }

pub fn l2_norm(v: &[f32]) -> f64 { dot(v, v).sqrt() }

pub fn is_finite(v: &[f32]) -> bool { v.iter().all(|x| x.is_finite()) }

/// `dot(a,b) / (‖a‖·‖b‖)` with precomputed norms. A zero norm on either side
/// yields exactly 0.
pub fn cosine_with_norms(a: &[f32], a_norm: f64, b: &[f32], b_norm: f64) -> f32 {
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    let s = (dot(a, b) / (a_norm * b_norm)).clamp(-1.0, 1.0) as f32;
    // fold -0.0 into 0.0 so equal scores compare equal
    if s == 0.0 { 0.0 } else { s }
}

pub fn cosine(a: &[f32], b: &[f32]) -> f32 { cosine_with_norms(a, l2_norm(a), b, l2_norm(b)) }

/// Copy of `v` scaled to unit length; the zero vector stays zero.
pub fn normalized(v: &[f32]) -> Vec<f32> {
    let n = l2_norm(v);
    if n == 0.0 { vec![0.0; v.len()] } else { v.iter().map(|&x| (f64::from(x) / n) as f32).collect() }
}

/// Descending score, then ascending position.
pub fn rank_order(a: &(usize, f32), b: &(usize, f32)) -> Ordering { b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)) }

/// The best `k` `(position, score)` pairs in [`rank_order`].
pub fn top_k(mut scored: Vec<(usize, f32)>, k: usize) -> Vec<(usize, f32)> {
    if k == 0 {
        return Vec::new();
    }
    if k < scored.len() {
        scored.select_nth_unstable_by(k - 1, rank_order);
        scored.truncate(k);
    }
    scored.sort_by(rank_order);
    scored
}

/// Validate a caller-supplied `k`.
pub fn checked_k(k: i64) -> Result<usize> {
    usize::try_from(k).map_err(|_| RetrievalError::InvalidK(k))
}

/// Query length must equal the corpus dimension and every component must be finite.
pub fn check_query(expected: usize, query: &[f32]) -> Result<()> {
    if query.len() != expected {
        return Err(RetrievalError::DimensionMismatch { expected, actual: query.len() });
    }
    if !is_finite(query) {
        return Err(RetrievalError::InvalidArgument("query vector has non-finite components".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_parallel_and_orthogonal_vectors() {
        assert!((cosine(&[1.0, 2.0], &[2.0, 4.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine(&[1.0, 0.0], &[0.0, 3.0]), 0.0);
        assert!((cosine(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_norm_is_zero_similarity() {
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine(&[1.0, 1.0], &[0.0, 0.0]), 0.0);
        assert_eq!(cosine(&[0.0, 0.0], &[0.0, 0.0]), 0.0);
    }

    #[test]
    fn large_components_keep_their_direction() {
        assert!((cosine(&[3e19, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!((cosine(&[3e38, 3e38], &[1.0, 1.0]) - 1.0).abs() < 1e-6);
        let unit = normalized(&[3e19, 4e19]);
        assert!((unit[0] - 0.6).abs() < 1e-6 && (unit[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn query_must_be_finite() {
        assert!(check_query(2, &[1.0, 0.0]).is_ok());
        assert!(matches!(check_query(2, &[f32::NAN, 0.0]), Err(RetrievalError::InvalidArgument(_))));
        assert!(matches!(check_query(2, &[f32::INFINITY, 0.0]), Err(RetrievalError::InvalidArgument(_))));
        assert!(matches!(check_query(3, &[1.0, 0.0]), Err(RetrievalError::DimensionMismatch { .. })));
    }

    #[test]
    fn negative_zero_folds_to_zero() {
        let s = cosine(&[1.0, 0.0], &[-0.0, 1.0]);
        assert!(s.is_sign_positive());
    }

    #[test]
    fn top_k_sorts_and_breaks_ties_by_position() {
        let scored = vec![(0, 0.5), (1, 0.9), (2, 0.5), (3, 0.1), (4, 0.9)];
        assert_eq!(top_k(scored.clone(), 3), vec![(1, 0.9), (4, 0.9), (0, 0.5)]);
        assert_eq!(top_k(scored.clone(), 10).len(), 5);
        assert!(top_k(scored, 0).is_empty());
    }

    #[test]
    fn checked_k_rejects_negative() {
        assert_eq!(checked_k(3).unwrap(), 3);
        assert_eq!(checked_k(-2).unwrap_err(), RetrievalError::InvalidK(-2));
    }
}
