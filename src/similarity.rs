use crate::error::{RankError, RankResult};

/// Cosine similarity between two vectors of equal dimension.
///
/// Zero-magnitude vectors score 0.0. The result is not clamped.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> RankResult<f64> {
    if a.len() != b.len() {
        return Err(RankError::ShapeMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let (mut dot, mut mag_a, mut mag_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        mag_a += x * x;
        mag_b += y * y;
    }

    let denom = mag_a.sqrt() * mag_b.sqrt();
    if denom < f64::EPSILON {
        Ok(0.0)
    } else {
        Ok(dot / denom)
    }
}

/// Square matrix of cosine similarities between every pair of vectors.
///
/// All vectors must share the dimension of the first one.
pub fn pairwise_matrix(vectors: &[Vec<f32>]) -> RankResult<Vec<Vec<f64>>> {
    let n = vectors.len();
    let mut matrix = vec![vec![0.0; n]; n];

    for i in 0..n {
        for j in i..n {
            let sim = cosine_similarity(&vectors[i], &vectors[j])?;
            matrix[i][j] = sim;
            matrix[j][i] = sim;
        }
    }

    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_vectors() {
        let v = vec![0.3, -1.2, 4.0];
        let sim = cosine_similarity(&v, &v).unwrap();
        assert!((sim - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_orthogonal_vectors() {
        let sim = cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap();
        assert!(sim.abs() < 1e-9);
    }

    #[test]
    fn test_opposite_vectors() {
        let sim = cosine_similarity(&[1.0, 2.0], &[-1.0, -2.0]).unwrap();
        assert!((sim + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_vector_scores_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]).unwrap(), 0.0);
        assert_eq!(cosine_similarity(&[], &[]).unwrap(), 0.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = cosine_similarity(&[1.0], &[1.0, 2.0]).unwrap_err();
        assert!(matches!(
            err,
            RankError::ShapeMismatch {
                expected: 1,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_pairwise_matrix_is_symmetric_with_unit_diagonal() {
        let vectors = vec![vec![1.0, 0.0], vec![0.6, 0.8], vec![0.0, 1.0]];
        let m = pairwise_matrix(&vectors).unwrap();

        assert_eq!(m.len(), 3);
        for i in 0..3 {
            assert!((m[i][i] - 1.0).abs() < 1e-9);
            for j in 0..3 {
                assert_eq!(m[i][j], m[j][i]);
            }
        }
        assert!((m[0][1] - 0.6).abs() < 1e-6);
        assert!(m[0][2].abs() < 1e-9);
    }

    #[test]
    fn test_pairwise_matrix_rejects_ragged_input() {
        let vectors = vec![vec![1.0, 0.0], vec![1.0, 0.0, 0.0]];
        assert!(matches!(
            pairwise_matrix(&vectors),
            Err(RankError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_pairwise_matrix_empty() {
        assert!(pairwise_matrix(&[]).unwrap().is_empty());
    }
}
