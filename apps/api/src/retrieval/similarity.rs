//! Cosine ranking of candidate vectors against a query vector.

const NORM_EPSILON: f32 = 1e-8;

/// Cosine similarity. Zero vectors score 0; vectors of different length are
/// compared over their common prefix.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().min(b.len());
    let (a, b) = (&a[..len], &b[..len]);
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;
    dot / if denom > 0.0 { denom } else { NORM_EPSILON }
}

/// Indices of `vectors` ordered by similarity to `query`, highest first.
/// The sort is stable, so equal scores keep input order.
pub fn rank_by_similarity(query: &[f32], vectors: &[Vec<f32>]) -> Vec<usize> {
    let scores: Vec<f32> = vectors.iter().map(|v| cosine(query, v)).collect();
    let mut order: Vec<usize> = (0..vectors.len()).collect();
    order.sort_by(|&i, &j| {
        scores[j]
            .partial_cmp(&scores[i])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_basics() {
        assert!((cosine(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_rank_orders_by_similarity_desc() {
        let query = [1.0, 0.0];
        let vectors = vec![vec![0.0, 1.0], vec![1.0, 0.1], vec![1.0, 1.0]];
        assert_eq!(rank_by_similarity(&query, &vectors), vec![1, 2, 0]);
    }

    #[test]
    fn test_rank_is_stable_for_ties() {
        let query = [1.0, 0.0];
        let vectors = vec![vec![2.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0], vec![3.0, 0.0]];
        // indices 0, 2, 3 all score 1.0 and must keep their storage order
        assert_eq!(rank_by_similarity(&query, &vectors), vec![0, 2, 3, 1]);
    }
}
