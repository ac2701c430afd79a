//! Scalar distance kernels.
//!
//! Exact ground truth is only as good as these loops, so they stay plain and
//! predictable: one pass, left-to-right accumulation in `f32`.

/// Compute the squared Euclidean distance between two vectors.
///
/// Returns sum((a[i] - b[i])^2)
#[inline]
pub fn euclidean_distance_squared(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum()
}

/// Compute the dot product of two vectors.
///
/// Returns sum(a[i] * b[i])
#[inline]
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Euclidean norm of a vector.
#[inline]
pub fn l2_norm(a: &[f32]) -> f32 {
    a.iter().map(|x| x * x).sum::<f32>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_euclidean_squared_identical() {
        let a = vec![1.0, 2.0, 3.0];
        assert!(euclidean_distance_squared(&a, &a) < 1e-6);
    }

    #[test]
    fn test_euclidean_squared_simple() {
        let a = vec![0.0, 0.0];
        let b = vec![3.0, 4.0];
        assert!((euclidean_distance_squared(&a, &b) - 25.0).abs() < 1e-6);
    }

    #[test]
    fn test_dot_product_simple() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![4.0, 5.0, 6.0];
        assert!((dot_product(&a, &b) - 32.0).abs() < 1e-6);
    }

    #[test]
    fn test_l2_norm() {
        assert!((l2_norm(&[3.0, 4.0]) - 5.0).abs() < 1e-6);
        assert_eq!(l2_norm(&[0.0, 0.0]), 0.0);
    }

    #[test]
    #[should_panic(expected = "Vector dimensions must match")]
    fn test_mismatched_dimensions_panic() {
        dot_product(&[1.0], &[1.0, 2.0]);
    }
}
