//! Vector math: cosine similarity and blob packing.
//!
//! Embeddings are stored as raw little-endian 32-bit IEEE-754 floats
//! concatenated without header or length prefix (§6). Vector length is
//! inferred from `blob_bytes / 4`. This format is contract-bearing: any
//! compatible implementation must read and write the same bytes.

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 for zero-norm vectors or a dimension mismatch, rather than
/// NaN — callers rank by this value and must never see NaN.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = (norm_a * norm_b).sqrt();
    if denom > 0.0 {
        dot / denom
    } else {
        0.0
    }
}

/// Pack a float vector into its raw little-endian byte representation.
pub fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Unpack a raw little-endian byte blob into a float vector.
///
/// Returns `None` if `bytes.len()` is not a multiple of 4.
pub fn blob_to_vector(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

/// `recency = max(0.5, 1 − age_seconds / (30·86400))` — linear decay to a
/// 0.5 floor over 30 days.
pub fn recency_factor(age_seconds: f64) -> f32 {
    let decayed = 1.0 - age_seconds / (30.0 * 86400.0);
    decayed.max(0.5) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_identical_vectors_is_one() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn cosine_similarity_orthogonal_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_dimension_mismatch_is_zero() {
        let a = vec![1.0, 2.0];
        let b = vec![1.0, 2.0, 3.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn cosine_similarity_zero_norm_is_zero() {
        let a = vec![0.0, 0.0, 0.0];
        let b = vec![1.0, 2.0, 3.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn blob_roundtrip_is_byte_exact() {
        let original = vec![1.5_f32, -2.25, 0.0, 3.125, f32::MIN_POSITIVE];
        let blob = vector_to_blob(&original);
        let restored = blob_to_vector(&blob).unwrap();
        assert_eq!(original, restored);
    }

    #[test]
    fn blob_with_invalid_length_is_rejected() {
        let bytes = vec![0u8, 1, 2];
        assert!(blob_to_vector(&bytes).is_none());
    }

    #[test]
    fn recency_factor_decays_to_floor() {
        assert!((recency_factor(0.0) - 1.0).abs() < 1e-6);
        assert!((recency_factor(30.0 * 86400.0) - 0.5).abs() < 1e-6);
        assert!((recency_factor(60.0 * 86400.0) - 0.5).abs() < 1e-6);
    }
}
