//! Small vector helpers shared by the scoring kernels.

/// Dot product over the common prefix of two slices.
#[inline]
pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Euclidean norm.
#[inline]
pub(crate) fn norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}

/// Converts an angle cosine into degrees, clamping rounding noise into `[-1, 1]`.
#[inline]
pub(crate) fn cos_to_deg(cos: f64) -> f64 {
    cos.clamp(-1.0, 1.0).acos().to_degrees()
}
