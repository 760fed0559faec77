//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Calculate output dimensions for a resize to a fixed target width.
///
/// The height follows the source aspect ratio, rounded to the nearest pixel
/// and never below 1. Targets wider than the source upscale it: every planned
/// size produces a file, so the derivative set never depends on pixel content.
///
/// # Arguments
/// * `original` - Source image dimensions (width, height)
/// * `target_width` - Requested output width in pixels
///
/// # Returns
/// * `(width, height)` - Output dimensions
pub fn calculate_scaled_dimensions(original: (u32, u32), target_width: u32) -> (u32, u32) {
    let (orig_w, orig_h) = original;
    if orig_w == 0 {
        return (target_width, 1);
    }
    let ratio = target_width as f64 / orig_w as f64;
    let height = (orig_h as f64 * ratio).round().max(1.0) as u32;
    (target_width, height)
}

/// Build a square Bayer threshold matrix of side `n` (a power of two).
///
/// Values run from `0` to `n*n - 1`, laid out row-major. Built recursively
/// from the 2×2 base so every power of two is supported.
pub fn bayer_matrix(n: u32) -> Vec<u32> {
    if n <= 1 {
        return vec![0];
    }
    let half = n / 2;
    let inner = bayer_matrix(half);
    let mut out = vec![0; (n * n) as usize];
    for y in 0..n {
        for x in 0..n {
            let base = inner[((y % half) * half + (x % half)) as usize] * 4;
            let quadrant = match (x < half, y < half) {
                (true, true) => 0,
                (false, false) => 1,
                (false, true) => 2,
                (true, false) => 3,
            };
            out[(y * n + x) as usize] = base + quadrant;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_dimensions_landscape() {
        assert_eq!(calculate_scaled_dimensions((2000, 1500), 800), (800, 600));
    }

    #[test]
    fn scaled_dimensions_portrait() {
        assert_eq!(calculate_scaled_dimensions((1500, 2000), 600), (600, 800));
    }

    #[test]
    fn scaled_dimensions_rounds_height() {
        // 1000x333 → 600 wide: 199.8 rounds to 200
        assert_eq!(calculate_scaled_dimensions((1000, 333), 600), (600, 200));
    }

    #[test]
    fn scaled_dimensions_upscales() {
        assert_eq!(calculate_scaled_dimensions((400, 300), 1800), (1800, 1350));
    }

    #[test]
    fn scaled_dimensions_never_zero_height() {
        assert_eq!(calculate_scaled_dimensions((4000, 1), 100), (100, 1));
    }

    #[test]
    fn bayer_2x2() {
        assert_eq!(bayer_matrix(2), vec![0, 2, 3, 1]);
    }

    #[test]
    fn bayer_4x4_is_a_permutation() {
        let mut m = bayer_matrix(4);
        assert_eq!(m[..4], [0, 8, 2, 10]);
        m.sort_unstable();
        assert_eq!(m, (0..16).collect::<Vec<_>>());
    }
}
