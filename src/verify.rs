// verify.rs — Compare a produced image against the scalar reference.
//
// A pixel mismatches when |produced - reference| > tolerance. The harness
// default is 5 grey levels; device sqrt may differ from the host in the
// last ulp.

use std::fmt;

use crate::image::Image;
use crate::stencil::{crop_interior, sobel_reference};

/// Default per-pixel tolerance.
pub const DEFAULT_TOLERANCE: u8 = 5;

/// Result of a verification pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    pub tolerance: u8,
    /// Pixels compared (0 when dimensions differ).
    pub compared: usize,
    /// Pixels whose difference exceeds the tolerance.
    pub mismatches: usize,
    pub max_diff: u8,
    /// First mismatch as `(x, y, produced, reference)`.
    pub first_mismatch: Option<(usize, usize, u8, u8)>,
    /// `Some((produced, reference))` dimensions when they disagree.
    pub dimension_mismatch: Option<((usize, usize), (usize, usize))>,
}

impl VerifyReport {
    pub fn passed(&self) -> bool {
        self.dimension_mismatch.is_none() && self.mismatches == 0
    }
}

impl fmt::Display for VerifyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(((pw, ph), (rw, rh))) = self.dimension_mismatch {
            return write!(f, "FAILED: output is {pw}×{ph}, reference is {rw}×{rh}");
        }
        if self.passed() {
            return write!(
                f,
                "PASSED: {} pixels within tolerance {} (max diff {})",
                self.compared, self.tolerance, self.max_diff
            );
        }
        write!(
            f,
            "FAILED: {} of {} pixels differ by more than {} (max diff {})",
            self.mismatches, self.compared, self.tolerance, self.max_diff
        )?;
        if let Some((x, y, a, b)) = self.first_mismatch {
            write!(f, "; first at ({x},{y}): {a} vs {b}")?;
        }
        Ok(())
    }
}

/// Compare two images pixel by pixel.
pub fn verify(produced: &Image<u8>, reference: &Image<u8>, tolerance: u8) -> VerifyReport {
    let pd = (produced.width(), produced.height());
    let rd = (reference.width(), reference.height());
    let mut report = VerifyReport {
        tolerance,
        compared: 0,
        mismatches: 0,
        max_diff: 0,
        first_mismatch: None,
        dimension_mismatch: None,
    };
    if pd != rd {
        report.dimension_mismatch = Some((pd, rd));
        return report;
    }

    for (x, y, a) in produced.pixels() {
        let b = reference.get(x, y);
        let diff = a.abs_diff(b);
        report.compared += 1;
        report.max_diff = report.max_diff.max(diff);
        if diff > tolerance {
            report.mismatches += 1;
            if report.first_mismatch.is_none() {
                report.first_mismatch = Some((x, y, a, b));
            }
        }
    }
    report
}

/// Reference for a cropped kernel output: the scalar Sobel of `source`,
/// cropped to its interior.
///
/// Built from the same `gradient_of`/`magnitude_to_u8` the host backend
/// runs, so against host output it only checks tiling and buffer handling.
/// Kernel arithmetic is independently checked only for the GPU backend.
pub fn reference_interior(source: &Image<u8>) -> Image<u8> {
    crop_interior(&sobel_reference(source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_images_pass() {
        let img = Image::from_vec(3, 2, vec![1u8, 2, 3, 4, 5, 6]);
        let r = verify(&img, &img.clone(), 0);
        assert!(r.passed());
        assert_eq!(r.compared, 6);
        assert_eq!(r.max_diff, 0);
    }

    #[test]
    fn test_tolerance_is_inclusive() {
        let a = Image::from_vec(2, 1, vec![100u8, 100]);
        let b = Image::from_vec(2, 1, vec![105u8, 94]);
        let r = verify(&a, &b, DEFAULT_TOLERANCE);
        assert_eq!(r.mismatches, 1);
        assert_eq!(r.max_diff, 6);
        assert_eq!(r.first_mismatch, Some((1, 0, 100, 94)));
        assert!(!r.passed());
        assert!(r.to_string().starts_with("FAILED: 1 of 2"));
    }

    #[test]
    fn test_dimension_mismatch_fails() {
        let a = Image::<u8>::new(4, 4);
        let b = Image::<u8>::new(2, 2);
        let r = verify(&a, &b, 255);
        assert!(!r.passed());
        assert_eq!(r.dimension_mismatch, Some(((4, 4), (2, 2))));
    }

    #[test]
    fn test_reference_interior_shape() {
        let src = Image::<u8>::filled(10, 7, 50);
        let r = reference_interior(&src);
        assert_eq!((r.width(), r.height()), (8, 5));
        assert!(r.as_slice().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_host_output_with_missing_tile_fails() {
        use crate::host::HostDevice;
        use crate::lifecycle::{run_once, PhaseTimings};
        use crate::tiling::TileSize;

        let src = Image::from_vec(12, 8, (0..96u32).map(|v| (v * 53 % 256) as u8).collect());
        let mut t = PhaseTimings::default();
        let full = run_once(&HostDevice::new(), &src, TileSize::new(4, 2).unwrap(), &mut t).unwrap();
        let mut produced = crop_interior(&full);
        let reference = reference_interior(&src);
        assert!(verify(&produced, &reference, 0).passed());

        // Zero one 4×2 tile, as a dropped dispatch would.
        for y in 2..4 {
            for x in 4..8 {
                produced.set(x, y, 0);
            }
        }
        let expected = (2..4)
            .flat_map(|y| (4..8).map(move |x| (x, y)))
            .filter(|&(x, y)| reference.get(x, y) > 0)
            .count();
        assert_eq!(verify(&produced, &reference, 0).mismatches, expected);
    }
}
