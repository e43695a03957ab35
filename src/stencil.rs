// stencil.rs — 3×3 Sobel gradient-magnitude stencil.
//
// The operator is applied only at interior pixels, where the full 3×3
// neighbourhood exists:
//
//   Gx = [-1  0  1]        Gy = [-1 -2 -1]
//        [-2  0  2]             [ 0  0  0]
//        [-1  0  1]             [ 1  2  1]
//
//   out(x, y) = sat_u8(round(sqrt(gx² + gy²)))
//
// Border pixels (row 0, row h-1, column 0, column w-1) are never centres.
// The kernel leaves them alone; callers crop them with `crop_interior`.
//
// Every backend (the scalar reference here, the rayon host backend, and the
// WGSL shader) accumulates in f32 in the same row-major neighbour order and
// converts through the same saturating rule, so outputs agree bit-for-bit
// on the CPU paths.
//
// SATURATION
// ──────────
// Raw magnitudes reach 1020·√2 ≈ 1442 on a diagonal 0/255 step. Values above
// 255 saturate to 255 rather than wrapping modulo 256.

use crate::image::{Image, Pixel};

/// Horizontal-gradient weights (responds to left→right intensity change).
pub const GX: [[f32; 3]; 3] = [[-1.0, 0.0, 1.0], [-2.0, 0.0, 2.0], [-1.0, 0.0, 1.0]];

/// Vertical-gradient weights (responds to top→bottom intensity change).
pub const GY: [[f32; 3]; 3] = [[-1.0, -2.0, -1.0], [0.0, 0.0, 0.0], [1.0, 2.0, 1.0]];

/// Stencil radius. The interior excludes this many pixels on every side.
pub const RADIUS: usize = 1;

/// Apply both operators to a 3×3 neighbourhood given as three rows.
#[inline(always)]
pub fn gradient_of(above: &[u8], center: &[u8], below: &[u8]) -> (f32, f32) {
    let rows = [above, center, below];
    let mut gx = 0.0f32;
    let mut gy = 0.0f32;
    for (i, row) in rows.iter().enumerate() {
        for j in 0..3 {
            let v = row[j] as f32;
            gx += GX[i][j] * v;
            gy += GY[i][j] * v;
        }
    }
    (gx, gy)
}

/// Directional responses `(gx, gy)` centred at interior pixel (x, y).
///
/// # Panics
/// Panics unless `1 <= x < width-1` and `1 <= y < height-1`.
pub fn gradient_at(src: &Image<u8>, x: usize, y: usize) -> (f32, f32) {
    assert!(
        is_interior(src.width(), src.height(), x, y),
        "({x},{y}) is not an interior pixel of a {}×{} image",
        src.width(),
        src.height(),
    );
    gradient_of(
        &src.row(y - 1)[x - 1..x + 2],
        &src.row(y)[x - 1..x + 2],
        &src.row(y + 1)[x - 1..x + 2],
    )
}

/// Euclidean magnitude of the two responses, rounded and saturated to u8.
#[inline(always)]
pub fn magnitude_to_u8(gx: f32, gy: f32) -> u8 {
    u8::from_f32((gx * gx + gy * gy).sqrt())
}

/// True when (x, y) has a full 3×3 neighbourhood.
#[inline]
pub fn is_interior(width: usize, height: usize, x: usize, y: usize) -> bool {
    x >= RADIUS && y >= RADIUS && x + RADIUS < width && y + RADIUS < height
}

/// Dimensions `(width, height)` of the interior region. Zero when the
/// image is narrower or shorter than 3 pixels.
#[inline]
pub fn interior_dims(width: usize, height: usize) -> (usize, usize) {
    (
        width.saturating_sub(2 * RADIUS),
        height.saturating_sub(2 * RADIUS),
    )
}

/// Sequential scalar Sobel magnitude over the whole image.
///
/// Output has the source's dimensions; border pixels are 0. Used as the
/// verification reference for every backend.
pub fn sobel_reference(src: &Image<u8>) -> Image<u8> {
    let (w, h) = (src.width(), src.height());
    let mut dst = Image::<u8>::new(w, h);
    let (iw, ih) = interior_dims(w, h);
    for y in RADIUS..RADIUS + ih {
        for x in RADIUS..RADIUS + iw {
            let (gx, gy) = gradient_at(src, x, y);
            dst.set(x, y, magnitude_to_u8(gx, gy));
        }
    }
    dst
}

/// Raw `(gx, gy)` images, zero on the border. Useful for inspecting the
/// directional responses separately from the clamped magnitude.
pub fn gradient_images(src: &Image<u8>) -> (Image<f32>, Image<f32>) {
    let (w, h) = (src.width(), src.height());
    let mut ix = Image::<f32>::new(w, h);
    let mut iy = Image::<f32>::new(w, h);
    let (iw, ih) = interior_dims(w, h);
    for y in RADIUS..RADIUS + ih {
        for x in RADIUS..RADIUS + iw {
            let (gx, gy) = gradient_at(src, x, y);
            ix.set(x, y, gx);
            iy.set(x, y, gy);
        }
    }
    (ix, iy)
}

/// Copy the interior of a full-size output, re-indexed to start at (0, 0).
///
/// A `w × h` input yields `(w-2) × (h-2)`; inputs smaller than 3 in either
/// dimension yield an empty image.
pub fn crop_interior<T: Pixel>(full: &Image<T>) -> Image<T> {
    let (iw, ih) = interior_dims(full.width(), full.height());
    if iw == 0 || ih == 0 {
        return Image::new(0, 0);
    }
    full.crop(RADIUS, RADIUS, iw, ih)
}
