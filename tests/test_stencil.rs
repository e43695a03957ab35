// tests/test_stencil.rs — End-to-end Sobel behaviour through the public API:
// host backend + run_once + crop_interior, checked against hand-computed
// values and the scalar reference.

use edgebench::host::HostDevice;
use edgebench::image::Image;
use edgebench::lifecycle::{run_once, PhaseTimings};
use edgebench::stencil::{crop_interior, gradient_images, sobel_reference};
use edgebench::tiling::TileSize;

fn sobel(img: &Image<u8>, tile: TileSize) -> Image<u8> {
    let mut t = PhaseTimings::default();
    run_once(&HostDevice::new(), img, tile, &mut t).unwrap()
}

fn sobel_cropped(img: &Image<u8>) -> Image<u8> {
    crop_interior(&sobel(img, TileSize::DEFAULT))
}

/// Deterministic pseudo-random texture.
fn noise(w: usize, h: usize, seed: u32) -> Image<u8> {
    let mut s = seed.wrapping_mul(2_654_435_761).max(1);
    let data = (0..w * h)
        .map(|_| {
            s ^= s << 13;
            s ^= s >> 17;
            s ^= s << 5;
            (s >> 24) as u8
        })
        .collect();
    Image::from_vec(w, h, data)
}

// ===== Shape =====

#[test]
fn output_is_interior_sized() {
    for (w, h) in [(3, 3), (4, 7), (64, 2), (65, 3), (130, 17)] {
        let out = sobel_cropped(&noise(w, h, 1));
        assert_eq!((out.width(), out.height()), (w - 2, h - 2), "{w}×{h}");
    }
}

#[test]
fn tiny_images_produce_no_output() {
    for (w, h) in [(0, 0), (1, 1), (2, 2), (1, 9), (9, 2)] {
        let full = sobel(&Image::filled(w, h, 77), TileSize::DEFAULT);
        assert_eq!((full.width(), full.height()), (w, h));
        assert!(full.as_slice().iter().all(|&v| v == 0));
        assert!(crop_interior(&full).is_empty());
    }
}

// ===== Values =====

#[test]
fn flat_image_has_zero_magnitude() {
    let out = sobel_cropped(&Image::filled(20, 10, 200));
    assert!(out.as_slice().iter().all(|&v| v == 0));
}

#[test]
fn vertical_step_saturates_along_the_edge() {
    // Columns 0..4 dark, 4..8 bright.
    let mut img = Image::<u8>::new(8, 5);
    for y in 0..5 {
        for x in 4..8 {
            img.set(x, y, 255);
        }
    }
    let full = sobel(&img, TileSize::DEFAULT);
    for y in 1..4 {
        for x in 1..7 {
            let expected = if x == 3 || x == 4 { 255 } else { 0 };
            assert_eq!(full.get(x, y), expected, "({x},{y})");
        }
    }

    let (gx, gy) = gradient_images(&img);
    assert_eq!(gx.get(3, 2), 1020.0);
    assert_eq!(gy.get(3, 2), 0.0);
}

#[test]
fn single_dark_pixel_lights_its_eight_neighbours() {
    // 6×6 of 100 with one 0 at (3,3).
    let mut img = Image::filled(6, 6, 100u8);
    img.set(3, 3, 0);
    let full = sobel(&img, TileSize::DEFAULT);

    for y in 1..5 {
        for x in 1..5 {
            let dx = x as i32 - 3;
            let dy = y as i32 - 3;
            let neighbour = dx.abs() <= 1 && dy.abs() <= 1 && (dx, dy) != (0, 0);
            let v = full.get(x, y);
            assert_eq!(v != 0, neighbour, "({x},{y}) = {v}");
        }
    }
    // Edge-adjacent: one weight-2 term. Diagonal: weight 1 in both.
    assert_eq!(full.get(2, 3), 200);
    assert_eq!(full.get(3, 2), 200);
    assert_eq!(full.get(2, 2), 141);
    assert_eq!(full.get(3, 3), 0);

    let out = crop_interior(&full);
    assert_eq!(out.get(1, 2), 200);
}

#[test]
fn border_pixels_are_never_centres() {
    let mut img = noise(12, 9, 5);
    let before = sobel(&img, TileSize::DEFAULT);
    for x in 0..12 {
        assert_eq!(before.get(x, 0), 0);
        assert_eq!(before.get(x, 8), 0);
    }
    for y in 0..9 {
        assert_eq!(before.get(0, y), 0);
        assert_eq!(before.get(11, y), 0);
    }

    // Changing a border pixel only affects interior pixels next to it.
    img.set(0, 4, img.get(0, 4).wrapping_add(128));
    let after = sobel(&img, TileSize::DEFAULT);
    for (x, y, v) in after.pixels() {
        if !(x == 1 && (3..=5).contains(&y)) {
            assert_eq!(v, before.get(x, y), "({x},{y}) changed");
        }
    }
}

// ===== Agreement =====

#[test]
fn matches_reference_for_any_tile() {
    let img = noise(97, 41, 9);
    let reference = sobel_reference(&img);
    for (tx, ty) in [(1, 1), (64, 2), (16, 16), (7, 3), (128, 1), (200, 100)] {
        let tile = TileSize::new(tx, ty).unwrap();
        assert_eq!(sobel(&img, tile), reference, "tile {tile}");
    }
}

#[test]
fn repeated_runs_are_identical() {
    let img = noise(50, 30, 3);
    let a = sobel(&img, TileSize::DEFAULT);
    let b = sobel(&img, TileSize::DEFAULT);
    assert_eq!(a, b);
}

#[test]
fn strided_input_matches_packed_input() {
    let packed = noise(10, 6, 11);
    let mut strided = Image::<u8>::new_with_stride(10, 6, 16);
    for (x, y, v) in packed.pixels() {
        strided.set(x, y, v);
    }
    assert_eq!(sobel(&strided, TileSize::DEFAULT), sobel(&packed, TileSize::DEFAULT));
}
