/*
 * SPDX-FileCopyrightText: 2022 William Swartzendruber <wswartzendruber@gmail.com>
 *
 * SPDX-License-Identifier: CC0-1.0
 */

use super::*;

#[test]
fn test_rect_union() {

    let a = Rect { x: 10, y: 10, width: 20, height: 20 };
    let b = Rect { x: 40, y: 0, width: 10, height: 15 };

    assert_eq!(a.union(b), Rect { x: 10, y: 0, width: 40, height: 30 });
    assert_eq!(a.union(a), a);
}

#[test]
fn test_rect_intersection() {

    let a = Rect { x: 0, y: 0, width: 20, height: 20 };
    let b = Rect { x: 10, y: 10, width: 20, height: 20 };
    let c = Rect { x: 30, y: 30, width: 5, height: 5 };

    assert_eq!(a.intersection(b), Some(Rect { x: 10, y: 10, width: 10, height: 10 }));
    assert_eq!(a.intersection(c), None);

    // Rectangles that only share an edge do not intersect.

    let d = Rect { x: 20, y: 0, width: 5, height: 20 };

    assert_eq!(a.intersection(d), None);
}

#[test]
fn test_copy_export_round_trip() {

    let size = Size { width: 8, height: 8 };
    let mut canvas = ImageBuffer::new(size);
    let crop = Rect { x: 2, y: 3, width: 4, height: 2 };
    let frame = solid_frame(size, [1, 2, 3, 4]);

    canvas.copy_from(&frame, size, crop).unwrap();

    let exported = canvas.export(crop).unwrap();

    assert_eq!(exported.len(), 4 * 2 * 4);
    assert!(exported.chunks_exact(4).all(|px| px == [1, 2, 3, 4]));

    // Pixels outside the crop stay transparent.

    let outside = canvas.export(Rect { x: 0, y: 0, width: 2, height: 2 }).unwrap();

    assert!(outside.iter().all(|&value| value == 0));
}

#[test]
fn test_restore_repaints_region() {

    let size = Size { width: 4, height: 4 };
    let mut canvas = ImageBuffer::new(size);
    let region = Rect { x: 1, y: 1, width: 2, height: 2 };
    let rows = vec![9u8; 2 * 2 * 4];

    canvas.restore(region, &rows).unwrap();
    assert_eq!(canvas.export(region).unwrap(), rows);

    assert!(matches!(
        canvas.restore(region, &rows[..8]),
        Err(ImageError::SizeMismatch),
    ));
}

#[test]
fn test_erase_clears_and_clips() {

    let size = Size { width: 4, height: 4 };
    let mut canvas = ImageBuffer::new(size);
    let all = Rect { x: 0, y: 0, width: 4, height: 4 };

    canvas.restore(all, &vec![7u8; 4 * 4 * 4]).unwrap();

    // Erasing a region that hangs off the canvas only clears the part inside it.

    canvas.erase(Rect { x: 2, y: 2, width: 10, height: 10 });

    let pixels = canvas.export(all).unwrap();

    for y in 0..4 {
        for x in 0..4 {
            let at = (y * 4 + x) * 4;
            let expected = if x >= 2 && y >= 2 { 0 } else { 7 };
            assert_eq!(pixels[at], expected, "pixel at {},{}", x, y);
        }
    }
}

#[test]
fn test_out_of_bounds_region_is_refused() {

    let size = Size { width: 4, height: 4 };
    let canvas = ImageBuffer::new(size);

    assert!(matches!(
        canvas.export(Rect { x: 2, y: 2, width: 4, height: 4 }),
        Err(ImageError::RegionOutOfBounds),
    ));
}

fn solid_frame(size: Size, pixel: [u8; 4]) -> Vec<u8> {

    let mut data = Vec::with_capacity(size.area() as usize * 4);

    for _ in 0..size.area() {
        data.extend_from_slice(&pixel);
    }

    data
}
