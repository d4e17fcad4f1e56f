//! Draw located change regions onto a page for human review.

use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::cluster::BoundingBox;

/// Outline colour for change boxes.
pub const BOX_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);

/// Return a copy of `page` with each box outlined in [`BOX_COLOR`].
#[must_use]
pub fn outline_regions(page: &RgbaImage, boxes: &[BoundingBox]) -> RgbaImage {
    let mut annotated = page.clone();
    for b in boxes {
        let rect = Rect::at(to_i32(b.x_min), to_i32(b.y_min)).of_size(b.width(), b.height());
        draw_hollow_rect_mut(&mut annotated, rect, BOX_COLOR);
    }
    annotated
}

fn to_i32(v: u32) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}
