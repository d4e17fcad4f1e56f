//! Locate regions of change in a difference raster.
//!
//! The nonzero pixels of a difference raster are grouped with k-means,
//! growing k from 1 until the mean distance of each pixel to its
//! centroid drops to the distortion threshold or k reaches its cap.
//! Each centroid becomes a fixed-size square box for display.
//!
//! This is a presentation aid only. Whether a page changed is decided
//! by [`crate::diff`]; nothing here feeds back into the results.
//!
//! # Determinism
//!
//! Seeding is farthest-first in raster order rather than random, so the
//! same raster always yields the same boxes. Other k-means
//! implementations may place boxes differently for the same input.
//!
//! Dense rasters are thinned before clustering: at most
//! [`MAX_POINTS`] changed pixels are kept, taken at a fixed stride in
//! raster order. Reflowed text can change tens of thousands of pixels
//! per page; clustering all of them costs far more than boxes for a
//! reviewer are worth, and the strided subset keeps the same shape.

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::types::Point;

/// Tuning for [`locate_changes`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Stop growing k once the mean point-to-centroid distance (pixels)
    /// is at or below this value.
    pub distortion_threshold: f64,
    /// Half the side length of each emitted box, in pixels.
    pub half_width: u32,
    /// Hard cap on k. The effective cap is also bounded by the number
    /// of changed pixels.
    pub max_clusters: usize,
}

impl ClusterConfig {
    /// Default distortion threshold in pixels.
    pub const DEFAULT_DISTORTION_THRESHOLD: f64 = 15.0;
    /// Default box half-width in pixels.
    pub const DEFAULT_HALF_WIDTH: u32 = 25;
    /// Default cap on the number of clusters.
    pub const DEFAULT_MAX_CLUSTERS: usize = 64;
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            distortion_threshold: Self::DEFAULT_DISTORTION_THRESHOLD,
            half_width: Self::DEFAULT_HALF_WIDTH,
            max_clusters: Self::DEFAULT_MAX_CLUSTERS,
        }
    }
}

/// Upper bound on Lloyd iterations for a single k.
const MAX_ITERATIONS: usize = 64;

/// Most changed pixels fed to k-means for one raster.
pub const MAX_POINTS: usize = 4096;

/// An axis-aligned box in pixel coordinates, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Leftmost column.
    pub x_min: u32,
    /// Topmost row.
    pub y_min: u32,
    /// Rightmost column.
    pub x_max: u32,
    /// Bottom row.
    pub y_max: u32,
}

impl BoundingBox {
    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.x_max - self.x_min + 1
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.y_max - self.y_min + 1
    }

    /// Square of side `2 * half_width + 1` centred on `center`, clipped
    /// to a `width` x `height` raster.
    fn around(center: Point, half_width: u32, width: u32, height: u32) -> Self {
        let cx = clamp_coordinate(center.x, width);
        let cy = clamp_coordinate(center.y, height);
        Self {
            x_min: cx.saturating_sub(half_width),
            y_min: cy.saturating_sub(half_width),
            x_max: cx.saturating_add(half_width).min(width - 1),
            y_max: cy.saturating_add(half_width).min(height - 1),
        }
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn clamp_coordinate(value: f64, extent: u32) -> u32 {
    value.round().clamp(0.0, f64::from(extent - 1)) as u32
}

/// Result of one k-means run.
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    /// Cluster centres.
    pub centroids: Vec<Point>,
    /// Mean Euclidean distance from each point to its nearest centroid.
    pub distortion: f64,
}

/// Coordinates of every nonzero pixel, in raster order.
#[must_use]
pub fn changed_pixels(diff: &RgbImage) -> Vec<Point> {
    diff.enumerate_pixels()
        .filter(|(_, _, p)| p.0 != [0, 0, 0])
        .map(|(x, y, _)| Point::new(f64::from(x), f64::from(y)))
        .collect()
}

/// Run k-means on `points` with farthest-first seeding.
///
/// `k` is clamped to `1..=points.len()`. Returns an empty clustering
/// for no points.
#[must_use]
pub fn kmeans(points: &[Point], k: usize) -> Clustering {
    if points.is_empty() {
        return Clustering {
            centroids: Vec::new(),
            distortion: 0.0,
        };
    }
    let k = k.clamp(1, points.len());

    let mut centroids = seed_farthest_first(points, k);
    let mut assignment = vec![usize::MAX; points.len()];

    for _ in 0..MAX_ITERATIONS {
        let mut moved = false;
        for (slot, &p) in assignment.iter_mut().zip(points) {
            let nearest = nearest_centroid(p, &centroids).0;
            if *slot != nearest {
                *slot = nearest;
                moved = true;
            }
        }
        if !moved {
            break;
        }

        let mut sums = vec![(0.0_f64, 0.0_f64, 0_usize); k];
        for (&c, p) in assignment.iter().zip(points) {
            sums[c].0 += p.x;
            sums[c].1 += p.y;
            sums[c].2 += 1;
        }
        for (centroid, &(sx, sy, n)) in centroids.iter_mut().zip(&sums) {
            // An emptied cluster keeps its previous centre.
            if n > 0 {
                #[allow(clippy::cast_precision_loss)]
                let n = n as f64;
                *centroid = Point::new(sx / n, sy / n);
            }
        }
    }

    let total: f64 = points.iter().map(|&p| nearest_centroid(p, &centroids).1).sum();
    #[allow(clippy::cast_precision_loss)]
    let distortion = total / points.len() as f64;
    Clustering {
        centroids,
        distortion,
    }
}

/// Every `stride`-th point, with the stride chosen so at most
/// `budget` points remain. The first point is always kept.
#[must_use]
pub fn thin_points(points: Vec<Point>, budget: usize) -> Vec<Point> {
    if points.len() <= budget {
        return points;
    }
    let stride = points.len().div_ceil(budget.max(1));
    points.into_iter().step_by(stride).collect()
}

/// Cluster the changed pixels of `diff`, growing k until the
/// distortion threshold or the cap is reached.
///
/// Pixels are thinned to [`MAX_POINTS`] first. The cap is
/// `min(config.max_clusters, clustered point count)`, so the loop
/// always terminates: once every point is its own centroid the
/// distortion is zero.
#[must_use]
pub fn cluster_changes(diff: &RgbImage, config: &ClusterConfig) -> Clustering {
    let points = thin_points(changed_pixels(diff), MAX_POINTS);
    let cap = config.max_clusters.max(1).min(points.len());

    let mut k = 1;
    let mut clustering = kmeans(&points, k);
    while clustering.distortion > config.distortion_threshold && k < cap {
        k += 1;
        clustering = kmeans(&points, k);
    }
    clustering
}

/// Boxes around the regions of change in `diff`. Empty if nothing
/// changed.
#[must_use]
pub fn locate_changes(diff: &RgbImage, config: &ClusterConfig) -> Vec<BoundingBox> {
    let (width, height) = diff.dimensions();
    if width == 0 || height == 0 {
        return Vec::new();
    }
    cluster_changes(diff, config)
        .centroids
        .into_iter()
        .map(|c| BoundingBox::around(c, config.half_width, width, height))
        .collect()
}

/// First seed is the first point in raster order; each further seed is
/// the point farthest from all seeds chosen so far.
fn seed_farthest_first(points: &[Point], k: usize) -> Vec<Point> {
    let mut seeds = Vec::with_capacity(k);
    seeds.push(points[0]);
    let mut nearest_sq: Vec<f64> = points
        .iter()
        .map(|p| p.distance_squared(points[0]))
        .collect();

    while seeds.len() < k {
        let (idx, _) = nearest_sq
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (i, &d)| {
                if d > best.1 { (i, d) } else { best }
            });
        let seed = points[idx];
        seeds.push(seed);
        for (d, p) in nearest_sq.iter_mut().zip(points) {
            *d = d.min(p.distance_squared(seed));
        }
    }
    seeds
}

/// Index of and distance to the closest centroid. Ties go to the lower
/// index.
fn nearest_centroid(p: Point, centroids: &[Point]) -> (usize, f64) {
    let (idx, dist_sq) = centroids
        .iter()
        .enumerate()
        .map(|(i, c)| (i, p.distance_squared(*c)))
        .fold((0, f64::INFINITY), |best, cur| {
            if cur.1 < best.1 { cur } else { best }
        });
    (idx, dist_sq.sqrt())
}
