use image::{GrayImage, Luma};
use imageproc::geometry::convex_hull;
use imageproc::point::Point;
use imageproc::region_labelling::{connected_components, Connectivity};

/// Particles smaller than this are dropped as zero-area noise.
pub const MIN_PARTICLE_AREA: i32 = 1;

/// Scalar features measured for one connected blob, all in pixel units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParticleFeatures {
    pub centroid_x: i32,
    pub centroid_y: i32,
    pub area: i32,
    pub convex_hull_area: i32,
    pub bounding_width: i32,
    pub bounding_height: i32,
}

#[derive(Clone)]
struct Accumulator {
    sum_x: i64,
    sum_y: i64,
    count: i64,
    min_x: i32,
    max_x: i32,
    min_y: i32,
    max_y: i32,
    points: Vec<Point<i32>>,
}

impl Accumulator {
    fn new() -> Self {
        Self {
            sum_x: 0,
            sum_y: 0,
            count: 0,
            min_x: i32::MAX,
            max_x: i32::MIN,
            min_y: i32::MAX,
            max_y: i32::MIN,
            points: Vec::new(),
        }
    }

    fn add(&mut self, x: i32, y: i32) {
        self.sum_x += x as i64;
        self.sum_y += y as i64;
        self.count += 1;
        self.min_x = self.min_x.min(x);
        self.max_x = self.max_x.max(x);
        self.min_y = self.min_y.min(y);
        self.max_y = self.max_y.max(y);
        self.points.push(Point::new(x, y));
    }
}

/// Enumerate connected blobs in a binary mask and measure each one. The
/// returned sequence is one complete snapshot of the mask; ordering follows
/// the component labelling (first-encounter raster order).
pub fn measure_particles(mask: &GrayImage) -> Vec<ParticleFeatures> {
    let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));

    let label_count = labels.pixels().map(|p| p.0[0]).max().unwrap_or(0) as usize;
    if label_count == 0 {
        return Vec::new();
    }

    let mut accumulators = vec![Accumulator::new(); label_count];
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label.0[0];
        if label > 0 {
            accumulators[(label - 1) as usize].add(x as i32, y as i32);
        }
    }

    accumulators
        .into_iter()
        .filter(|acc| acc.count >= MIN_PARTICLE_AREA as i64)
        .map(|acc| {
            let area = acc.count as i32;
            ParticleFeatures {
                centroid_x: (acc.sum_x / acc.count) as i32,
                centroid_y: (acc.sum_y / acc.count) as i32,
                area,
                convex_hull_area: hull_area(&acc.points, area),
                bounding_width: acc.max_x - acc.min_x + 1,
                bounding_height: acc.max_y - acc.min_y + 1,
            }
        })
        .collect()
}

/// Lattice-point area of a blob's convex hull: shoelace area of the hull
/// polygon plus the boundary correction, so a solid convex blob's hull area
/// equals its pixel count and ragged blobs measure strictly larger hulls.
/// Degenerate hulls (fewer than 3 vertices) fall back to the pixel count.
fn hull_area(points: &[Point<i32>], pixel_area: i32) -> i32 {
    if points.len() < 3 {
        return pixel_area;
    }

    let hull = convex_hull(points);
    if hull.len() < 3 {
        return pixel_area;
    }

    let mut twice_area: i64 = 0;
    let mut boundary: i64 = 0;
    for (i, a) in hull.iter().enumerate() {
        let b = &hull[(i + 1) % hull.len()];
        twice_area += a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64;
        boundary += gcd((b.x - a.x).unsigned_abs() as i64, (b.y - a.y).unsigned_abs() as i64);
    }

    let lattice_points = (twice_area.abs() + boundary) / 2 + 1;
    (lattice_points as i32).max(pixel_area)
}

fn gcd(a: i64, b: i64) -> i64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}
