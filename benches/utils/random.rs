use geo::Rect;
use rand::Rng;

use convex_layers::Point;

#[inline]
pub fn uniform_point<R: Rng>(rng: &mut R, id: i64, bounds: Rect<f64>) -> Point {
    let dims = bounds.max() - bounds.min();
    Point::new(
        id,
        bounds.min().x + dims.x * rng.gen::<f64>(),
        bounds.min().y + dims.y * rng.gen::<f64>(),
    )
}

pub fn uniform_points<R: Rng>(rng: &mut R, count: usize, bounds: Rect<f64>) -> Vec<Point> {
    (0..count)
        .map(|i| uniform_point(rng, i as i64, bounds))
        .collect()
}
