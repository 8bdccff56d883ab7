//! Uniform spatial hash grid over 2-D points.
//!
//! Points are bucketed by `floor(coord / cell_size)` on each axis. Queries
//! visit only the buckets overlapping the query region and then filter by the
//! exact predicate, so their cost depends on local density rather than on the
//! total number of points.
//!
//! The cell size is fixed when the grid is built. Grids are meant to be cheap
//! to rebuild (one per classification run, one per frame) rather than resized.
//!
//! # Example
//!
//! ```
//! use tacmap_grid::SpatialHashGrid;
//!
//! let mut grid = SpatialHashGrid::new(10.0);
//! grid.insert((1.0, 1.0));
//! grid.insert((25.0, 3.0));
//!
//! assert_eq!(grid.query_radius(0.0, 0.0, 5.0).len(), 1);
//! assert_eq!(grid.query_nearest(20.0, 0.0, 50.0), Some(&(25.0, 3.0)));
//! ```

use std::collections::HashMap;

/// Anything with a planar position.
pub trait GridPoint {
    /// `(x, y)` coordinates.
    fn position(&self) -> (f64, f64);
}

impl GridPoint for (f64, f64) {
    fn position(&self) -> (f64, f64) {
        *self
    }
}

impl<T: GridPoint> GridPoint for &T {
    fn position(&self) -> (f64, f64) {
        (**self).position()
    }
}

/// Bucket coordinates `(floor(x / cell), floor(y / cell))`.
pub type CellKey = (i64, i64);

/// Fixed-cell-size uniform bucket index.
#[derive(Debug, Clone)]
pub struct SpatialHashGrid<T> {
    cell_size: f64,
    buckets: HashMap<CellKey, Vec<T>>,
    len: usize,
}

impl<T: GridPoint> SpatialHashGrid<T> {
    /// Create an empty grid.
    ///
    /// # Panics
    ///
    /// Panics if `cell_size` is not a finite positive number.
    pub fn new(cell_size: f64) -> Self {
        assert!(
            cell_size.is_finite() && cell_size > 0.0,
            "cell size must be finite and positive, got {cell_size}"
        );
        Self {
            cell_size,
            buckets: HashMap::new(),
            len: 0,
        }
    }

    /// Build a grid from an iterator of points.
    pub fn from_points(cell_size: f64, points: impl IntoIterator<Item = T>) -> Self {
        let mut grid = Self::new(cell_size);
        grid.extend(points);
        grid
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Bucket holding position `(x, y)`.
    pub fn cell_of(&self, x: f64, y: f64) -> CellKey {
        (
            (x / self.cell_size).floor() as i64,
            (y / self.cell_size).floor() as i64,
        )
    }

    /// Append a point to its bucket.
    pub fn insert(&mut self, item: T) {
        let (x, y) = item.position();
        let key = self.cell_of(x, y);
        self.buckets.entry(key).or_default().push(item);
        self.len += 1;
    }

    pub fn extend(&mut self, items: impl IntoIterator<Item = T>) {
        for item in items {
            self.insert(item);
        }
    }

    /// Number of points stored.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of non-empty buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Drop every point, keeping the cell size.
    pub fn clear(&mut self) {
        self.buckets.clear();
        self.len = 0;
    }

    /// Points in one bucket, in insertion order.
    pub fn bucket(&self, key: CellKey) -> &[T] {
        self.buckets.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Non-empty buckets in unspecified order.
    pub fn buckets(&self) -> impl Iterator<Item = (CellKey, &[T])> {
        self.buckets.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    /// Every stored point, in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buckets.values().flatten()
    }

    /// Consume the grid, returning its bucket map.
    pub fn into_buckets(self) -> HashMap<CellKey, Vec<T>> {
        self.buckets
    }

    /// Points within distance `radius` of `(x, y)`, boundary included.
    pub fn query_radius(&self, x: f64, y: f64, radius: f64) -> Vec<&T> {
        if radius.is_nan() || radius < 0.0 {
            return Vec::new();
        }
        let r2 = radius * radius;
        self.candidates(x - radius, y - radius, x + radius, y + radius)
            .filter(|item| {
                let (px, py) = item.position();
                let (dx, dy) = (px - x, py - y);
                dx * dx + dy * dy <= r2
            })
            .collect()
    }

    /// Closest point within `max_radius` of `(x, y)`.
    ///
    /// Ties keep the first point found.
    pub fn query_nearest(&self, x: f64, y: f64, max_radius: f64) -> Option<&T> {
        let distance2 = |item: &T| {
            let (px, py) = item.position();
            (px - x) * (px - x) + (py - y) * (py - y)
        };

        let mut best: Option<(&T, f64)> = None;
        for item in self.query_radius(x, y, max_radius) {
            let d2 = distance2(item);
            if best.map_or(true, |(_, best_d2)| d2 < best_d2) {
                best = Some((item, d2));
            }
        }
        best.map(|(item, _)| item)
    }

    /// Points inside the closed box `[min_x, max_x] x [min_y, max_y]`.
    pub fn query_aabb(&self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Vec<&T> {
        let ordered = min_x <= max_x && min_y <= max_y;
        if !ordered {
            return Vec::new();
        }
        self.candidates(min_x, min_y, max_x, max_y)
            .filter(|item| {
                let (px, py) = item.position();
                px >= min_x && px <= max_x && py >= min_y && py <= max_y
            })
            .collect()
    }

    /// Points in every bucket overlapping the box.
    fn candidates(
        &self,
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
    ) -> Box<dyn Iterator<Item = &T> + '_> {
        let (cx0, cy0) = self.cell_of(min_x, min_y);
        let (cx1, cy1) = self.cell_of(max_x, max_y);

        let span = (cx1 as i128 - cx0 as i128 + 1) * (cy1 as i128 - cy0 as i128 + 1);
        if span > self.buckets.len() as i128 {
            // Region covers more cells than are occupied.
            return Box::new(
                self.buckets
                    .iter()
                    .filter(move |((cx, cy), _)| {
                        (cx0..=cx1).contains(cx) && (cy0..=cy1).contains(cy)
                    })
                    .flat_map(|(_, items)| items.iter()),
            );
        }

        Box::new(
            (cx0..=cx1)
                .flat_map(move |cx| (cy0..=cy1).map(move |cy| (cx, cy)))
                .filter_map(|key| self.buckets.get(&key))
                .flatten(),
        )
    }
}
