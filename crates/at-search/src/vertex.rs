//! Geometric view over candidate points.
//!
//! The simplex strategies work on real-valued coordinate vectors and only
//! snap back onto the space's grid when a vertex is turned into a point for
//! delivery. Every dimension contributes one coordinate: its value for
//! integer and real dimensions, its choice index for enumerated ones.

use rand::Rng;

use at_types::{Perf, Point, Space, Value};

/// A point in coordinate form, augmented with its observed performance.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub id: u32,
    pub coords: Vec<f64>,
    pub perf: Perf,
}

fn raw_coord(v: &Value) -> f64 {
    match v {
        Value::Int(x) => *x as f64,
        Value::Real(x) => *x,
        Value::Str(i) => *i as f64,
    }
}

impl Vertex {
    pub fn new(dims: usize, perf_len: usize) -> Self {
        Self {
            id: 0,
            coords: vec![0.0; dims],
            perf: Perf::reset_with(perf_len),
        }
    }

    /// Adopt a point's terms as coordinates. Performance resets.
    pub fn from_point(point: &Point, perf_len: usize) -> Self {
        Self {
            id: point.id,
            coords: point.terms.iter().map(raw_coord).collect(),
            perf: Perf::reset_with(perf_len),
        }
    }

    /// Overwrite coordinates from a point, keeping this vertex's id.
    pub fn set_from_point(&mut self, point: &Point) {
        self.coords = point.terms.iter().map(raw_coord).collect();
        self.perf.reset();
    }

    /// Snap onto the space grid and produce a deliverable point.
    pub fn to_point(&self, space: &Space) -> Point {
        let terms = space
            .dimensions
            .iter()
            .zip(&self.coords)
            .map(|(d, c)| d.value_at_coord(*c))
            .collect();
        Point::new(self.id, terms)
    }

    /// The geometric center of the space.
    pub fn center(space: &Space, perf_len: usize) -> Self {
        Self {
            id: 0,
            coords: space
                .dimensions
                .iter()
                .map(|d| (d.coord_min() + d.coord_max()) / 2.0)
                .collect(),
            perf: Perf::reset_with(perf_len),
        }
    }

    /// Replace the coordinates with a uniformly random legal position.
    pub fn randomize<R: Rng>(&mut self, space: &Space, rng: &mut R) {
        for (c, d) in self.coords.iter_mut().zip(&space.dimensions) {
            *c = raw_coord(&d.random(rng));
        }
        self.perf.reset();
    }

    /// Euclidean distance between two vertices.
    pub fn dist(&self, other: &Vertex) -> f64 {
        self.coords
            .iter()
            .zip(&other.coords)
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt()
    }

    /// Whether every coordinate lies inside its dimension's interval.
    pub fn in_bounds(&self, space: &Space) -> bool {
        self.coords
            .iter()
            .zip(&space.dimensions)
            .all(|(c, d)| *c >= d.coord_min() && *c <= d.coord_max())
    }

    /// Scale `src` about `pivot`: `pivot + coeff * (src - pivot)`.
    ///
    /// A coefficient of -1 reflects `src` through `pivot`; coefficients in
    /// (0, 1) pull it toward the pivot, greater than 1 push it away.
    pub fn transform(src: &Vertex, pivot: &Vertex, coeff: f64) -> Vertex {
        let coords = src
            .coords
            .iter()
            .zip(&pivot.coords)
            .map(|(s, p)| p + coeff * (s - p))
            .collect();
        Vertex {
            id: 0,
            coords,
            perf: Perf::reset_with(src.perf.len()),
        }
    }
}

/// A set of vertices driven through the space as a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Simplex {
    pub vertices: Vec<Vertex>,
}

impl Simplex {
    pub fn new(size: usize, dims: usize, perf_len: usize) -> Self {
        Self {
            vertices: vec![Vertex::new(dims, perf_len); size],
        }
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Centroid of the vertex set, optionally leaving one vertex out.
    /// Coordinates and objective values both average.
    pub fn centroid(&self, exclude: Option<usize>) -> Vertex {
        let dims = self.vertices[0].coords.len();
        let perf_len = self.vertices[0].perf.len();
        let mut coords = vec![0.0; dims];
        let mut obj = vec![0.0; perf_len];
        let mut count = 0usize;

        for (i, v) in self.vertices.iter().enumerate() {
            if Some(i) == exclude {
                continue;
            }
            for (acc, c) in coords.iter_mut().zip(&v.coords) {
                *acc += c;
            }
            for (acc, o) in obj.iter_mut().zip(&v.perf.obj) {
                *acc += o;
            }
            count += 1;
        }
        for c in &mut coords {
            *c /= count as f64;
        }
        for o in &mut obj {
            *o /= count as f64;
        }
        Vertex {
            id: 0,
            coords,
            perf: Perf::from_vec(obj),
        }
    }

    /// Scale every vertex about the pivot with the same coefficient.
    pub fn transform_all(&self, pivot: &Vertex, coeff: f64) -> Simplex {
        Simplex {
            vertices: self
                .vertices
                .iter()
                .map(|v| Vertex::transform(v, pivot, coeff))
                .collect(),
        }
    }

    /// Whether every vertex snaps onto the same grid point.
    pub fn collapsed(&self, space: &Space) -> bool {
        let first = self.vertices[0].to_point(space);
        self.vertices[1..]
            .iter()
            .all(|v| v.to_point(space).terms == first.terms)
    }

    /// Whether the simplex lies entirely outside the space bounds.
    pub fn out_of_bounds(&self, space: &Space) -> bool {
        self.vertices.iter().all(|v| !v.in_bounds(space))
    }

    /// Initial simplex of uniformly random vertices.
    pub fn random<R: Rng>(size: usize, space: &Space, perf_len: usize, rng: &mut R) -> Simplex {
        let mut simplex = Simplex::new(size, space.len(), perf_len);
        for v in &mut simplex.vertices {
            v.randomize(space, rng);
        }
        simplex
    }

    /// Axis-aligned initial simplex around a center vertex: one vertex per
    /// dimension offset by `percent` of that dimension's span, flipped
    /// inward when the offset would leave the space. Slots beyond the
    /// dimension count fill with random draws inside the same box.
    pub fn from_center_fast<R: Rng>(
        center: &Vertex,
        percent: f64,
        size: usize,
        space: &Space,
        perf_len: usize,
        rng: &mut R,
    ) -> Simplex {
        let dims = space.len();
        let mut simplex = Simplex::new(size, dims, perf_len);
        simplex.vertices[0].coords = center.coords.clone();

        for i in 1..size {
            let mut coords = center.coords.clone();
            if i <= dims {
                let d = space.dim(i - 1);
                let off = percent * (d.coord_max() - d.coord_min());
                let up = coords[i - 1] + off;
                coords[i - 1] = if up <= d.coord_max() {
                    up
                } else {
                    coords[i - 1] - off
                };
            } else {
                sample_box(&mut coords, center, percent, space, rng);
            }
            simplex.vertices[i].coords = coords;
        }
        simplex
    }

    /// Balanced initial simplex around a center vertex: a regular simplex
    /// scaled so each axis spans `percent` of its dimension, then clamped
    /// into bounds. Slots beyond the regular construction fill with random
    /// draws inside the same box.
    pub fn from_center<R: Rng>(
        center: &Vertex,
        percent: f64,
        size: usize,
        space: &Space,
        perf_len: usize,
        rng: &mut R,
    ) -> Simplex {
        let n = space.len();
        let mut simplex = Simplex::new(size, n, perf_len);

        // Regular n-simplex with unit edge: the scaled basis vectors plus
        // one balancing vertex on the main diagonal.
        let mut unit = vec![vec![0.0; n]; n + 1];
        let alpha = (2f64.sqrt() + (2.0 + 2.0 * n as f64).sqrt()) / (2.0 * n as f64);
        for (i, row) in unit.iter_mut().enumerate().skip(1) {
            row[i - 1] = 1.0 / 2f64.sqrt();
        }
        for c in unit[0].iter_mut() {
            *c = alpha;
        }

        // Center the construction on the origin.
        for j in 0..n {
            let mean: f64 = unit.iter().map(|row| row[j]).sum::<f64>() / (n + 1) as f64;
            for row in unit.iter_mut() {
                row[j] -= mean;
            }
        }

        for (i, v) in simplex.vertices.iter_mut().enumerate() {
            if i <= n {
                for j in 0..n {
                    let d = space.dim(j);
                    let span = d.coord_max() - d.coord_min();
                    let extent: f64 = {
                        let lo = unit.iter().map(|r| r[j]).fold(f64::INFINITY, f64::min);
                        let hi = unit.iter().map(|r| r[j]).fold(f64::NEG_INFINITY, f64::max);
                        (hi - lo).max(f64::EPSILON)
                    };
                    let scaled = center.coords[j] + unit[i][j] / extent * percent * span;
                    v.coords[j] = scaled.clamp(d.coord_min(), d.coord_max());
                }
            } else {
                v.coords = center.coords.clone();
                sample_box(&mut v.coords, center, percent, space, rng);
            }
        }
        simplex
    }
}

fn sample_box<R: Rng>(
    coords: &mut [f64],
    center: &Vertex,
    percent: f64,
    space: &Space,
    rng: &mut R,
) {
    for (j, c) in coords.iter_mut().enumerate() {
        let d = space.dim(j);
        let half = percent * (d.coord_max() - d.coord_min()) / 2.0;
        let lo = (center.coords[j] - half).max(d.coord_min());
        let hi = (center.coords[j] + half).min(d.coord_max());
        *c = if hi > lo { rng.gen_range(lo..=hi) } else { lo };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn square() -> Space {
        Space::new().add_real("x", 0.0, 10.0).add_real("y", 0.0, 10.0)
    }

    #[test]
    fn transform_reflects_through_pivot() {
        let mut a = Vertex::new(2, 1);
        a.coords = vec![1.0, 2.0];
        let mut p = Vertex::new(2, 1);
        p.coords = vec![3.0, 3.0];

        let reflected = Vertex::transform(&a, &p, -1.0);
        assert_eq!(reflected.coords, vec![5.0, 4.0]);

        let shrunk = Vertex::transform(&a, &p, 0.5);
        assert_eq!(shrunk.coords, vec![2.0, 2.5]);

        let expanded = Vertex::transform(&a, &p, 2.0);
        assert_eq!(expanded.coords, vec![-1.0, 1.0]);
    }

    #[test]
    fn centroid_excludes_requested_vertex() {
        let mut s = Simplex::new(3, 1, 1);
        s.vertices[0].coords = vec![0.0];
        s.vertices[1].coords = vec![2.0];
        s.vertices[2].coords = vec![10.0];
        for (i, v) in s.vertices.iter_mut().enumerate() {
            v.perf = Perf::scalar(i as f64);
        }

        let full = s.centroid(None);
        assert!((full.coords[0] - 4.0).abs() < 1e-12);
        assert!((full.perf.obj[0] - 1.0).abs() < 1e-12);

        let partial = s.centroid(Some(2));
        assert!((partial.coords[0] - 1.0).abs() < 1e-12);
        assert!((partial.perf.obj[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn collapse_on_integer_grid() {
        let space = Space::new().add_int("i", 0, 10, 1);
        let mut s = Simplex::new(2, 1, 1);
        s.vertices[0].coords = vec![4.9];
        s.vertices[1].coords = vec![5.1];
        assert!(s.collapsed(&space));
        s.vertices[1].coords = vec![5.6];
        assert!(!s.collapsed(&space));
    }

    #[test]
    fn out_of_bounds_means_every_vertex() {
        let space = square();
        let mut s = Simplex::new(2, 2, 1);
        s.vertices[0].coords = vec![-5.0, -5.0];
        s.vertices[1].coords = vec![5.0, 5.0];
        assert!(!s.out_of_bounds(&space));
        s.vertices[1].coords = vec![15.0, 3.0];
        assert!(s.out_of_bounds(&space));
    }

    #[test]
    fn to_point_snaps_to_grid() {
        let space = Space::new()
            .add_int("i", 0, 10, 2)
            .add_enum("e", vec!["a".into(), "b".into()]);
        let mut v = Vertex::new(2, 1);
        v.id = 9;
        v.coords = vec![5.2, 0.9];
        let p = v.to_point(&space);
        assert_eq!(p.id, 9);
        assert_eq!(p.terms, vec![Value::Int(6), Value::Str(1)]);
        assert!(space.contains(&p));
    }

    #[test]
    fn balanced_simplex_has_equal_edges_on_uniform_space() {
        let space = square();
        let center = Vertex::center(&space, 1);
        let mut rng = StdRng::seed_from_u64(1);
        let s = Simplex::from_center(&center, 0.35, 3, &space, 1, &mut rng);

        let d01 = s.vertices[0].dist(&s.vertices[1]);
        let d02 = s.vertices[0].dist(&s.vertices[2]);
        let d12 = s.vertices[1].dist(&s.vertices[2]);
        assert!((d01 - d02).abs() < 1e-9, "{d01} vs {d02}");
        assert!((d01 - d12).abs() < 1e-9, "{d01} vs {d12}");
        for v in &s.vertices {
            assert!(v.in_bounds(&space));
        }
    }

    #[test]
    fn fast_simplex_offsets_each_axis() {
        let space = square();
        let center = Vertex::center(&space, 1);
        let mut rng = StdRng::seed_from_u64(2);
        let s = Simplex::from_center_fast(&center, 0.2, 3, &space, 1, &mut rng);

        assert_eq!(s.vertices[0].coords, vec![5.0, 5.0]);
        assert_eq!(s.vertices[1].coords, vec![7.0, 5.0]);
        assert_eq!(s.vertices[2].coords, vec![5.0, 7.0]);
    }

    #[test]
    fn oversized_simplex_fills_extra_slots_in_bounds() {
        let space = square();
        let center = Vertex::center(&space, 1);
        let mut rng = StdRng::seed_from_u64(3);
        let s = Simplex::from_center(&center, 0.5, 6, &space, 1, &mut rng);
        assert_eq!(s.len(), 6);
        for v in &s.vertices {
            assert!(v.in_bounds(&space));
        }
    }
}
