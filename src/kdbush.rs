/// Projected `[x, y]` coordinates of an indexed node.
pub type Coords = [f64; 2];

/// Selection ranges wider than this are narrowed with a Floyd-Rivest sample first.
const SELECT_SAMPLE_THRESHOLD: usize = 600;

/// A static spatial index for 2D points based on a flat KD-tree.
///
/// The tree is bulk-built once from a fixed set of points and never updated.
/// Query results are indices into the slice the index was built from, reported
/// in tree traversal order, which is fully determined by the input order.
#[derive(Clone, Debug, Default)]
pub struct KDBush {
    /// Maximum number of points scanned linearly in a leaf node.
    node_size: usize,

    /// Input indices, permuted into KD-tree order.
    ids: Vec<usize>,

    /// Coordinates, permuted alongside `ids`.
    coords: Vec<Coords>,
}

impl KDBush {
    /// Build the index over `points`.
    ///
    /// # Arguments
    ///
    /// - `points`: Coordinates to index; their position in the iterator becomes their id.
    /// - `node_size`: Maximum number of points in a leaf node. Values below 1 are raised to 1.
    pub fn new<I>(points: I, node_size: usize) -> Self
    where
        I: IntoIterator<Item = Coords>,
    {
        let coords: Vec<Coords> = points.into_iter().collect();
        let mut index = KDBush {
            node_size: node_size.max(1),
            ids: (0..coords.len()).collect(),
            coords,
        };

        if !index.ids.is_empty() {
            index.sort(0, index.ids.len() - 1, 0);
        }

        index
    }

    /// Number of indexed points.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the index holds no points.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Find the ids of all points inside the axis-aligned rectangle (bounds inclusive).
    pub fn range(&self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Vec<usize> {
        let mut result = Vec::new();

        if self.ids.is_empty() {
            return result;
        }

        let inside = |[x, y]: Coords| x >= min_x && x <= max_x && y >= min_y && y <= max_y;
        let mut stack = vec![(0, self.ids.len() - 1, 0)];

        while let Some((left, right, axis)) = stack.pop() {
            if right - left <= self.node_size {
                for i in left..=right {
                    if inside(self.coords[i]) {
                        result.push(self.ids[i]);
                    }
                }
                continue;
            }

            let m = (left + right) >> 1;
            let point = self.coords[m];

            if inside(point) {
                result.push(self.ids[m]);
            }

            let (lower, upper) = if axis == 0 { (min_x, max_x) } else { (min_y, max_y) };

            if lower <= point[axis] {
                stack.push((left, m - 1, 1 - axis));
            }
            if upper >= point[axis] {
                stack.push((m + 1, right, 1 - axis));
            }
        }

        result
    }

    /// Find the ids of all points within `radius` (inclusive) of `(qx, qy)`.
    pub fn within(&self, qx: f64, qy: f64, radius: f64) -> Vec<usize> {
        let mut result = Vec::new();

        if self.ids.is_empty() {
            return result;
        }

        let r2 = radius * radius;
        let query = [qx, qy];
        let mut stack = vec![(0, self.ids.len() - 1, 0)];

        while let Some((left, right, axis)) = stack.pop() {
            if right - left <= self.node_size {
                for i in left..=right {
                    if sq_dist(self.coords[i], query) <= r2 {
                        result.push(self.ids[i]);
                    }
                }
                continue;
            }

            let m = (left + right) >> 1;
            let point = self.coords[m];

            if sq_dist(point, query) <= r2 {
                result.push(self.ids[m]);
            }

            if query[axis] - radius <= point[axis] {
                stack.push((left, m - 1, 1 - axis));
            }
            if query[axis] + radius >= point[axis] {
                stack.push((m + 1, right, 1 - axis));
            }
        }

        result
    }

    /// Recursively partition `left..=right` around its median, alternating axes.
    fn sort(&mut self, left: usize, right: usize, axis: usize) {
        if right - left <= self.node_size {
            return;
        }

        let m = (left + right) >> 1;

        self.select(m, left, right, axis);

        self.sort(left, m - 1, 1 - axis);
        self.sort(m + 1, right, 1 - axis);
    }

    /// Rearrange `left..=right` so that the k-th element along `axis` lands at
    /// position `k`, smaller values before it and larger ones after.
    fn select(&mut self, k: usize, mut left: usize, mut right: usize, axis: usize) {
        while right > left {
            if right - left > SELECT_SAMPLE_THRESHOLD {
                let n = (right - left + 1) as f64;
                let m = (k - left + 1) as f64;
                let z = n.ln();
                let s = 0.5 * (2.0 * z / 3.0).exp();
                let sign = if m - n / 2.0 < 0.0 { -1.0 } else { 1.0 };
                let sd = 0.5 * (z * s * (n - s) / n).sqrt() * sign;
                let new_left = ((k as f64) - m * s / n + sd).floor().max(0.0) as usize;
                let new_right = ((k as f64) + (n - m) * s / n + sd).floor().max(0.0) as usize;

                self.select(k, left.max(new_left), right.min(new_right), axis);
            }

            let t = self.coords[k][axis];
            let mut i = left;
            let mut j = right;

            self.swap_item(left, k);

            if self.coords[right][axis] > t {
                self.swap_item(left, right);
            }

            while i < j {
                self.swap_item(i, j);

                i += 1;
                j -= 1;

                while self.coords[i][axis] < t {
                    i += 1;
                }
                while self.coords[j][axis] > t {
                    j -= 1;
                }
            }

            if self.coords[left][axis] == t {
                self.swap_item(left, j);
            } else {
                j += 1;
                self.swap_item(j, right);
            }

            if j <= k {
                left = j + 1;
            }
            if k <= j {
                match j.checked_sub(1) {
                    Some(new_right) => right = new_right,
                    None => break,
                }
            }
        }
    }

    fn swap_item(&mut self, i: usize, j: usize) {
        self.ids.swap(i, j);
        self.coords.swap(i, j);
    }
}

/// Squared Euclidean distance between two points.
fn sq_dist(a: Coords, b: Coords) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];

    dx * dx + dy * dy
}
