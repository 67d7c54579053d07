//! Uniform-grid cell list for 2D neighbor search.
//!
//! Uses sorted-index + cell-offset arrays rather than `HashMap` so a rebuild is
//! a handful of linear passes and queries never chase pointers.

/// Uniform-grid spatial hash for O(1) neighbor cell lookup.
///
/// The grid covers a fixed axis-aligned rectangle. Cell size must be at least
/// the largest query radius so that the 3x3 block of cells around a point
/// contains every candidate. Positions outside the rectangle are clamped into
/// the border cells, so escaped particles are still found, only more slowly.
#[derive(Debug, Clone)]
pub struct NeighborGrid {
    cell_size: f64,
    grid_min: [f64; 2],
    grid_dims: [u32; 2],
    /// Cell index for each particle (parallel to particle arrays).
    cell_indices: Vec<u32>,
    /// Particle indices sorted by cell index.
    sorted_indices: Vec<u32>,
    /// Start offset in `sorted_indices` for each cell.
    cell_offsets: Vec<u32>,
    /// Number of particles in each cell.
    cell_counts: Vec<u32>,
}

impl NeighborGrid {
    /// Create a new neighbor grid covering `[domain_min, domain_max]`.
    ///
    /// `cell_size` should be set to the kernel support radius.
    pub fn new(cell_size: f64, domain_min: [f64; 2], domain_max: [f64; 2]) -> Self {
        assert!(cell_size > 0.0, "cell_size must be positive");
        let dims = [
            ((domain_max[0] - domain_min[0]) / cell_size).ceil().max(1.0) as u32,
            ((domain_max[1] - domain_min[1]) / cell_size).ceil().max(1.0) as u32,
        ];
        let total_cells = (dims[0] as usize) * (dims[1] as usize);
        Self {
            cell_size,
            grid_min: domain_min,
            grid_dims: dims,
            cell_indices: Vec::new(),
            sorted_indices: Vec::new(),
            cell_offsets: vec![0; total_cells],
            cell_counts: vec![0; total_cells],
        }
    }

    /// Build a grid sized to cover every point of the given populations,
    /// padded by `margin` on each side.
    pub fn covering(cell_size: f64, points: &[(&[f64], &[f64])], margin: f64) -> Self {
        let mut lo = [f64::INFINITY; 2];
        let mut hi = [f64::NEG_INFINITY; 2];
        for (xs, ys) in points {
            for (&px, &py) in xs.iter().zip(ys.iter()) {
                lo = [lo[0].min(px), lo[1].min(py)];
                hi = [hi[0].max(px), hi[1].max(py)];
            }
        }
        if !lo[0].is_finite() || !hi[0].is_finite() {
            lo = [0.0; 2];
            hi = [cell_size; 2];
        }
        Self::new(
            cell_size,
            [lo[0] - margin, lo[1] - margin],
            [hi[0] + margin, hi[1] + margin],
        )
    }

    /// Cell edge length.
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Total number of cells in the grid.
    fn total_cells(&self) -> usize {
        (self.grid_dims[0] as usize) * (self.grid_dims[1] as usize)
    }

    /// Map a world-space position to a cell (cx, cy), clamped to grid bounds.
    #[inline]
    fn pos_to_cell(&self, px: f64, py: f64) -> (u32, u32) {
        let cx = ((px - self.grid_min[0]) / self.cell_size)
            .floor()
            .max(0.0)
            .min((self.grid_dims[0] - 1) as f64) as u32;
        let cy = ((py - self.grid_min[1]) / self.cell_size)
            .floor()
            .max(0.0)
            .min((self.grid_dims[1] - 1) as f64) as u32;
        (cx, cy)
    }

    #[inline]
    fn cell_hash(&self, cx: u32, cy: u32) -> u32 {
        cx + cy * self.grid_dims[0]
    }

    /// Rebuild the grid from current particle positions.
    pub fn update(&mut self, x: &[f64], y: &[f64]) {
        let n = x.len();
        debug_assert_eq!(n, y.len());

        let total_cells = self.total_cells();

        // --- 1. Compute cell index for each particle ---
        self.cell_indices.resize(n, 0);
        for i in 0..n {
            let (cx, cy) = self.pos_to_cell(x[i], y[i]);
            self.cell_indices[i] = self.cell_hash(cx, cy);
        }

        // --- 2. Count particles per cell ---
        self.cell_counts.clear();
        self.cell_counts.resize(total_cells, 0);
        for &ci in &self.cell_indices {
            self.cell_counts[ci as usize] += 1;
        }

        // --- 3. Prefix-sum to get cell offsets ---
        self.cell_offsets.clear();
        self.cell_offsets.resize(total_cells, 0);
        let mut running = 0u32;
        for c in 0..total_cells {
            self.cell_offsets[c] = running;
            running += self.cell_counts[c];
        }

        // --- 4. Scatter particle indices into sorted order ---
        self.sorted_indices.resize(n, 0);
        let mut write_heads: Vec<u32> = self.cell_offsets.clone();
        for i in 0..n {
            let ci = self.cell_indices[i] as usize;
            let pos = write_heads[ci] as usize;
            self.sorted_indices[pos] = i as u32;
            write_heads[ci] += 1;
        }
    }

    /// Visit every indexed particle within `radius` of `(px, py)`, in cell order.
    pub fn for_each_near_point<F>(
        &self,
        px: f64,
        py: f64,
        x: &[f64],
        y: &[f64],
        radius: f64,
        mut f: F,
    ) where
        F: FnMut(usize),
    {
        debug_assert!(radius <= self.cell_size * (1.0 + 1.0e-9));
        let (cx, cy) = self.pos_to_cell(px, py);
        let radius_sq = radius * radius;

        for dy in -1i32..=1 {
            let ny = cy as i32 + dy;
            if ny < 0 || ny >= self.grid_dims[1] as i32 {
                continue;
            }
            for dx in -1i32..=1 {
                let nx = cx as i32 + dx;
                if nx < 0 || nx >= self.grid_dims[0] as i32 {
                    continue;
                }
                let cell = self.cell_hash(nx as u32, ny as u32) as usize;
                let start = self.cell_offsets[cell] as usize;
                let count = self.cell_counts[cell] as usize;

                for s in start..start + count {
                    let j = self.sorted_indices[s] as usize;
                    let ddx = px - x[j];
                    let ddy = py - y[j];
                    if ddx * ddx + ddy * ddy <= radius_sq {
                        f(j);
                    }
                }
            }
        }
    }

    /// Iterate over all neighbors of `particle_idx` within `radius`,
    /// excluding the particle itself.
    pub fn for_each_neighbor<F>(
        &self,
        particle_idx: usize,
        x: &[f64],
        y: &[f64],
        radius: f64,
        mut f: F,
    ) where
        F: FnMut(usize),
    {
        self.for_each_near_point(x[particle_idx], y[particle_idx], x, y, radius, |j| {
            if j != particle_idx {
                f(j);
            }
        });
    }
}
