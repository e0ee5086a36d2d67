//! Fixed-edge histogram binning
//!
//! Bins are half open `[e_i, e_{i+1})` except the last, which also takes its
//! upper edge. Values outside the edges and non-finite values are tallied
//! separately, so every input lands in exactly one counter.

/// `num` evenly spaced points from `start` to `stop` inclusive
pub fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (num - 1) as f64;
            let mut points: Vec<f64> = (0..num).map(|i| start + step * i as f64).collect();
            points[num - 1] = stop;
            points
        }
    }
}

/// Counts over fixed bin edges
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    edges: Vec<f64>,
    counts: Vec<u64>,
    underflow: u64,
    overflow: u64,
    non_finite: u64,
}

impl Histogram {
    /// Empty histogram over `edges` (strictly increasing, at least two)
    pub fn new(edges: Vec<f64>) -> anyhow::Result<Self> {
        if edges.len() < 2 {
            anyhow::bail!("A histogram needs at least two bin edges");
        }
        if edges.iter().any(|e| !e.is_finite()) || edges.windows(2).any(|w| w[0] >= w[1]) {
            anyhow::bail!("Bin edges must be finite and strictly increasing");
        }
        let bins = edges.len() - 1;
        Ok(Self {
            edges,
            counts: vec![0; bins],
            underflow: 0,
            overflow: 0,
            non_finite: 0,
        })
    }

    /// Histogram of `values` over `edges`
    pub fn from_values(edges: Vec<f64>, values: &[f32]) -> anyhow::Result<Self> {
        let mut hist = Self::new(edges)?;
        hist.fill(values);
        Ok(hist)
    }

    pub fn fill(&mut self, values: &[f32]) {
        for &v in values {
            self.add(v as f64);
        }
    }

    pub fn add(&mut self, v: f64) {
        if !v.is_finite() {
            self.non_finite += 1;
            return;
        }
        match self.bin_index(v) {
            Some(i) => self.counts[i] += 1,
            None if v < self.edges[0] => self.underflow += 1,
            None => self.overflow += 1,
        }
    }

    /// Bin holding `v`, if it is within the edges
    pub fn bin_index(&self, v: f64) -> Option<usize> {
        let n = self.counts.len();
        let lo = self.edges[0];
        let hi = self.edges[n];
        if !(lo..=hi).contains(&v) {
            return None;
        }
        if v == hi {
            return Some(n - 1);
        }

        // Estimate assuming even spacing, then settle against the real edges
        let mut i = (((v - lo) / (hi - lo)) * n as f64) as usize;
        i = i.min(n - 1);
        while i > 0 && v < self.edges[i] {
            i -= 1;
        }
        while i + 1 < n && v >= self.edges[i + 1] {
            i += 1;
        }
        Some(i)
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn num_bins(&self) -> usize {
        self.counts.len()
    }

    pub fn underflow(&self) -> u64 {
        self.underflow
    }

    pub fn overflow(&self) -> u64 {
        self.overflow
    }

    pub fn non_finite(&self) -> u64 {
        self.non_finite
    }

    /// Values that fell inside the edges
    pub fn in_range(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Finite values seen, in range or not
    pub fn finite_total(&self) -> u64 {
        self.in_range() + self.underflow + self.overflow
    }

    /// Largest bin count
    pub fn max_count(&self) -> u64 {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    /// `(left, right, count)` per bin
    pub fn bins(&self) -> impl Iterator<Item = (f64, f64, u64)> + '_ {
        self.edges
            .windows(2)
            .zip(&self.counts)
            .map(|(w, &c)| (w[0], w[1], c))
    }
}
