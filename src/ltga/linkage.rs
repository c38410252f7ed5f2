//! Linkage learning: mutual-information matrix and linkage-tree clustering.
//!
//! Each generation the population's pairwise mutual information is measured
//! and the variables are clustered bottom-up (UPGMA, size-weighted average
//! linkage) into a linkage tree. The tree's nodes, minus the root, form the
//! family of subsets ([`Fos`]) that drives optimal mixing.
//!
//! Clustering uses a nearest-neighbour chain, which finds the same merges as
//! naive UPGMA in O(L²) time after the O(L²·N) matrix construction.
//!
//! # References
//!
//! - Thierens (2010), "The Linkage Tree Genetic Algorithm", PPSN XI
//! - Murtagh (1983), "A survey of recent advances in hierarchical clustering
//!   algorithms", *The Computer Journal* 26(4)

use super::population::Population;
use crate::random::random_order;
use rand::Rng;

/// Symmetric similarity matrix between clusters.
///
/// Slot `a` initially holds variable `order[a]`. Off-diagonal entries are the
/// mutual information (in bits) between the two variables; the diagonal holds
/// each variable's entropy. Higher values mean stronger linkage, i.e. a
/// smaller clustering distance.
#[derive(Debug, Clone, PartialEq)]
pub struct MiMatrix {
    size: usize,
    values: Vec<f64>,
}

impl MiMatrix {
    /// Computes the matrix from the population's bit statistics.
    pub fn compute(population: &Population, order: &[usize]) -> Self {
        let stats = ColumnStats::new(population, order);
        let rows: Vec<Vec<f64>> = (0..order.len()).map(|a| stats.row(a)).collect();
        Self::from_rows(rows)
    }

    /// Same as [`compute`](Self::compute), with rows spread over the rayon pool.
    #[cfg(feature = "parallel")]
    pub fn compute_par(population: &Population, order: &[usize]) -> Self {
        use rayon::prelude::*;

        let stats = ColumnStats::new(population, order);
        let rows: Vec<Vec<f64>> = (0..order.len())
            .into_par_iter()
            .map(|a| stats.row(a))
            .collect();
        Self::from_rows(rows)
    }

    /// Builds a matrix from explicit values (row-major, `size × size`).
    ///
    /// # Panics
    /// Panics if `values.len() != size * size`.
    pub fn from_values(size: usize, values: Vec<f64>) -> Self {
        assert_eq!(values.len(), size * size, "matrix must be square");
        Self { size, values }
    }

    /// Row `a` of `rows` holds the diagonal followed by entries `a+1..`.
    fn from_rows(rows: Vec<Vec<f64>>) -> Self {
        let size = rows.len();
        let mut matrix = Self {
            size,
            values: vec![0.0; size * size],
        };
        for (a, row) in rows.into_iter().enumerate() {
            for (offset, value) in row.into_iter().enumerate() {
                let b = a + offset;
                matrix.set(a, b, value);
                matrix.set(b, a, value);
            }
        }
        matrix
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, a: usize, b: usize) -> f64 {
        self.values[a * self.size + b]
    }

    fn set(&mut self, a: usize, b: usize, value: f64) {
        self.values[a * self.size + b] = value;
    }

    /// Replaces the similarity of every other cluster to `r0` by the
    /// size-weighted average of its similarities to `r0` and `r1`.
    fn merge_into(&mut self, r0: usize, r1: usize, size0: usize, size1: usize) {
        let total = (size0 + size1) as f64;
        let w0 = size0 as f64 / total;
        let w1 = size1 as f64 / total;
        for i in 0..self.size {
            if i != r0 && i != r1 {
                let value = w0 * self.get(i, r0) + w1 * self.get(i, r1);
                self.set(i, r0, value);
                self.set(r0, i, value);
            }
        }
    }

    /// Moves cluster slot `from` into slot `to` for the first `active` slots.
    fn move_slot(&mut self, from: usize, to: usize, active: usize) {
        for i in 0..active {
            let value = self.get(i, from);
            self.set(i, to, value);
            let value = self.get(i, to);
            self.set(to, i, value);
        }
        let diagonal = self.get(from, from);
        self.set(to, to, diagonal);
    }
}

/// Per-variable column data needed for pairwise entropies.
struct ColumnStats<'a> {
    population: &'a Population,
    order: &'a [usize],
    ones: Vec<usize>,
    n: f64,
}

impl<'a> ColumnStats<'a> {
    fn new(population: &'a Population, order: &'a [usize]) -> Self {
        let ones = order
            .iter()
            .map(|&v| population.iter().filter(|g| g.genes()[v]).count())
            .collect();
        Self {
            population,
            order,
            ones,
            n: population.len() as f64,
        }
    }

    /// Entropy of slot `a` followed by its mutual information with `a+1..`.
    fn row(&self, a: usize) -> Vec<f64> {
        let total = self.population.len();
        let va = self.order[a];
        let h_a = entropy(&[self.ones[a], total - self.ones[a]], self.n);
        let mut row = Vec::with_capacity(self.order.len() - a);
        row.push(h_a);
        for b in (a + 1)..self.order.len() {
            let vb = self.order[b];
            let n11 = self
                .population
                .iter()
                .filter(|g| g.genes()[va] && g.genes()[vb])
                .count();
            let n10 = self.ones[a] - n11;
            let n01 = self.ones[b] - n11;
            let n00 = total - n11 - n10 - n01;
            let h_b = entropy(&[self.ones[b], total - self.ones[b]], self.n);
            let h_ab = entropy(&[n00, n01, n10, n11], self.n);
            row.push((h_a + h_b - h_ab).max(0.0));
        }
        row
    }
}

/// Shannon entropy (bits) of a frequency table over `n` samples.
fn entropy(counts: &[usize], n: f64) -> f64 {
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / n;
            -p * p.log2()
        })
        .sum()
}

/// Family Of Subsets: the ordered variable groups used for mixing.
///
/// Each subset is a sorted list of variable indices in `[0, L)`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Fos {
    length: usize,
    subsets: Vec<Vec<usize>>,
    merges: usize,
}

impl Fos {
    /// Builds an FOS from explicit subsets (for fixed linkage models).
    ///
    /// Indices are sorted and deduplicated; empty subsets are dropped.
    ///
    /// # Panics
    /// Panics if an index is out of range.
    pub fn from_subsets(length: usize, subsets: Vec<Vec<usize>>) -> Self {
        let subsets = subsets
            .into_iter()
            .filter_map(|mut s| {
                assert!(s.iter().all(|&v| v < length), "variable index out of range");
                s.sort_unstable();
                s.dedup();
                (!s.is_empty()).then_some(s)
            })
            .collect();
        Self {
            length,
            subsets,
            merges: 0,
        }
    }

    /// All singletons `{0}, ..., {L-1}` in index order.
    pub fn univariate(length: usize) -> Self {
        Self::from_subsets(length, (0..length).map(|v| vec![v]).collect())
    }

    /// Number of variables `L` the subsets range over.
    pub fn problem_length(&self) -> usize {
        self.length
    }

    pub fn len(&self) -> usize {
        self.subsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subsets.is_empty()
    }

    pub fn get(&self, index: usize) -> &[usize] {
        &self.subsets[index]
    }

    pub fn subsets(&self) -> &[Vec<usize>] {
        &self.subsets
    }

    pub fn iter(&self) -> impl Iterator<Item = &[usize]> {
        self.subsets.iter().map(Vec::as_slice)
    }

    /// Cluster merges performed while building the tree, root included.
    pub fn merges(&self) -> usize {
        self.merges
    }

    /// `true` when the union of all subsets is `{0, ..., L-1}`.
    pub fn covers_all(&self) -> bool {
        let mut seen = vec![false; self.length];
        for &v in self.subsets.iter().flatten() {
            seen[v] = true;
        }
        seen.into_iter().all(|s| s)
    }
}

/// Learns a linkage tree from a population.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkageTreeBuilder {
    include_singletons: bool,
}

impl Default for LinkageTreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkageTreeBuilder {
    /// A builder whose FOS contains the singleton leaves and every internal
    /// node except the root.
    pub fn new() -> Self {
        Self {
            include_singletons: true,
        }
    }

    /// A builder that leaves the singletons out of the FOS (used together
    /// with bit-flip local search, which already covers them).
    pub fn without_singletons() -> Self {
        Self {
            include_singletons: false,
        }
    }

    pub fn includes_singletons(&self) -> bool {
        self.include_singletons
    }

    /// Builds the FOS for `population`.
    ///
    /// # Panics
    /// Panics if the genotypes have length 0.
    pub fn build<R: Rng>(&self, population: &Population, rng: &mut R) -> Fos {
        let order = random_order(population.problem_length(), rng);
        let matrix = MiMatrix::compute(population, &order);
        self.build_from_matrix(matrix, &order, rng)
    }

    /// Clusters a precomputed matrix whose slot `a` holds variable `order[a]`.
    ///
    /// Output order: leaves first (in slot order), then internal nodes in
    /// the order they were merged, so children always precede parents.
    ///
    /// # Panics
    /// Panics if `order` is empty or does not match the matrix size.
    pub fn build_from_matrix<R: Rng>(
        &self,
        mut matrix: MiMatrix,
        order: &[usize],
        rng: &mut R,
    ) -> Fos {
        let length = order.len();
        assert!(length > 0, "cannot build a linkage tree over zero variables");
        assert_eq!(matrix.size(), length, "matrix does not match variable order");

        let mut clusters: Vec<Vec<usize>> = order.iter().map(|&v| vec![v]).collect();
        let mut subsets: Vec<Vec<usize>> = Vec::with_capacity(2 * length);
        if self.include_singletons && length > 1 {
            subsets.extend(clusters.iter().cloned());
        }

        let mut chain = NearestNeighborChain::with_capacity(length);
        let mut merges = 0;
        while clusters.len() > 1 {
            let (r0, r1) = chain.next_pair(&matrix, &clusters, length, rng);
            let merged = union_sorted(&clusters[r0], &clusters[r1]);
            if merged.len() < length {
                subsets.push(merged.clone());
            }
            merges += 1;

            matrix.merge_into(r0, r1, clusters[r0].len(), clusters[r1].len());

            let last = clusters.len() - 1;
            clusters[r0] = merged;
            clusters.swap_remove(r1);
            if r1 < last {
                matrix.move_slot(last, r1, last);
                chain.relabel(last, r1);
            }
        }

        Fos {
            length,
            subsets,
            merges,
        }
    }
}

/// Merges two sorted index lists.
fn union_sorted(a: &[usize], b: &[usize]) -> Vec<usize> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i] < b[j] {
            out.push(a[i]);
            i += 1;
        } else {
            out.push(b[j]);
            j += 1;
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

/// Nearest-neighbour chain over cluster slots.
///
/// The chain survives across merges; only its last three entries (the
/// reciprocal pair) are consumed per merge.
struct NearestNeighborChain {
    chain: Vec<usize>,
}

impl NearestNeighborChain {
    fn with_capacity(n: usize) -> Self {
        Self {
            chain: Vec::with_capacity(n + 2),
        }
    }

    /// Extends the chain until it ends in a reciprocal nearest-neighbour
    /// pair and returns that pair with the lower slot first.
    fn next_pair<R: Rng>(
        &mut self,
        matrix: &MiMatrix,
        clusters: &[Vec<usize>],
        length: usize,
        rng: &mut R,
    ) -> (usize, usize) {
        if self.chain.is_empty() {
            self.chain.push(rng.random_range(0..clusters.len()));
        }
        while self.chain.len() < 3 {
            let last = self.chain[self.chain.len() - 1];
            self.chain.push(nearest_neighbor(last, matrix, clusters, length));
        }

        loop {
            let n = self.chain.len();
            if self.chain[n - 3] == self.chain[n - 1] {
                break;
            }
            let next = nearest_neighbor(self.chain[n - 1], matrix, clusters, length);
            self.chain.push(next);

            // Equal similarity back and forth: close the loop instead of
            // wandering along a plateau.
            let n = self.chain.len();
            let (third, second, last) = (self.chain[n - 3], self.chain[n - 2], self.chain[n - 1]);
            if matrix.get(second, last) == matrix.get(second, third) {
                self.chain[n - 1] = third;
            }
        }

        let n = self.chain.len();
        let (a, b) = (self.chain[n - 1], self.chain[n - 2]);
        self.chain.truncate(n - 3);
        (a.min(b), a.max(b))
    }

    /// Renames slot `from` to `to` after the cluster matrix was compacted.
    fn relabel(&mut self, from: usize, to: usize) {
        for slot in self.chain.iter_mut().filter(|s| **s == from) {
            *slot = to;
        }
    }
}

/// Most similar other cluster; ties go to the smaller cluster, then to the
/// lower slot.
fn nearest_neighbor(
    slot: usize,
    matrix: &MiMatrix,
    clusters: &[Vec<usize>],
    length: usize,
) -> usize {
    let mut result = if slot == 0 { 1 } else { 0 };
    let mut max_score = 0.0;
    let mut min_size = length;
    for (i, cluster) in clusters.iter().enumerate() {
        if i == slot {
            continue;
        }
        let score = matrix.get(slot, i);
        if score > max_score || (score == max_score && cluster.len() < min_size) {
            result = i;
            max_score = score;
            min_size = cluster.len();
        }
    }
    result
}
