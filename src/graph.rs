//! Ragged per-cell index lists and the iCAR neighborhood graph.

use crate::error::IcarError;

/// Jagged array stored as one flat buffer plus row offsets.
///
/// Row `i` occupies `values[offsets[i]..offsets[i + 1]]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ragged {
    offsets: Vec<usize>,
    values: Vec<usize>,
}

impl Ragged {
    /// Build from per-row lengths and the concatenated rows.
    ///
    /// # Errors
    /// [`IcarError::LengthMismatch`] if the lengths do not sum to `values.len()`.
    pub fn from_lengths(lengths: &[usize], values: Vec<usize>) -> Result<Self, IcarError> {
        let mut offsets = Vec::with_capacity(lengths.len() + 1);
        offsets.push(0);
        let mut end = 0usize;
        for &len in lengths {
            end += len;
            offsets.push(end);
        }
        if end != values.len() {
            return Err(IcarError::LengthMismatch {
                name: "flattened neighbor list",
                expected: end,
                found: values.len(),
            });
        }
        Ok(Self { offsets, values })
    }

    /// Build from one `Vec` per row.
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<[usize]>,
    {
        let mut offsets = vec![0];
        let mut values = Vec::new();
        for row in rows {
            values.extend_from_slice(row.as_ref());
            offsets.push(values.len());
        }
        Self { offsets, values }
    }

    /// Group item indices by their key: row `k` lists, in increasing order,
    /// every `j` with `keys[j] == k`. Keys must be `< n_rows`.
    pub(crate) fn group(keys: &[usize], n_rows: usize) -> Self {
        let mut counts = vec![0usize; n_rows];
        for &k in keys {
            counts[k] += 1;
        }
        let mut offsets = Vec::with_capacity(n_rows + 1);
        offsets.push(0);
        for c in &counts {
            let last = offsets[offsets.len() - 1];
            offsets.push(last + c);
        }
        let mut cursor = offsets[..n_rows].to_vec();
        let mut values = vec![0usize; keys.len()];
        for (j, &k) in keys.iter().enumerate() {
            values[cursor[k]] = j;
            cursor[k] += 1;
        }
        Self { offsets, values }
    }

    #[inline]
    pub fn n_rows(&self) -> usize {
        self.offsets.len() - 1
    }

    #[inline]
    pub fn row(&self, i: usize) -> &[usize] {
        &self.values[self.offsets[i]..self.offsets[i + 1]]
    }

    #[inline]
    pub fn row_len(&self, i: usize) -> usize {
        self.offsets[i + 1] - self.offsets[i]
    }

    /// Per-row lengths.
    pub fn lengths(&self) -> Vec<usize> {
        self.offsets.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// The concatenated rows.
    pub fn flat(&self) -> &[usize] {
        &self.values
    }
}

/// Adjacency lists of the spatial cells.
///
/// Every cell must have at least one neighbor and every neighbor id must be a
/// valid cell. Symmetry is expected but not checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborGraph {
    adjacency: Ragged,
}

impl NeighborGraph {
    /// Build from per-cell neighbor counts and the neighbor ids concatenated in
    /// cell order.
    ///
    /// # Example
    /// ```
    /// use binomial_icar::NeighborGraph;
    ///
    /// // Ring of four cells.
    /// let graph =
    ///     NeighborGraph::from_counts(&[2, 2, 2, 2], vec![1, 3, 0, 2, 1, 3, 2, 0]).unwrap();
    /// assert_eq!(graph.neighbors(2), &[1, 3]);
    /// ```
    pub fn from_counts(n_neigh: &[usize], neighbors: Vec<usize>) -> Result<Self, IcarError> {
        Self::checked(Ragged::from_lengths(n_neigh, neighbors)?)
    }

    /// Build from one neighbor list per cell.
    pub fn from_lists<I>(lists: I) -> Result<Self, IcarError>
    where
        I: IntoIterator,
        I::Item: AsRef<[usize]>,
    {
        Self::checked(Ragged::from_rows(lists))
    }

    /// King's-move neighborhood of order `rank` on a row-major `nrow × ncol`
    /// grid. Cell `(r, c)` has id `r * ncol + c`; its neighbors are every other
    /// cell within `rank` rows and `rank` columns, listed row by row.
    ///
    /// # Errors
    /// [`IcarError::Empty`] for an empty grid or zero rank, and
    /// [`IcarError::IsolatedCell`] for a `1 × 1` grid.
    pub fn grid(nrow: usize, ncol: usize, rank: usize) -> Result<Self, IcarError> {
        if nrow == 0 || ncol == 0 {
            return Err(IcarError::Empty("grid cell"));
        }
        if rank == 0 {
            return Err(IcarError::Empty("neighborhood rank"));
        }
        let mut lists = Vec::with_capacity(nrow * ncol);
        for r in 0..nrow {
            for c in 0..ncol {
                let mut list = Vec::new();
                for rr in r.saturating_sub(rank)..=(r + rank).min(nrow - 1) {
                    for cc in c.saturating_sub(rank)..=(c + rank).min(ncol - 1) {
                        if rr != r || cc != c {
                            list.push(rr * ncol + cc);
                        }
                    }
                }
                lists.push(list);
            }
        }
        Self::from_lists(lists)
    }

    fn checked(adjacency: Ragged) -> Result<Self, IcarError> {
        let n_cells = adjacency.n_rows();
        if n_cells == 0 {
            return Err(IcarError::Empty("cell"));
        }
        for i in 0..n_cells {
            if adjacency.row_len(i) == 0 {
                return Err(IcarError::IsolatedCell(i));
            }
        }
        if let Some((index, &id)) = adjacency
            .flat()
            .iter()
            .enumerate()
            .find(|&(_, &id)| id >= n_cells)
        {
            return Err(IcarError::CellOutOfRange {
                name: "neighbors",
                index,
                id,
                n_cells,
            });
        }
        Ok(Self { adjacency })
    }

    #[inline]
    pub fn n_cells(&self) -> usize {
        self.adjacency.n_rows()
    }

    #[inline]
    pub fn neighbors(&self, i: usize) -> &[usize] {
        self.adjacency.row(i)
    }

    #[inline]
    pub fn n_neighbors(&self, i: usize) -> usize {
        self.adjacency.row_len(i)
    }

    /// Neighbor counts per cell, the legacy `nNeigh` vector.
    pub fn counts(&self) -> Vec<usize> {
        self.adjacency.lengths()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ragged_rows_follow_lengths() {
        let r = Ragged::from_lengths(&[2, 0, 3], vec![4, 5, 6, 7, 8]).unwrap();
        assert_eq!(r.n_rows(), 3);
        assert_eq!(r.row(0), &[4, 5]);
        assert!(r.row(1).is_empty());
        assert_eq!(r.row(2), &[6, 7, 8]);
        assert_eq!(r.lengths(), vec![2, 0, 3]);
    }

    #[test]
    fn ragged_rejects_bad_total() {
        let err = Ragged::from_lengths(&[2, 2], vec![1, 2, 3]).unwrap_err();
        assert_eq!(
            err,
            IcarError::LengthMismatch {
                name: "flattened neighbor list",
                expected: 4,
                found: 3
            }
        );
    }

    #[test]
    fn group_keeps_observation_order() {
        let g = Ragged::group(&[2, 0, 2, 1, 0], 4);
        assert_eq!(g.row(0), &[1, 4]);
        assert_eq!(g.row(1), &[3]);
        assert_eq!(g.row(2), &[0, 2]);
        assert!(g.row(3).is_empty());
    }

    #[test]
    fn grid_rank_one_matches_king_moves() {
        let g = NeighborGraph::grid(3, 3, 1).unwrap();
        assert_eq!(g.n_cells(), 9);
        assert_eq!(g.neighbors(0), &[1, 3, 4]);
        assert_eq!(g.neighbors(4), &[0, 1, 2, 3, 5, 6, 7, 8]);
        assert_eq!(g.neighbors(8), &[4, 5, 7]);
        assert_eq!(g.counts(), vec![3, 5, 3, 5, 8, 5, 3, 5, 3]);
    }

    #[test]
    fn grid_is_symmetric() {
        let g = NeighborGraph::grid(4, 5, 2).unwrap();
        for i in 0..g.n_cells() {
            for &j in g.neighbors(i) {
                assert!(g.neighbors(j).contains(&i), "{i} -> {j} not mirrored");
            }
        }
    }

    #[test]
    fn graph_validation() {
        assert_eq!(
            NeighborGraph::from_lists(vec![vec![1], vec![]]).unwrap_err(),
            IcarError::IsolatedCell(1)
        );
        assert!(matches!(
            NeighborGraph::from_counts(&[1, 1], vec![1, 2]).unwrap_err(),
            IcarError::CellOutOfRange { id: 2, .. }
        ));
        assert_eq!(
            NeighborGraph::grid(1, 1, 1).unwrap_err(),
            IcarError::IsolatedCell(0)
        );
        assert!(NeighborGraph::from_lists(Vec::<Vec<usize>>::new()).is_err());
    }
}
