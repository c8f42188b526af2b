//! Structural sparsity pattern algebra.
//!
//! All patterns are interpreted row-major: the major dimension of a
//! [`SparsityPattern`] indexes rows and the minor dimension indexes columns. Only the
//! *structure* of a matrix is considered here, so products and sums are boolean.

use itertools::Itertools;
use nalgebra_sparse::pattern::{SparsityPattern, SparsityPatternFormatError};
use std::ops::Range;

/// A rectangular region of a matrix, given as half-open row and column ranges.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Region {
    pub rows: Range<usize>,
    pub cols: Range<usize>,
}

impl Region {
    pub fn new(rows: Range<usize>, cols: Range<usize>) -> Self {
        Self { rows, cols }
    }

    /// The region covering an entire `nrows x ncols` matrix.
    pub fn full(nrows: usize, ncols: usize) -> Self {
        Self::new(0..nrows, 0..ncols)
    }

    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    pub fn ncols(&self) -> usize {
        self.cols.len()
    }

    pub fn area(&self) -> usize {
        self.nrows() * self.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.cols.is_empty()
    }

    pub fn contains(&self, i: usize, j: usize) -> bool {
        self.rows.contains(&i) && self.cols.contains(&j)
    }

    /// The intersection of two regions, or `None` if they do not overlap.
    pub fn intersection(&self, other: &Region) -> Option<Region> {
        let rows = intersect_ranges(&self.rows, &other.rows)?;
        let cols = intersect_ranges(&self.cols, &other.cols)?;
        Some(Region::new(rows, cols))
    }

    pub fn overlaps(&self, other: &Region) -> bool {
        self.intersection(other).is_some()
    }
}

/// Intersects two half-open ranges, returning `None` if the intersection is empty.
pub fn intersect_ranges(a: &Range<usize>, b: &Range<usize>) -> Option<Range<usize>> {
    let start = a.start.max(b.start);
    let end = a.end.min(b.end);
    (start < end).then(|| start..end)
}

/// Builds a pattern from an arbitrary collection of `(row, col)` entries.
///
/// Entries may be given in any order and may contain duplicates. Entries outside of the
/// `nrows x ncols` extents are rejected before any storage is allocated for them.
pub fn pattern_from_entries(
    nrows: usize,
    ncols: usize,
    entries: impl IntoIterator<Item = (usize, usize)>,
) -> Result<SparsityPattern, SparsityPatternFormatError> {
    let entries: Vec<_> = entries.into_iter().sorted_unstable().dedup().collect();
    if entries.iter().any(|&(i, _)| i >= nrows) {
        return Err(SparsityPatternFormatError::MajorIndexOutOfBounds);
    }
    if entries.iter().any(|&(_, j)| j >= ncols) {
        return Err(SparsityPatternFormatError::MinorIndexOutOfBounds);
    }

    let mut offsets = Vec::with_capacity(nrows + 1);
    let mut column_indices = Vec::with_capacity(entries.len());
    offsets.push(0);
    for (i, j) in entries {
        while i + 1 > offsets.len() {
            offsets.push(column_indices.len());
        }
        column_indices.push(j);
    }
    while offsets.len() < nrows + 1 {
        offsets.push(column_indices.len());
    }

    SparsityPattern::try_from_offsets_and_indices(nrows, ncols, offsets, column_indices)
}

/// A pattern where every entry is populated.
pub fn dense_pattern(nrows: usize, ncols: usize) -> SparsityPattern {
    let offsets = (0..=nrows).map(|i| i * ncols).collect();
    let indices = (0..nrows).flat_map(|_| 0..ncols).collect();
    SparsityPattern::try_from_offsets_and_indices(nrows, ncols, offsets, indices)
        .expect("Internal error: dense pattern must always be valid")
}

/// Whether every entry of the pattern is populated.
pub fn is_dense(pattern: &SparsityPattern) -> bool {
    pattern.nnz() == pattern.major_dim() * pattern.minor_dim()
}

/// Build a pattern from per-row sets of column indices.
///
/// Each row is given as a boolean mask of length `ncols`.
fn pattern_from_row_masks(nrows: usize, ncols: usize, rows: impl Iterator<Item = Vec<bool>>) -> SparsityPattern {
    let mut offsets = Vec::with_capacity(nrows + 1);
    let mut indices = Vec::new();
    offsets.push(0);
    for mask in rows {
        indices.extend(mask.iter().positions(|&populated| populated));
        offsets.push(indices.len());
    }
    assert_eq!(offsets.len(), nrows + 1, "Number of row masks must match number of rows.");
    SparsityPattern::try_from_offsets_and_indices(nrows, ncols, offsets, indices)
        .expect("Internal error: row masks always produce sorted, unique, in-bounds indices")
}

/// The structural product `a * b`.
///
/// # Panics
///
/// Panics if the number of columns of `a` does not match the number of rows of `b`.
pub fn pattern_product(a: &SparsityPattern, b: &SparsityPattern) -> SparsityPattern {
    assert_eq!(
        a.minor_dim(),
        b.major_dim(),
        "Inner dimensions of pattern product must agree."
    );
    let ncols = b.minor_dim();
    let rows = (0..a.major_dim()).map(|i| {
        let mut mask = vec![false; ncols];
        for &k in a.lane(i) {
            for &j in b.lane(k) {
                mask[j] = true;
            }
        }
        mask
    });
    pattern_from_row_masks(a.major_dim(), ncols, rows)
}

/// The structural sum `a + b`.
///
/// # Panics
///
/// Panics if the two patterns have different shapes.
pub fn pattern_union(a: &SparsityPattern, b: &SparsityPattern) -> SparsityPattern {
    assert_eq!(a.major_dim(), b.major_dim(), "Patterns must have the same number of rows.");
    assert_eq!(a.minor_dim(), b.minor_dim(), "Patterns must have the same number of columns.");
    let ncols = a.minor_dim();
    let rows = (0..a.major_dim()).map(|i| {
        let mut mask = vec![false; ncols];
        for &j in a.lane(i).iter().chain(b.lane(i)) {
            mask[j] = true;
        }
        mask
    });
    pattern_from_row_masks(a.major_dim(), ncols, rows)
}

/// For every row, whether the row contains at least one entry.
pub fn nonzero_rows(pattern: &SparsityPattern) -> Vec<bool> {
    (0..pattern.major_dim())
        .map(|i| !pattern.lane(i).is_empty())
        .collect()
}

/// For every column, whether the column contains at least one entry.
pub fn nonzero_cols(pattern: &SparsityPattern) -> Vec<bool> {
    let mut mask = vec![false; pattern.minor_dim()];
    for (_, j) in pattern.entries() {
        mask[j] = true;
    }
    mask
}

/// Removes every entry whose row or column is not selected by the given masks.
pub fn restrict(pattern: &SparsityPattern, row_mask: &[bool], col_mask: &[bool]) -> SparsityPattern {
    assert_eq!(row_mask.len(), pattern.major_dim());
    assert_eq!(col_mask.len(), pattern.minor_dim());
    let ncols = pattern.minor_dim();
    let rows = (0..pattern.major_dim()).map(|i| {
        let mut mask = vec![false; ncols];
        if row_mask[i] {
            for &j in pattern.lane(i) {
                mask[j] = col_mask[j];
            }
        }
        mask
    });
    pattern_from_row_masks(pattern.major_dim(), ncols, rows)
}

/// Number of entries of the pattern inside the given region.
pub fn count_in_region(pattern: &SparsityPattern, region: &Region) -> usize {
    region
        .rows
        .clone()
        .filter(|&i| i < pattern.major_dim())
        .map(|i| {
            pattern
                .lane(i)
                .iter()
                .filter(|j| region.cols.contains(j))
                .count()
        })
        .sum()
}

/// The smallest region containing every entry of the pattern that lies inside `within`.
///
/// Returns `None` if `within` contains no entries.
pub fn bounding_box(pattern: &SparsityPattern, within: &Region) -> Option<Region> {
    let mut rows: Option<(usize, usize)> = None;
    let mut cols: Option<(usize, usize)> = None;
    for i in within.rows.clone().filter(|&i| i < pattern.major_dim()) {
        for &j in pattern.lane(i).iter().filter(|j| within.cols.contains(j)) {
            rows = Some(rows.map_or((i, i), |(lo, hi)| (lo.min(i), hi.max(i))));
            cols = Some(cols.map_or((j, j), |(lo, hi)| (lo.min(j), hi.max(j))));
        }
    }
    let (r0, r1) = rows?;
    let (c0, c1) = cols?;
    Some(Region::new(r0..r1 + 1, c0..c1 + 1))
}

/// Maximal runs of consecutive `true` values in the mask.
pub fn contiguous_runs(mask: &[bool]) -> Vec<Range<usize>> {
    let mut runs = Vec::new();
    let mut start = None;
    for (idx, &populated) in mask.iter().enumerate() {
        match (populated, start) {
            (true, None) => start = Some(idx),
            (false, Some(s)) => {
                runs.push(s..idx);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push(s..mask.len());
    }
    runs
}

/// Covers the entries of the pattern with disjoint rectangles.
///
/// Rows are first grouped into maximal runs of non-empty rows. Within each row run, the
/// union of the populated columns is split into maximal runs of columns. Every
/// (row run, column run) pair that contains at least one entry forms a rectangle. The
/// rectangles are pairwise disjoint and every entry lies in exactly one of them.
pub fn covering_regions(pattern: &SparsityPattern) -> Vec<Region> {
    let mut regions = Vec::new();
    for row_run in contiguous_runs(&nonzero_rows(pattern)) {
        let mut col_mask = vec![false; pattern.minor_dim()];
        for i in row_run.clone() {
            for &j in pattern.lane(i) {
                col_mask[j] = true;
            }
        }
        for col_run in contiguous_runs(&col_mask) {
            let region = Region::new(row_run.clone(), col_run);
            // A column run may only be populated by some of the rows in the run
            if let Some(bbox) = bounding_box(pattern, &region) {
                regions.push(bbox);
            }
        }
    }
    regions
}
