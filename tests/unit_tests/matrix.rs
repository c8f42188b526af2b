use adergen::adergen_sparse::{pattern_from_entries, Region};
use adergen::matrix::{MatrixDescriptor, MemoryLayout, Sparsity};
use adergen::KernelError;

fn star_descriptor() -> MatrixDescriptor {
    // Stresses couple with velocities only
    let entries = (0..9).flat_map(|i| (0..9).map(move |j| (i, j))).filter(|&(i, j)| (i < 6) != (j < 6));
    MatrixDescriptor::with_pattern("star", pattern_from_entries(9, 9, entries).unwrap())
}

#[test]
fn dense_descriptor_has_single_full_block() {
    let matrix = MatrixDescriptor::new("kXiDivM", 10, 10);
    assert!(matrix.is_dense());
    assert_eq!(matrix.layout(), &MemoryLayout::Dense);
    assert_eq!(matrix.blocks(), &[Region::full(10, 10)]);
    assert_eq!(matrix.pattern().nnz(), 100);
    assert_eq!(matrix.global_id(), None);
}

#[test]
fn full_pattern_is_dense() {
    let pattern = pattern_from_entries(2, 2, [(0, 0), (0, 1), (1, 0), (1, 1)]).unwrap();
    let matrix = MatrixDescriptor::with_pattern("full", pattern);
    assert!(matrix.is_dense());
    assert_eq!(matrix.sparsity(), &Sparsity::Dense);
    assert_eq!(matrix.layout(), &MemoryLayout::Dense);
}

#[test]
fn sparse_descriptor_blocks_cover_pattern() {
    // Two dense 2x2 blocks on the diagonal, separated by an empty row and column
    let entries = [(0, 0), (0, 1), (1, 0), (1, 1), (3, 3), (3, 4), (4, 3), (4, 4)];
    let matrix = MatrixDescriptor::with_pattern("m", pattern_from_entries(5, 5, entries).unwrap());
    assert!(!matrix.is_dense());
    assert_eq!(matrix.layout(), &MemoryLayout::Sparse);
    assert_eq!(matrix.blocks(), &[Region::new(0..2, 0..2), Region::new(3..5, 3..5)]);

    // Every row and column of the star matrix is populated, so one rectangle covers it
    let star = star_descriptor();
    assert_eq!(star.pattern().nnz(), 36);
    assert_eq!(star.blocks(), &[Region::full(9, 9)]);
}

#[test]
fn extents_must_match_pattern() {
    let pattern = pattern_from_entries(3, 3, [(0, 0)]).unwrap();
    let result = MatrixDescriptor::try_with_extents_and_pattern("m", 3, 4, pattern);
    assert!(matches!(result, Err(KernelError::InvalidPattern { ref name, .. }) if name == "m"));
}

#[test]
fn block_dense_layout_is_validated() {
    let mut matrix = star_descriptor();

    let valid = MemoryLayout::BlockDense(vec![Region::new(0..6, 6..9), Region::new(6..9, 0..6)]);
    matrix.set_layout(valid.clone()).unwrap();
    assert_eq!(matrix.layout(), &valid);
    assert_eq!(matrix.blocks().len(), 2);

    let uncovered = MemoryLayout::BlockDense(vec![Region::new(0..6, 6..9)]);
    assert!(matches!(matrix.set_layout(uncovered), Err(KernelError::InvalidLayout { .. })));

    let overlapping = MemoryLayout::BlockDense(vec![
        Region::new(0..6, 6..9),
        Region::new(5..9, 0..6),
        Region::new(6..9, 0..6),
    ]);
    assert!(matches!(matrix.set_layout(overlapping), Err(KernelError::InvalidLayout { .. })));

    let out_of_bounds = MemoryLayout::BlockDense(vec![Region::new(0..6, 6..10), Region::new(6..9, 0..6)]);
    assert!(matches!(matrix.set_layout(out_of_bounds), Err(KernelError::InvalidLayout { .. })));

    // A failed annotation leaves the previous layout in place
    assert_eq!(matrix.layout(), &valid);
}

#[test]
fn fitting_shrinks_blocks_to_nonzeros() {
    let pattern = pattern_from_entries(4, 4, [(1, 1), (1, 2), (2, 1)]).unwrap();
    let mut matrix = MatrixDescriptor::with_pattern("m", pattern);
    matrix
        .set_layout(MemoryLayout::BlockDense(vec![Region::new(0..3, 0..4), Region::new(3..4, 0..4)]))
        .unwrap();
    matrix.fit_blocks_to_sparsity_pattern();
    assert_eq!(matrix.blocks(), &[Region::new(1..3, 1..3)]);
    // The layout itself is an annotation and stays as given
    assert!(matches!(matrix.layout(), MemoryLayout::BlockDense(blocks) if blocks.len() == 2));
}

#[test]
fn clones_do_not_inherit_global_ids() {
    let matrix = star_descriptor();
    let clone = matrix.clone_as("AstarT");
    assert_eq!(clone.name(), "AstarT");
    assert_eq!(clone.shape(), matrix.shape());
    assert_eq!(clone.sparsity(), matrix.sparsity());
    assert_eq!(clone.global_id(), None);
}
