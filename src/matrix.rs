//! Named matrix operands and their structural metadata.
use crate::error::{KernelError, Result, Shape};
use adergen_sparse::{bounding_box, count_in_region, covering_regions, dense_pattern, is_dense, Region};
use nalgebra_sparse::pattern::SparsityPattern;
use std::borrow::Cow;

/// The structural sparsity of a matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sparsity {
    /// Every entry may be nonzero.
    Dense,
    /// Only the entries of the (row-major) pattern may be nonzero.
    Pattern(SparsityPattern),
}

/// How the backend should store and access a matrix.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MemoryLayout {
    #[default]
    Dense,
    Sparse,
    /// The matrix is stored as a set of disjoint dense blocks.
    BlockDense(Vec<Region>),
}

/// Metadata describing a named matrix operand.
///
/// Extents and sparsity are fixed at construction. The memory layout and the global
/// identifier are annotations added by later passes over the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixDescriptor {
    name: String,
    nrows: usize,
    ncols: usize,
    sparsity: Sparsity,
    layout: MemoryLayout,
    blocks: Vec<Region>,
    global_id: Option<usize>,
}

impl MatrixDescriptor {
    /// A dense matrix with the given extents.
    pub fn new(name: impl Into<String>, nrows: usize, ncols: usize) -> Self {
        Self {
            name: name.into(),
            nrows,
            ncols,
            sparsity: Sparsity::Dense,
            layout: MemoryLayout::Dense,
            blocks: vec![Region::full(nrows, ncols)],
            global_id: None,
        }
    }

    /// A matrix whose nonzeros are restricted to the given pattern.
    ///
    /// The layout defaults to [`MemoryLayout::Sparse`] unless the pattern is full.
    pub fn with_pattern(name: impl Into<String>, pattern: SparsityPattern) -> Self {
        let mut descriptor = Self::new(name, pattern.major_dim(), pattern.minor_dim());
        if !is_dense(&pattern) {
            descriptor.sparsity = Sparsity::Pattern(pattern);
            descriptor.layout = MemoryLayout::Sparse;
            descriptor.blocks = descriptor.layout_blocks();
        }
        descriptor
    }

    /// Like [`MatrixDescriptor::with_pattern`], but checks the pattern against explicit extents.
    pub fn try_with_extents_and_pattern(
        name: impl Into<String>,
        nrows: usize,
        ncols: usize,
        pattern: SparsityPattern,
    ) -> Result<Self> {
        let name = name.into();
        if pattern.major_dim() != nrows || pattern.minor_dim() != ncols {
            return Err(KernelError::InvalidPattern {
                reason: format!(
                    "pattern is {}x{} but the matrix is {}x{}",
                    pattern.major_dim(),
                    pattern.minor_dim(),
                    nrows,
                    ncols
                ),
                name,
            });
        }
        Ok(Self::with_pattern(name, pattern))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn shape(&self) -> Shape {
        (self.nrows, self.ncols)
    }

    pub fn sparsity(&self) -> &Sparsity {
        &self.sparsity
    }

    /// The sparsity pattern, materializing a full pattern for dense matrices.
    pub fn pattern(&self) -> Cow<SparsityPattern> {
        match &self.sparsity {
            Sparsity::Dense => Cow::Owned(dense_pattern(self.nrows, self.ncols)),
            Sparsity::Pattern(pattern) => Cow::Borrowed(pattern),
        }
    }

    pub fn is_dense(&self) -> bool {
        matches!(self.sparsity, Sparsity::Dense)
    }

    pub fn layout(&self) -> &MemoryLayout {
        &self.layout
    }

    /// The storage blocks of the matrix.
    pub fn blocks(&self) -> &[Region] {
        &self.blocks
    }

    pub fn global_id(&self) -> Option<usize> {
        self.global_id
    }

    pub(crate) fn set_global_id(&mut self, id: usize) {
        self.global_id = Some(id);
    }

    /// Returns a copy of this descriptor under a different name.
    ///
    /// The global identifier is not carried over, since it is tied to the name.
    pub fn clone_as(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            global_id: None,
            ..self.clone()
        }
    }

    /// Annotates the matrix with a memory layout, replacing its storage blocks.
    ///
    /// Block-dense layouts must consist of disjoint, in-bounds blocks that together cover
    /// every entry of the sparsity pattern.
    pub fn set_layout(&mut self, layout: MemoryLayout) -> Result<()> {
        if let MemoryLayout::BlockDense(blocks) = &layout {
            self.check_block_dense(blocks)?;
        }
        self.layout = layout;
        self.blocks = self.layout_blocks();
        Ok(())
    }

    fn check_block_dense(&self, blocks: &[Region]) -> Result<()> {
        let invalid = |reason: String| KernelError::InvalidLayout {
            name: self.name.clone(),
            reason,
        };
        let full = Region::full(self.nrows, self.ncols);
        for (idx, block) in blocks.iter().enumerate() {
            if block.rows.end > self.nrows || block.cols.end > self.ncols || block.is_empty() {
                return Err(invalid(format!("block {block:?} is empty or outside {full:?}")));
            }
            if let Some(other) = blocks[idx + 1..].iter().find(|other| block.overlaps(other)) {
                return Err(invalid(format!("blocks {block:?} and {other:?} overlap")));
            }
        }
        let pattern = self.pattern();
        let covered: usize = blocks
            .iter()
            .map(|block| count_in_region(&pattern, block))
            .sum();
        if covered != pattern.nnz() {
            return Err(invalid(format!(
                "blocks cover {covered} of {} pattern entries",
                pattern.nnz()
            )));
        }
        Ok(())
    }

    /// Storage blocks implied by the current layout, before fitting.
    fn layout_blocks(&self) -> Vec<Region> {
        match &self.layout {
            MemoryLayout::Dense => vec![Region::full(self.nrows, self.ncols)],
            MemoryLayout::Sparse => covering_regions(&self.pattern()),
            MemoryLayout::BlockDense(blocks) => blocks.clone(),
        }
    }

    /// Shrinks every storage block to the bounding box of the nonzeros it contains.
    ///
    /// Blocks without any nonzeros are dropped.
    pub fn fit_blocks_to_sparsity_pattern(&mut self) {
        let pattern = self.pattern().into_owned();
        self.blocks = self
            .blocks
            .iter()
            .filter_map(|block| bounding_box(&pattern, block))
            .collect();
    }
}
