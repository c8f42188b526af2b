//! Decomposition of expressions into dense and sparse blocks.
//!
//! Block fitting expands an expression into a sum of matrix-chain products and, for
//! every chain, determines which entries of each factor can actually contribute to
//! the result. An entry `(r, c)` of the `j`-th factor contributes only if column `r` of
//! the structural product of the factors to its left, and row `c` of the structural
//! product of the factors to its right, are both nonempty. The contributing entries of
//! each factor are covered with disjoint rectangles, which are classified as dense or
//! sparse. Every combination of rectangles along the chain whose contraction ranges
//! overlap becomes one block of the decomposition.
//!
//! Since the rectangles of each factor are disjoint and cover all contributing entries,
//! the blocks sum to exactly the value of the expression.
use crate::error::{KernelError, Result, Shape};
use crate::expression::{matrix_value, Expression, MatrixValues};
use crate::matrix::{MatrixDescriptor, MemoryLayout};
use crate::registry::MatrixRegistry;
use adergen_sparse::{
    bounding_box, count_in_region, covering_regions, intersect_ranges, nonzero_cols, nonzero_rows, pattern_product,
    restrict, Region,
};
use itertools::Itertools;
use log::debug;
use nalgebra::DMatrix;
use nalgebra_sparse::pattern::SparsityPattern;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SparsityClass {
    Dense,
    Sparse,
}

/// Parameters controlling how rectangles are classified.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BlockFitOptions {
    /// Minimum fraction of populated entries for a rectangle to be treated as dense.
    pub dense_fill_threshold: f64,
}

impl Default for BlockFitOptions {
    fn default() -> Self {
        Self {
            dense_fill_threshold: 0.5,
        }
    }
}

/// A rectangular window into one factor of a block.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockFactor {
    pub matrix: String,
    pub region: Region,
    pub class: SparsityClass,
}

/// One matrix-chain product over windows of the original factors.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionBlock {
    /// Index of the sum-of-products term this block was derived from.
    pub term: usize,
    pub factors: Vec<BlockFactor>,
    /// The region of the expression's result this block contributes to.
    pub output: Region,
    pub class: SparsityClass,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockDecomposition {
    shape: Shape,
    blocks: Vec<ExpressionBlock>,
}

impl BlockDecomposition {
    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn blocks(&self) -> &[ExpressionBlock] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn count(&self, class: SparsityClass) -> usize {
        self.blocks
            .iter()
            .filter(|block| block.class == class)
            .count()
    }

    /// Sums the contributions of all blocks into a dense matrix.
    pub fn evaluate(&self, values: &MatrixValues) -> Result<DMatrix<f64>> {
        let mut result = DMatrix::zeros(self.shape.0, self.shape.1);
        for block in &self.blocks {
            let mut contribution: Option<DMatrix<f64>> = None;
            for factor in &block.factors {
                let window = windowed(matrix_value(&factor.matrix, values)?, &factor.region);
                contribution = Some(match contribution {
                    None => window,
                    Some(acc) => acc * window,
                });
            }
            if let Some(contribution) = contribution {
                result += contribution;
            }
        }
        Ok(result)
    }
}

/// A copy of `values` with everything outside `region` set to zero.
fn windowed(values: &DMatrix<f64>, region: &Region) -> DMatrix<f64> {
    let mut window = DMatrix::zeros(values.nrows(), values.ncols());
    let start = (region.rows.start, region.cols.start);
    let shape = (region.nrows(), region.ncols());
    window
        .view_mut(start, shape)
        .copy_from(&values.view(start, shape));
    window
}

/// Computes the block decomposition of `expression` and stores it in the expression.
///
/// Fails with [`KernelError::PreconditionViolation`] if the expression has not been
/// shape-validated.
pub fn fit_blocks_to_sparsity_pattern(
    expression: &mut Expression,
    registry: &MatrixRegistry,
    options: &BlockFitOptions,
) -> Result<()> {
    let decomposition = decompose(expression, registry, options)?;
    debug!(
        "Fitted {} dense and {} sparse blocks for {}",
        decomposition.count(SparsityClass::Dense),
        decomposition.count(SparsityClass::Sparse),
        expression
    );
    expression.set_blocks(decomposition);
    Ok(())
}

/// Computes the block decomposition of `expression` without modifying it.
pub fn decompose(
    expression: &Expression,
    registry: &MatrixRegistry,
    options: &BlockFitOptions,
) -> Result<BlockDecomposition> {
    let shape = expression.validated_shape().map_err(|_| {
        KernelError::PreconditionViolation(format!(
            "block fitting requires a shape-validated expression, but `{expression}` is not validated"
        ))
    })?;

    let mut blocks = Vec::new();
    for (term_index, term) in expression.terms().into_iter().enumerate() {
        let factors = term
            .iter()
            .map(|name| registry.lookup(name, "block fitting"))
            .collect::<Result<Vec<_>>>()?;
        decompose_term(term_index, &factors, options, &mut blocks);
    }

    Ok(BlockDecomposition { shape, blocks })
}

fn decompose_term(
    term_index: usize,
    factors: &[&MatrixDescriptor],
    options: &BlockFitOptions,
    blocks: &mut Vec<ExpressionBlock>,
) {
    // A chain of dense operands gains nothing from decomposition
    if factors
        .iter()
        .all(|f| f.is_dense() && *f.layout() == MemoryLayout::Dense)
    {
        let factors: Vec<_> = factors
            .iter()
            .map(|f| BlockFactor {
                matrix: f.name().to_string(),
                region: Region::full(f.nrows(), f.ncols()),
                class: SparsityClass::Dense,
            })
            .collect();
        blocks.push(make_block(term_index, factors));
        return;
    }

    let effective = effective_patterns(factors);
    if effective.iter().any(|pattern| pattern.nnz() == 0) {
        // The term is structurally zero
        return;
    }

    let windows: Vec<Vec<(Region, SparsityClass)>> = factors
        .iter()
        .zip(&effective)
        .map(|(factor, pattern)| factor_windows(factor, pattern, options))
        .collect();

    for combination in windows.iter().map(|w| w.iter()).multi_cartesian_product() {
        let mut regions: Vec<Region> = combination.iter().map(|(region, _)| region.clone()).collect();
        if !tighten_along_contractions(&mut regions) {
            continue;
        }
        if regions
            .iter()
            .zip(&effective)
            .any(|(region, pattern)| count_in_region(pattern, region) == 0)
        {
            continue;
        }
        let factors = factors
            .iter()
            .zip(regions)
            .zip(&combination)
            .map(|((factor, region), (_, class))| BlockFactor {
                matrix: factor.name().to_string(),
                region,
                class: *class,
            })
            .collect();
        blocks.push(make_block(term_index, factors));
    }
}

fn make_block(term: usize, factors: Vec<BlockFactor>) -> ExpressionBlock {
    let rows = factors.first().map(|f| f.region.rows.clone()).unwrap_or(0..0);
    let cols = factors.last().map(|f| f.region.cols.clone()).unwrap_or(0..0);
    let class = if factors.iter().all(|f| f.class == SparsityClass::Dense) {
        SparsityClass::Dense
    } else {
        SparsityClass::Sparse
    };
    ExpressionBlock {
        term,
        factors,
        output: Region::new(rows, cols),
        class,
    }
}

/// Restricts every factor's pattern to the entries that can contribute to the chain product.
fn effective_patterns(factors: &[&MatrixDescriptor]) -> Vec<SparsityPattern> {
    let patterns: Vec<SparsityPattern> = factors.iter().map(|f| f.pattern().into_owned()).collect();
    let n = patterns.len();

    // row_masks[j]: rows of factor j that meet a nonempty column of the left partial product
    let mut row_masks = Vec::with_capacity(n);
    let mut left: Option<SparsityPattern> = None;
    for pattern in &patterns {
        row_masks.push(match &left {
            None => vec![true; pattern.major_dim()],
            Some(left) => nonzero_cols(left),
        });
        left = Some(match left {
            None => pattern.clone(),
            Some(left) => pattern_product(&left, pattern),
        });
    }

    let mut col_masks = vec![Vec::new(); n];
    let mut right: Option<SparsityPattern> = None;
    for (j, pattern) in patterns.iter().enumerate().rev() {
        col_masks[j] = match &right {
            None => vec![true; pattern.minor_dim()],
            Some(right) => nonzero_rows(right),
        };
        right = Some(match right {
            None => pattern.clone(),
            Some(right) => pattern_product(pattern, &right),
        });
    }

    patterns
        .iter()
        .zip(row_masks.iter().zip(&col_masks))
        .map(|(pattern, (rows, cols))| restrict(pattern, rows, cols))
        .collect()
}

/// Disjoint windows covering every contributing entry of a factor.
fn factor_windows(
    factor: &MatrixDescriptor,
    effective: &SparsityPattern,
    options: &BlockFitOptions,
) -> Vec<(Region, SparsityClass)> {
    match factor.layout() {
        MemoryLayout::Dense => vec![(Region::full(factor.nrows(), factor.ncols()), SparsityClass::Dense)],
        MemoryLayout::BlockDense(_) => factor
            .blocks()
            .iter()
            .filter_map(|block| bounding_box(effective, block))
            .map(|region| (region, SparsityClass::Dense))
            .collect(),
        MemoryLayout::Sparse => covering_regions(effective)
            .into_iter()
            .map(|region| {
                let populated = count_in_region(effective, &region);
                let fill = populated as f64 / region.area() as f64;
                let class = if populated > 1 && fill >= options.dense_fill_threshold {
                    SparsityClass::Dense
                } else {
                    SparsityClass::Sparse
                };
                (region, class)
            })
            .collect(),
    }
}

/// Shrinks adjacent windows to their common contraction range.
///
/// Returns `false` if some contraction range is empty, in which case the chain of
/// windows contributes nothing.
fn tighten_along_contractions(regions: &mut [Region]) -> bool {
    for j in 1..regions.len() {
        match intersect_ranges(&regions[j - 1].cols, &regions[j].rows) {
            Some(range) => {
                regions[j - 1].cols = range.clone();
                regions[j].rows = range;
            }
            None => return false,
        }
    }
    true
}
