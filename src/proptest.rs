use crate::error::Result;
use crate::expression::{Expression, ExpressionBuilder, MatrixValues};
use crate::matrix::{MatrixDescriptor, MemoryLayout};
use crate::registry::MatrixRegistry;
use ::proptest::prelude::*;
use adergen_sparse::{covering_regions, pattern_from_entries};
use itertools::iproduct;
use nalgebra::DMatrix;
use nalgebra_sparse::pattern::SparsityPattern;
use std::iter::once;

/// Sparsity patterns with the given extents, populating each entry with probability `density`.
pub fn sparsity_pattern(nrows: usize, ncols: usize, density: f64) -> impl Strategy<Value = SparsityPattern> {
    prop::collection::vec(prop::bool::weighted(density), nrows * ncols).prop_map(move |mask| {
        let entries = iproduct!(0..nrows, 0..ncols)
            .zip(mask)
            .filter_map(|(entry, populated)| populated.then_some(entry));
        pattern_from_entries(nrows, ncols, entries).expect("Entries are within bounds")
    })
}

/// Values bounded away from zero, so that no structural nonzero cancels by accident.
pub fn nonzero_value() -> impl Strategy<Value = f64> {
    prop_oneof![-2.0..-0.5, 0.5..2.0]
}

/// Dense matrices that are zero outside of `pattern`.
pub fn values_with_pattern(pattern: &SparsityPattern) -> impl Strategy<Value = DMatrix<f64>> {
    let (nrows, ncols) = (pattern.major_dim(), pattern.minor_dim());
    let entries: Vec<_> = pattern.entries().collect();
    prop::collection::vec(nonzero_value(), entries.len()).prop_map(move |values| {
        let mut matrix = DMatrix::zeros(nrows, ncols);
        for (&(i, j), v) in entries.iter().zip(values) {
            matrix[(i, j)] = v;
        }
        matrix
    })
}

/// A matrix with a random pattern and layout, together with values respecting the pattern.
pub fn matrix_with_values(name: String, nrows: usize, ncols: usize) -> impl Strategy<Value = (MatrixDescriptor, DMatrix<f64>)> {
    (sparsity_pattern(nrows, ncols, 0.5), 0..3usize)
        .prop_flat_map(|(pattern, layout)| {
            let values = values_with_pattern(&pattern);
            (Just(pattern), Just(layout), values)
        })
        .prop_map(move |(pattern, layout, values)| {
            let mut descriptor = MatrixDescriptor::with_pattern(name.clone(), pattern);
            let layout = match layout {
                0 => MemoryLayout::Dense,
                1 => MemoryLayout::Sparse,
                _ => MemoryLayout::BlockDense(covering_regions(&descriptor.pattern())),
            };
            descriptor
                .set_layout(layout)
                .expect("Covering regions form a valid block-dense layout");
            (descriptor, values)
        })
}

/// A sum of matrix chains over a registry of random matrices, with values for every matrix.
#[derive(Debug, Clone)]
pub struct SumOfChains {
    pub registry: MatrixRegistry,
    pub terms: Vec<Vec<String>>,
    pub values: MatrixValues,
}

impl SumOfChains {
    pub fn expression(&self) -> Result<Expression> {
        let builder = ExpressionBuilder::new(&self.registry);
        let chains = self
            .terms
            .iter()
            .map(|term| builder.chain(term.iter().map(String::as_str)))
            .collect::<Result<Vec<_>>>()?;
        builder.sum(chains)
    }
}

/// Sums of up to `max_terms` chains, each with up to `max_factors` factors whose extents
/// do not exceed `max_dim`.
pub fn sum_of_chains(max_terms: usize, max_factors: usize, max_dim: usize) -> impl Strategy<Value = SumOfChains> {
    (1..=max_dim, 1..=max_dim, 1..=max_terms)
        .prop_flat_map(move |(nrows, ncols, nterms)| {
            let inner_dims = prop::collection::vec(prop::collection::vec(1..=max_dim, 0..max_factors), nterms);
            inner_dims.prop_flat_map(move |inner_dims| {
                let mut factors = Vec::new();
                let mut terms = Vec::new();
                for (t, inner) in inner_dims.iter().enumerate() {
                    let dims: Vec<usize> = once(nrows)
                        .chain(inner.iter().copied())
                        .chain(once(ncols))
                        .collect();
                    let mut term = Vec::new();
                    for (k, extents) in dims.windows(2).enumerate() {
                        let name = format!("M{t}_{k}");
                        factors.push(matrix_with_values(name.clone(), extents[0], extents[1]));
                        term.push(name);
                    }
                    terms.push(term);
                }
                (factors, Just(terms))
            })
        })
        .prop_map(|(factors, terms)| {
            let mut registry = MatrixRegistry::new();
            let mut values = MatrixValues::default();
            for (descriptor, value) in factors {
                values.insert(descriptor.name().to_string(), value);
                registry
                    .insert(descriptor)
                    .expect("Generated matrix names are unique");
            }
            SumOfChains {
                registry,
                terms,
                values,
            }
        })
}
