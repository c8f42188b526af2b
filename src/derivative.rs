//! Recursive construction of time-derivative kernels.
//!
//! The `i`-th time derivative of the degrees of freedom is obtained from the
//! `(i-1)`-th by applying the transposed stiffness matrices and the star matrices:
//!
//! ```text
//! D_i = kXiDivMT * D_{i-1} * AstarT + kEtaDivMT * D_{i-1} * BstarT + kZetaDivMT * D_{i-1} * CstarT
//! ```
//!
//! Every derivative is flattened into a new registry matrix, so the next iteration sees
//! its (typically sparser) structure.
use crate::blocks::{fit_blocks_to_sparsity_pattern, BlockFitOptions};
use crate::error::Result;
use crate::expression::ExpressionBuilder;
use crate::kernel::{KernelCatalog, KernelPrototype};
use crate::registry::MatrixRegistry;
use log::{debug, warn};

/// Names of the matrices taking part in the derivative recurrence.
#[derive(Debug, Clone)]
pub struct DerivativeRecurrence {
    pub stiffness: [String; 3],
    pub star: [String; 3],
    /// Derivative `i` is registered as `{prefix}{i}`; derivative 0 must already exist.
    pub derivative_prefix: String,
    pub kernel_name: String,
    pub options: BlockFitOptions,
}

impl Default for DerivativeRecurrence {
    fn default() -> Self {
        Self {
            stiffness: ["kXiDivMT".into(), "kEtaDivMT".into(), "kZetaDivMT".into()],
            star: ["AstarT".into(), "BstarT".into(), "CstarT".into()],
            derivative_prefix: "timeDerivative".into(),
            kernel_name: "derivative".into(),
            options: BlockFitOptions::default(),
        }
    }
}

impl DerivativeRecurrence {
    pub fn derivative_name(&self, i: usize) -> String {
        format!("{}{}", self.derivative_prefix, i)
    }

    /// Builds the derivative kernels `1..order`.
    ///
    /// For each `i`, the kernel `derivative[i]` (with `beta = 0`) is appended to the
    /// catalog and the flattened derivative is registered as `timeDerivative{i}`. Returns
    /// the name of the last derivative available in the registry, which is
    /// `timeDerivative0` when `order < 2`.
    pub fn run(&self, registry: &mut MatrixRegistry, catalog: &mut KernelCatalog, order: usize) -> Result<String> {
        if order < 2 {
            warn!("Order {order} scheme has no time derivative kernels");
        }

        for i in 1..order {
            let last = self.derivative_name(i - 1);
            let next = self.derivative_name(i);

            let builder = ExpressionBuilder::new(registry);
            let terms = self
                .stiffness
                .iter()
                .zip(&self.star)
                .map(|(stiffness, star)| builder.chain([stiffness.as_str(), last.as_str(), star.as_str()]))
                .collect::<Result<Vec<_>>>()?;
            let mut derivative = builder.sum(terms)?;

            fit_blocks_to_sparsity_pattern(&mut derivative, registry, &self.options)?;
            let mut flattened = derivative.flat(next.as_str(), registry)?;
            flattened.fit_blocks_to_sparsity_pattern();
            debug!(
                "{} has {} nonzeros in {} blocks",
                next,
                flattened.pattern().nnz(),
                flattened.blocks().len()
            );

            catalog.add(
                KernelPrototype::new(format!("{}[{}]", self.kernel_name, i), derivative).with_beta(0.0),
            )?;
            registry.insert(flattened)?;
        }

        Ok(self.derivative_name(order.saturating_sub(1)))
    }
}
