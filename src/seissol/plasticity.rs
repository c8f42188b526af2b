//! Nodal evaluation of the stress for plasticity corrections.
use super::{insert_if_absent, SolverExtension};
use crate::config::number_of_basis_functions;
use crate::expression::ExpressionBuilder;
use crate::kernel::{KernelCatalog, KernelPrototype};
use crate::matrix::MatrixDescriptor;
use crate::registry::MatrixRegistry;
use eyre::eyre;

/// Number of independent stress components.
const NUMBER_OF_STRESS_COMPONENTS: usize = 6;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PlasticityMethod {
    /// One node per basis function.
    NodalBasis,
    /// Nodes at the `(order + 1)^3` integration points.
    IntegrationPoints,
}

impl PlasticityMethod {
    pub fn from_name(name: &str) -> eyre::Result<Self> {
        match name {
            "nb" => Ok(Self::NodalBasis),
            "ip" => Ok(Self::IntegrationPoints),
            other => Err(eyre!("unknown plasticity method `{other}`")),
        }
    }

    pub fn number_of_nodes(&self, order: usize) -> usize {
        match self {
            Self::NodalBasis => number_of_basis_functions(order),
            Self::IntegrationPoints => (order + 1).pow(3),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Plasticity {
    method: PlasticityMethod,
    order: usize,
}

impl Plasticity {
    pub fn new(method: &str, order: usize) -> eyre::Result<Self> {
        Ok(Self {
            method: PlasticityMethod::from_name(method)?,
            order,
        })
    }

    pub fn method(&self) -> PlasticityMethod {
        self.method
    }

    pub fn number_of_nodes(&self) -> usize {
        self.method.number_of_nodes(self.order)
    }
}

impl SolverExtension for Plasticity {
    fn name(&self) -> &str {
        "plasticity"
    }

    fn add_matrices(&self, registry: &mut MatrixRegistry) -> eyre::Result<()> {
        let nodes = self.number_of_nodes();
        let nbf = number_of_basis_functions(self.order);
        insert_if_absent(registry, MatrixDescriptor::new("vNodes", nodes, nbf))?;
        insert_if_absent(registry, MatrixDescriptor::new("vInv", nbf, nodes))?;
        insert_if_absent(registry, MatrixDescriptor::new("stressDOFS", nbf, NUMBER_OF_STRESS_COMPONENTS))?;
        insert_if_absent(
            registry,
            MatrixDescriptor::new("interpolationDOFS", nodes, NUMBER_OF_STRESS_COMPONENTS),
        )?;
        Ok(())
    }

    fn add_kernels(&self, registry: &MatrixRegistry, catalog: &mut KernelCatalog) -> eyre::Result<()> {
        let builder = ExpressionBuilder::new(registry);
        let evaluate_at_nodes = builder.multiply("vNodes", "stressDOFS")?;
        catalog.add(KernelPrototype::new("evaluateAtNodes", evaluate_at_nodes).with_beta(0.0))?;
        let convert_to_modal = builder.multiply("vInv", "interpolationDOFS")?;
        catalog.add(KernelPrototype::new("convertToModal", convert_to_modal).with_beta(0.0))?;
        Ok(())
    }
}
