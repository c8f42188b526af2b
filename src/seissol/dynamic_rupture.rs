//! Dynamic rupture on faults between elements.
use super::{insert_if_absent, SolverExtension, NUMBER_OF_FACES};
use crate::config::{number_of_basis_functions, NUMBER_OF_QUANTITIES};
use crate::expression::ExpressionBuilder;
use crate::kernel::{KernelCatalog, KernelPrototype, PrefetchHint};
use crate::matrix::MatrixDescriptor;
use crate::registry::MatrixRegistry;
use eyre::eyre;
use itertools::iproduct;

/// Number of fault side orientations considered per face.
const NUMBER_OF_SIDE_ORIENTATIONS: usize = 4;

const GODUNOV_STATE: &str = "godunovState";

/// How the fault is sampled.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DynamicRuptureMethod {
    /// Gaussian quadrature with `(order + 1)^2` points.
    Quadrature,
    /// Averages over `4^n` sub-triangles, the smallest such count covering the face basis.
    CellAverage,
}

impl DynamicRuptureMethod {
    pub fn from_name(name: &str) -> eyre::Result<Self> {
        match name {
            "quadrature" => Ok(Self::Quadrature),
            "cellaverage" => Ok(Self::CellAverage),
            other => Err(eyre!("unknown dynamic rupture method `{other}`")),
        }
    }

    pub fn number_of_points(&self, order: usize) -> usize {
        match self {
            Self::Quadrature => (order + 1) * (order + 1),
            Self::CellAverage => {
                let face_basis_functions = order * (order + 1) / 2;
                let mut points = 1;
                while points < face_basis_functions {
                    points *= 4;
                }
                points
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct DynamicRupture {
    method: DynamicRuptureMethod,
    order: usize,
    dofs: String,
}

impl DynamicRupture {
    /// `dofs` names the degrees of freedom the Godunov state is computed from.
    pub fn new(method: &str, order: usize, dofs: impl Into<String>) -> eyre::Result<Self> {
        Ok(Self {
            method: DynamicRuptureMethod::from_name(method)?,
            order,
            dofs: dofs.into(),
        })
    }

    pub fn method(&self) -> DynamicRuptureMethod {
        self.method
    }

    pub fn number_of_points(&self) -> usize {
        self.method.number_of_points(self.order)
    }

    fn orientations() -> impl Iterator<Item = (usize, usize)> {
        iproduct!(0..NUMBER_OF_FACES, 0..NUMBER_OF_SIDE_ORIENTATIONS)
    }
}

impl SolverExtension for DynamicRupture {
    fn name(&self) -> &str {
        "dynamic rupture"
    }

    fn add_matrices(&self, registry: &mut MatrixRegistry) -> eyre::Result<()> {
        let points = self.number_of_points();
        let nbf = number_of_basis_functions(self.order);

        insert_if_absent(registry, MatrixDescriptor::new("godunovMatrix", NUMBER_OF_QUANTITIES, NUMBER_OF_QUANTITIES))?;
        insert_if_absent(registry, MatrixDescriptor::new("fluxSolver", NUMBER_OF_QUANTITIES, NUMBER_OF_QUANTITIES))?;
        insert_if_absent(registry, MatrixDescriptor::new(GODUNOV_STATE, points, NUMBER_OF_QUANTITIES))?;
        for (i, h) in Self::orientations() {
            insert_if_absent(registry, MatrixDescriptor::new(format!("V3mTo2n{i}{h}"), points, nbf))?;
            insert_if_absent(registry, MatrixDescriptor::new(format!("V3mTo2nTWDivM{i}{h}"), nbf, points))?;
        }
        Ok(())
    }

    fn add_kernels(&self, registry: &MatrixRegistry, catalog: &mut KernelCatalog) -> eyre::Result<()> {
        let builder = ExpressionBuilder::new(registry);
        for (i, h) in Self::orientations() {
            let index = NUMBER_OF_SIDE_ORIENTATIONS * i + h;
            let projection = format!("V3mTo2n{i}{h}");
            let godunov_state = builder.chain([projection.as_str(), self.dofs.as_str(), "godunovMatrix"])?;
            catalog.add(
                KernelPrototype::new(format!("godunovState[{index}]"), godunov_state)
                    .with_prefetch(PrefetchHint::Expression(GODUNOV_STATE.to_string())),
            )?;
        }
        for (i, h) in Self::orientations() {
            let index = NUMBER_OF_SIDE_ORIENTATIONS * i + h;
            let lifting = format!("V3mTo2nTWDivM{i}{h}");
            let nodal_flux = builder.chain([lifting.as_str(), GODUNOV_STATE, "fluxSolver"])?;
            catalog.add(
                KernelPrototype::new(format!("nodalFlux[{index}]"), nodal_flux)
                    .with_prefetch(PrefetchHint::Expression(GODUNOV_STATE.to_string())),
            )?;
        }
        Ok(())
    }
}
