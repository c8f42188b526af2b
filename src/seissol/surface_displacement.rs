//! Integration of the velocity on free-surface faces.
use super::{insert_if_absent, SolverExtension, NUMBER_OF_FACES, TIME_INTEGRATED};
use crate::config::{number_of_basis_functions, number_of_face_basis_functions, NUMBER_OF_QUANTITIES};
use crate::expression::ExpressionBuilder;
use crate::kernel::{KernelCatalog, KernelPrototype};
use crate::matrix::MatrixDescriptor;
use crate::registry::MatrixRegistry;
use adergen_sparse::pattern_from_entries;
use eyre::eyre;

const SELECT_VELOCITY: &str = "selectVelocity";

#[derive(Debug, Clone)]
pub struct SurfaceDisplacement {
    order: usize,
}

impl SurfaceDisplacement {
    pub fn new(order: usize) -> Self {
        Self { order }
    }
}

impl SolverExtension for SurfaceDisplacement {
    fn name(&self) -> &str {
        "surface displacement"
    }

    fn add_matrices(&self, registry: &mut MatrixRegistry) -> eyre::Result<()> {
        let nf = number_of_face_basis_functions(self.order);
        let nbf = number_of_basis_functions(self.order);
        for face in 0..NUMBER_OF_FACES {
            insert_if_absent(registry, MatrixDescriptor::new(format!("V3mTo2nFace{face}"), nf, nbf))?;
        }

        // Velocities are the last three quantities
        let pattern = pattern_from_entries(NUMBER_OF_QUANTITIES, 3, [(6, 0), (7, 1), (8, 2)])
            .map_err(|e| eyre!("invalid velocity selection pattern: {e}"))?;
        insert_if_absent(registry, MatrixDescriptor::with_pattern(SELECT_VELOCITY, pattern))?;
        Ok(())
    }

    fn add_kernels(&self, registry: &MatrixRegistry, catalog: &mut KernelCatalog) -> eyre::Result<()> {
        let builder = ExpressionBuilder::new(registry);
        for face in 0..NUMBER_OF_FACES {
            let projection = format!("V3mTo2nFace{face}");
            let displacement = builder.chain([projection.as_str(), TIME_INTEGRATED, SELECT_VELOCITY])?;
            catalog.add(KernelPrototype::new(format!("surfaceDisplacement[{face}]"), displacement))?;
        }
        Ok(())
    }
}
