//! Hand-off of the finished registry and kernel catalog to a code generation backend.
use crate::arch::Architecture;
use crate::error::Result;
use crate::global_ids::GlobalMatrixIdRules;
use crate::kernel::{KernelCatalog, ResolvedPrefetch};
use crate::registry::MatrixRegistry;
use log::info;
use std::path::Path;

/// Everything the backend needs to emit code for a generation run.
///
/// A library can only be obtained through [`KernelLibrary::finalize`], which checks that
/// all references in the catalog resolve.
#[derive(Debug)]
pub struct KernelLibrary {
    registry: MatrixRegistry,
    catalog: KernelCatalog,
    architecture: Architecture,
    generator: String,
}

impl KernelLibrary {
    /// Validates the registry and catalog for hand-off.
    ///
    /// Fails if a kernel references an unregistered matrix, if a prefetch hint does not
    /// resolve, or if a matrix matched by a global id rule carries no identifier.
    pub fn finalize(
        registry: MatrixRegistry,
        catalog: KernelCatalog,
        rules: &GlobalMatrixIdRules,
        architecture: Architecture,
        generator: impl Into<String>,
    ) -> Result<Self> {
        for (position, kernel) in catalog.iter().enumerate() {
            for name in kernel.expression().matrix_names() {
                registry.lookup(name, &format!("kernel `{}`", kernel.name()))?;
            }
            catalog.resolve_prefetch(position, &registry)?;
        }
        rules.verify(&registry)?;
        info!(
            "Finalized kernel library with {} matrices and {} kernels for {}",
            registry.len(),
            catalog.len(),
            architecture
        );
        Ok(Self {
            registry,
            catalog,
            architecture,
            generator: generator.into(),
        })
    }

    pub fn registry(&self) -> &MatrixRegistry {
        &self.registry
    }

    pub fn catalog(&self) -> &KernelCatalog {
        &self.catalog
    }

    pub fn architecture(&self) -> &Architecture {
        &self.architecture
    }

    /// Backend selection identifier.
    pub fn generator(&self) -> &str {
        &self.generator
    }

    /// The resolved prefetch targets of all kernels, in catalog order.
    pub fn prefetches(&self) -> Vec<ResolvedPrefetch<'_>> {
        (0..self.catalog.len())
            .map(|position| {
                self.catalog
                    .resolve_prefetch(position, &self.registry)
                    .expect("Internal error: prefetches are resolved when the library is finalized")
            })
            .collect()
    }
}

/// A code generation backend.
pub trait CodeGenerator {
    fn generate(&self, library: &KernelLibrary, output_dir: &Path) -> eyre::Result<()>;
}
