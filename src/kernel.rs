//! Kernel prototypes and the ordered catalog collecting them.
use crate::error::{KernelError, Result};
use crate::expression::Expression;
use crate::matrix::MatrixDescriptor;
use crate::registry::MatrixRegistry;
use log::debug;
use rustc_hash::FxHashMap;

/// A hint to the backend about which value to stage into fast memory ahead of a kernel.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PrefetchHint {
    #[default]
    None,
    /// Prefetch the value of a named matrix of the registry.
    Expression(String),
    /// Prefetch the operands of a kernel that appears earlier in the catalog.
    PriorKernel(String),
}

/// A prefetch hint resolved against the registry and catalog.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResolvedPrefetch<'a> {
    None,
    Matrix(&'a MatrixDescriptor),
    Kernel(&'a KernelPrototype),
}

/// A named computation handed to the code generation backend.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelPrototype {
    name: String,
    expression: Expression,
    prefetch: PrefetchHint,
    beta: f64,
}

impl KernelPrototype {
    /// A prototype accumulating into its destination (`beta = 1`) without prefetching.
    pub fn new(name: impl Into<String>, expression: Expression) -> Self {
        Self {
            name: name.into(),
            expression,
            prefetch: PrefetchHint::None,
            beta: 1.0,
        }
    }

    pub fn with_prefetch(self, prefetch: PrefetchHint) -> Self {
        Self { prefetch, ..self }
    }

    pub fn with_beta(self, beta: f64) -> Self {
        Self { beta, ..self }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    pub fn prefetch(&self) -> &PrefetchHint {
        &self.prefetch
    }

    /// Blending factor: zero overwrites the destination, anything else accumulates.
    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn overwrites_destination(&self) -> bool {
        self.beta == 0.0
    }
}

/// An ordered collection of uniquely named kernel prototypes.
#[derive(Debug, Clone, Default)]
pub struct KernelCatalog {
    prototypes: Vec<KernelPrototype>,
    index: FxHashMap<String, usize>,
}

impl KernelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.prototypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prototypes.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&KernelPrototype> {
        self.index.get(name).map(|&idx| &self.prototypes[idx])
    }

    /// Position of the named kernel in the catalog.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KernelPrototype> {
        self.prototypes.iter()
    }

    pub fn prototypes(&self) -> &[KernelPrototype] {
        &self.prototypes
    }

    /// Appends a prototype to the catalog.
    ///
    /// The prototype's expression must be shape-validated. Prefetch targets are not
    /// checked here; see [`KernelCatalog::resolve_prefetch`].
    pub fn add(&mut self, prototype: KernelPrototype) -> Result<()> {
        if self.index.contains_key(prototype.name()) {
            return Err(KernelError::DuplicateName {
                kind: "kernel",
                name: prototype.name().to_string(),
            });
        }
        prototype.expression().validated_shape()?;
        debug!(
            "Adding kernel {} = {} (beta = {})",
            prototype.name(),
            prototype.expression(),
            prototype.beta()
        );
        self.index
            .insert(prototype.name().to_string(), self.prototypes.len());
        self.prototypes.push(prototype);
        Ok(())
    }

    /// Shorthand for adding a prototype with the given hints.
    pub fn add_prototype(
        &mut self,
        name: impl Into<String>,
        expression: Expression,
        prefetch: PrefetchHint,
        beta: f64,
    ) -> Result<()> {
        self.add(
            KernelPrototype::new(name, expression)
                .with_prefetch(prefetch)
                .with_beta(beta),
        )
    }

    /// Resolves the prefetch hint of the kernel at `position`.
    ///
    /// Prior-kernel references must name a kernel that appears earlier in the catalog.
    pub fn resolve_prefetch<'a>(
        &'a self,
        position: usize,
        registry: &'a MatrixRegistry,
    ) -> Result<ResolvedPrefetch<'a>> {
        let kernel = self.prototypes.get(position).ok_or_else(|| {
            KernelError::PreconditionViolation(format!(
                "kernel position {position} is out of range for a catalog of {} kernels",
                self.prototypes.len()
            ))
        })?;
        let unknown = |target: &str| KernelError::UnknownPrefetchTarget {
            kernel: kernel.name().to_string(),
            target: target.to_string(),
        };
        match kernel.prefetch() {
            PrefetchHint::None => Ok(ResolvedPrefetch::None),
            PrefetchHint::Expression(name) => registry
                .get(name)
                .map(ResolvedPrefetch::Matrix)
                .ok_or_else(|| unknown(name)),
            PrefetchHint::PriorKernel(name) => match self.position(name) {
                Some(target) if target < position => Ok(ResolvedPrefetch::Kernel(&self.prototypes[target])),
                _ => Err(unknown(name)),
            },
        }
    }
}
