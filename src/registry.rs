//! The matrix registry owning every named matrix of a generation run.
use crate::error::{KernelError, Result};
use crate::matrix::{MatrixDescriptor, MemoryLayout};
use log::debug;
use rustc_hash::FxHashMap;

/// An insertion-ordered collection of uniquely named matrices.
///
/// Entries are never removed and their extents never change. Later passes may only
/// annotate existing entries with a memory layout or a global identifier.
#[derive(Debug, Clone, Default)]
pub struct MatrixRegistry {
    matrices: Vec<MatrixDescriptor>,
    index: FxHashMap<String, usize>,
    // Clone group name -> names of the clones
    clones: FxHashMap<String, Vec<String>>,
}

impl MatrixRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&MatrixDescriptor> {
        self.index.get(name).map(|&idx| &self.matrices[idx])
    }

    /// Looks up a matrix, reporting `referenced_by` as the origin of the reference on failure.
    pub fn lookup(&self, name: &str, referenced_by: &str) -> Result<&MatrixDescriptor> {
        self.get(name).ok_or_else(|| KernelError::UnresolvedReference {
            name: name.to_string(),
            referenced_by: referenced_by.to_string(),
        })
    }

    /// Matrices in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &MatrixDescriptor> {
        self.matrices.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut MatrixDescriptor> {
        self.matrices.iter_mut()
    }

    pub fn insert(&mut self, descriptor: MatrixDescriptor) -> Result<()> {
        if self.contains(descriptor.name()) {
            return Err(KernelError::DuplicateName {
                kind: "matrix",
                name: descriptor.name().to_string(),
            });
        }
        debug!(
            "Registering matrix {} ({}x{})",
            descriptor.name(),
            descriptor.nrows(),
            descriptor.ncols()
        );
        self.index
            .insert(descriptor.name().to_string(), self.matrices.len());
        self.matrices.push(descriptor);
        Ok(())
    }

    /// Inserts `prototype` once per clone name.
    ///
    /// The clones are remembered under the prototype's name, so that layout
    /// annotations addressed to the prototype reach every clone.
    pub fn insert_clones(&mut self, prototype: &MatrixDescriptor, clone_names: &[&str]) -> Result<()> {
        for &clone_name in clone_names {
            self.insert(prototype.clone_as(clone_name))?;
        }
        self.clones
            .entry(prototype.name().to_string())
            .or_default()
            .extend(clone_names.iter().map(|name| name.to_string()));
        Ok(())
    }

    /// Names addressed by `name`: the clones if `name` is a clone group, otherwise `name` itself.
    pub fn resolve_clones<'a>(&'a self, name: &'a str) -> Vec<&'a str> {
        match self.clones.get(name) {
            Some(clones) => clones.iter().map(String::as_str).collect(),
            None => vec![name],
        }
    }

    /// Annotates a matrix (or every clone of a clone group) with a memory layout.
    pub fn set_layout(&mut self, name: &str, layout: MemoryLayout) -> Result<()> {
        let targets: Vec<String> = self
            .resolve_clones(name)
            .into_iter()
            .map(str::to_string)
            .collect();
        for target in targets {
            let idx = *self
                .index
                .get(&target)
                .ok_or_else(|| KernelError::UnresolvedReference {
                    name: target.clone(),
                    referenced_by: "memory layout".to_string(),
                })?;
            self.matrices[idx].set_layout(layout.clone())?;
        }
        Ok(())
    }
}
