//! JSON matrix and memory layout descriptions.
//!
//! A matrix description is an array of matrices:
//!
//! ```json
//! [
//!   { "name": "kXiDivM", "rows": 4, "columns": 4, "entries": [[0, 1], [1, 3]] },
//!   { "name": "star", "rows": 9, "columns": 9 }
//! ]
//! ```
//!
//! Matrices without `entries` are dense. A memory layout description maps matrix (or
//! clone group) names to a layout:
//!
//! ```json
//! {
//!   "kXiDivM": "sparse",
//!   "star": { "blocks": [ { "rows": [0, 6], "columns": [6, 9] } ] }
//! }
//! ```
use crate::matrix::{MatrixDescriptor, MemoryLayout};
use crate::registry::MatrixRegistry;
use adergen_sparse::{pattern_from_entries, Region};
use eyre::{eyre, Context};
use log::{info, warn};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Clone groups: a described matrix is registered under each of the clone names instead
/// of its own name.
pub type Clones<'a> = &'a [(&'a str, &'a [&'a str])];

#[derive(Debug, Deserialize)]
struct MatrixEntry {
    name: String,
    rows: usize,
    columns: usize,
    #[serde(default)]
    entries: Option<Vec<(usize, usize)>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum LayoutKind {
    Dense,
    Sparse,
}

#[derive(Debug, Deserialize)]
struct BlockEntry {
    rows: (usize, usize),
    columns: (usize, usize),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LayoutEntry {
    Kind(LayoutKind),
    Blocks { blocks: Vec<BlockEntry> },
}

impl From<LayoutEntry> for MemoryLayout {
    fn from(entry: LayoutEntry) -> Self {
        match entry {
            LayoutEntry::Kind(LayoutKind::Dense) => MemoryLayout::Dense,
            LayoutEntry::Kind(LayoutKind::Sparse) => MemoryLayout::Sparse,
            LayoutEntry::Blocks { blocks } => MemoryLayout::BlockDense(
                blocks
                    .into_iter()
                    .map(|b| Region::new(b.rows.0..b.rows.1, b.columns.0..b.columns.1))
                    .collect(),
            ),
        }
    }
}

/// Loads the matrix description at the given path into a new registry.
pub fn load_matrices_from_file<P: AsRef<Path>>(file_path: P, clones: Clones) -> eyre::Result<MatrixRegistry> {
    let file_path = file_path.as_ref();
    let json = std::fs::read_to_string(file_path)
        .wrap_err_with(|| format!("failed to read matrix description {}", file_path.display()))?;
    load_matrices_from_str(&json, clones).wrap_err("failed to load matrix description")
}

/// Parses a JSON matrix description into a new registry.
pub fn load_matrices_from_str(json: &str, clones: Clones) -> eyre::Result<MatrixRegistry> {
    let entries: Vec<MatrixEntry> = serde_json::from_str(json).wrap_err("malformed matrix description")?;
    let mut registry = MatrixRegistry::new();
    for entry in entries {
        if entry.rows == 0 || entry.columns == 0 {
            return Err(eyre!("matrix {} has zero extent", entry.name));
        }
        let descriptor = match entry.entries {
            None => MatrixDescriptor::new(&entry.name, entry.rows, entry.columns),
            Some(entries) => {
                let pattern = pattern_from_entries(entry.rows, entry.columns, entries)
                    .map_err(|e| eyre!("matrix {} has invalid entries: {}", entry.name, e))?;
                MatrixDescriptor::try_with_extents_and_pattern(&entry.name, entry.rows, entry.columns, pattern)?
            }
        };
        match clones.iter().find(|(prototype, _)| *prototype == entry.name) {
            Some((_, clone_names)) => registry.insert_clones(&descriptor, clone_names)?,
            None => registry.insert(descriptor)?,
        }
    }
    info!("Loaded {} matrices", registry.len());
    Ok(registry)
}

/// Applies the memory layout description at the given path to the registry.
pub fn apply_memory_layout_from_file<P: AsRef<Path>>(file_path: P, registry: &mut MatrixRegistry) -> eyre::Result<()> {
    let file_path = file_path.as_ref();
    let json = std::fs::read_to_string(file_path)
        .wrap_err_with(|| format!("failed to read memory layout {}", file_path.display()))?;
    apply_memory_layout_from_str(&json, registry).wrap_err("failed to apply memory layout")
}

/// Applies a JSON memory layout description to the registry.
///
/// Entries naming matrices that are not registered are skipped, since layout files
/// usually cover every solver configuration.
pub fn apply_memory_layout_from_str(json: &str, registry: &mut MatrixRegistry) -> eyre::Result<()> {
    let layouts: BTreeMap<String, LayoutEntry> =
        serde_json::from_str(json).wrap_err("malformed memory layout description")?;
    for (name, entry) in layouts {
        let known = registry
            .resolve_clones(&name)
            .iter()
            .all(|target| registry.contains(target));
        if !known {
            warn!("Memory layout refers to unknown matrix {}, skipping", name);
            continue;
        }
        registry.set_layout(&name, entry.into())?;
    }
    Ok(())
}
