//! A JSON manifest describing a kernel library for an external code generator.
use crate::arch::Architecture;
use crate::backend::{CodeGenerator, KernelLibrary};
use crate::blocks::SparsityClass;
use crate::kernel::ResolvedPrefetch;
use crate::matrix::{MatrixDescriptor, MemoryLayout, Sparsity};
use adergen_sparse::Region;
use eyre::Context;
use log::info;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub const MANIFEST_FILE_NAME: &str = "kernels.json";

#[derive(Debug, Serialize)]
pub struct Manifest<'a> {
    pub architecture: &'a Architecture,
    pub generator: &'a str,
    pub matrices: Vec<MatrixManifest<'a>>,
    pub kernels: Vec<KernelManifest<'a>>,
}

#[derive(Debug, Serialize)]
pub struct RegionManifest {
    pub rows: (usize, usize),
    pub columns: (usize, usize),
}

impl From<&Region> for RegionManifest {
    fn from(region: &Region) -> Self {
        Self {
            rows: (region.rows.start, region.rows.end),
            columns: (region.cols.start, region.cols.end),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MatrixManifest<'a> {
    pub name: &'a str,
    pub rows: usize,
    pub columns: usize,
    /// Leading dimension after padding for the target architecture.
    pub leading_dimension: usize,
    pub layout: &'static str,
    /// Populated entries, omitted for dense matrices.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries: Option<Vec<(usize, usize)>>,
    pub blocks: Vec<RegionManifest>,
    pub global_id: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct FactorManifest<'a> {
    pub matrix: &'a str,
    pub region: RegionManifest,
    pub sparse: bool,
}

#[derive(Debug, Serialize)]
pub struct BlockManifest<'a> {
    pub output: RegionManifest,
    pub sparse: bool,
    pub factors: Vec<FactorManifest<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", content = "target", rename_all = "lowercase")]
pub enum PrefetchManifest<'a> {
    None,
    Matrix(&'a str),
    Kernel(&'a str),
}

#[derive(Debug, Serialize)]
pub struct KernelManifest<'a> {
    pub name: &'a str,
    pub expression: String,
    pub rows: usize,
    pub columns: usize,
    pub terms: Vec<Vec<&'a str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<BlockManifest<'a>>>,
    pub prefetch: PrefetchManifest<'a>,
    pub beta: f64,
}

fn matrix_manifest<'a>(matrix: &'a MatrixDescriptor, architecture: &Architecture) -> MatrixManifest<'a> {
    MatrixManifest {
        name: matrix.name(),
        rows: matrix.nrows(),
        columns: matrix.ncols(),
        leading_dimension: architecture.aligned_rows(matrix.nrows()),
        layout: match matrix.layout() {
            MemoryLayout::Dense => "dense",
            MemoryLayout::Sparse => "sparse",
            MemoryLayout::BlockDense(_) => "blockdense",
        },
        entries: match matrix.sparsity() {
            Sparsity::Dense => None,
            Sparsity::Pattern(pattern) => Some(pattern.entries().collect()),
        },
        blocks: matrix.blocks().iter().map(RegionManifest::from).collect(),
        global_id: matrix.global_id(),
    }
}

impl<'a> Manifest<'a> {
    pub fn from_library(library: &'a KernelLibrary) -> Self {
        let architecture = library.architecture();
        let matrices = library
            .registry()
            .iter()
            .map(|matrix| matrix_manifest(matrix, architecture))
            .collect();

        let kernels = library
            .catalog()
            .iter()
            .zip(library.prefetches())
            .map(|(kernel, prefetch)| {
                let expression = kernel.expression();
                let (rows, columns) = expression.shape().unwrap_or((0, 0));
                let blocks = expression.blocks().map(|decomposition| {
                    decomposition
                        .blocks()
                        .iter()
                        .map(|block| BlockManifest {
                            output: RegionManifest::from(&block.output),
                            sparse: block.class == SparsityClass::Sparse,
                            factors: block
                                .factors
                                .iter()
                                .map(|factor| FactorManifest {
                                    matrix: &factor.matrix,
                                    region: RegionManifest::from(&factor.region),
                                    sparse: factor.class == SparsityClass::Sparse,
                                })
                                .collect(),
                        })
                        .collect()
                });
                KernelManifest {
                    name: kernel.name(),
                    expression: expression.to_string(),
                    rows,
                    columns,
                    terms: expression.terms(),
                    blocks,
                    prefetch: match prefetch {
                        ResolvedPrefetch::None => PrefetchManifest::None,
                        ResolvedPrefetch::Matrix(matrix) => PrefetchManifest::Matrix(matrix.name()),
                        ResolvedPrefetch::Kernel(kernel) => PrefetchManifest::Kernel(kernel.name()),
                    },
                    beta: kernel.beta(),
                }
            })
            .collect();

        Self {
            architecture,
            generator: library.generator(),
            matrices,
            kernels,
        }
    }
}

/// Writes the kernel library as a JSON manifest for an external code generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManifestGenerator;

impl CodeGenerator for ManifestGenerator {
    fn generate(&self, library: &KernelLibrary, output_dir: &Path) -> eyre::Result<()> {
        std::fs::create_dir_all(output_dir)
            .wrap_err_with(|| format!("failed to create output directory {}", output_dir.display()))?;
        let path = output_dir.join(MANIFEST_FILE_NAME);
        let file = File::create(&path).wrap_err_with(|| format!("failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &Manifest::from_library(library))
            .wrap_err("failed to write kernel manifest")?;
        writer
            .flush()
            .wrap_err_with(|| format!("failed to flush {}", path.display()))?;
        info!("Wrote kernel manifest to {}", path.display());
        Ok(())
    }
}
