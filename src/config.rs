//! Solver-wide configuration of a generation run.
use clap::Parser;
use std::path::PathBuf;

/// Number of physical quantities of the elastic wave equation.
pub const NUMBER_OF_QUANTITIES: usize = 9;

/// Number of basis functions of a polynomial basis on tetrahedra for a scheme of the given order.
pub fn number_of_basis_functions(order: usize) -> usize {
    order * (order + 1) * (order + 2) / 6
}

/// Number of basis functions on a triangular face for a scheme of the given order.
pub fn number_of_face_basis_functions(order: usize) -> usize {
    order * (order + 1) / 2
}

/// Generate small matrix multiplication kernels for an ADER-DG elastic wave solver.
#[derive(Debug, Clone, Parser)]
#[command(name = "adergen", version)]
pub struct GeneratorConfig {
    /// Directory containing the `matrices_<N>.json` descriptions.
    #[arg(long = "matricesDir")]
    pub matrices_dir: PathBuf,

    /// Directory the backend writes its output to.
    #[arg(long = "outputDir")]
    pub output_dir: PathBuf,

    /// Target architecture identifier, e.g. `dsnb`.
    #[arg(long)]
    pub arch: String,

    /// Convergence order of the scheme.
    #[arg(long)]
    pub order: usize,

    /// Number of relaxation mechanisms; unused by the elastic solver.
    #[arg(long = "numberOfMechanisms", default_value_t = 0)]
    pub number_of_mechanisms: usize,

    /// Backend selection, forwarded to the code generator.
    #[arg(long)]
    pub generator: String,

    /// Memory layout description.
    #[arg(long = "memLayout")]
    pub mem_layout: PathBuf,

    #[arg(long = "dynamicRuptureMethod", default_value = "quadrature")]
    pub dynamic_rupture_method: String,

    #[arg(long = "PlasticityMethod", default_value = "nb")]
    pub plasticity_method: String,
}

impl GeneratorConfig {
    pub fn number_of_basis_functions(&self) -> usize {
        number_of_basis_functions(self.order)
    }

    /// Path of the matrix description matching the configured order.
    pub fn matrices_file(&self) -> PathBuf {
        self.matrices_dir
            .join(format!("matrices_{}.json", self.number_of_basis_functions()))
    }
}
