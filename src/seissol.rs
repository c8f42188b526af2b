//! Kernels of the elastic ADER-DG wave propagation solver.
//!
//! With `Nbf` basis functions per element, `Nf` basis functions per face and 9 quantities,
//! the solver uses
//!
//! - stiffness matrices `k{Xi,Eta,Zeta}DivM` and their transposes `k{Xi,Eta,Zeta}DivMT` (`Nbf x Nbf`),
//! - flux matrices `r{i}DivM` (`Nbf x Nf`), `fMrT{i}` and `rT{i}` (`Nf x Nbf`), `fP{h}` (`Nf x Nf`),
//! - star matrices `AstarT`, `BstarT`, `CstarT` and flux solvers `AplusT`, `AminusT` (`9 x 9`),
//! - the element degrees of freedom `timeIntegrated` and `timeDerivative0` (`Nbf x 9`).
use crate::arch::Architecture;
use crate::backend::KernelLibrary;
use crate::blocks::BlockFitOptions;
use crate::config::{number_of_basis_functions, GeneratorConfig, NUMBER_OF_QUANTITIES};
use crate::derivative::DerivativeRecurrence;
use crate::error::Result;
use crate::expression::ExpressionBuilder;
use crate::global_ids::GlobalMatrixIdRules;
use crate::io::description::{apply_memory_layout_from_file, load_matrices_from_file};
use crate::kernel::{KernelCatalog, KernelPrototype, PrefetchHint};
use crate::matrix::MatrixDescriptor;
use crate::registry::MatrixRegistry;
use eyre::Context;
use itertools::iproduct;
use log::info;
use rayon::prelude::*;

mod dynamic_rupture;
mod plasticity;
mod surface_displacement;

pub use dynamic_rupture::DynamicRupture;
pub use plasticity::Plasticity;
pub use surface_displacement::SurfaceDisplacement;

/// Number of faces of a tetrahedron.
pub const NUMBER_OF_FACES: usize = 4;
/// Number of possible orientations of a face relative to its neighbor.
pub const NUMBER_OF_FACE_ORIENTATIONS: usize = 3;

pub const TIME_INTEGRATED: &str = "timeIntegrated";
pub const TIME_DERIVATIVE_0: &str = "timeDerivative0";

/// The star matrices share one description, registered under three names.
pub const CLONES: &[(&str, &[&str])] = &[("star", &["AstarT", "BstarT", "CstarT"])];

/// Contributes matrices and kernels beyond the elastic core.
pub trait SolverExtension {
    fn name(&self) -> &str;

    fn add_matrices(&self, registry: &mut MatrixRegistry) -> eyre::Result<()>;

    fn add_kernels(&self, registry: &MatrixRegistry, catalog: &mut KernelCatalog) -> eyre::Result<()>;
}

/// Inserts a matrix unless one with the same name was already loaded from a description.
pub(crate) fn insert_if_absent(registry: &mut MatrixRegistry, descriptor: MatrixDescriptor) -> Result<()> {
    if registry.contains(descriptor.name()) {
        Ok(())
    } else {
        registry.insert(descriptor)
    }
}

/// Global matrix id rules of the elastic solver.
///
/// Transposed stiffness matrices come first (0-2), followed by the stiffness matrices
/// (3-5), the flux matrices `r{i}DivM` (6-9), `rT{i}` (10-13), `fMrT{i}` (14-17) and the
/// face permutation matrices `fP{h}` (18-20).
pub fn global_matrix_id_rules() -> Result<GlobalMatrixIdRules> {
    fn stiffness_order(captures: &[&str]) -> Option<usize> {
        match captures.first().copied()? {
            "Xi" => Some(0),
            "Eta" => Some(1),
            "Zeta" => Some(2),
            _ => None,
        }
    }
    fn one_based_digit(captures: &[&str]) -> Option<usize> {
        captures.first()?.parse::<usize>().ok()?.checked_sub(1)
    }

    GlobalMatrixIdRules::new()
        .with_rule(r"^k(Xi|Eta|Zeta)DivMT$", stiffness_order)?
        .with_rule(r"^k(Xi|Eta|Zeta)DivM$", |c| Some(3 + stiffness_order(c)?))?
        .with_rule(r"^r(\d{1})DivM$", |c| Some(6 + one_based_digit(c)?))?
        .with_rule(r"^rT(\d{1})$", |c| Some(10 + one_based_digit(c)?))?
        .with_rule(r"^fMrT(\d{1})$", |c| Some(14 + one_based_digit(c)?))?
        .with_rule(r"^fP(\d{1})$", |c| Some(18 + one_based_digit(c)?))
}

/// Registers the flux solver matrices `AplusT` and `AminusT`.
pub fn add_flux_solver_matrices(registry: &mut MatrixRegistry) -> Result<()> {
    registry.insert(MatrixDescriptor::new("AplusT", NUMBER_OF_QUANTITIES, NUMBER_OF_QUANTITIES))?;
    registry.insert(MatrixDescriptor::new("AminusT", NUMBER_OF_QUANTITIES, NUMBER_OF_QUANTITIES))
}

/// Registers the element degrees of freedom `timeIntegrated` and `timeDerivative0`.
pub fn add_dof_matrices(registry: &mut MatrixRegistry, order: usize) -> Result<()> {
    let nbf = number_of_basis_functions(order);
    registry.insert(MatrixDescriptor::new(TIME_INTEGRATED, nbf, NUMBER_OF_QUANTITIES))?;
    registry.insert(MatrixDescriptor::new(TIME_DERIVATIVE_0, nbf, NUMBER_OF_QUANTITIES))
}

/// `kXiDivM * timeIntegrated * AstarT + kEtaDivM * timeIntegrated * BstarT + kZetaDivM * timeIntegrated * CstarT`
pub fn volume_kernel(registry: &MatrixRegistry) -> Result<KernelPrototype> {
    let builder = ExpressionBuilder::new(registry);
    let volume = builder.sum([
        builder.chain(["kXiDivM", TIME_INTEGRATED, "AstarT"])?,
        builder.chain(["kEtaDivM", TIME_INTEGRATED, "BstarT"])?,
        builder.chain(["kZetaDivM", TIME_INTEGRATED, "CstarT"])?,
    ])?;
    Ok(KernelPrototype::new("volume", volume))
}

/// The kernels `localFlux[i] = r{i+1}DivM * fMrT{i+1} * timeIntegrated * AplusT`.
///
/// The first kernel prefetches `timeIntegrated`, the second prefetches the operands of
/// the first and the remaining ones do not prefetch.
pub fn local_flux_kernels(registry: &MatrixRegistry) -> Result<Vec<KernelPrototype>> {
    let builder = ExpressionBuilder::new(registry);
    (0..NUMBER_OF_FACES)
        .map(|i| {
            let r = format!("r{}DivM", i + 1);
            let f = format!("fMrT{}", i + 1);
            let local_flux = builder.chain([r.as_str(), f.as_str(), TIME_INTEGRATED, "AplusT"])?;
            let prefetch = match i {
                0 => PrefetchHint::Expression(TIME_INTEGRATED.to_string()),
                1 => PrefetchHint::PriorKernel("localFlux[0]".to_string()),
                _ => PrefetchHint::None,
            };
            Ok(KernelPrototype::new(format!("localFlux[{i}]"), local_flux).with_prefetch(prefetch))
        })
        .collect()
}

/// The kernels `neighboringFlux[12i + 3j + h] = r{i+1}DivM * fP{h+1} * rT{j+1} * timeIntegrated * AminusT`.
///
/// The expressions are independent and built in parallel against the read-only registry.
pub fn neighboring_flux_kernels(registry: &MatrixRegistry) -> Result<Vec<KernelPrototype>> {
    let combinations: Vec<_> = iproduct!(0..NUMBER_OF_FACES, 0..NUMBER_OF_FACES, 0..NUMBER_OF_FACE_ORIENTATIONS).collect();
    combinations
        .into_par_iter()
        .map(|(i, j, h)| {
            let builder = ExpressionBuilder::new(registry);
            let r = format!("r{}DivM", i + 1);
            let f = format!("fP{}", h + 1);
            let rt = format!("rT{}", j + 1);
            let neighboring_flux = builder.chain([r.as_str(), f.as_str(), rt.as_str(), TIME_INTEGRATED, "AminusT"])?;
            let index = i * NUMBER_OF_FACE_ORIENTATIONS * NUMBER_OF_FACES + j * NUMBER_OF_FACE_ORIENTATIONS + h;
            Ok(KernelPrototype::new(format!("neighboringFlux[{index}]"), neighboring_flux)
                .with_prefetch(PrefetchHint::Expression(TIME_INTEGRATED.to_string())))
        })
        .collect()
}

/// Appends the volume, flux and time derivative kernels to the catalog.
///
/// Returns the name of the highest time derivative in the registry.
pub fn add_elastic_kernels(
    registry: &mut MatrixRegistry,
    catalog: &mut KernelCatalog,
    order: usize,
    options: &BlockFitOptions,
) -> Result<String> {
    catalog.add(volume_kernel(registry)?)?;
    for kernel in local_flux_kernels(registry)? {
        catalog.add(kernel)?;
    }
    for kernel in neighboring_flux_kernels(registry)? {
        catalog.add(kernel)?;
    }
    let recurrence = DerivativeRecurrence {
        options: *options,
        ..DerivativeRecurrence::default()
    };
    recurrence.run(registry, catalog, order)
}

/// The solver extensions selected by the configuration.
pub fn extensions(config: &GeneratorConfig) -> eyre::Result<Vec<Box<dyn SolverExtension>>> {
    Ok(vec![
        Box::new(DynamicRupture::new(&config.dynamic_rupture_method, config.order, TIME_DERIVATIVE_0)?),
        Box::new(Plasticity::new(&config.plasticity_method, config.order)?),
        Box::new(SurfaceDisplacement::new(config.order)),
    ])
}

/// Assembles the matrices and kernels of the elastic solver into the registry.
///
/// The registry holds the matrices loaded from the descriptions. `apply_layout` runs once
/// every statically known matrix is registered and before global identifiers are
/// resolved. Returns the kernel catalog and the identifier rules used.
pub fn assemble_elastic<F>(
    registry: &mut MatrixRegistry,
    order: usize,
    extensions: &[Box<dyn SolverExtension>],
    apply_layout: F,
) -> eyre::Result<(KernelCatalog, GlobalMatrixIdRules)>
where
    F: FnOnce(&mut MatrixRegistry) -> eyre::Result<()>,
{
    add_flux_solver_matrices(registry)?;
    for extension in extensions {
        extension
            .add_matrices(registry)
            .wrap_err_with(|| format!("{} failed to add matrices", extension.name()))?;
    }
    apply_layout(&mut *registry)?;

    let rules = global_matrix_id_rules()?;
    rules.determine_global_matrix_ids(registry)?;

    let mut catalog = KernelCatalog::new();
    add_dof_matrices(registry, order)?;
    let last_derivative = add_elastic_kernels(registry, &mut catalog, order, &BlockFitOptions::default())?;
    info!("Highest time derivative is {}", last_derivative);

    for extension in extensions {
        extension
            .add_kernels(registry, &mut catalog)
            .wrap_err_with(|| format!("{} failed to add kernels", extension.name()))?;
    }
    info!("Assembled {} kernels over {} matrices", catalog.len(), registry.len());
    Ok((catalog, rules))
}

/// Runs a complete generation: loads the descriptions named by the configuration,
/// assembles the elastic solver and finalizes the kernel library.
pub fn generate_kernel_library(config: &GeneratorConfig) -> eyre::Result<KernelLibrary> {
    let architecture = Architecture::from_identifier(&config.arch)?;
    let extensions = extensions(config)?;

    let mut registry = load_matrices_from_file(config.matrices_file(), CLONES)?;
    let (catalog, rules) = assemble_elastic(&mut registry, config.order, &extensions, |registry| {
        apply_memory_layout_from_file(&config.mem_layout, registry)
    })?;

    Ok(KernelLibrary::finalize(
        registry,
        catalog,
        &rules,
        architecture,
        config.generator.clone(),
    )?)
}
