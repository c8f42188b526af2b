use adergen::arch::Architecture;
use adergen::backend::KernelLibrary;
use adergen::blocks::{decompose, BlockFitOptions};
use adergen::kernel::{KernelCatalog, PrefetchHint};
use adergen::matrix::MatrixDescriptor;
use adergen::registry::MatrixRegistry;
use adergen::seissol::{
    add_dof_matrices, add_flux_solver_matrices, assemble_elastic, neighboring_flux_kernels, DynamicRupture, Plasticity,
    SolverExtension, SurfaceDisplacement, TIME_DERIVATIVE_0,
};
use adergen::adergen_sparse::pattern_from_entries;
use adergen::KernelError;
use matrixcompare::assert_matrix_eq;
use util::{elastic_registry, registry_values};

const ORDER: usize = 3;
const NBF: usize = 10;

fn extensions() -> Vec<Box<dyn SolverExtension>> {
    vec![
        Box::new(DynamicRupture::new("quadrature", ORDER, TIME_DERIVATIVE_0).unwrap()),
        Box::new(Plasticity::new("nb", ORDER).unwrap()),
        Box::new(SurfaceDisplacement::new(ORDER)),
    ]
}

fn assemble(registry: &mut MatrixRegistry) -> KernelCatalog {
    let (catalog, _) = assemble_elastic(registry, ORDER, &extensions(), |_| Ok(())).unwrap();
    catalog
}

#[test]
fn elastic_catalog_layout() {
    let mut registry = elastic_registry(ORDER);
    let catalog = assemble(&mut registry);

    let names: Vec<_> = catalog.iter().map(|kernel| kernel.name()).collect();
    assert_eq!(names.len(), 1 + 4 + 48 + 2 + 32 + 2 + 4);
    assert_eq!(names[0], "volume");
    assert_eq!(&names[1..5], ["localFlux[0]", "localFlux[1]", "localFlux[2]", "localFlux[3]"]);
    let neighboring: Vec<String> = (0..48).map(|i| format!("neighboringFlux[{i}]")).collect();
    assert_eq!(&names[5..53], neighboring.as_slice());
    assert_eq!(&names[53..55], ["derivative[1]", "derivative[2]"]);
    assert_eq!(names[55], "godunovState[0]");
    assert_eq!(names[71], "nodalFlux[0]");
    assert_eq!(&names[87..89], ["evaluateAtNodes", "convertToModal"]);
    assert_eq!(names[92], "surfaceDisplacement[3]");
}

#[test]
fn volume_and_flux_kernels() {
    let mut registry = elastic_registry(ORDER);
    let catalog = assemble(&mut registry);

    let volume = catalog.get("volume").unwrap();
    assert_eq!(volume.expression().shape(), Some((NBF, 9)));
    assert_eq!(volume.beta(), 1.0);
    assert_eq!(
        volume.expression().to_string(),
        "kXiDivM * timeIntegrated * AstarT + kEtaDivM * timeIntegrated * BstarT + kZetaDivM * timeIntegrated * CstarT"
    );

    let prefetches: Vec<_> = (0..4)
        .map(|i| catalog.get(&format!("localFlux[{i}]")).unwrap().prefetch().clone())
        .collect();
    assert_eq!(
        prefetches,
        [
            PrefetchHint::Expression("timeIntegrated".to_string()),
            PrefetchHint::PriorKernel("localFlux[0]".to_string()),
            PrefetchHint::None,
            PrefetchHint::None,
        ]
    );
    assert_eq!(
        catalog.get("localFlux[2]").unwrap().expression().to_string(),
        "r3DivM * fMrT3 * timeIntegrated * AplusT"
    );

    for kernel in catalog.iter().filter(|kernel| kernel.name().starts_with("neighboringFlux")) {
        assert_eq!(kernel.expression().shape(), Some((NBF, 9)));
        assert_eq!(kernel.prefetch(), &PrefetchHint::Expression("timeIntegrated".to_string()));
    }
    // 17 = 12 * 1 + 3 * 1 + 2
    assert_eq!(
        catalog.get("neighboringFlux[17]").unwrap().expression().to_string(),
        "r2DivM * fP3 * rT2 * timeIntegrated * AminusT"
    );
}

#[test]
fn global_ids_are_resolved() {
    let mut registry = elastic_registry(ORDER);
    assemble(&mut registry);

    for (name, id) in [("kXiDivMT", 0), ("kZetaDivM", 5), ("r4DivM", 9), ("rT1", 10), ("fMrT2", 15), ("fP3", 20)] {
        assert_eq!(registry.get(name).unwrap().global_id(), Some(id), "{name}");
    }
    for name in ["AstarT", "AplusT", "timeIntegrated", "timeDerivative1", "godunovMatrix"] {
        assert_eq!(registry.get(name).unwrap().global_id(), None, "{name}");
    }
}

#[test]
fn assembled_kernels_finalize() {
    let mut registry = elastic_registry(ORDER);
    let (catalog, rules) = assemble_elastic(&mut registry, ORDER, &extensions(), |_| Ok(())).unwrap();
    let architecture = Architecture::from_identifier("dsnb").unwrap();
    let library = KernelLibrary::finalize(registry, catalog, &rules, architecture, "libxsmm").unwrap();
    assert_eq!(library.generator(), "libxsmm");
    assert_eq!(library.prefetches().len(), library.catalog().len());
}

#[test]
fn block_decompositions_of_elastic_kernels_are_lossless() {
    let mut registry = elastic_registry(ORDER);
    let catalog = assemble(&mut registry);
    let values = registry_values(&registry);
    let options = BlockFitOptions::default();

    for kernel in catalog.iter() {
        let decomposition = decompose(kernel.expression(), &registry, &options).unwrap();
        let expected = kernel.expression().evaluate(&values).unwrap();
        let blocked = decomposition.evaluate(&values).unwrap();
        assert_matrix_eq!(blocked, expected, comp = abs, tol = 1e-9);
    }
}

#[test]
fn parallel_neighboring_flux_is_deterministic() {
    let mut registry = elastic_registry(ORDER);
    add_flux_solver_matrices(&mut registry).unwrap();
    add_dof_matrices(&mut registry, ORDER).unwrap();
    let first = neighboring_flux_kernels(&registry).unwrap();
    let second = neighboring_flux_kernels(&registry).unwrap();
    assert_eq!(first.len(), 48);
    assert_eq!(first, second);
}

#[test]
fn described_extension_matrices_are_kept() {
    let mut registry = elastic_registry(ORDER);
    let diagonal = pattern_from_entries(9, 9, (0..9).map(|i| (i, i))).unwrap();
    registry
        .insert(MatrixDescriptor::with_pattern("godunovMatrix", diagonal.clone()))
        .unwrap();
    assemble(&mut registry);
    assert_eq!(registry.get("godunovMatrix").unwrap().pattern().as_ref(), &diagonal);
    assert_eq!(registry.get("godunovState").unwrap().shape(), (16, 9));
    assert_eq!(registry.get("vNodes").unwrap().shape(), (NBF, NBF));
    assert_eq!(registry.get("V3mTo2nFace2").unwrap().shape(), (6, NBF));
    assert_eq!(registry.get("selectVelocity").unwrap().pattern().nnz(), 3);
}

#[test]
fn missing_global_matrices_abort_assembly() {
    let mut registry = MatrixRegistry::new();
    for descriptor in elastic_registry(ORDER).iter().filter(|matrix| matrix.name() != "fP2") {
        registry.insert(descriptor.clone()).unwrap();
    }
    let error = assemble_elastic(&mut registry, ORDER, &extensions(), |_| Ok(())).unwrap_err();
    assert!(matches!(
        error.downcast_ref::<KernelError>(),
        Some(KernelError::UnresolvedReference { name, .. }) if name == "fP2"
    ));
}

#[test]
fn unknown_extension_methods_are_rejected() {
    assert!(DynamicRupture::new("exact", ORDER, TIME_DERIVATIVE_0).is_err());
    assert!(Plasticity::new("modal", ORDER).is_err());
    assert_eq!(Plasticity::new("ip", ORDER).unwrap().number_of_nodes(), 64);
    assert_eq!(
        DynamicRupture::new("cellaverage", ORDER, TIME_DERIVATIVE_0)
            .unwrap()
            .number_of_points(),
        16
    );
}
