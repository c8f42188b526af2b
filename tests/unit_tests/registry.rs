use adergen::adergen_sparse::Region;
use adergen::matrix::{MatrixDescriptor, MemoryLayout};
use adergen::registry::MatrixRegistry;
use adergen::KernelError;

#[test]
fn insert_and_lookup() {
    let mut registry = MatrixRegistry::new();
    assert!(registry.is_empty());
    registry.insert(MatrixDescriptor::new("A", 2, 3)).unwrap();
    registry.insert(MatrixDescriptor::new("B", 3, 4)).unwrap();

    assert_eq!(registry.len(), 2);
    assert!(registry.contains("A"));
    assert_eq!(registry.get("B").unwrap().shape(), (3, 4));
    let names: Vec<_> = registry.iter().map(MatrixDescriptor::name).collect();
    assert_eq!(names, ["A", "B"]);

    let missing = registry.lookup("C", "kernel `k`");
    assert!(matches!(
        missing,
        Err(KernelError::UnresolvedReference { ref name, ref referenced_by })
            if name == "C" && referenced_by == "kernel `k`"
    ));
}

#[test]
fn duplicate_names_are_rejected() {
    let mut registry = MatrixRegistry::new();
    registry.insert(MatrixDescriptor::new("A", 2, 3)).unwrap();
    let result = registry.insert(MatrixDescriptor::new("A", 5, 5));
    assert!(matches!(result, Err(KernelError::DuplicateName { kind: "matrix", ref name }) if name == "A"));
    assert_eq!(registry.get("A").unwrap().shape(), (2, 3));
}

#[test]
fn layout_reaches_every_clone() {
    let mut registry = MatrixRegistry::new();
    let star = MatrixDescriptor::new("star", 9, 9);
    registry.insert_clones(&star, &["AstarT", "BstarT", "CstarT"]).unwrap();
    assert_eq!(registry.len(), 3);
    assert!(!registry.contains("star"));
    assert_eq!(registry.resolve_clones("star"), ["AstarT", "BstarT", "CstarT"]);
    assert_eq!(registry.resolve_clones("AstarT"), ["AstarT"]);

    registry.set_layout("star", MemoryLayout::Sparse).unwrap();
    for name in ["AstarT", "BstarT", "CstarT"] {
        assert_eq!(registry.get(name).unwrap().layout(), &MemoryLayout::Sparse);
    }

    let blocks = MemoryLayout::BlockDense(vec![Region::full(9, 9)]);
    registry.set_layout("BstarT", blocks.clone()).unwrap();
    assert_eq!(registry.get("BstarT").unwrap().layout(), &blocks);
    assert_eq!(registry.get("AstarT").unwrap().layout(), &MemoryLayout::Sparse);
}

#[test]
fn layout_of_unknown_matrix_fails() {
    let mut registry = MatrixRegistry::new();
    let result = registry.set_layout("missing", MemoryLayout::Dense);
    assert!(matches!(result, Err(KernelError::UnresolvedReference { .. })));
}
