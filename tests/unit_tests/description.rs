use adergen::adergen_sparse::Region;
use adergen::io::description::{apply_memory_layout_from_str, load_matrices_from_str};
use adergen::matrix::MemoryLayout;
use adergen::seissol::CLONES;

const MATRICES: &str = r#"[
    { "name": "kXiDivM", "rows": 4, "columns": 4, "entries": [[1, 0], [2, 0], [3, 0], [3, 1]] },
    { "name": "r1DivM", "rows": 4, "columns": 3 },
    { "name": "star", "rows": 9, "columns": 9, "entries": [[0, 6], [6, 0]] }
]"#;

#[test]
fn load_matrices_with_clones() {
    let registry = load_matrices_from_str(MATRICES, CLONES).unwrap();
    let names: Vec<_> = registry.iter().map(|matrix| matrix.name()).collect();
    assert_eq!(names, ["kXiDivM", "r1DivM", "AstarT", "BstarT", "CstarT"]);

    let stiffness = registry.get("kXiDivM").unwrap();
    assert_eq!(stiffness.shape(), (4, 4));
    assert_eq!(stiffness.pattern().nnz(), 4);
    assert_eq!(stiffness.layout(), &MemoryLayout::Sparse);

    assert!(registry.get("r1DivM").unwrap().is_dense());
    assert_eq!(registry.get("CstarT").unwrap().pattern().nnz(), 2);
}

#[test]
fn malformed_descriptions_are_rejected() {
    assert!(load_matrices_from_str("{}", CLONES).is_err());
    assert!(load_matrices_from_str(r#"[{ "name": "A", "rows": 0, "columns": 3 }]"#, CLONES).is_err());
    assert!(load_matrices_from_str(r#"[{ "name": "A", "rows": 2, "columns": 2, "entries": [[2, 0]] }]"#, CLONES).is_err());
    assert!(load_matrices_from_str(r#"[{ "name": "A", "rows": 2, "columns": 2, "entries": [[0, 2]] }]"#, CLONES).is_err());
    let duplicate = r#"[{ "name": "A", "rows": 2, "columns": 2 }, { "name": "A", "rows": 2, "columns": 2 }]"#;
    assert!(load_matrices_from_str(duplicate, CLONES).is_err());
}

#[test]
fn apply_memory_layout() {
    let mut registry = load_matrices_from_str(MATRICES, CLONES).unwrap();
    let layout = r#"{
        "kXiDivM": "dense",
        "star": { "blocks": [ { "rows": [0, 1], "columns": [6, 7] }, { "rows": [6, 7], "columns": [0, 1] } ] },
        "godunovMatrix": "sparse"
    }"#;
    apply_memory_layout_from_str(layout, &mut registry).unwrap();

    assert_eq!(registry.get("kXiDivM").unwrap().layout(), &MemoryLayout::Dense);
    let expected = MemoryLayout::BlockDense(vec![Region::new(0..1, 6..7), Region::new(6..7, 0..1)]);
    for name in ["AstarT", "BstarT", "CstarT"] {
        assert_eq!(registry.get(name).unwrap().layout(), &expected);
    }
    // Layouts never change extents or patterns
    assert_eq!(registry.get("kXiDivM").unwrap().pattern().nnz(), 4);
}

#[test]
fn invalid_layouts_are_rejected() {
    let mut registry = load_matrices_from_str(MATRICES, CLONES).unwrap();
    let uncovering = r#"{ "star": { "blocks": [ { "rows": [0, 1], "columns": [6, 7] } ] } }"#;
    assert!(apply_memory_layout_from_str(uncovering, &mut registry).is_err());
    assert!(apply_memory_layout_from_str(r#"{ "kXiDivM": "diagonal" }"#, &mut registry).is_err());
}

#[test]
fn entries_with_huge_indices_are_rejected() {
    let overflowing = r#"[{ "name": "A", "rows": 2, "columns": 2, "entries": [[18446744073709551615, 0]] }]"#;
    assert!(load_matrices_from_str(overflowing, &[]).is_err());
    let far_row = r#"[{ "name": "A", "rows": 2, "columns": 2, "entries": [[100000000000, 0]] }]"#;
    assert!(load_matrices_from_str(far_row, &[]).is_err());
    let far_column = r#"[{ "name": "A", "rows": 2, "columns": 2, "entries": [[0, 18446744073709551615]] }]"#;
    assert!(load_matrices_from_str(far_column, &[]).is_err());
}

#[test]
fn blocks_with_huge_extents_are_rejected() {
    let mut registry = load_matrices_from_str(r#"[{ "name": "A", "rows": 2, "columns": 2 }]"#, &[]).unwrap();
    let huge_rows = r#"{ "A": { "blocks": [ { "rows": [0, 18446744073709551615], "columns": [0, 2] } ] } }"#;
    assert!(apply_memory_layout_from_str(huge_rows, &mut registry).is_err());
    let huge_both = r#"{ "A": { "blocks": [ { "rows": [0, 18446744073709551615], "columns": [0, 18446744073709551615] } ] } }"#;
    assert!(apply_memory_layout_from_str(huge_both, &mut registry).is_err());
    assert_eq!(registry.get("A").unwrap().layout(), &MemoryLayout::Dense);
}
