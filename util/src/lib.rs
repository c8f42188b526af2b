//! Test fixtures shared by the tests and benchmarks of the workspace.
use adergen::config::{number_of_basis_functions, number_of_face_basis_functions};
use adergen::expression::MatrixValues;
use adergen::io::description::{apply_memory_layout_from_str, load_matrices_from_str};
use adergen::registry::MatrixRegistry;
use adergen::seissol::CLONES;
use nalgebra::DMatrix;
use serde_json::{json, Value};

/// Polynomial degree of each function of a hierarchical modal basis on tetrahedra.
fn basis_degrees(order: usize) -> Vec<usize> {
    (0..order)
        .flat_map(|degree| {
            let count = number_of_basis_functions(degree + 1) - number_of_basis_functions(degree);
            std::iter::repeat(degree).take(count)
        })
        .collect()
}

fn entries(nrows: usize, ncols: usize, populated: impl Fn(usize, usize) -> bool) -> Vec<(usize, usize)> {
    (0..nrows)
        .flat_map(|i| (0..ncols).map(move |j| (i, j)))
        .filter(|&(i, j)| populated(i, j))
        .collect()
}

fn dense(name: &str, rows: usize, columns: usize) -> Value {
    json!({ "name": name, "rows": rows, "columns": columns })
}

fn sparse(name: &str, rows: usize, columns: usize, entries: Vec<(usize, usize)>) -> Value {
    json!({ "name": name, "rows": rows, "columns": columns, "entries": entries })
}

/// A matrix description with the shapes and structure of the elastic solver's global matrices.
///
/// Stiffness matrices couple basis functions of different degree only, the star matrices
/// couple stresses with velocities and the face permutations are permutation matrices.
pub fn elastic_matrix_description(order: usize) -> String {
    let nbf = number_of_basis_functions(order);
    let nf = number_of_face_basis_functions(order);
    let degrees = basis_degrees(order);

    let mut matrices = Vec::new();
    for dim in ["Xi", "Eta", "Zeta"] {
        matrices.push(sparse(
            &format!("k{dim}DivMT"),
            nbf,
            nbf,
            entries(nbf, nbf, |i, j| degrees[i] < degrees[j]),
        ));
        matrices.push(sparse(
            &format!("k{dim}DivM"),
            nbf,
            nbf,
            entries(nbf, nbf, |i, j| degrees[i] > degrees[j]),
        ));
    }
    matrices.push(sparse("star", 9, 9, entries(9, 9, |i, j| (i < 6) != (j < 6))));
    for i in 1..=4 {
        matrices.push(dense(&format!("r{i}DivM"), nbf, nf));
        matrices.push(dense(&format!("fMrT{i}"), nf, nbf));
        matrices.push(dense(&format!("rT{i}"), nf, nbf));
    }
    let permutations: [Box<dyn Fn(usize) -> usize>; 3] = [
        Box::new(|k| k),
        Box::new(move |k| nf - 1 - k),
        Box::new(move |k| (k + 1) % nf),
    ];
    for (h, permutation) in permutations.iter().enumerate() {
        let fp = entries(nf, nf, |i, j| permutation(i) == j);
        matrices.push(sparse(&format!("fP{}", h + 1), nf, nf, fp));
    }
    Value::Array(matrices).to_string()
}

/// A memory layout storing the star matrices as their two coupling blocks.
pub fn elastic_memory_layout() -> String {
    json!({
        "star": { "blocks": [
            { "rows": [0, 6], "columns": [6, 9] },
            { "rows": [6, 9], "columns": [0, 6] },
        ] },
        "kXiDivM": "sparse",
        "kEtaDivM": "sparse",
        "kZetaDivM": "sparse",
    })
    .to_string()
}

/// The registry the elastic solver starts from, with its memory layout applied.
pub fn elastic_registry(order: usize) -> MatrixRegistry {
    let mut registry =
        load_matrices_from_str(&elastic_matrix_description(order), CLONES).expect("Fixture description is valid");
    apply_memory_layout_from_str(&elastic_memory_layout(), &mut registry).expect("Fixture layout is valid");
    registry
}

/// Deterministic, nonzero values on the pattern of every registered matrix.
pub fn registry_values(registry: &MatrixRegistry) -> MatrixValues {
    registry
        .iter()
        .enumerate()
        .map(|(m, matrix)| {
            let mut values = DMatrix::zeros(matrix.nrows(), matrix.ncols());
            for (i, j) in matrix.pattern().entries() {
                values[(i, j)] = 1.0 + ((3 * i + 7 * j + 5 * m) % 11) as f64 / 8.0;
            }
            (matrix.name().to_string(), values)
        })
        .collect()
}
