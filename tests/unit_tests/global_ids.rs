use adergen::global_ids::{GlobalMatrixIdRule, GlobalMatrixIdRules, RuleMatch};
use adergen::matrix::MatrixDescriptor;
use adergen::registry::MatrixRegistry;
use adergen::seissol::global_matrix_id_rules;
use adergen::KernelError;

fn registry_with(names: &[&str]) -> MatrixRegistry {
    let mut registry = MatrixRegistry::new();
    for name in names {
        registry.insert(MatrixDescriptor::new(*name, 4, 4)).unwrap();
    }
    registry
}

#[test]
fn first_matching_rule_wins() {
    let rules = GlobalMatrixIdRules::new()
        .with_rule("^a.*", |_| Some(1))
        .unwrap()
        .with_rule("^ab.*", |_| Some(2))
        .unwrap();
    assert_eq!(rules.len(), 2);
    assert_eq!(rules.resolve_name("abc").unwrap(), Some(RuleMatch { rule: 0, id: 1 }));
    assert_eq!(rules.resolve_name("xyz").unwrap(), None);
}

#[test]
fn id_functions_receive_captures() {
    let rule = GlobalMatrixIdRule::new(r"^m(\d)_(\d)$", |captures| {
        let i: usize = captures[0].parse().ok()?;
        let j: usize = captures[1].parse().ok()?;
        Some(10 * i + j)
    })
    .unwrap();
    assert_eq!(rule.pattern(), r"^m(\d)_(\d)$");

    let mut rules = GlobalMatrixIdRules::new();
    rules.push(rule);
    assert_eq!(rules.resolve_name("m3_4").unwrap(), Some(RuleMatch { rule: 0, id: 34 }));
}

#[test]
fn invalid_patterns_are_rejected() {
    let result = GlobalMatrixIdRule::new("^k(Xi", |_| Some(0));
    assert!(matches!(result, Err(KernelError::InvalidRule { ref pattern, .. }) if pattern == "^k(Xi"));
}

#[test]
fn failing_id_function_is_reported() {
    let rules = GlobalMatrixIdRules::new().with_rule(r"^r(\d)$", |_| None).unwrap();
    let result = rules.resolve_name("r1");
    assert!(matches!(
        result,
        Err(KernelError::RuleEvaluation { rule: 0, ref name, ref captures, .. })
            if name == "r1" && captures == &["1".to_string()]
    ));
}

#[test]
fn ids_are_assigned_to_matching_matrices_only() {
    let mut registry = registry_with(&["kXiDivM", "kXiDivMT", "timeIntegrated", "r2DivM"]);
    let rules = global_matrix_id_rules().unwrap();
    rules.determine_global_matrix_ids(&mut registry).unwrap();

    assert_eq!(registry.get("kXiDivMT").unwrap().global_id(), Some(0));
    assert_eq!(registry.get("kXiDivM").unwrap().global_id(), Some(3));
    assert_eq!(registry.get("r2DivM").unwrap().global_id(), Some(7));
    assert_eq!(registry.get("timeIntegrated").unwrap().global_id(), None);
    rules.verify(&registry).unwrap();
}

#[test]
fn elastic_rules_cover_all_global_matrices() {
    let rules = global_matrix_id_rules().unwrap();
    let expected = [
        ("kXiDivMT", 0),
        ("kEtaDivMT", 1),
        ("kZetaDivMT", 2),
        ("kXiDivM", 3),
        ("kEtaDivM", 4),
        ("kZetaDivM", 5),
        ("r1DivM", 6),
        ("r4DivM", 9),
        ("rT1", 10),
        ("rT4", 13),
        ("fMrT1", 14),
        ("fMrT4", 17),
        ("fP1", 18),
        ("fP3", 20),
    ];
    for (name, id) in expected {
        let resolved = rules.resolve_name(name).unwrap().map(|m| m.id);
        assert_eq!(resolved, Some(id), "{name}");
    }
    for name in ["AstarT", "timeDerivative1", "kXiDivMTT", "r12DivM"] {
        assert_eq!(rules.resolve_name(name).unwrap(), None, "{name}");
    }
}

#[test]
fn colliding_ids_are_rejected() {
    let mut registry = registry_with(&["a1", "b1", "c1"]);
    let rules = GlobalMatrixIdRules::new()
        .with_rule("^a", |_| Some(0))
        .unwrap()
        .with_rule("^[bc]", |_| Some(5))
        .unwrap();
    let result = rules.determine_global_matrix_ids(&mut registry);
    match result {
        Err(KernelError::IdentifierCollision {
            id,
            first,
            first_rule,
            second,
            second_rule,
        }) => {
            assert_eq!(id, 5);
            assert_eq!((first.as_str(), first_rule), ("b1", 1));
            assert_eq!((second.as_str(), second_rule), ("c1", 1));
        }
        other => panic!("expected collision, got {other:?}"),
    }
    // Nothing is assigned when resolution fails
    assert!(registry.iter().all(|matrix| matrix.global_id().is_none()));
}

#[test]
fn ids_colliding_across_rules_are_rejected() {
    let mut registry = registry_with(&["kXiDivMT", "star", "r1DivM"]);
    let rules = GlobalMatrixIdRules::new()
        .with_rule(r"^k(Xi|Eta|Zeta)DivMT$", |_| Some(0))
        .unwrap()
        .with_rule(r"^r(\d)DivM$", |c| c.first()?.parse::<usize>().ok()?.checked_sub(1))
        .unwrap();
    match rules.determine_global_matrix_ids(&mut registry) {
        Err(KernelError::IdentifierCollision {
            id,
            first,
            first_rule,
            second,
            second_rule,
        }) => {
            assert_eq!(id, 0);
            assert_eq!((first.as_str(), first_rule), ("kXiDivMT", 0));
            assert_eq!((second.as_str(), second_rule), ("r1DivM", 1));
        }
        other => panic!("expected collision, got {other:?}"),
    }
    assert!(registry.iter().all(|matrix| matrix.global_id().is_none()));
}

#[test]
fn verify_detects_unresolved_ids() {
    let registry = registry_with(&["fP1"]);
    let rules = global_matrix_id_rules().unwrap();
    assert!(matches!(
        rules.verify(&registry),
        Err(KernelError::UnresolvedGlobalId { ref name, rule: 5 }) if name == "fP1"
    ));
}
