mod common;

use approx::assert_abs_diff_eq;
use bayes_update::{BayesNetBuilder, CountingCpt, Cpt, Dag, Error, Evidence, NodeSet, Proposition};
use common::*;

#[test]
fn normalize_row_scales_and_handles_zero_rows() {
    let mut cpt = Cpt::new(3, 3).unwrap();
    cpt.set_row(0, &[0.2, 0.2, 0.4]).unwrap();
    cpt.set_row(1, &[0.0, 0.0, 0.0]).unwrap();
    cpt.set(2, 0, Some(0.5)).unwrap();

    cpt.normalize_row(0).unwrap();
    assert_abs_diff_eq!(cpt.get(0, 0).unwrap().unwrap(), 0.25, epsilon = 1e-12);
    assert_abs_diff_eq!(cpt.get(0, 2).unwrap().unwrap(), 0.5, epsilon = 1e-12);

    // A row with no mass becomes uniform.
    cpt.normalize_row(1).unwrap();
    for column in 0..3 {
        assert_abs_diff_eq!(cpt.get(1, column).unwrap().unwrap(), 1.0 / 3.0, epsilon = 1e-12);
    }

    // An incomplete row is left alone.
    cpt.normalize_row(2).unwrap();
    assert_eq!(cpt.row(2).unwrap(), &[Some(0.5), None, None]);
    assert!(!cpt.is_row_complete(2).unwrap());

    assert!(cpt.normalize_row(3).is_err());
}

#[test]
fn oversized_tables_are_rejected() {
    assert!(matches!(
        Cpt::new(usize::MAX, 2),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        CountingCpt::new(usize::MAX, 3, 1.0),
        Err(Error::InvalidArgument(_))
    ));

    // Sixty-four binary parents give 2^64 parent combinations.
    let mut builder = BayesNetBuilder::new();
    let child = builder.add_variable("child", &["0", "1"]).unwrap();
    for i in 0..64 {
        let parent = builder
            .add_variable(&format!("p{}", i), &["0", "1"])
            .unwrap();
        builder.add_edge(parent, child).unwrap();
    }
    assert!(matches!(builder.build(), Err(Error::InvalidArgument(_))));
}

#[test]
fn normalize_node_and_all() {
    let mut net = chain();
    net.set_row(1, 0, &[0.2, 0.6]).unwrap();
    net.set_row(2, 1, &[0.5, 0.5]).unwrap();
    net.set_row(2, 0, &[0.1, 0.1]).unwrap();
    assert!(net.validate(1e-9).is_err());

    net.normalize_node(1).unwrap();
    assert_abs_diff_eq!(net.probability(1, 0, 1).unwrap().unwrap(), 0.75, epsilon = 1e-12);
    assert!(net.validate(1e-9).is_err());

    net.normalize_all().unwrap();
    assert_abs_diff_eq!(net.probability(2, 0, 0).unwrap().unwrap(), 0.5, epsilon = 1e-12);
    assert!(net.validate(1e-9).is_ok());
    assert!(net.normalize_node(3).is_err());
}

#[test]
fn counting_prior_can_change() {
    let mut counts = CountingCpt::new(2, 2, 0.0).unwrap();
    counts.add_count(0, 1, 4.0).unwrap();
    assert_eq!(counts.probability(0, 0).unwrap(), Some(0.0));
    assert_eq!(counts.probability(1, 0).unwrap(), None);

    counts.set_prior(1.0).unwrap();
    assert_eq!(counts.prior(), 1.0);
    assert_eq!(counts.probability(0, 0).unwrap(), Some(1.0 / 6.0));
    assert_eq!(counts.probability(1, 0).unwrap(), Some(0.5));

    assert!(counts.set_prior(-1.0).is_err());
    assert!(counts.set_prior(f64::NAN).is_err());
    assert_eq!(counts.prior(), 1.0);
}

#[test]
fn set_category_widens_but_other_mutators_narrow() {
    let net = fork();
    let mut p = Proposition::tautology(net.variables());
    assert!(p.is_unconditioned(0).unwrap());

    p.disallow_complement(0, 0).unwrap();
    assert_eq!(p.single_category(0).unwrap(), Some(0));
    assert!(!p.is_unconditioned(0).unwrap());

    // Disallowing the complement of a ruled-out category leaves nothing.
    p.disallow_complement(0, 2).unwrap();
    assert_eq!(p.num_allowed(0).unwrap(), 0);
    assert_eq!(p.single_category(0).unwrap(), None);
    assert!(!p.exists_combination());

    // Setting a category brings it back even though it was ruled out.
    p.set_category(0, 2).unwrap();
    assert_eq!(p.single_category(0).unwrap(), Some(2));
    assert!(p.exists_combination());

    p.set_variable(1, false).unwrap();
    assert!(!p.exists_combination());
    p.set_variable(1, true).unwrap();
    assert!(p.is_unconditioned(1).unwrap());
    assert_eq!(p.constrained_variables(), NodeSet::new(&[0]));

    assert!(p.set_category(0, 3).is_err());
    assert!(p.set_variable(3, true).is_err());
}

#[test]
fn restrict_intersects() {
    let net = fork();
    let mut p = Proposition::tautology(net.variables());
    p.remove_category(0, 0).unwrap();
    let mut q = Proposition::tautology(net.variables());
    q.remove_category(0, 2).unwrap();
    q.disallow_complement(2, 1).unwrap();

    p.restrict(&q).unwrap();
    assert_eq!(p.single_category(0).unwrap(), Some(1));
    assert_eq!(p.single_category(2).unwrap(), Some(1));
    assert!(p.is_unconditioned(1).unwrap());
    assert_eq!(p.to_string(), "a=mid & c=yes");

    let other = chain();
    let unrelated = Proposition::tautology(other.variables());
    assert_eq!(p.restrict(&unrelated), Err(Error::IncompatibleVariables));
}

#[test]
fn evidence_lookups() {
    let net = sprinkler();
    let mut evidence = Evidence::tautology(net.variables());
    assert_eq!(evidence.node_index("rain"), Some(2));
    assert_eq!(evidence.node_index("snow"), None);
    assert_eq!(evidence.category_index(1, "on").unwrap(), Some(1));
    assert_eq!(evidence.category_index(1, "broken").unwrap(), None);
    assert!(evidence.category_index(9, "on").is_err());

    assert!(evidence.variables_in_evidence().is_empty());
    evidence.proposition_mut().disallow_complement(3, 1).unwrap();
    // Manipulated without a constraint: not part of the evidence.
    evidence.set_manipulated(1, true).unwrap();
    assert_eq!(evidence.variables_in_evidence(), NodeSet::new(&[3]));
    evidence.proposition_mut().disallow_complement(1, 0).unwrap();
    assert_eq!(evidence.variables_in_evidence(), NodeSet::new(&[1, 3]));
}

#[test]
fn remove_edge() {
    let mut dag = Dag::from_parents(vec![vec![], vec![0], vec![0, 1]]).unwrap();
    assert!(dag.remove_edge(0, 2));
    assert!(!dag.remove_edge(0, 2));
    assert!(!dag.has_edge(0, 2));
    assert_eq!(dag.parents(2), &[1]);
    assert!(!dag.children(0).contains(2));
    assert_eq!(dag.num_edges(), 2);
    // Still an ancestor through 1.
    assert!(dag.is_ancestor_of(0, 2));
    dag.add_edge(0, 2).unwrap();
    assert_eq!(dag.parents(2), &[1, 0]);
}
