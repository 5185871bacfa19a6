mod common;

use approx::assert_abs_diff_eq;
use bayes_update::{
    new_updater, AncestralEngine, AncestralUpdater, BayesNet, BayesNetBuilder, CancelToken, CountingCpt,
    EngineKind, Error, Evidence, JunctionTreeUpdater, Updater, UpdaterConfig, Variable,
    VariableList,
};
use common::*;
use std::sync::Arc;

fn both(net: &BayesNet) -> Vec<Box<dyn Updater>> {
    vec![
        Box::new(JunctionTreeUpdater::new(net.clone()).unwrap()),
        Box::new(AncestralUpdater::new(net.clone()).unwrap()),
    ]
}

fn check_all_marginals(net: &BayesNet, evidence: &Evidence) {
    for mut updater in both(net) {
        updater.set_evidence(evidence.clone()).unwrap();
        for node in 0..net.num_nodes() {
            for category in 0..net.num_columns(node).unwrap() {
                let expected = enumerate(net, evidence, &[(node, category)]);
                assert_close(updater.marginal(node, category).unwrap(), expected);
            }
        }
    }
}

#[test]
fn prior_marginals_match_enumeration() {
    for net in vec![chain(), fork(), sprinkler()] {
        check_all_marginals(&net, &Evidence::tautology(net.variables()));
    }
}

#[test]
fn observed_marginals_match_enumeration() {
    let net = sprinkler();
    check_all_marginals(&net, &observe(&net, &[(3, 1)]));
    check_all_marginals(&net, &observe(&net, &[(3, 1), (1, 0)]));

    let net = fork();
    check_all_marginals(&net, &observe(&net, &[(1, 1), (2, 0)]));

    let mut evidence = Evidence::tautology(net.variables());
    evidence.proposition_mut().remove_category(0, 1).unwrap();
    check_all_marginals(&net, &evidence);
}

#[test]
fn intervened_marginals_match_enumeration() {
    let net = sprinkler();
    check_all_marginals(&net, &intervene(&net, &[(1, 1)]));

    let mut evidence = intervene(&net, &[(1, 1)]);
    evidence.proposition_mut().disallow_complement(3, 1).unwrap();
    check_all_marginals(&net, &evidence);
}

#[test]
fn fixed_evidence_pins_its_variable() {
    let net = sprinkler();
    for mut updater in both(&net) {
        updater.set_evidence(observe(&net, &[(2, 1)])).unwrap();
        assert_abs_diff_eq!(updater.marginal(2, 1).unwrap().unwrap(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(updater.marginal(2, 0).unwrap().unwrap(), 0.0, epsilon = 1e-12);
    }
}

#[test]
fn intervention_screens_off_causes() {
    let net = chain();
    let (a, b, c) = (0, 1, 2);
    for mut updater in both(&net) {
        let prior = updater.marginal(a, 1).unwrap().unwrap();
        assert_abs_diff_eq!(prior, 0.3, epsilon = 1e-12);

        updater.set_evidence(observe(&net, &[(c, 1)])).unwrap();
        let observed = updater.marginal(a, 1).unwrap().unwrap();
        assert_abs_diff_eq!(observed, 0.2145 / 0.5435, epsilon = 1e-9);
        assert!((observed - prior).abs() > 0.05);

        let mut evidence = observe(&net, &[(c, 1), (b, 1)]);
        evidence.set_manipulated(b, true).unwrap();
        updater.set_evidence(evidence).unwrap();
        assert_abs_diff_eq!(updater.marginal(a, 1).unwrap().unwrap(), prior, epsilon = 1e-12);
        assert!(updater.manipulated_graph().parents(b).is_empty());
        assert_eq!(updater.bayes_net().dag().parents(b), &[a]);
    }
}

#[test]
fn engines_agree() {
    let net = sprinkler();
    let cases = vec![
        Evidence::tautology(net.variables()),
        observe(&net, &[(3, 1)]),
        observe(&net, &[(0, 1), (3, 0)]),
        intervene(&net, &[(2, 0)]),
    ];
    for evidence in cases {
        let mut junction = JunctionTreeUpdater::new(net.clone()).unwrap();
        let mut ancestral = AncestralUpdater::new(net.clone()).unwrap();
        junction.set_evidence(evidence.clone()).unwrap();
        ancestral.set_evidence(evidence).unwrap();
        for node in 0..net.num_nodes() {
            let j = junction.calculate_updated_marginals(node).unwrap();
            let a = ancestral.calculate_updated_marginals(node).unwrap();
            for (j, a) in j.into_iter().zip(a) {
                assert_abs_diff_eq!(j.unwrap(), a.unwrap(), epsilon = 1e-6);
            }
        }
    }
}

#[test]
fn empty_evidence_is_undefined() {
    let net = chain();
    let mut evidence = observe(&net, &[(1, 0)]);
    evidence.proposition_mut().remove_category(1, 0).unwrap();
    assert!(!evidence.proposition().exists_combination());

    for mut updater in both(&net) {
        updater.set_evidence(evidence.clone()).unwrap();
        for node in 0..3 {
            assert_eq!(updater.marginal(node, 0).unwrap(), None);
        }
    }
}

#[test]
fn zero_probability_evidence_is_undefined() {
    let net = sprinkler();
    // Wet grass is certainly dry when the sprinkler is off and it doesn't rain.
    let evidence = observe(&net, &[(1, 0), (2, 0), (3, 1)]);
    for mut updater in both(&net) {
        updater.set_evidence(evidence.clone()).unwrap();
        assert_eq!(updater.marginal(0, 1).unwrap(), None);
    }
}

#[test]
fn unset_cells_are_undefined() {
    let mut net = chain();
    net.clear_row(2, 1).unwrap();
    assert!(net.is_incomplete(2).unwrap());

    // One connected tree: the missing row reaches every clique once it is propagated.
    let mut junction = JunctionTreeUpdater::new(net.clone()).unwrap();
    assert_eq!(junction.marginal(2, 1).unwrap(), None);
    assert_eq!(junction.marginal(0, 1).unwrap(), None);

    // The recursive engine drops the undefined row and keeps the defined one.
    let mut ancestral = AncestralUpdater::new(net).unwrap();
    let p_b0 = 0.7 * 0.8 + 0.3 * 0.1;
    assert_abs_diff_eq!(
        ancestral.marginal(2, 1).unwrap().unwrap(),
        0.4 * p_b0,
        epsilon = 1e-12
    );
}

#[test]
fn unset_tables_only_affect_their_own_component() {
    let mut builder = BayesNetBuilder::new();
    let a = builder.add_variable("a", &["0", "1"]).unwrap();
    let b = builder.add_variable("b", &["0", "1"]).unwrap();
    let z = builder.add_variable("z", &["0", "1"]).unwrap();
    builder.add_edge(a, b).unwrap();
    let mut net = builder.build().unwrap();
    net.set_row(a, 0, &[0.7, 0.3]).unwrap();
    net.set_row(b, 0, &[0.8, 0.2]).unwrap();
    net.set_row(b, 1, &[0.1, 0.9]).unwrap();
    assert!(net.is_incomplete(z).unwrap());

    for mut updater in both(&net) {
        assert_abs_diff_eq!(updater.marginal(a, 1).unwrap().unwrap(), 0.3, epsilon = 1e-12);
        assert_eq!(updater.marginal(z, 0).unwrap(), None);

        // P(b=1) = 0.7 * 0.2 + 0.3 * 0.9
        updater.set_evidence(observe(&net, &[(b, 1)])).unwrap();
        assert_abs_diff_eq!(
            updater.marginal(a, 1).unwrap().unwrap(),
            0.27 / 0.41,
            epsilon = 1e-9
        );

        // Observing the unestimated node makes the evidence itself undefined.
        updater.set_evidence(observe(&net, &[(b, 1), (z, 0)])).unwrap();
        assert_eq!(updater.marginal(a, 1).unwrap(), None);
    }

    let mut junction = JunctionTreeUpdater::new(net).unwrap();
    assert_eq!(junction.engine().evidence_probability(), Some(1.0));
    assert!(junction.joint_marginal(&[a, b], &[1, 1]).unwrap().is_some());
    assert_eq!(junction.joint_marginal(&[a, z], &[1, 0]).unwrap(), None);
}

#[test]
fn conditionals_and_distributions() {
    let net = sprinkler();
    let evidence = observe(&net, &[(2, 1)]);
    let mut updater = JunctionTreeUpdater::new(net.clone()).unwrap();
    updater.set_evidence(evidence.clone()).unwrap();
    let junction = updater.engine();

    let wet = junction.marginals(3).unwrap().unwrap();
    assert_eq!(wet.len(), 2);
    assert_close(Some(wet[1]), enumerate(&net, &evidence, &[(3, 1)]));
    assert_abs_diff_eq!(wet.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    assert!(junction.marginals(4).is_err());

    let mut ancestral = AncestralEngine::new(net, evidence.proposition().clone()).unwrap();
    // Rain is known, so "sprinkler off and no rain" can't be conditioned on.
    assert_eq!(junction.conditional_probability(3, 1, &[1, 2], &[0, 0]).unwrap(), None);
    assert_eq!(ancestral.conditional_probability(3, 1, &[1, 2], &[0, 0]).unwrap(), None);
    assert_abs_diff_eq!(
        junction.conditional_probability(3, 1, &[1, 2], &[1, 1]).unwrap().unwrap(),
        0.99,
        epsilon = 1e-9
    );
    assert_abs_diff_eq!(
        ancestral.conditional_probability(3, 1, &[1, 2], &[1, 1]).unwrap().unwrap(),
        0.99,
        epsilon = 1e-9
    );
    // The sprinkler and the rain are independent given the clouds.
    assert_abs_diff_eq!(
        junction.conditional_probability(1, 1, &[0], &[1]).unwrap().unwrap(),
        0.1,
        epsilon = 1e-9
    );
    assert_abs_diff_eq!(
        ancestral.conditional_probability(1, 1, &[0], &[1]).unwrap().unwrap(),
        0.1,
        epsilon = 1e-9
    );
    assert!(junction.conditional_probability(3, 1, &[1], &[0, 0]).is_err());
    assert!(ancestral.conditional_probability(3, 1, &[1], &[0, 0]).is_err());
}

#[test]
fn joint_marginals_match_enumeration() {
    let net = sprinkler();
    let mut updater = JunctionTreeUpdater::new(net.clone()).unwrap();
    for evidence in vec![
        Evidence::tautology(net.variables()),
        observe(&net, &[(3, 1)]),
        intervene(&net, &[(1, 0)]),
    ] {
        updater.set_evidence(evidence.clone()).unwrap();
        // Same clique as the family of wet.
        let q = [(1, 1), (2, 1), (3, 1)];
        let (nodes, cats): (Vec<usize>, Vec<usize>) = q.iter().copied().unzip();
        assert_close(
            updater.joint_marginal(&nodes, &cats).unwrap(),
            enumerate(&net, &evidence, &q),
        );
        // Cloudy and wet never share a clique.
        let q = [(0, 1), (3, 0)];
        let (nodes, cats): (Vec<usize>, Vec<usize>) = q.iter().copied().unzip();
        assert_close(
            updater.joint_marginal(&nodes, &cats).unwrap(),
            enumerate(&net, &evidence, &q),
        );
    }
    assert_eq!(updater.joint_marginal(&[0, 0], &[0, 1]).unwrap(), Some(0.0));
    assert!(updater.joint_marginal(&[0], &[0, 1]).is_err());
}

#[test]
fn ancestral_joint_marginal_is_unsupported() {
    let mut updater = AncestralUpdater::new(chain()).unwrap();
    assert!(!updater.is_joint_marginal_supported());
    assert_eq!(
        updater.joint_marginal(&[0, 1], &[0, 0]),
        Err(Error::Unsupported(
            "joint marginals need the junction tree engine"
        ))
    );
}

#[test]
fn prior_marginals_restore_evidence() {
    let net = chain();
    for mut updater in both(&net) {
        let evidence = observe(&net, &[(2, 1)]);
        updater.set_evidence(evidence.clone()).unwrap();
        let prior = updater.calculate_prior_marginals(0).unwrap();
        assert_abs_diff_eq!(prior[1].unwrap(), 0.3, epsilon = 1e-12);
        assert_eq!(updater.evidence(), &evidence);
        let updated = updater.calculate_updated_marginals(0).unwrap();
        assert_abs_diff_eq!(updated[1].unwrap(), 0.2145 / 0.5435, epsilon = 1e-9);
    }
}

#[test]
fn updated_network_holds_posterior_conditionals() {
    let net = sprinkler();
    let evidence = observe(&net, &[(3, 1)]);
    for mut updater in both(&net) {
        updater.set_evidence(evidence.clone()).unwrap();
        let updated = updater.updated_bayes_net().unwrap();
        // The root's single row is its posterior marginal.
        let cloudy = enumerate(&net, &evidence, &[(0, 1)]);
        assert_close(updated.probability(0, 0, 1).unwrap(), cloudy);
        // P(rain | cloudy = yes, wet = yes)
        let joint = enumerate(&net, &evidence, &[(0, 1), (2, 1)]).unwrap();
        let given = cloudy.unwrap();
        assert_abs_diff_eq!(
            updated.probability(2, 1, 1).unwrap().unwrap(),
            joint / given,
            epsilon = 1e-9
        );
        // Wet is certain, and rows with possible parents sum to one.
        assert_eq!(updated.probability(3, 3, 0).unwrap(), Some(0.0));
        updated.validate(1e-9).unwrap();
    }
}

#[test]
fn incompatible_evidence_is_rejected() {
    let net = chain();
    let other = Arc::new(
        VariableList::new(vec![Variable::new("z", &["0", "1"]).unwrap()]).unwrap(),
    );
    for mut updater in both(&net) {
        let kept = observe(&net, &[(0, 1)]);
        updater.set_evidence(kept.clone()).unwrap();
        assert_eq!(
            updater.set_evidence(Evidence::tautology(&other)),
            Err(Error::IncompatibleVariables)
        );
        assert_eq!(updater.evidence(), &kept);
        assert_abs_diff_eq!(updater.marginal(0, 1).unwrap().unwrap(), 1.0, epsilon = 1e-12);
    }
}

#[test]
fn equal_variable_lists_are_compatible() {
    // Same variables, built separately.
    let evidence = observe(&chain(), &[(2, 1)]);
    let mut updater = JunctionTreeUpdater::new(chain()).unwrap();
    updater.set_evidence(evidence).unwrap();
    assert_abs_diff_eq!(
        updater.marginal(0, 1).unwrap().unwrap(),
        0.2145 / 0.5435,
        epsilon = 1e-9
    );
}

#[test]
fn cancelled_builds_keep_previous_state() {
    let net = sprinkler();
    let cancel = CancelToken::new();
    let mut updater =
        JunctionTreeUpdater::with_cancel(net.clone(), UpdaterConfig::default(), cancel.clone())
            .unwrap();
    let before = updater.marginal(2, 1).unwrap();

    cancel.cancel();
    assert_eq!(
        updater.set_evidence(observe(&net, &[(3, 1)])),
        Err(Error::Cancelled)
    );
    assert!(updater.evidence().proposition().is_tautology());
    assert_eq!(updater.marginal(2, 1).unwrap(), before);

    let mut ancestral =
        AncestralUpdater::with_cancel(net, UpdaterConfig::default(), cancel).unwrap();
    assert_eq!(ancestral.marginal(2, 1), Err(Error::Cancelled));
}

#[test]
fn failed_prior_query_keeps_evidence() {
    let net = chain();
    let cancel = CancelToken::new();
    let evidence = observe(&net, &[(2, 1)]);
    let mut junction =
        JunctionTreeUpdater::with_cancel(net.clone(), UpdaterConfig::default(), cancel.clone())
            .unwrap();
    let mut ancestral =
        AncestralUpdater::with_cancel(net, UpdaterConfig::default(), cancel.clone()).unwrap();
    junction.set_evidence(evidence.clone()).unwrap();
    ancestral.set_evidence(evidence.clone()).unwrap();
    let before = junction.marginal(0, 1).unwrap();

    cancel.cancel();
    assert_eq!(junction.calculate_prior_marginals(0), Err(Error::Cancelled));
    assert_eq!(ancestral.calculate_prior_marginals(0), Err(Error::Cancelled));
    assert_eq!(junction.evidence(), &evidence);
    assert_eq!(ancestral.evidence(), &evidence);
    assert_eq!(junction.marginal(0, 1).unwrap(), before);
}

#[test]
fn oversized_cliques_are_refused() {
    let config = UpdaterConfig {
        max_clique_cells: 4,
        ..UpdaterConfig::default()
    };
    // The moral graph of the sprinkler network has two three-node cliques.
    match JunctionTreeUpdater::with_config(sprinkler(), config) {
        Err(Error::CliqueTooLarge { variables, limit }) => {
            assert_eq!(variables, 3);
            assert_eq!(limit, 4);
        }
        other => panic!("expected CliqueTooLarge, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn non_stochastic_rows_are_rejected() {
    let mut net = chain();
    net.set_probability(0, 0, 0, Some(0.5)).unwrap();
    assert!(matches!(
        JunctionTreeUpdater::new(net.clone()),
        Err(Error::InvalidArgument(_))
    ));

    let config = UpdaterConfig {
        validate_cpts: false,
        ..UpdaterConfig::default()
    };
    assert!(JunctionTreeUpdater::with_config(net, config).is_ok());
}

#[test]
fn config_fills_in_defaults() {
    let config: UpdaterConfig = serde_json::from_str(r#"{"engine": "ancestral"}"#).unwrap();
    assert_eq!(config.engine, EngineKind::Ancestral);
    assert_eq!(config.max_clique_cells, UpdaterConfig::default().max_clique_cells);
    assert_abs_diff_eq!(config.row_tolerance, 1e-4);
    assert!(config.validate_cpts);

    let config: UpdaterConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(config, UpdaterConfig::default());

    let bad: UpdaterConfig = serde_json::from_str(r#"{"row_tolerance": -1.0}"#).unwrap();
    assert!(bad.validate().is_err());

    let mut updater = new_updater(chain(), config).unwrap();
    assert!(updater.is_joint_marginal_supported());
    assert!(updater.joint_marginal(&[0, 2], &[1, 1]).unwrap().is_some());
}

#[test]
fn counting_tables_feed_networks() {
    let mut builder = BayesNetBuilder::new();
    let coin = builder.add_variable("coin", &["heads", "tails"]).unwrap();
    let mut net = builder.build().unwrap();

    let mut counts = CountingCpt::new(1, 2, 0.5).unwrap();
    counts.add_count(0, 0, 7.0).unwrap();
    counts.add_count(0, 1, 2.0).unwrap();
    assert_eq!(counts.row_count(0).unwrap(), 9.0);
    assert_abs_diff_eq!(counts.probability(0, 0).unwrap().unwrap(), 7.5 / 10.0);
    assert!(counts.add_count(0, 0, -1.0).is_err());
    assert!(counts.probability(1, 0).is_err());

    net.set_cpt(coin, counts.to_cpt()).unwrap();
    let mut updater = JunctionTreeUpdater::new(net).unwrap();
    assert_abs_diff_eq!(updater.marginal(coin, 1).unwrap().unwrap(), 0.25);
}

#[test]
fn display_lists_cliques_and_margins() {
    let updater = JunctionTreeUpdater::new(sprinkler()).unwrap();
    let text = updater.engine().to_string();
    for name in &["cloudy", "sprinkler", "rain", "wet"] {
        assert!(text.contains(name), "{} missing from\n{}", name, text);
    }
    assert!(text.contains("wet: no="));
    assert_eq!(text.lines().filter(|l| l.starts_with('{')).count(), 1);
}
