#![allow(dead_code)]

use bayes_update::{manipulate, BayesNet, BayesNetBuilder, Evidence};

/// A -> B -> C, all binary, with no deterministic rows.
pub fn chain() -> BayesNet {
    let mut builder = BayesNetBuilder::new();
    let a = builder.add_variable("a", &["0", "1"]).unwrap();
    let b = builder.add_variable("b", &["0", "1"]).unwrap();
    let c = builder.add_variable("c", &["0", "1"]).unwrap();
    builder.add_edge(a, b).unwrap();
    builder.add_edge(b, c).unwrap();
    let mut net = builder.build().unwrap();
    net.set_row(a, 0, &[0.7, 0.3]).unwrap();
    net.set_row(b, 0, &[0.8, 0.2]).unwrap();
    net.set_row(b, 1, &[0.1, 0.9]).unwrap();
    net.set_row(c, 0, &[0.6, 0.4]).unwrap();
    net.set_row(c, 1, &[0.25, 0.75]).unwrap();
    net
}

/// A -> B, A -> C with a three-valued root.
pub fn fork() -> BayesNet {
    let mut builder = BayesNetBuilder::new();
    let a = builder.add_variable("a", &["low", "mid", "high"]).unwrap();
    let b = builder.add_variable("b", &["no", "yes"]).unwrap();
    let c = builder.add_variable("c", &["no", "yes"]).unwrap();
    builder.add_edge(a, b).unwrap();
    builder.add_edge(a, c).unwrap();
    let mut net = builder.build().unwrap();
    net.set_row(a, 0, &[0.2, 0.5, 0.3]).unwrap();
    net.set_row(b, 0, &[0.9, 0.1]).unwrap();
    net.set_row(b, 1, &[0.5, 0.5]).unwrap();
    net.set_row(b, 2, &[0.2, 0.8]).unwrap();
    net.set_row(c, 0, &[0.3, 0.7]).unwrap();
    net.set_row(c, 1, &[0.6, 0.4]).unwrap();
    net.set_row(c, 2, &[0.95, 0.05]).unwrap();
    net
}

/// The classic cloudy/sprinkler/rain/wet-grass network, which has an undirected loop.
pub fn sprinkler() -> BayesNet {
    let mut builder = BayesNetBuilder::new();
    let cloudy = builder.add_variable("cloudy", &["no", "yes"]).unwrap();
    let sprinkler = builder.add_variable("sprinkler", &["off", "on"]).unwrap();
    let rain = builder.add_variable("rain", &["no", "yes"]).unwrap();
    let wet = builder.add_variable("wet", &["no", "yes"]).unwrap();
    builder.add_edge(cloudy, sprinkler).unwrap();
    builder.add_edge(cloudy, rain).unwrap();
    builder.add_edge(sprinkler, wet).unwrap();
    builder.add_edge(rain, wet).unwrap();
    let mut net = builder.build().unwrap();
    net.set_row(cloudy, 0, &[0.5, 0.5]).unwrap();
    net.set_row(sprinkler, 0, &[0.5, 0.5]).unwrap();
    net.set_row(sprinkler, 1, &[0.9, 0.1]).unwrap();
    net.set_row(rain, 0, &[0.8, 0.2]).unwrap();
    net.set_row(rain, 1, &[0.2, 0.8]).unwrap();
    // Rows are (sprinkler, rain) = (off, no), (off, yes), (on, no), (on, yes).
    net.set_row(wet, 0, &[1.0, 0.0]).unwrap();
    net.set_row(wet, 1, &[0.1, 0.9]).unwrap();
    net.set_row(wet, 2, &[0.1, 0.9]).unwrap();
    net.set_row(wet, 3, &[0.01, 0.99]).unwrap();
    net
}

/// Builds a network over nodes with the given cardinalities. `edges` holds one flag per pair
/// `i < j`, in row-major order, saying whether `i -> j` is present. CPT rows are filled from
/// `weights` in order, cycling as needed, and normalized.
pub fn from_weights(cards: &[usize], edges: &[bool], weights: &[f64]) -> BayesNet {
    let mut builder = BayesNetBuilder::new();
    for (i, &card) in cards.iter().enumerate() {
        let categories: Vec<String> = (0..card).map(|c| c.to_string()).collect();
        builder.add_variable(&format!("x{}", i), &categories).unwrap();
    }
    let mut flags = edges.iter().cycle();
    for i in 0..cards.len() {
        for j in i + 1..cards.len() {
            if *flags.next().unwrap_or(&false) {
                builder.add_edge(i, j).unwrap();
            }
        }
    }
    let mut net = builder.build().unwrap();

    let mut pool = weights.iter().cycle();
    for node in 0..net.num_nodes() {
        for row in 0..net.num_rows(node).unwrap() {
            let raw: Vec<f64> = (0..net.num_columns(node).unwrap())
                .map(|_| *pool.next().unwrap())
                .collect();
            let total: f64 = raw.iter().sum();
            let row_values: Vec<f64> = raw.iter().map(|w| w / total).collect();
            net.set_row(node, row, &row_values).unwrap();
        }
    }
    net
}

/// Every joint configuration of the network's variables, last variable fastest.
pub fn configurations(net: &BayesNet) -> Vec<Vec<usize>> {
    let cards: Vec<usize> = net.variables().iter().map(|v| v.num_categories()).collect();
    let mut all = Vec::new();
    let mut values = vec![0; cards.len()];
    loop {
        all.push(values.clone());
        let mut i = cards.len();
        loop {
            if i == 0 {
                return all;
            }
            i -= 1;
            values[i] += 1;
            if values[i] < cards[i] {
                break;
            }
            values[i] = 0;
        }
    }
}

/// The probability of one full configuration under the network's CPTs.
pub fn joint_probability(net: &BayesNet, config: &[usize]) -> f64 {
    (0..net.num_nodes())
        .map(|node| {
            let parent_values: Vec<usize> = net
                .parents(node)
                .unwrap()
                .iter()
                .map(|&p| config[p])
                .collect();
            let row = net.row_index(node, &parent_values).unwrap();
            net.probability(node, row, config[node]).unwrap().unwrap()
        })
        .product()
}

/// The posterior probability that every `(node, category)` pair holds, by summing the full
/// joint distribution of the manipulated network.
pub fn enumerate(net: &BayesNet, evidence: &Evidence, query: &[(usize, usize)]) -> Option<f64> {
    let surgery = manipulate(net, evidence).unwrap();
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for config in configurations(&surgery) {
        if !evidence
            .proposition()
            .is_permissible_combination(&config)
            .unwrap()
        {
            continue;
        }
        let p = joint_probability(&surgery, &config);
        denominator += p;
        if query.iter().all(|&(node, category)| config[node] == category) {
            numerator += p;
        }
    }
    if denominator > 0.0 {
        Some(numerator / denominator)
    } else {
        None
    }
}

/// Evidence observing each `(node, category)` pair.
pub fn observe(net: &BayesNet, observations: &[(usize, usize)]) -> Evidence {
    let mut evidence = Evidence::tautology(net.variables());
    for &(node, category) in observations {
        evidence
            .proposition_mut()
            .disallow_complement(node, category)
            .unwrap();
    }
    evidence
}

/// Evidence forcing each `(node, category)` pair by intervention.
pub fn intervene(net: &BayesNet, interventions: &[(usize, usize)]) -> Evidence {
    let mut evidence = observe(net, interventions);
    for &(node, _) in interventions {
        evidence.set_manipulated(node, true).unwrap();
    }
    evidence
}

pub fn assert_close(actual: Option<f64>, expected: Option<f64>) {
    match (actual, expected) {
        (Some(a), Some(e)) => approx::assert_abs_diff_eq!(a, e, epsilon = 1e-9),
        (None, None) => {}
        _ => panic!("expected {:?}, got {:?}", expected, actual),
    }
}
