//! Graph surgery for interventions.

use crate::cpt::Cpt;
use crate::error::{Error, Result};
use crate::evidence::Evidence;
use crate::network::BayesNet;
use std::sync::Arc;
use tracing::trace;

/// Builds the network in which every manipulated variable of `evidence` was set from outside.
///
/// Each manipulated node loses all of its incoming edges, and its CPT becomes a single row
/// spreading probability evenly over the categories the evidence allows (all zeros if none
/// are). Every other CPT is copied unchanged, including its parent order.
///
/// ```
/// use bayes_update::{manipulate, BayesNetBuilder, Evidence};
///
/// let mut builder = BayesNetBuilder::new();
/// let a = builder.add_variable("a", &["0", "1"]).unwrap();
/// let b = builder.add_variable("b", &["0", "1", "2"]).unwrap();
/// builder.add_edge(a, b).unwrap();
/// let net = builder.build().unwrap();
///
/// let mut evidence = Evidence::tautology(net.variables());
/// evidence.proposition_mut().remove_category(b, 0).unwrap();
/// evidence.set_manipulated(b, true).unwrap();
///
/// let surgery = manipulate(&net, &evidence).unwrap();
/// assert!(surgery.parents(b).unwrap().is_empty());
/// assert_eq!(surgery.num_rows(b).unwrap(), 1);
/// assert_eq!(surgery.probability(b, 0, 0).unwrap(), Some(0.0));
/// assert_eq!(surgery.probability(b, 0, 2).unwrap(), Some(0.5));
/// ```
pub fn manipulate(net: &BayesNet, evidence: &Evidence) -> Result<BayesNet> {
    if !evidence.is_compatible_with(net) {
        return Err(Error::IncompatibleVariables);
    }

    let mut dag = net.dag().clone();
    let mut cpts = Vec::with_capacity(net.num_nodes());
    for (node, &manipulated) in evidence.manipulated_flags().iter().enumerate() {
        if !manipulated {
            cpts.push(net.cpt_unchecked(node).clone());
            continue;
        }

        let cut = dag.remove_incoming(node);
        let allowed = evidence.proposition().allowed(node);
        let k = allowed.iter().filter(|&&a| a).count();
        let row: Vec<f64> = allowed
            .iter()
            .map(|&a| if a { 1.0 / k as f64 } else { 0.0 })
            .collect();
        let mut cpt = Cpt::new(1, allowed.len())?;
        cpt.set_row(0, &row)?;
        cpts.push(cpt);
        trace!(node, parents_cut = cut.len(), allowed = k, "manipulated node");
    }

    Ok(BayesNet::from_parts(Arc::clone(net.variables()), dag, cpts))
}
