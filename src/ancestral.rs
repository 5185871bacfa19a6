//! Inference straight from the CPTs, using ancestral independence instead of a junction tree.

use crate::config::CancelToken;
use crate::error::{check_index, Error, Result};
use crate::network::BayesNet;
use crate::proposition::Proposition;
use crate::triangulate::positions;
use crate::{DisjointSets, NodeSet};
use std::collections::HashMap;
use tracing::trace;

/// Computes posteriors by conditioning on parents, one CPT at a time.
///
/// The probability of a conjunctive proposition is found by splitting off its topologically
/// last constrained variable and summing over that variable's CPT rows, with each row's
/// parent values added to what the rest of the proposition requires. Constrained variables
/// with no common ancestor are independent, so their groups are evaluated separately and
/// multiplied.
///
/// Results are memoized per proposition for the life of the engine. Building an engine is
/// cheap, so new evidence means a new engine.
///
/// ```
/// use bayes_update::{AncestralEngine, BayesNetBuilder, Proposition};
///
/// let mut builder = BayesNetBuilder::new();
/// let a = builder.add_variable("a", &["0", "1"]).unwrap();
/// let b = builder.add_variable("b", &["0", "1"]).unwrap();
/// builder.add_edge(a, b).unwrap();
/// let mut net = builder.build().unwrap();
/// net.set_row(a, 0, &[0.5, 0.5]).unwrap();
/// net.set_row(b, 0, &[1.0, 0.0]).unwrap();
/// net.set_row(b, 1, &[0.25, 0.75]).unwrap();
///
/// let mut evidence = Proposition::tautology(net.variables());
/// evidence.disallow_complement(b, 1).unwrap();
/// let mut engine = AncestralEngine::new(net, evidence).unwrap();
/// assert_eq!(engine.marginal(a, 1).unwrap(), Some(1.0));
/// assert_eq!(engine.evidence_probability().unwrap(), Some(0.375));
/// ```
#[derive(Debug)]
pub struct AncestralEngine {
    net: BayesNet,
    evidence: Proposition,
    topological_position: Vec<usize>,
    ancestors: Vec<NodeSet>,
    memo: HashMap<Proposition, Option<f64>>,
    cancel: CancelToken,
}

/// How one proposition's probability follows from others.
enum Plan {
    Known(Option<f64>),
    /// Independent groups of constrained variables.
    Product(Vec<Proposition>),
    /// One sub-query per CPT row of the last constrained variable, weighted by the CPT mass
    /// that row puts on the variable's allowed categories.
    Sum {
        terms: Vec<(Proposition, f64)>,
        zero_rows: bool,
    },
}

impl Plan {
    fn subqueries(&self) -> Vec<&Proposition> {
        match self {
            Plan::Known(_) => Vec::new(),
            Plan::Product(groups) => groups.iter().collect(),
            Plan::Sum { terms, .. } => terms.iter().map(|(q, _)| q).collect(),
        }
    }

    fn combine(&self, memo: &HashMap<Proposition, Option<f64>>) -> Option<f64> {
        let lookup = |q: &Proposition| memo.get(q).copied().flatten();
        match self {
            Plan::Known(value) => *value,
            Plan::Product(groups) => {
                let factors: Vec<Option<f64>> = groups.iter().map(lookup).collect();
                if factors.contains(&Some(0.0)) {
                    return Some(0.0);
                }
                factors.into_iter().product()
            }
            Plan::Sum { terms, zero_rows } => {
                let mut total = if *zero_rows { Some(0.0) } else { None };
                for (q, mass) in terms.iter() {
                    if let Some(p) = lookup(q) {
                        total = Some(total.unwrap_or(0.0) + p * mass);
                    }
                }
                total
            }
        }
    }
}

struct Frame {
    key: Proposition,
    plan: Plan,
    expanded: bool,
}

impl AncestralEngine {
    /// Creates an engine answering queries about `net` given `evidence`.
    pub fn new(net: BayesNet, evidence: Proposition) -> Result<Self> {
        AncestralEngine::with_cancel(net, evidence, CancelToken::new())
    }

    /// Creates an engine whose queries give up once `cancel` fires.
    pub fn with_cancel(net: BayesNet, evidence: Proposition, cancel: CancelToken) -> Result<Self> {
        if !evidence.same_variables_as(net.variables()) {
            return Err(Error::IncompatibleVariables);
        }
        let topological_position = positions(&net.dag().topological_order());
        let ancestors = (0..net.num_nodes())
            .map(|node| net.dag().ancestors(&NodeSet::new(&[node])))
            .collect();
        Ok(AncestralEngine {
            net,
            evidence,
            topological_position,
            ancestors,
            memo: HashMap::new(),
            cancel,
        })
    }

    /// The network this engine reads CPTs from.
    pub fn bayes_net(&self) -> &BayesNet {
        &self.net
    }

    /// The evidence queries are conditioned on.
    pub fn proposition(&self) -> &Proposition {
        &self.evidence
    }

    /// The probability of the evidence itself.
    pub fn evidence_probability(&mut self) -> Result<Option<f64>> {
        let evidence = self.evidence.clone();
        self.joint(&evidence)
    }

    /// The posterior probability that `node` takes `category`.
    pub fn marginal(&mut self, node: usize, category: usize) -> Result<Option<f64>> {
        let mut query = self.evidence.clone();
        query.disallow_complement(node, category)?;
        let evidence = self.evidence.clone();
        self.ratio(&query, &evidence)
    }

    /// The posterior probability that `node` takes `category` given that `parents` take
    /// `parent_values`, or `None` if that parent configuration has probability zero.
    pub fn conditional_probability(
        &mut self,
        node: usize,
        category: usize,
        parents: &[usize],
        parent_values: &[usize],
    ) -> Result<Option<f64>> {
        check_index("node", node, self.net.num_nodes())?;
        if parents.len() != parent_values.len() {
            return Err(Error::InvalidArgument(format!(
                "{} parents but {} values",
                parents.len(),
                parent_values.len()
            )));
        }
        let mut given = self.evidence.clone();
        for (&parent, &value) in parents.iter().zip(parent_values) {
            given.disallow_complement(parent, value)?;
        }
        let mut query = given.clone();
        query.disallow_complement(node, category)?;
        self.ratio(&query, &given)
    }

    fn ratio(&mut self, numerator: &Proposition, denominator: &Proposition) -> Result<Option<f64>> {
        let denominator = match self.joint(denominator)? {
            Some(d) if d > 0.0 => d,
            _ => return Ok(None),
        };
        Ok(self.joint(numerator)?.map(|n| n / denominator))
    }

    /// The probability that every variable lies in its allowed categories, or `None` if that
    /// depends only on unset CPT cells.
    pub fn joint(&mut self, proposition: &Proposition) -> Result<Option<f64>> {
        if !proposition.same_variables_as(self.net.variables()) {
            return Err(Error::IncompatibleVariables);
        }
        if let Some(&value) = self.memo.get(proposition) {
            return Ok(value);
        }

        let mut stack = vec![Frame {
            plan: self.plan(proposition),
            key: proposition.clone(),
            expanded: false,
        }];
        while let Some(frame) = stack.last_mut() {
            self.cancel.check()?;
            if self.memo.contains_key(&frame.key) {
                stack.pop();
                continue;
            }
            if !frame.expanded {
                frame.expanded = true;
                let missing: Vec<Proposition> = frame
                    .plan
                    .subqueries()
                    .into_iter()
                    .filter(|q| !self.memo.contains_key(q))
                    .cloned()
                    .collect();
                if !missing.is_empty() {
                    for key in missing {
                        let plan = self.plan(&key);
                        stack.push(Frame {
                            key,
                            plan,
                            expanded: false,
                        });
                    }
                    continue;
                }
            }
            // Every sub-query was pushed above this frame, so all of them are done.
            let value = frame.plan.combine(&self.memo);
            if let Some(frame) = stack.pop() {
                self.memo.insert(frame.key, value);
            }
        }

        Ok(self.memo.get(proposition).copied().flatten())
    }

    fn plan(&self, proposition: &Proposition) -> Plan {
        if !proposition.exists_combination() {
            return Plan::Known(Some(0.0));
        }
        let constrained: Vec<usize> = proposition.constrained_variables().iter().collect();
        if constrained.is_empty() {
            return Plan::Known(Some(1.0));
        }

        let mut sets = DisjointSets::new(constrained.len());
        for (i, &a) in constrained.iter().enumerate() {
            for (j, &b) in constrained.iter().enumerate().skip(i + 1) {
                if self.ancestors[a].intersects(&self.ancestors[b]) {
                    sets.union(i, j);
                }
            }
        }
        let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
        for (i, &variable) in constrained.iter().enumerate() {
            groups.entry(sets.find(i)).or_default().push(variable);
        }
        if groups.len() > 1 {
            trace!(groups = groups.len(), "split into independent groups");
            let mut parts: Vec<Proposition> = groups
                .values()
                .map(|group| proposition.keep_only(&group.iter().copied().collect()))
                .collect();
            parts.sort_by_key(|p| p.constrained_variables());
            return Plan::Product(parts);
        }

        let last = constrained
            .iter()
            .copied()
            .max_by_key(|&v| self.topological_position[v])
            .unwrap_or(constrained[0]);
        let parents = self.net.dag().parents(last);
        let cpt = self.net.cpt_unchecked(last);
        let allowed = proposition.allowed(last);

        let mut terms = Vec::new();
        let mut zero_rows = false;
        for row in 0..cpt.num_rows() {
            let values = self.net.parent_values_unchecked(last, row);
            let consistent = parents
                .iter()
                .zip(values.iter())
                .all(|(&p, &v)| proposition.is_allowed(p, v));
            if !consistent {
                continue;
            }
            let mass: Option<f64> = allowed
                .iter()
                .enumerate()
                .filter(|&(_, &a)| a)
                .map(|(c, _)| cpt.cell(row, c))
                .sum();
            let mass = match mass {
                Some(mass) => mass,
                None => continue,
            };
            if mass == 0.0 {
                zero_rows = true;
                continue;
            }
            let mut sub = proposition.clone();
            sub.widen(last);
            for (&p, &v) in parents.iter().zip(values.iter()) {
                sub.narrow_to(p, v);
            }
            terms.push((sub, mass));
        }
        Plan::Sum { terms, zero_rows }
    }
}
