#![warn(missing_docs)]
#![doc(test(no_crate_inject))]
#![doc(test(attr(deny(unused, future_incompatible))))]

//! This crate computes exact posterior probabilities in discrete Bayesian networks, under both
//! observations and interventions ("do" operations), as described in:
//!
//! - Lauritzen and Spiegelhalter, Local Computations with Probabilities on Graphical Structures
//!   and their Application to Expert Systems, 1988
//! - Pearl, [Causality][], 2000, chapter 3, for the treatment of interventions as surgery on
//!   the network
//!
//! [Causality]: https://bayes.cs.ucla.edu/BOOK-2K/
//!
//! The clique-tree construction follows Weka's `MarginCalculator`: maximum cardinality search
//! over the moral graph, fill-in along that ordering, and a parent clique for every clique that
//! shares variables with earlier ones.
//!
//! Two engines answer queries through the [`Updater`] trait:
//!
//! - [`JunctionTreeUpdater`] propagates evidence through a junction tree and also answers joint
//!   queries.
//! - [`AncestralUpdater`] works directly on the conditional probability tables, recursing into
//!   a variable's parents and treating groups of variables with no common ancestor as
//!   independent.
//!
//! ```
//! use bayes_update::{BayesNetBuilder, Evidence, JunctionTreeUpdater, Updater};
//!
//! let mut builder = BayesNetBuilder::new();
//! let rain = builder.add_variable("rain", &["no", "yes"]).unwrap();
//! let wet = builder.add_variable("wet", &["no", "yes"]).unwrap();
//! builder.add_edge(rain, wet).unwrap();
//! let mut net = builder.build().unwrap();
//! net.set_row(rain, 0, &[0.8, 0.2]).unwrap();
//! net.set_row(wet, 0, &[0.9, 0.1]).unwrap();
//! net.set_row(wet, 1, &[0.2, 0.8]).unwrap();
//!
//! let mut updater = JunctionTreeUpdater::new(net).unwrap();
//! let mut evidence = Evidence::tautology(updater.bayes_net().variables());
//! evidence.proposition_mut().disallow_complement(wet, 1).unwrap();
//! updater.set_evidence(evidence).unwrap();
//!
//! let p = updater.marginal(rain, 1).unwrap().unwrap();
//! assert!((p - 0.16 / 0.24).abs() < 1e-9);
//! ```

mod ancestral;
mod config;
mod cpt;
mod error;
mod evidence;
mod graph;
mod junction;
mod manipulation;
mod network;
mod proposition;
pub mod triangulate;
mod updater;
mod variable;

pub use ancestral::AncestralEngine;
pub use config::{CancelToken, EngineKind, UpdaterConfig};
pub use cpt::{CountingCpt, Cpt};
pub use error::{Error, Result};
pub use evidence::Evidence;
pub use graph::{Dag, UndirectedGraph};
pub use junction::{Clique, JunctionTree, JunctionTreeEngine};
pub use manipulation::manipulate;
pub use network::{BayesNet, BayesNetBuilder};
pub use proposition::Proposition;
pub use updater::{new_updater, AncestralUpdater, JunctionTreeUpdater, Updater};
pub use variable::{Variable, VariableList};

use smallvec::SmallVec;
use sorted_iter::assume::AssumeSortedByItemExt;
use sorted_iter::sorted_iterator::SortedByItem;
use sorted_iter::SortedIterator;
use std::iter;

/// A set of node indices, kept sorted.
///
/// Cliques, separators and ancestor sets are all `NodeSet`s. Sets of up to four nodes, which
/// covers most cliques in sparse networks, live inline without a heap allocation.
#[derive(Clone, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NodeSet(SmallVec<[usize; 4]>);

impl NodeSet {
    /// Creates a node set containing the specified nodes.
    ///
    /// It's okay if the provided slice contains duplicates.
    pub fn new(ids: &[usize]) -> Self {
        let mut v = SmallVec::from_slice(ids);
        v.sort_unstable();
        v.dedup();
        NodeSet(v)
    }

    /// The number of nodes in the set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The nodes in ascending order.
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// Returns an iterator over the nodes which appear in this set.
    ///
    /// ```
    /// use bayes_update::NodeSet;
    ///
    /// let abc = NodeSet::new(&[2, 3, 1]);
    /// let mut it = abc.iter();
    /// assert_eq!(it.next(), Some(1));
    /// assert_eq!(it.next(), Some(2));
    /// assert_eq!(it.next(), Some(3));
    /// assert_eq!(it.next(), None);
    /// ```
    pub fn iter(&self) -> impl Iterator<Item = usize> + SortedByItem + Clone + '_ {
        self.0.iter().copied().assume_sorted_by_item()
    }

    /// Returns `true` if `node` is in the set.
    pub fn contains(&self, node: usize) -> bool {
        self.0.binary_search(&node).is_ok()
    }

    /// Returns the position of `node` within the sorted set.
    pub fn position(&self, node: usize) -> Option<usize> {
        self.0.binary_search(&node).ok()
    }

    /// Adds `node`, returning `false` if it was already present.
    pub fn insert(&mut self, node: usize) -> bool {
        match self.0.binary_search(&node) {
            Ok(_) => false,
            Err(at) => {
                self.0.insert(at, node);
                true
            }
        }
    }

    /// Returns `true` if `other` contains every node that `self` does.
    ///
    /// ```
    /// use bayes_update::NodeSet;
    /// let nil = NodeSet::new(&[]);
    /// let one = NodeSet::new(&[1]);
    ///
    /// assert!(nil.is_subset(&one));
    /// assert!(nil.is_subset(&nil));
    /// assert!(one.is_subset(&one));
    /// assert!(!one.is_subset(&nil));
    /// ```
    pub fn is_subset(&self, other: &Self) -> bool {
        self.len() <= other.len() && self.iter().intersection(other.iter()).eq(self.iter())
    }

    /// Returns `true` if `self` contains every node that `other` does.
    pub fn is_superset(&self, other: &Self) -> bool {
        other.is_subset(self)
    }

    /// Returns `true` if the two sets share at least one node.
    ///
    /// ```
    /// use bayes_update::NodeSet;
    ///
    /// assert!(NodeSet::new(&[1, 4]).intersects(&NodeSet::new(&[2, 4])));
    /// assert!(!NodeSet::new(&[1, 3]).intersects(&NodeSet::new(&[2, 4])));
    /// ```
    pub fn intersects(&self, other: &Self) -> bool {
        self.iter().intersection(other.iter()).next().is_some()
    }

    /// The nodes present in both sets.
    pub fn intersection(&self, other: &Self) -> Self {
        NodeSet(self.iter().intersection(other.iter()).collect())
    }

    /// The nodes present in either set.
    pub fn union(&self, other: &Self) -> Self {
        NodeSet(self.iter().union(other.iter()).collect())
    }
}

impl std::fmt::Debug for NodeSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.0.iter()).finish()
    }
}

impl iter::FromIterator<usize> for NodeSet {
    /// Creates a node set containing the specified nodes.
    ///
    /// It's okay if the provided iterator contains duplicates.
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut v: SmallVec<[usize; 4]> = iter.into_iter().collect();
        v.sort_unstable();
        v.dedup();
        NodeSet(v)
    }
}

/// Union-find over node indices, with path halving and union by rank.
pub(crate) struct DisjointSets(Vec<(usize, u8)>);

impl DisjointSets {
    pub(crate) fn new(len: usize) -> Self {
        DisjointSets((0..len).map(|x| (x, 0)).collect())
    }

    pub(crate) fn find(&mut self, x: usize) -> usize {
        self.find_rank(x).0
    }

    fn find_rank(&mut self, mut x: usize) -> (usize, u8) {
        let mut parent = self.0[x];
        while x != parent.0 {
            let grandparent = self.0[parent.0];
            self.0[x] = grandparent;
            x = parent.0;
            parent = grandparent;
        }
        parent
    }

    pub(crate) fn union(&mut self, a: usize, b: usize) {
        let mut a = self.find_rank(a);
        let mut b = self.find_rank(b);

        if a.0 == b.0 {
            return;
        }

        if a.1 < b.1 {
            std::mem::swap(&mut a, &mut b);
        }

        self.0[b.0] = a;

        if a.1 == b.1 {
            a.1 += 1;
            self.0[a.0] = a;
        }
    }
}
