//! Directed and undirected graphs over node indices.
//!
//! Nodes are the indices `0..num_nodes` into the network's variable list. Adjacency is stored
//! per node as index lists, so graphs are plain values that clone cheaply and never hold
//! references into each other.

use crate::error::{check_index, Error, Result};
use crate::NodeSet;
use std::collections::VecDeque;

/// A directed acyclic graph.
///
/// Each node's parents are kept in the order their edges were added, because that order fixes
/// how parent values are encoded as CPT rows. Any method taking a node index panics if the
/// index is out of range, unless it returns a `Result`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Dag {
    parents: Vec<Vec<usize>>,
    children: Vec<NodeSet>,
}

impl Dag {
    /// Creates a graph with `num_nodes` nodes and no edges.
    pub fn new(num_nodes: usize) -> Self {
        Dag {
            parents: vec![Vec::new(); num_nodes],
            children: vec![NodeSet::default(); num_nodes],
        }
    }

    /// Creates a graph from each node's ordered parent list, rejecting cycles.
    ///
    /// ```
    /// use bayes_update::{Dag, Error};
    ///
    /// let chain = Dag::from_parents(vec![vec![], vec![0], vec![1]]).unwrap();
    /// assert_eq!(chain.parents(2), &[1]);
    ///
    /// let cycle = Dag::from_parents(vec![vec![2], vec![0], vec![1]]);
    /// assert!(matches!(cycle, Err(Error::Cycle { .. })));
    /// ```
    pub fn from_parents(parents: Vec<Vec<usize>>) -> Result<Self> {
        let mut dag = Dag::new(parents.len());
        for (child, list) in parents.into_iter().enumerate() {
            for parent in list {
                dag.add_edge(parent, child)?;
            }
        }
        Ok(dag)
    }

    /// Adds an unconnected node, returning its index.
    pub fn add_node(&mut self) -> usize {
        self.parents.push(Vec::new());
        self.children.push(NodeSet::default());
        self.parents.len() - 1
    }

    /// The number of nodes.
    pub fn num_nodes(&self) -> usize {
        self.parents.len()
    }

    /// The number of edges.
    pub fn num_edges(&self) -> usize {
        self.parents.iter().map(Vec::len).sum()
    }

    /// The parents of `node`, in CPT row order.
    pub fn parents(&self, node: usize) -> &[usize] {
        &self.parents[node]
    }

    /// The children of `node`.
    pub fn children(&self, node: usize) -> &NodeSet {
        &self.children[node]
    }

    /// Returns `true` if the edge `from -> to` is present.
    pub fn has_edge(&self, from: usize, to: usize) -> bool {
        self.children[from].contains(to)
    }

    /// Returns an iterator over every edge as a `(parent, child)` pair.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.parents
            .iter()
            .enumerate()
            .flat_map(|(child, parents)| parents.iter().map(move |&parent| (parent, child)))
    }

    /// Adds the edge `from -> to` as the last parent of `to`.
    ///
    /// Fails with [`Error::Cycle`] if `to` is already an ancestor of `from`, which includes the
    /// case `from == to`.
    pub fn add_edge(&mut self, from: usize, to: usize) -> Result<()> {
        check_index("node", from, self.num_nodes())?;
        check_index("node", to, self.num_nodes())?;
        if self.has_edge(from, to) {
            return Err(Error::InvalidArgument(format!(
                "edge {} -> {} already exists",
                from, to
            )));
        }
        if self.is_ancestor_of(to, from) {
            return Err(Error::Cycle { from, to });
        }
        self.parents[to].push(from);
        self.children[from].insert(to);
        Ok(())
    }

    /// Removes the edge `from -> to`, returning `false` if it wasn't present.
    pub fn remove_edge(&mut self, from: usize, to: usize) -> bool {
        match self.parents[to].iter().position(|&p| p == from) {
            Some(at) => {
                self.parents[to].remove(at);
                self.children[from] = self.children[from].iter().filter(|&c| c != to).collect();
                true
            }
            None => false,
        }
    }

    /// Removes every edge into `node`, returning the former parents.
    pub fn remove_incoming(&mut self, node: usize) -> Vec<usize> {
        let parents = std::mem::take(&mut self.parents[node]);
        for &parent in parents.iter() {
            self.children[parent] = self.children[parent]
                .iter()
                .filter(|&c| c != node)
                .collect();
        }
        parents
    }

    /// Returns `true` if there is a directed path from `ancestor` to `node`. Every node is its
    /// own ancestor.
    pub fn is_ancestor_of(&self, ancestor: usize, node: usize) -> bool {
        if ancestor == node {
            return true;
        }
        let mut seen = vec![false; self.num_nodes()];
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            for &parent in self.parents[current].iter() {
                if parent == ancestor {
                    return true;
                }
                if !seen[parent] {
                    seen[parent] = true;
                    stack.push(parent);
                }
            }
        }
        false
    }

    /// Every ancestor of any node in `nodes`, including those nodes themselves.
    ///
    /// ```
    /// use bayes_update::{Dag, NodeSet};
    ///
    /// // 0 -> 1 -> 2, 3 -> 2, 4 alone
    /// let dag = Dag::from_parents(vec![vec![], vec![0], vec![1, 3], vec![], vec![]]).unwrap();
    /// assert_eq!(dag.ancestors(&NodeSet::new(&[2])), NodeSet::new(&[0, 1, 2, 3]));
    /// assert_eq!(dag.ancestors(&NodeSet::new(&[1, 4])), NodeSet::new(&[0, 1, 4]));
    /// ```
    pub fn ancestors(&self, nodes: &NodeSet) -> NodeSet {
        let mut seen = vec![false; self.num_nodes()];
        let mut stack: Vec<usize> = nodes.iter().collect();
        for &node in stack.iter() {
            seen[node] = true;
        }
        while let Some(current) = stack.pop() {
            for &parent in self.parents[current].iter() {
                if !seen[parent] {
                    seen[parent] = true;
                    stack.push(parent);
                }
            }
        }
        seen.iter()
            .enumerate()
            .filter_map(|(node, &s)| if s { Some(node) } else { None })
            .collect()
    }

    /// Orders the nodes so every parent comes before its children. Among nodes that are ready
    /// at the same time, lower indices come first.
    pub fn topological_order(&self) -> Vec<usize> {
        let mut pending: Vec<usize> = self.parents.iter().map(Vec::len).collect();
        let mut ready: VecDeque<usize> = (0..self.num_nodes())
            .filter(|&node| pending[node] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.num_nodes());
        while let Some(node) = ready.pop_front() {
            order.push(node);
            for child in self.children[node].iter() {
                pending[child] -= 1;
                if pending[child] == 0 {
                    ready.push_back(child);
                }
            }
        }
        // add_edge refuses cycles, so every node is eventually ready.
        debug_assert_eq!(order.len(), self.num_nodes());
        order
    }
}

/// A simple undirected graph, used for the moral graph and its triangulation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UndirectedGraph {
    adjacent: Vec<NodeSet>,
}

impl UndirectedGraph {
    /// Creates a graph with `num_nodes` nodes and no edges.
    pub fn new(num_nodes: usize) -> Self {
        UndirectedGraph {
            adjacent: vec![NodeSet::default(); num_nodes],
        }
    }

    /// The number of nodes.
    pub fn num_nodes(&self) -> usize {
        self.adjacent.len()
    }

    /// The number of edges.
    pub fn num_edges(&self) -> usize {
        self.adjacent.iter().map(NodeSet::len).sum::<usize>() / 2
    }

    /// Connects `a` and `b`, returning `false` if they were already adjacent. Self-loops are
    /// ignored.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range.
    pub fn add_edge(&mut self, a: usize, b: usize) -> bool {
        if a == b {
            return false;
        }
        let added = self.adjacent[a].insert(b);
        self.adjacent[b].insert(a);
        added
    }

    /// Returns `true` if `a` and `b` are adjacent.
    pub fn is_adjacent(&self, a: usize, b: usize) -> bool {
        self.adjacent[a].contains(b)
    }

    /// The nodes adjacent to `node`.
    pub fn neighbors(&self, node: usize) -> &NodeSet {
        &self.adjacent[node]
    }

    /// Returns an iterator over every edge once, as `(a, b)` with `a < b`.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.adjacent.iter().enumerate().flat_map(|(a, adjacent)| {
            adjacent
                .iter()
                .skip_while(move |&b| b <= a)
                .map(move |b| (a, b))
        })
    }
}
