//! Moralization, triangulation, and clique extraction.
//!
//! These are the steps that turn a network's DAG into the skeleton of a junction tree:
//!
//! 1. [`moralize`] drops edge directions and marries every pair of co-parents.
//! 2. [`maximum_cardinality_search`] orders the nodes.
//! 3. [`fill_in`] adds the edges that make the graph chordal along that ordering.
//! 4. [`cliques`], [`separators`] and [`clique_tree`] read the maximal cliques and their tree
//!    structure off the ordering.
//!
//! Results of the last three steps are indexed by node: the clique generated by a node is the
//! node plus its neighbors earlier in the ordering, and only nodes whose clique is maximal get
//! an entry.

use crate::config::CancelToken;
use crate::error::Result;
use crate::graph::{Dag, UndirectedGraph};
use crate::NodeSet;
use std::convert::Infallible;

fn never_cancelled() -> std::result::Result<(), Infallible> {
    Ok(())
}

fn infallible<T>(result: std::result::Result<T, Infallible>) -> T {
    match result {
        Ok(value) => value,
        Err(never) => match never {},
    }
}

/// Builds the moral graph of `dag`: every directed edge becomes undirected, and every pair of
/// parents sharing a child gets connected.
///
/// ```
/// use bayes_update::Dag;
/// use bayes_update::triangulate::moralize;
///
/// // 0 -> 2 <- 1
/// let dag = Dag::from_parents(vec![vec![], vec![], vec![0, 1]]).unwrap();
/// let moral = moralize(&dag);
/// assert!(moral.is_adjacent(0, 1));
/// assert!(moral.is_adjacent(2, 0));
/// assert_eq!(moral.num_edges(), 3);
/// ```
pub fn moralize(dag: &Dag) -> UndirectedGraph {
    let mut graph = UndirectedGraph::new(dag.num_nodes());
    for (parent, child) in dag.edges() {
        graph.add_edge(parent, child);
    }
    for node in 0..dag.num_nodes() {
        let parents = dag.parents(node);
        for (i, &a) in parents.iter().enumerate() {
            for &b in parents[i + 1..].iter() {
                graph.add_edge(a, b);
            }
        }
    }
    graph
}

/// Orders the nodes by maximum cardinality search: each step numbers the unnumbered node with
/// the most numbered neighbors, preferring the lowest index on ties.
///
/// On a chordal graph the reverse of this ordering is a perfect elimination ordering.
pub fn maximum_cardinality_search(graph: &UndirectedGraph) -> Vec<usize> {
    infallible(search(graph, never_cancelled))
}

/// [`maximum_cardinality_search`], polling `cancel` before numbering each node.
pub(crate) fn maximum_cardinality_search_until(
    graph: &UndirectedGraph,
    cancel: &CancelToken,
) -> Result<Vec<usize>> {
    search(graph, || cancel.check())
}

fn search<E>(
    graph: &UndirectedGraph,
    mut poll: impl FnMut() -> std::result::Result<(), E>,
) -> std::result::Result<Vec<usize>, E> {
    let n = graph.num_nodes();
    let mut numbered = vec![false; n];
    let mut weight = vec![0usize; n];
    let mut ordering = Vec::with_capacity(n);
    for _ in 0..n {
        poll()?;
        let mut best: Option<usize> = None;
        for node in 0..n {
            if numbered[node] {
                continue;
            }
            if best.map_or(true, |b| weight[node] > weight[b]) {
                best = Some(node);
            }
        }
        let node = match best {
            Some(node) => node,
            None => break,
        };
        numbered[node] = true;
        ordering.push(node);
        for neighbor in graph.neighbors(node).iter() {
            if !numbered[neighbor] {
                weight[neighbor] += 1;
            }
        }
    }
    Ok(ordering)
}

/// The inverse of an ordering: the position of each node within it.
pub(crate) fn positions(ordering: &[usize]) -> Vec<usize> {
    let mut position = vec![0; ordering.len()];
    for (i, &node) in ordering.iter().enumerate() {
        position[node] = i;
    }
    position
}

fn earlier_neighbors<'a>(
    graph: &'a UndirectedGraph,
    position: &'a [usize],
    node: usize,
) -> impl Iterator<Item = usize> + 'a {
    graph
        .neighbors(node)
        .iter()
        .filter(move |&other| position[other] < position[node])
}

/// Makes `graph` chordal by eliminating nodes from the last in `ordering` to the first, each
/// time connecting every pair of the node's neighbors that come earlier in the ordering.
///
/// Returns the edges that were added.
pub fn fill_in(graph: &mut UndirectedGraph, ordering: &[usize]) -> Vec<(usize, usize)> {
    infallible(eliminate(graph, ordering, never_cancelled))
}

/// [`fill_in`], polling `cancel` before eliminating each node.
pub(crate) fn fill_in_until(
    graph: &mut UndirectedGraph,
    ordering: &[usize],
    cancel: &CancelToken,
) -> Result<Vec<(usize, usize)>> {
    eliminate(graph, ordering, || cancel.check())
}

fn eliminate<E>(
    graph: &mut UndirectedGraph,
    ordering: &[usize],
    mut poll: impl FnMut() -> std::result::Result<(), E>,
) -> std::result::Result<Vec<(usize, usize)>, E> {
    let position = positions(ordering);
    let mut added = Vec::new();
    for &node in ordering.iter().rev() {
        poll()?;
        let earlier: Vec<usize> = earlier_neighbors(graph, &position, node).collect();
        for (i, &a) in earlier.iter().enumerate() {
            for &b in earlier[i + 1..].iter() {
                if graph.add_edge(a, b) {
                    added.push((a.min(b), a.max(b)));
                }
            }
        }
    }
    Ok(added)
}

/// Returns `true` if every cycle of four or more nodes in `graph` has a chord.
///
/// ```
/// use bayes_update::UndirectedGraph;
/// use bayes_update::triangulate::is_chordal;
///
/// let mut square = UndirectedGraph::new(4);
/// for &(a, b) in &[(0, 1), (1, 2), (2, 3), (3, 0)] {
///     square.add_edge(a, b);
/// }
/// assert!(!is_chordal(&square));
/// square.add_edge(0, 2);
/// assert!(is_chordal(&square));
/// ```
pub fn is_chordal(graph: &UndirectedGraph) -> bool {
    let ordering = maximum_cardinality_search(graph);
    let position = positions(&ordering);
    ordering.iter().all(|&node| {
        let earlier: Vec<usize> = earlier_neighbors(graph, &position, node).collect();
        earlier
            .iter()
            .enumerate()
            .all(|(i, &a)| earlier[i + 1..].iter().all(|&b| graph.is_adjacent(a, b)))
    })
}

/// Extracts the maximal cliques of a chordal `graph` along `ordering`.
///
/// Each node first generates the candidate `{node}` plus its earlier neighbors. Candidates that
/// are contained in another candidate are then dropped, so the entry for a node is `Some` only
/// if its candidate is a maximal clique.
pub fn cliques(ordering: &[usize], graph: &UndirectedGraph) -> Vec<Option<NodeSet>> {
    let position = positions(ordering);
    let candidates: Vec<NodeSet> = (0..graph.num_nodes())
        .map(|node| {
            let mut clique: NodeSet = earlier_neighbors(graph, &position, node).collect();
            clique.insert(node);
            clique
        })
        .collect();

    candidates
        .iter()
        .enumerate()
        .map(|(node, clique)| {
            let dominated = candidates
                .iter()
                .enumerate()
                .any(|(other, bigger)| other != node && clique.is_subset(bigger));
            if dominated {
                None
            } else {
                Some(clique.clone())
            }
        })
        .collect()
}

/// Computes each clique's separator: the nodes it shares with all cliques generated earlier in
/// `ordering`.
pub fn separators(ordering: &[usize], cliques: &[Option<NodeSet>]) -> Vec<Option<NodeSet>> {
    let mut separators = vec![None; cliques.len()];
    let mut processed = NodeSet::default();
    for &node in ordering {
        if let Some(clique) = &cliques[node] {
            separators[node] = Some(clique.intersection(&processed));
            processed = processed.union(clique);
        }
    }
    separators
}

/// Links each clique with a non-empty separator to the first clique in `ordering` that
/// contains that whole separator.
///
/// The parent always comes earlier in the ordering than its child. Cliques with an empty
/// separator are roots, one per connected component of the graph.
pub fn clique_tree(
    ordering: &[usize],
    cliques: &[Option<NodeSet>],
    separators: &[Option<NodeSet>],
) -> Vec<Option<usize>> {
    let mut parents = vec![None; cliques.len()];
    for &node in ordering {
        let separator = match &separators[node] {
            Some(separator) if !separator.is_empty() => separator,
            _ => continue,
        };
        parents[node] = ordering.iter().copied().find(|&other| {
            other != node
                && cliques[other]
                    .as_ref()
                    .map_or(false, |clique| clique.is_superset(separator))
        });
    }
    parents
}
