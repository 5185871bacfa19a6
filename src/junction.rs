//! Junction trees and exact inference by propagating potentials over them.

use crate::config::CancelToken;
use crate::error::{check_index, Error, Result};
use crate::graph::{Dag, UndirectedGraph};
use crate::network::BayesNet;
use crate::proposition::Proposition;
use crate::triangulate;
use crate::NodeSet;
use std::fmt;
use std::iter;
use tracing::{debug, trace, warn};

/// One maximal clique of the triangulated moral graph, placed in a [`JunctionTree`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Clique {
    nodes: NodeSet,
    separator: NodeSet,
    parent: Option<usize>,
    children: Vec<usize>,
}

impl Clique {
    /// The network nodes in this clique.
    pub fn nodes(&self) -> &NodeSet {
        &self.nodes
    }

    /// The nodes shared with the parent clique. Empty for a root.
    pub fn separator(&self) -> &NodeSet {
        &self.separator
    }

    /// The index of the parent clique, or `None` for a root.
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    /// The indices of the child cliques.
    pub fn children(&self) -> &[usize] {
        &self.children
    }
}

/// The cliques of a triangulated moral graph, linked into a forest with one tree per connected
/// component.
///
/// Cliques are stored so that every parent comes before its children.
///
/// ```
/// use bayes_update::{CancelToken, Dag, JunctionTree, NodeSet};
///
/// // 0 -> 1 -> 2 and 0 -> 3 -> 2: moralization marries 1 and 3, closing the loop.
/// let dag = Dag::from_parents(vec![vec![], vec![0], vec![1, 3], vec![0]]).unwrap();
/// let tree = JunctionTree::build(&dag, &CancelToken::new()).unwrap();
/// assert_eq!(tree.cliques().len(), 2);
/// assert!(tree.satisfies_running_intersection());
/// assert!(tree.find_clique(&NodeSet::new(&[1, 2, 3])).is_some());
/// ```
#[derive(Clone, Debug)]
pub struct JunctionTree {
    cliques: Vec<Clique>,
    ordering: Vec<usize>,
    triangulated: UndirectedGraph,
}

impl JunctionTree {
    /// Builds the junction tree of `dag`, giving up with [`Error::Cancelled`] once `cancel`
    /// fires. The searches and the fill-in poll it once per node.
    pub fn build(dag: &Dag, cancel: &CancelToken) -> Result<Self> {
        let mut triangulated = triangulate::moralize(dag);
        cancel.check()?;
        let ordering = triangulate::maximum_cardinality_search_until(&triangulated, cancel)?;
        let added = triangulate::fill_in_until(&mut triangulated, &ordering, cancel)?;
        trace!(fill_in = added.len(), "triangulated moral graph");

        // Clique extraction needs an ordering whose reverse eliminates without fill-in, which a
        // second search over the chordal graph provides.
        let ordering = triangulate::maximum_cardinality_search_until(&triangulated, cancel)?;
        cancel.check()?;
        Ok(JunctionTree::from_chordal(triangulated, ordering))
    }

    fn from_chordal(triangulated: UndirectedGraph, ordering: Vec<usize>) -> Self {
        let by_node = triangulate::cliques(&ordering, &triangulated);
        let separators = triangulate::separators(&ordering, &by_node);
        let parents = triangulate::clique_tree(&ordering, &by_node, &separators);

        let mut children = vec![Vec::new(); by_node.len()];
        for &node in ordering.iter() {
            if let Some(parent) = parents[node] {
                children[parent].push(node);
            }
        }

        // Lay the cliques out parents-first by walking down from each root.
        let mut index = vec![usize::MAX; by_node.len()];
        let mut layout = Vec::new();
        let mut stack: Vec<usize> = ordering
            .iter()
            .rev()
            .copied()
            .filter(|&node| by_node[node].is_some() && parents[node].is_none())
            .collect();
        while let Some(node) = stack.pop() {
            index[node] = layout.len();
            layout.push(node);
            stack.extend(children[node].iter().rev());
        }

        let cliques = layout
            .iter()
            .map(|&node| Clique {
                nodes: by_node[node].clone().unwrap_or_default(),
                separator: separators[node].clone().unwrap_or_default(),
                parent: parents[node].map(|p| index[p]),
                children: children[node].iter().map(|&c| index[c]).collect(),
            })
            .collect();

        JunctionTree {
            cliques,
            ordering,
            triangulated,
        }
    }

    /// The cliques, parents before children.
    pub fn cliques(&self) -> &[Clique] {
        &self.cliques
    }

    /// The node ordering the cliques were extracted along.
    pub fn ordering(&self) -> &[usize] {
        &self.ordering
    }

    /// The moral graph plus its fill-in edges.
    pub fn triangulated_graph(&self) -> &UndirectedGraph {
        &self.triangulated
    }

    /// Returns an iterator over the indices of the root cliques.
    pub fn roots(&self) -> impl Iterator<Item = usize> + '_ {
        self.cliques
            .iter()
            .enumerate()
            .filter(|(_, clique)| clique.parent.is_none())
            .map(|(i, _)| i)
    }

    /// The number of nodes in the largest clique.
    pub fn largest_clique(&self) -> usize {
        self.cliques.iter().map(|c| c.nodes.len()).max().unwrap_or(0)
    }

    /// The first clique containing every node of `nodes`.
    pub fn find_clique(&self, nodes: &NodeSet) -> Option<usize> {
        self.cliques.iter().position(|c| c.nodes.is_superset(nodes))
    }

    /// Checks that the cliques containing any given node form a connected subtree.
    ///
    /// That holds exactly when, for every node, at most one of the cliques containing it has
    /// a parent that doesn't.
    pub fn satisfies_running_intersection(&self) -> bool {
        let mut tops = vec![0usize; self.triangulated.num_nodes()];
        for clique in self.cliques.iter() {
            for node in clique.nodes.iter() {
                let parent_has = clique
                    .parent
                    .map_or(false, |p| self.cliques[p].nodes.contains(node));
                if !parent_has {
                    tops[node] += 1;
                }
            }
        }
        tops.iter().all(|&count| count <= 1)
    }
}

/// The cells of a table over the configurations of a node set, in mixed radix over the sorted
/// nodes with the last node varying fastest.
#[derive(Clone, Debug)]
struct Layout {
    nodes: NodeSet,
    dims: Vec<usize>,
    size: usize,
}

impl Layout {
    fn new(nodes: &NodeSet, net: &BayesNet, limit: usize) -> Result<Self> {
        let dims: Vec<usize> = nodes
            .iter()
            .map(|node| net.variables().num_categories(node))
            .collect();
        let too_large = Error::CliqueTooLarge {
            variables: nodes.len(),
            limit,
        };
        let mut size = 1usize;
        for &d in dims.iter() {
            size = size.checked_mul(d).ok_or_else(|| too_large.clone())?;
        }
        if size > limit {
            return Err(too_large);
        }
        Ok(Layout {
            nodes: nodes.clone(),
            dims,
            size,
        })
    }

    /// For every cell of this layout, the offset of the matching cell in `sub`, whose nodes
    /// must be a subset of these.
    fn offsets_into(&self, sub: &Layout) -> Vec<usize> {
        let mut strides = vec![0; self.dims.len()];
        let mut stride = 1;
        for (node, &d) in sub.nodes.as_slice().iter().copied().zip(sub.dims.iter()).rev() {
            if let Some(at) = self.nodes.position(node) {
                strides[at] = stride;
            }
            stride *= d;
        }

        let mut offsets = Vec::with_capacity(self.size);
        let mut values = vec![0; self.dims.len()];
        loop {
            offsets.push(values.iter().zip(strides.iter()).map(|(v, s)| v * s).sum());
            if !next_configuration(&mut values, &self.dims) {
                break;
            }
        }
        offsets
    }
}

/// Steps `values` to the next configuration in mixed-radix order, returning `false` after the
/// last one.
fn next_configuration(values: &mut [usize], dims: &[usize]) -> bool {
    for (value, &dim) in values.iter_mut().zip(dims).rev() {
        *value += 1;
        if *value < dim {
            return true;
        }
        *value = 0;
    }
    false
}

/// A clique's table layout plus the offset maps for talking to its parent.
#[derive(Clone, Debug)]
struct Potential {
    layout: Layout,
    /// Product of the CPTs assigned to this clique, before evidence. Unset CPT cells are NaN.
    base: Vec<f64>,
    /// Number of cells in the separator table.
    separator_size: usize,
    /// Separator cell of each cell of this clique.
    to_separator: Vec<usize>,
    /// Separator cell of each cell of the parent clique.
    from_parent: Vec<usize>,
}

/// Beliefs after absorbing a proposition and propagating it through the tree.
#[derive(Clone, Debug)]
struct Calibration {
    /// Normalized joint distribution over each clique given the evidence.
    beliefs: Vec<Vec<f64>>,
    /// Natural log of the probability of the evidence within each tree of the forest, stored
    /// at the tree's root clique and zero elsewhere. Negative infinity when that tree's
    /// evidence is impossible and NaN when it depends on unset CPT cells.
    log_mass: Vec<f64>,
}

impl Calibration {
    fn log_mass_over(&self, roots: &NodeSet) -> f64 {
        roots.iter().map(|root| self.log_mass[root]).sum()
    }
}

/// Exact inference over the junction tree of one network and one proposition.
///
/// Every node's CPT is multiplied into the first clique holding the node and all its parents.
/// The proposition zeroes out the cells it rules out, and a collect pass toward the roots
/// followed by a distribute pass back out leaves every clique holding its posterior joint
/// distribution.
///
/// Queries return `None` when the answer is undefined: when the evidence has probability zero,
/// or when it depends on unset CPT cells. Each tree of the forest is judged on its own, and a
/// query only consults the trees holding a queried node or a constrained variable.
#[derive(Clone, Debug)]
pub struct JunctionTreeEngine {
    net: BayesNet,
    tree: JunctionTree,
    potentials: Vec<Potential>,
    /// First clique containing each node.
    home: Vec<usize>,
    /// Root of the tree each clique belongs to.
    root_of: Vec<usize>,
    /// Roots of the trees holding a variable the proposition constrains.
    constrained: NodeSet,
    proposition: Proposition,
    calibration: Calibration,
    margins: Vec<Option<Vec<f64>>>,
    cancel: CancelToken,
}

impl JunctionTreeEngine {
    /// Builds and calibrates an engine with no limit on clique size.
    pub fn new(net: BayesNet, proposition: Proposition) -> Result<Self> {
        JunctionTreeEngine::build(net, proposition, usize::MAX, CancelToken::new())
    }

    /// Builds and calibrates an engine, refusing cliques with more than `max_clique_cells`
    /// cells. Construction and any later recalibration watch `cancel`.
    pub fn build(
        net: BayesNet,
        proposition: Proposition,
        max_clique_cells: usize,
        cancel: CancelToken,
    ) -> Result<Self> {
        if !proposition.same_variables_as(net.variables()) {
            return Err(Error::IncompatibleVariables);
        }

        let tree = JunctionTree::build(net.dag(), &cancel)?;
        debug!(
            cliques = tree.cliques().len(),
            largest = tree.largest_clique(),
            "built junction tree"
        );

        let layouts = tree
            .cliques()
            .iter()
            .map(|clique| Layout::new(clique.nodes(), &net, max_clique_cells))
            .collect::<Result<Vec<_>>>()?;

        let mut bases: Vec<Vec<f64>> = layouts.iter().map(|l| vec![1.0; l.size]).collect();
        for node in 0..net.num_nodes() {
            cancel.check()?;
            let mut family: NodeSet = net.dag().parents(node).iter().copied().collect();
            family.insert(node);
            // Moralization makes every family complete, so some clique holds it.
            let at = tree.find_clique(&family).unwrap_or(0);
            multiply_cpt(&mut bases[at], &layouts[at], &net, node);
        }

        let mut potentials = Vec::with_capacity(layouts.len());
        for (i, (layout, base)) in layouts.iter().zip(bases).enumerate() {
            cancel.check()?;
            let clique = &tree.cliques()[i];
            let separator = Layout::new(clique.separator(), &net, usize::MAX)?;
            let to_separator = layout.offsets_into(&separator);
            let from_parent = match clique.parent() {
                Some(p) => layouts[p].offsets_into(&separator),
                None => Vec::new(),
            };
            trace!(clique = i, cells = layout.size, "built clique potential");
            potentials.push(Potential {
                layout: layout.clone(),
                base,
                separator_size: separator.size,
                to_separator,
                from_parent,
            });
        }

        let mut home = vec![0; net.num_nodes()];
        for node in 0..net.num_nodes() {
            home[node] = tree.find_clique(&NodeSet::new(&[node])).unwrap_or(0);
        }
        let mut root_of = vec![0; tree.cliques().len()];
        for (i, clique) in tree.cliques().iter().enumerate() {
            let root = clique.parent().map_or(i, |p| root_of[p]);
            root_of[i] = root;
        }
        let constrained = proposition
            .constrained_variables()
            .iter()
            .map(|node| root_of[home[node]])
            .collect();

        let mut engine = JunctionTreeEngine {
            net,
            tree,
            potentials,
            home,
            root_of,
            constrained,
            calibration: Calibration {
                beliefs: Vec::new(),
                log_mass: Vec::new(),
            },
            margins: Vec::new(),
            proposition,
            cancel,
        };
        engine.calibration = engine.calibrate(&engine.proposition)?;
        engine.margins = (0..engine.net.num_nodes())
            .map(|node| engine.compute_margin(node))
            .collect();
        if !engine.proposition.exists_combination() {
            warn!("evidence rules out every category of some variable");
        }
        Ok(engine)
    }

    /// The network this engine was built over.
    pub fn bayes_net(&self) -> &BayesNet {
        &self.net
    }

    /// The junction tree of the network.
    pub fn junction_tree(&self) -> &JunctionTree {
        &self.tree
    }

    /// The evidence absorbed into the potentials.
    pub fn proposition(&self) -> &Proposition {
        &self.proposition
    }

    /// The probability of the evidence, or `None` if it depends on unset CPT cells.
    pub fn evidence_probability(&self) -> Option<f64> {
        let log_mass = self.calibration.log_mass_over(&self.constrained);
        if log_mass.is_nan() {
            None
        } else {
            Some(log_mass.exp())
        }
    }

    /// The roots of the trees a query about `nodes` depends on.
    fn needed_roots(&self, nodes: impl IntoIterator<Item = usize>) -> NodeSet {
        let mut roots = self.constrained.clone();
        for node in nodes {
            roots.insert(self.root_of[self.home[node]]);
        }
        roots
    }

    fn calibrate(&self, proposition: &Proposition) -> Result<Calibration> {
        let mut tables: Vec<Vec<f64>> = Vec::with_capacity(self.potentials.len());
        for potential in self.potentials.iter() {
            self.cancel.check()?;
            let mut table = potential.base.clone();
            absorb(&mut table, &potential.layout, proposition);
            tables.push(table);
        }

        let mut log_mass = vec![0.0; tables.len()];
        let mut messages: Vec<Vec<f64>> = vec![Vec::new(); tables.len()];

        // Collect: children come after their parents, so walking backwards finishes every
        // subtree before its root.
        for i in (0..tables.len()).rev() {
            self.cancel.check()?;
            let potential = &self.potentials[i];
            match self.tree.cliques[i].parent {
                Some(parent) => {
                    let mut message = vec![0.0; potential.separator_size];
                    for (&value, &at) in tables[i].iter().zip(potential.to_separator.iter()) {
                        message[at] += value;
                    }
                    log_mass[self.root_of[i]] += normalize(&mut message).ln();
                    for (value, &at) in tables[parent].iter_mut().zip(potential.from_parent.iter())
                    {
                        *value *= message[at];
                    }
                    messages[i] = message;
                }
                None => {
                    log_mass[i] += normalize(&mut tables[i]).ln();
                }
            }
        }

        // Distribute: each parent is final before any of its children is visited.
        for i in 0..tables.len() {
            let parent = match self.tree.cliques[i].parent {
                Some(parent) => parent,
                None => continue,
            };
            self.cancel.check()?;
            let potential = &self.potentials[i];
            let mut update = vec![0.0; potential.separator_size];
            for (&value, &at) in tables[parent].iter().zip(potential.from_parent.iter()) {
                update[at] += value;
            }
            let old = &messages[i];
            for (value, &at) in tables[i].iter_mut().zip(potential.to_separator.iter()) {
                *value *= if old[at] == 0.0 {
                    0.0
                } else {
                    update[at] / old[at]
                };
            }
            normalize(&mut tables[i]);
        }

        Ok(Calibration {
            beliefs: tables,
            log_mass,
        })
    }

    fn compute_margin(&self, node: usize) -> Option<Vec<f64>> {
        let roots = self.needed_roots(iter::once(node));
        if !self.calibration.log_mass_over(&roots).is_finite() {
            return None;
        }
        let at = self.home[node];
        let layout = &self.potentials[at].layout;
        let position = layout.nodes.position(node)?;
        let mut margin = vec![0.0; layout.dims[position]];
        let mut values = vec![0; layout.dims.len()];
        for &p in self.calibration.beliefs[at].iter() {
            margin[values[position]] += p;
            next_configuration(&mut values, &layout.dims);
        }
        if margin.iter().any(|p| p.is_nan()) {
            return None;
        }
        Some(margin)
    }

    /// The posterior probability that `node` takes `category`.
    pub fn marginal(&self, node: usize, category: usize) -> Result<Option<f64>> {
        check_index("node", node, self.net.num_nodes())?;
        check_index(
            "category",
            category,
            self.net.variables().num_categories(node),
        )?;
        Ok(self.margins[node].as_ref().map(|m| m[category]))
    }

    /// The posterior distribution of `node`.
    pub fn marginals(&self, node: usize) -> Result<Option<&[f64]>> {
        check_index("node", node, self.net.num_nodes())?;
        Ok(self.margins[node].as_deref())
    }

    /// The posterior probability that each of `nodes` takes the matching entry of
    /// `categories`.
    ///
    /// When some clique contains all the nodes this sums its beliefs. Otherwise it propagates
    /// the narrowed evidence through the tree again and compares the two evidence masses.
    pub fn joint_marginal(&self, nodes: &[usize], categories: &[usize]) -> Result<Option<f64>> {
        if nodes.len() != categories.len() {
            return Err(Error::InvalidArgument(format!(
                "{} nodes but {} categories",
                nodes.len(),
                categories.len()
            )));
        }
        let mut narrowed = self.proposition.clone();
        for (&node, &category) in nodes.iter().zip(categories) {
            narrowed.disallow_complement(node, category)?;
        }
        let roots = self.needed_roots(nodes.iter().copied());
        if !self.calibration.log_mass_over(&roots).is_finite() {
            return Ok(None);
        }
        if nodes.is_empty() {
            return Ok(Some(1.0));
        }

        let set: NodeSet = nodes.iter().copied().collect();
        if let Some(at) = self.tree.find_clique(&set) {
            // The beliefs already reflect the evidence, so only the queried nodes need checking.
            let layout = &self.potentials[at].layout;
            let mut total = 0.0;
            let mut values = vec![0; layout.dims.len()];
            for &p in self.calibration.beliefs[at].iter() {
                let consistent = layout
                    .nodes
                    .iter()
                    .zip(values.iter())
                    .all(|(node, &value)| !set.contains(node) || narrowed.is_allowed(node, value));
                if consistent {
                    total += p;
                }
                next_configuration(&mut values, &layout.dims);
            }
            return Ok(if total.is_nan() { None } else { Some(total) });
        }

        // Trees without a queried node keep the same evidence, so their masses cancel.
        let queried: NodeSet = nodes
            .iter()
            .map(|&node| self.root_of[self.home[node]])
            .collect();
        let joint = self.calibrate(&narrowed)?;
        let after = joint.log_mass_over(&queried);
        Ok(if after.is_nan() {
            None
        } else {
            Some((after - self.calibration.log_mass_over(&queried)).exp())
        })
    }

    /// The posterior probability that `node` takes `category` given that `parents` take
    /// `parent_values`, or `None` if that parent configuration has probability zero.
    pub fn conditional_probability(
        &self,
        node: usize,
        category: usize,
        parents: &[usize],
        parent_values: &[usize],
    ) -> Result<Option<f64>> {
        check_index("node", node, self.net.num_nodes())?;
        let denominator = match self.joint_marginal(parents, parent_values)? {
            Some(d) if d > 0.0 => d,
            _ => return Ok(None),
        };
        let mut nodes = parents.to_vec();
        nodes.push(node);
        let mut categories = parent_values.to_vec();
        categories.push(category);
        Ok(self
            .joint_marginal(&nodes, &categories)?
            .map(|numerator| numerator / denominator))
    }
}

/// Multiplies one node's CPT into a clique table that holds the node and all its parents.
fn multiply_cpt(table: &mut [f64], layout: &Layout, net: &BayesNet, node: usize) {
    let parents = net.dag().parents(node);
    let parent_at: Vec<usize> = parents
        .iter()
        .filter_map(|&p| layout.nodes.position(p))
        .collect();
    let node_at = match layout.nodes.position(node) {
        Some(at) => at,
        None => return,
    };
    let radixes: Vec<usize> = parents
        .iter()
        .map(|&p| net.variables().num_categories(p))
        .collect();
    let cpt = net.cpt_unchecked(node);

    let mut values = vec![0; layout.dims.len()];
    for cell in table.iter_mut() {
        let row = parent_at
            .iter()
            .zip(radixes.iter())
            .fold(0, |row, (&at, &radix)| row * radix + values[at]);
        *cell *= cpt.cell(row, values[node_at]).unwrap_or(f64::NAN);
        next_configuration(&mut values, &layout.dims);
    }
}

/// Zeroes every cell of a clique table that `proposition` rules out.
fn absorb(table: &mut [f64], layout: &Layout, proposition: &Proposition) {
    let mut values = vec![0; layout.dims.len()];
    for cell in table.iter_mut() {
        let allowed = layout
            .nodes
            .iter()
            .zip(values.iter())
            .all(|(node, &value)| proposition.is_allowed(node, value));
        if !allowed {
            *cell = 0.0;
        }
        next_configuration(&mut values, &layout.dims);
    }
}

/// Scales `table` to sum to 1 unless it sums to zero, returning the original sum.
fn normalize(table: &mut [f64]) -> f64 {
    let sum: f64 = table.iter().sum();
    if sum > 0.0 {
        for value in table.iter_mut() {
            *value /= sum;
        }
    }
    sum
}

impl fmt::Display for JunctionTreeEngine {
    /// Prints each clique with its separator, indented under its parent, followed by the
    /// posterior of every node whose first clique it is.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let variables = self.net.variables();
        let names = |set: &NodeSet| {
            set.iter()
                .map(|node| variables[node].name())
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut stack: Vec<(usize, usize)> = self.tree.roots().map(|r| (r, 0)).collect();
        stack.reverse();
        while let Some((at, depth)) = stack.pop() {
            let clique = &self.tree.cliques[at];
            let indent = "  ".repeat(depth);
            if clique.parent.is_some() {
                writeln!(
                    f,
                    "{}[{}] {{{}}}",
                    indent,
                    names(&clique.separator),
                    names(&clique.nodes)
                )?;
            } else {
                writeln!(f, "{}{{{}}}", indent, names(&clique.nodes))?;
            }
            for node in clique.nodes.iter().filter(|&node| self.home[node] == at) {
                write!(f, "{}  {}:", indent, variables[node].name())?;
                match &self.margins[node] {
                    Some(margin) => {
                        for (category, p) in variables[node].categories().iter().zip(margin) {
                            write!(f, " {}={:.4}", category, p)?;
                        }
                    }
                    None => f.write_str(" undefined")?,
                }
                writeln!(f)?;
            }
            for &child in clique.children.iter().rev() {
                stack.push((child, depth + 1));
            }
        }
        Ok(())
    }
}
