//! Bayesian networks: variables, a DAG over them, and one CPT per node.

use crate::cpt::Cpt;
use crate::error::{check_index, Error, Result};
use crate::graph::Dag;
use crate::variable::{Variable, VariableList};
use std::sync::Arc;

/// A parametrized Bayesian network.
///
/// Each node has a [`Cpt`] with one row per combination of its parents' values and one column
/// per category of its own variable. Row numbers encode parent values in mixed radix, in the
/// order the parents were added, with the last parent varying fastest.
///
/// Once an updater takes a network it works from its own copy, so editing CPTs afterwards
/// means building a new updater.
#[derive(Clone, Debug, PartialEq)]
pub struct BayesNet {
    variables: Arc<VariableList>,
    dag: Dag,
    cpts: Vec<Cpt>,
}

impl BayesNet {
    /// Creates a network over `variables` shaped like `dag`, with every CPT cell unset.
    pub fn new(variables: Arc<VariableList>, dag: Dag) -> Result<Self> {
        if dag.num_nodes() != variables.len() {
            return Err(Error::InvalidArgument(format!(
                "graph has {} nodes but there are {} variables",
                dag.num_nodes(),
                variables.len()
            )));
        }
        let cpts = (0..dag.num_nodes())
            .map(|node| {
                let rows = dag
                    .parents(node)
                    .iter()
                    .try_fold(1usize, |rows, &p| rows.checked_mul(variables.num_categories(p)))
                    .ok_or_else(|| {
                        Error::InvalidArgument(format!(
                            "{} has too many parent combinations",
                            variables[node].name()
                        ))
                    })?;
                Cpt::new(rows, variables.num_categories(node))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(BayesNet {
            variables,
            dag,
            cpts,
        })
    }

    pub(crate) fn from_parts(variables: Arc<VariableList>, dag: Dag, cpts: Vec<Cpt>) -> Self {
        debug_assert_eq!(cpts.len(), dag.num_nodes());
        BayesNet {
            variables,
            dag,
            cpts,
        }
    }

    /// The shared variable list. Evidence for this network must be built over an equal list.
    pub fn variables(&self) -> &Arc<VariableList> {
        &self.variables
    }

    /// The network structure.
    pub fn dag(&self) -> &Dag {
        &self.dag
    }

    /// The number of nodes.
    pub fn num_nodes(&self) -> usize {
        self.cpts.len()
    }

    /// Looks up a node's index by its variable name.
    pub fn node_index(&self, name: &str) -> Option<usize> {
        self.variables.index_of(name)
    }

    /// The parents of `node`, in row-encoding order.
    pub fn parents(&self, node: usize) -> Result<&[usize]> {
        check_index("node", node, self.num_nodes())?;
        Ok(self.dag.parents(node))
    }

    /// The CPT of `node`.
    pub fn cpt(&self, node: usize) -> Result<&Cpt> {
        check_index("node", node, self.num_nodes())?;
        Ok(&self.cpts[node])
    }

    /// Replaces the CPT of `node` with one of the same shape, e.g. from
    /// [`CountingCpt::to_cpt`](crate::CountingCpt::to_cpt).
    pub fn set_cpt(&mut self, node: usize, cpt: Cpt) -> Result<()> {
        let current = self.cpt(node)?;
        if cpt.num_rows() != current.num_rows() || cpt.num_columns() != current.num_columns() {
            return Err(Error::InvalidArgument(format!(
                "node {} needs a {}x{} table, got {}x{}",
                node,
                current.num_rows(),
                current.num_columns(),
                cpt.num_rows(),
                cpt.num_columns()
            )));
        }
        self.cpts[node] = cpt;
        Ok(())
    }

    pub(crate) fn cpt_unchecked(&self, node: usize) -> &Cpt {
        &self.cpts[node]
    }

    /// The number of rows in the CPT of `node`.
    pub fn num_rows(&self, node: usize) -> Result<usize> {
        Ok(self.cpt(node)?.num_rows())
    }

    /// The number of columns in the CPT of `node`.
    pub fn num_columns(&self, node: usize) -> Result<usize> {
        Ok(self.cpt(node)?.num_columns())
    }

    /// The probability of `node` taking category `column` given parent row `row`.
    pub fn probability(&self, node: usize, row: usize, column: usize) -> Result<Option<f64>> {
        self.cpt(node)?.get(row, column)
    }

    /// Sets or clears one CPT cell.
    pub fn set_probability(
        &mut self,
        node: usize,
        row: usize,
        column: usize,
        probability: Option<f64>,
    ) -> Result<()> {
        check_index("node", node, self.num_nodes())?;
        self.cpts[node].set(row, column, probability)
    }

    /// Sets a whole CPT row.
    pub fn set_row(&mut self, node: usize, row: usize, probabilities: &[f64]) -> Result<()> {
        check_index("node", node, self.num_nodes())?;
        self.cpts[node].set_row(row, probabilities)
    }

    /// Unsets every cell of a CPT row.
    pub fn clear_row(&mut self, node: usize, row: usize) -> Result<()> {
        check_index("node", node, self.num_nodes())?;
        self.cpts[node].clear_row(row)
    }

    /// Encodes one value per parent of `node` as a CPT row number.
    ///
    /// ```
    /// use bayes_update::BayesNetBuilder;
    ///
    /// let mut builder = BayesNetBuilder::new();
    /// let a = builder.add_variable("a", &["0", "1"]).unwrap();
    /// let b = builder.add_variable("b", &["0", "1", "2"]).unwrap();
    /// let c = builder.add_variable("c", &["0", "1"]).unwrap();
    /// builder.add_edge(a, c).unwrap();
    /// builder.add_edge(b, c).unwrap();
    /// let net = builder.build().unwrap();
    ///
    /// assert_eq!(net.num_rows(c).unwrap(), 6);
    /// assert_eq!(net.row_index(c, &[1, 2]).unwrap(), 5);
    /// assert_eq!(net.parent_values(c, 4).unwrap(), vec![1, 1]);
    /// assert!(net.row_index(c, &[2, 0]).is_err());
    /// ```
    pub fn row_index(&self, node: usize, parent_values: &[usize]) -> Result<usize> {
        let parents = self.parents(node)?;
        if parent_values.len() != parents.len() {
            return Err(Error::InvalidArgument(format!(
                "node {} has {} parents, got {} values",
                node,
                parents.len(),
                parent_values.len()
            )));
        }
        let mut row = 0;
        for (&parent, &value) in parents.iter().zip(parent_values) {
            let radix = self.variables.num_categories(parent);
            check_index("category", value, radix)?;
            row = row * radix + value;
        }
        Ok(row)
    }

    /// Decodes a CPT row number of `node` into one value per parent.
    pub fn parent_values(&self, node: usize, row: usize) -> Result<Vec<usize>> {
        check_index("row", row, self.num_rows(node)?)?;
        Ok(self.parent_values_unchecked(node, row))
    }

    pub(crate) fn parent_values_unchecked(&self, node: usize, mut row: usize) -> Vec<usize> {
        let parents = self.dag.parents(node);
        let mut values = vec![0; parents.len()];
        for (slot, &parent) in values.iter_mut().zip(parents).rev() {
            let radix = self.variables.num_categories(parent);
            *slot = row % radix;
            row /= radix;
        }
        values
    }

    /// Scales a complete CPT row to sum to 1, or makes it uniform if it sums to 0.
    pub fn normalize_row(&mut self, node: usize, row: usize) -> Result<()> {
        check_index("node", node, self.num_nodes())?;
        self.cpts[node].normalize_row(row)
    }

    /// Normalizes every row of one node's CPT.
    pub fn normalize_node(&mut self, node: usize) -> Result<()> {
        for row in 0..self.num_rows(node)? {
            self.cpts[node].normalize_row(row)?;
        }
        Ok(())
    }

    /// Normalizes every row of every CPT.
    pub fn normalize_all(&mut self) -> Result<()> {
        for node in 0..self.num_nodes() {
            self.normalize_node(node)?;
        }
        Ok(())
    }

    /// Returns `true` if any cell of the CPT of `node` is unset.
    pub fn is_incomplete(&self, node: usize) -> Result<bool> {
        Ok(!self.cpt(node)?.is_complete())
    }

    /// Checks that every complete CPT row sums to 1 within `tolerance`. Incomplete rows are
    /// allowed; queries that depend on them come back undefined.
    pub fn validate(&self, tolerance: f64) -> Result<()> {
        for (node, cpt) in self.cpts.iter().enumerate() {
            for row in 0..cpt.num_rows() {
                if let Some(sum) = cpt.row_sum(row)? {
                    if (sum - 1.0).abs() > tolerance {
                        return Err(Error::InvalidArgument(format!(
                            "row {} of {} sums to {}",
                            row,
                            self.variables[node].name(),
                            sum
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Assembles the variables and edges of a [`BayesNet`].
///
/// Edges are checked for cycles as they are added. The built network starts with every CPT
/// cell unset.
#[derive(Debug, Default)]
pub struct BayesNetBuilder {
    variables: Vec<Variable>,
    dag: Dag,
}

impl BayesNetBuilder {
    /// Creates a builder with no variables.
    pub fn new() -> Self {
        BayesNetBuilder::default()
    }

    /// Adds a variable, returning its node index.
    pub fn add_variable<S: AsRef<str>>(&mut self, name: &str, categories: &[S]) -> Result<usize> {
        if self.variables.iter().any(|v| v.name() == name) {
            return Err(Error::InvalidArgument(format!(
                "variable name {} is used twice",
                name
            )));
        }
        self.variables.push(Variable::new(name, categories)?);
        Ok(self.dag.add_node())
    }

    /// Adds the edge `parent -> child`. The parent becomes the last, fastest-varying
    /// coordinate of the child's CPT rows.
    pub fn add_edge(&mut self, parent: usize, child: usize) -> Result<()> {
        self.dag.add_edge(parent, child)
    }

    /// Finishes the network.
    pub fn build(self) -> Result<BayesNet> {
        let variables = Arc::new(VariableList::new(self.variables)?);
        BayesNet::new(variables, self.dag)
    }
}
