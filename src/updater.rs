//! The common query interface over both inference engines.

use crate::ancestral::AncestralEngine;
use crate::config::{CancelToken, EngineKind, UpdaterConfig};
use crate::error::{Error, Result};
use crate::evidence::Evidence;
use crate::graph::Dag;
use crate::junction::JunctionTreeEngine;
use crate::manipulation::manipulate;
use crate::network::BayesNet;
use tracing::debug;

/// Answers posterior queries about a network under a changeable body of evidence.
///
/// An updater starts with tautological evidence. Every call to
/// [`set_evidence`](Updater::set_evidence) rebuilds the manipulated network and the engine
/// from scratch; if that fails, the updater keeps its previous evidence and engine.
pub trait Updater {
    /// The network as given, before any manipulation.
    fn bayes_net(&self) -> &BayesNet;

    /// The current evidence.
    fn evidence(&self) -> &Evidence;

    /// Replaces the evidence. Fails with [`Error::IncompatibleVariables`] if it was built over
    /// a different variable list.
    fn set_evidence(&mut self, evidence: Evidence) -> Result<()>;

    /// The posterior probability that `node` takes `category`, or `None` if that is undefined
    /// given the evidence.
    fn marginal(&mut self, node: usize, category: usize) -> Result<Option<f64>>;

    /// Returns `true` if [`joint_marginal`](Updater::joint_marginal) is implemented.
    fn is_joint_marginal_supported(&self) -> bool;

    /// The posterior probability that each of `nodes` takes the matching entry of
    /// `categories`.
    fn joint_marginal(&mut self, nodes: &[usize], categories: &[usize]) -> Result<Option<f64>>;

    /// The network after surgery for the manipulated variables of the current evidence.
    fn manipulated_bayes_net(&self) -> &BayesNet;

    /// The structure of [`manipulated_bayes_net`](Updater::manipulated_bayes_net).
    fn manipulated_graph(&self) -> &Dag {
        self.manipulated_bayes_net().dag()
    }

    /// A copy of the manipulated network whose CPTs hold each node's posterior given its
    /// parents and the evidence. Rows whose parent values are impossible are left unset.
    fn updated_bayes_net(&mut self) -> Result<BayesNet>;

    /// The posterior distribution of `node` under the current evidence.
    fn calculate_updated_marginals(&mut self, node: usize) -> Result<Vec<Option<f64>>> {
        let categories = self.bayes_net().num_columns(node)?;
        (0..categories)
            .map(|category| self.marginal(node, category))
            .collect()
    }

    /// The distribution of `node` with no evidence at all. The query runs on a separate
    /// engine, so the current evidence is untouched even if it fails.
    fn calculate_prior_marginals(&mut self, node: usize) -> Result<Vec<Option<f64>>>;
}

/// Builds the engine `config` selects, wrapped in its updater.
///
/// ```
/// use bayes_update::{new_updater, BayesNetBuilder, EngineKind, UpdaterConfig};
///
/// let mut builder = BayesNetBuilder::new();
/// let coin = builder.add_variable("coin", &["heads", "tails"]).unwrap();
/// let mut net = builder.build().unwrap();
/// net.set_row(coin, 0, &[0.5, 0.5]).unwrap();
///
/// let config = UpdaterConfig { engine: EngineKind::Ancestral, ..UpdaterConfig::default() };
/// let mut updater = new_updater(net, config).unwrap();
/// assert!(!updater.is_joint_marginal_supported());
/// assert_eq!(updater.calculate_prior_marginals(coin).unwrap(), vec![Some(0.5), Some(0.5)]);
/// ```
pub fn new_updater(net: BayesNet, config: UpdaterConfig) -> Result<Box<dyn Updater>> {
    let updater: Box<dyn Updater> = match config.engine {
        EngineKind::JunctionTree => Box::new(JunctionTreeUpdater::with_config(net, config)?),
        EngineKind::Ancestral => Box::new(AncestralUpdater::with_config(net, config)?),
    };
    Ok(updater)
}

fn check_network(net: &BayesNet, config: UpdaterConfig) -> Result<UpdaterConfig> {
    let config = config.validate()?;
    if config.validate_cpts {
        net.validate(config.row_tolerance)?;
    }
    Ok(config)
}

fn manipulate_for(net: &BayesNet, evidence: &Evidence) -> Result<BayesNet> {
    if !evidence.is_compatible_with(net) {
        return Err(Error::IncompatibleVariables);
    }
    debug!(evidence = %evidence, "setting evidence");
    manipulate(net, evidence)
}

/// Fills a copy of a manipulated network with posterior conditional probabilities.
fn updated_snapshot<F>(mut snapshot: BayesNet, mut conditional: F) -> Result<BayesNet>
where
    F: FnMut(usize, usize, &[usize], &[usize]) -> Result<Option<f64>>,
{
    for node in 0..snapshot.num_nodes() {
        let parents = snapshot.parents(node)?.to_vec();
        for row in 0..snapshot.num_rows(node)? {
            let values = snapshot.parent_values_unchecked(node, row);
            for category in 0..snapshot.num_columns(node)? {
                let p = conditional(node, category, &parents, &values)?;
                // Rounding can push a ratio of probabilities just past 1.
                let p = p.map(|p| p.max(0.0).min(1.0));
                snapshot.set_probability(node, row, category, p)?;
            }
        }
    }
    Ok(snapshot)
}

/// An [`Updater`] backed by a [`JunctionTreeEngine`].
///
/// ```
/// use bayes_update::{BayesNetBuilder, JunctionTreeUpdater, Updater};
///
/// let mut builder = BayesNetBuilder::new();
/// let a = builder.add_variable("a", &["0", "1"]).unwrap();
/// let b = builder.add_variable("b", &["0", "1"]).unwrap();
/// builder.add_edge(a, b).unwrap();
/// let mut net = builder.build().unwrap();
/// net.set_row(a, 0, &[0.5, 0.5]).unwrap();
/// net.set_row(b, 0, &[0.5, 0.5]).unwrap();
/// net.set_row(b, 1, &[0.0, 1.0]).unwrap();
///
/// let mut updater = JunctionTreeUpdater::new(net).unwrap();
/// assert_eq!(updater.joint_marginal(&[a, b], &[1, 0]).unwrap(), Some(0.0));
///
/// let mut evidence = updater.evidence().clone();
/// evidence.proposition_mut().disallow_complement(b, 0).unwrap();
/// updater.set_evidence(evidence).unwrap();
/// assert_eq!(updater.marginal(a, 0).unwrap(), Some(1.0));
/// ```
#[derive(Debug)]
pub struct JunctionTreeUpdater {
    net: BayesNet,
    config: UpdaterConfig,
    cancel: CancelToken,
    evidence: Evidence,
    engine: JunctionTreeEngine,
}

impl JunctionTreeUpdater {
    /// Creates an updater with the default configuration.
    pub fn new(net: BayesNet) -> Result<Self> {
        JunctionTreeUpdater::with_config(net, UpdaterConfig::default())
    }

    /// Creates an updater with the given configuration. The `engine` field is ignored.
    pub fn with_config(net: BayesNet, config: UpdaterConfig) -> Result<Self> {
        JunctionTreeUpdater::with_cancel(net, config, CancelToken::new())
    }

    /// Creates an updater whose builds give up once `cancel` fires.
    pub fn with_cancel(net: BayesNet, config: UpdaterConfig, cancel: CancelToken) -> Result<Self> {
        let config = check_network(&net, config)?;
        let evidence = Evidence::tautology(net.variables());
        let engine = JunctionTreeUpdater::build_engine(&net, &config, &cancel, &evidence)?;
        Ok(JunctionTreeUpdater {
            net,
            config,
            cancel,
            evidence,
            engine,
        })
    }

    fn build_engine(
        net: &BayesNet,
        config: &UpdaterConfig,
        cancel: &CancelToken,
        evidence: &Evidence,
    ) -> Result<JunctionTreeEngine> {
        let manipulated = manipulate_for(net, evidence)?;
        JunctionTreeEngine::build(
            manipulated,
            evidence.proposition().clone(),
            config.max_clique_cells,
            cancel.clone(),
        )
    }

    /// The engine for the current evidence.
    pub fn engine(&self) -> &JunctionTreeEngine {
        &self.engine
    }

    /// The configuration this updater was built with.
    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }
}

impl Updater for JunctionTreeUpdater {
    fn bayes_net(&self) -> &BayesNet {
        &self.net
    }

    fn evidence(&self) -> &Evidence {
        &self.evidence
    }

    fn set_evidence(&mut self, evidence: Evidence) -> Result<()> {
        let engine =
            JunctionTreeUpdater::build_engine(&self.net, &self.config, &self.cancel, &evidence)?;
        self.engine = engine;
        self.evidence = evidence;
        Ok(())
    }

    fn marginal(&mut self, node: usize, category: usize) -> Result<Option<f64>> {
        self.engine.marginal(node, category)
    }

    fn is_joint_marginal_supported(&self) -> bool {
        true
    }

    fn joint_marginal(&mut self, nodes: &[usize], categories: &[usize]) -> Result<Option<f64>> {
        self.engine.joint_marginal(nodes, categories)
    }

    fn manipulated_bayes_net(&self) -> &BayesNet {
        self.engine.bayes_net()
    }

    fn calculate_prior_marginals(&mut self, node: usize) -> Result<Vec<Option<f64>>> {
        let tautology = Evidence::tautology(self.net.variables());
        let engine =
            JunctionTreeUpdater::build_engine(&self.net, &self.config, &self.cancel, &tautology)?;
        let marginals = match engine.marginals(node)? {
            Some(margin) => margin.iter().map(|&p| Some(p)).collect(),
            None => vec![None; self.net.num_columns(node)?],
        };
        Ok(marginals)
    }

    fn updated_bayes_net(&mut self) -> Result<BayesNet> {
        let engine = &self.engine;
        updated_snapshot(engine.bayes_net().clone(), |node, category, parents, values| {
            engine.conditional_probability(node, category, parents, values)
        })
    }
}

/// An [`Updater`] backed by an [`AncestralEngine`]. Joint marginals are unsupported.
#[derive(Debug)]
pub struct AncestralUpdater {
    net: BayesNet,
    cancel: CancelToken,
    evidence: Evidence,
    engine: AncestralEngine,
}

impl AncestralUpdater {
    /// Creates an updater with the default configuration.
    pub fn new(net: BayesNet) -> Result<Self> {
        AncestralUpdater::with_config(net, UpdaterConfig::default())
    }

    /// Creates an updater with the given configuration. Only the CPT checks apply to this
    /// engine.
    pub fn with_config(net: BayesNet, config: UpdaterConfig) -> Result<Self> {
        AncestralUpdater::with_cancel(net, config, CancelToken::new())
    }

    /// Creates an updater whose queries give up once `cancel` fires.
    pub fn with_cancel(net: BayesNet, config: UpdaterConfig, cancel: CancelToken) -> Result<Self> {
        check_network(&net, config)?;
        let evidence = Evidence::tautology(net.variables());
        let engine = AncestralUpdater::build_engine(&net, &cancel, &evidence)?;
        Ok(AncestralUpdater {
            net,
            cancel,
            evidence,
            engine,
        })
    }

    fn build_engine(
        net: &BayesNet,
        cancel: &CancelToken,
        evidence: &Evidence,
    ) -> Result<AncestralEngine> {
        let manipulated = manipulate_for(net, evidence)?;
        AncestralEngine::with_cancel(manipulated, evidence.proposition().clone(), cancel.clone())
    }

    /// The engine for the current evidence.
    pub fn engine(&self) -> &AncestralEngine {
        &self.engine
    }
}

impl Updater for AncestralUpdater {
    fn bayes_net(&self) -> &BayesNet {
        &self.net
    }

    fn evidence(&self) -> &Evidence {
        &self.evidence
    }

    fn set_evidence(&mut self, evidence: Evidence) -> Result<()> {
        let engine = AncestralUpdater::build_engine(&self.net, &self.cancel, &evidence)?;
        self.engine = engine;
        self.evidence = evidence;
        Ok(())
    }

    fn marginal(&mut self, node: usize, category: usize) -> Result<Option<f64>> {
        self.engine.marginal(node, category)
    }

    fn is_joint_marginal_supported(&self) -> bool {
        false
    }

    fn joint_marginal(&mut self, _nodes: &[usize], _categories: &[usize]) -> Result<Option<f64>> {
        Err(Error::Unsupported(
            "joint marginals need the junction tree engine",
        ))
    }

    fn manipulated_bayes_net(&self) -> &BayesNet {
        self.engine.bayes_net()
    }

    fn calculate_prior_marginals(&mut self, node: usize) -> Result<Vec<Option<f64>>> {
        let tautology = Evidence::tautology(self.net.variables());
        let mut engine = AncestralUpdater::build_engine(&self.net, &self.cancel, &tautology)?;
        (0..self.net.num_columns(node)?)
            .map(|category| engine.marginal(node, category))
            .collect()
    }

    fn updated_bayes_net(&mut self) -> Result<BayesNet> {
        let snapshot = self.engine.bayes_net().clone();
        let engine = &mut self.engine;
        updated_snapshot(snapshot, |node, category, parents, values| {
            engine.conditional_probability(node, category, parents, values)
        })
    }
}
