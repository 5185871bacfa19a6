//! Evidence: observations plus interventions.

use crate::error::{check_index, Result};
use crate::network::BayesNet;
use crate::proposition::Proposition;
use crate::variable::VariableList;
use crate::NodeSet;
use std::fmt;
use std::sync::Arc;

/// A [`Proposition`] together with a flag per variable saying whether it was intervened on.
///
/// An observed variable is merely known to lie in its allowed categories. A manipulated one
/// was forced there from outside, which cuts it off from its causes. Cloning an `Evidence`
/// gives an independent copy for "what if" variations.
///
/// ```
/// use bayes_update::{Evidence, Variable, VariableList};
/// use std::sync::Arc;
///
/// let variables = Arc::new(VariableList::new(vec![
///     Variable::new("sprinkler", &["off", "on"]).unwrap(),
///     Variable::new("wet", &["no", "yes"]).unwrap(),
/// ]).unwrap());
/// let mut evidence = Evidence::tautology(&variables);
/// evidence.proposition_mut().disallow_complement(0, 1).unwrap();
/// evidence.set_manipulated(0, true).unwrap();
/// assert_eq!(evidence.to_string(), "sprinkler=on; do(sprinkler)");
///
/// let observed = {
///     let mut e = evidence.clone();
///     e.set_manipulated(0, false).unwrap();
///     e
/// };
/// assert_ne!(evidence, observed);
/// ```
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Evidence {
    proposition: Proposition,
    manipulated: Vec<bool>,
}

impl Evidence {
    /// Creates evidence that constrains nothing and manipulates nothing.
    pub fn tautology(variables: &Arc<VariableList>) -> Self {
        Evidence::from_proposition(Proposition::tautology(variables))
    }

    /// Wraps an observational proposition.
    pub fn from_proposition(proposition: Proposition) -> Self {
        let manipulated = vec![false; proposition.num_variables()];
        Evidence {
            proposition,
            manipulated,
        }
    }

    /// The observed and forced categories.
    pub fn proposition(&self) -> &Proposition {
        &self.proposition
    }

    /// Mutable access for narrowing the allowed categories.
    pub fn proposition_mut(&mut self) -> &mut Proposition {
        &mut self.proposition
    }

    /// The variables this evidence is over.
    pub fn variables(&self) -> &Arc<VariableList> {
        self.proposition.variables()
    }

    /// The number of variables.
    pub fn num_variables(&self) -> usize {
        self.manipulated.len()
    }

    /// Returns `true` if `variable` was intervened on.
    pub fn is_manipulated(&self, variable: usize) -> Result<bool> {
        check_index("variable", variable, self.manipulated.len())?;
        Ok(self.manipulated[variable])
    }

    /// Marks `variable` as intervened on, or as merely observed.
    pub fn set_manipulated(&mut self, variable: usize, manipulated: bool) -> Result<()> {
        check_index("variable", variable, self.manipulated.len())?;
        self.manipulated[variable] = manipulated;
        Ok(())
    }

    /// Returns `true` if `net` was built over an equal variable list.
    pub fn is_compatible_with(&self, net: &BayesNet) -> bool {
        let mine = self.variables();
        let theirs = net.variables();
        Arc::ptr_eq(mine, theirs) || **mine == **theirs
    }

    /// Looks up a variable's index by name.
    pub fn node_index(&self, name: &str) -> Option<usize> {
        self.variables().index_of(name)
    }

    /// Looks up a category of `variable` by name.
    pub fn category_index(&self, variable: usize, name: &str) -> Result<Option<usize>> {
        Ok(self.variables().get(variable)?.category_index(name))
    }

    /// The variables the proposition constrains. Manipulated variables with no constraint
    /// aren't included.
    pub fn variables_in_evidence(&self) -> NodeSet {
        self.proposition.constrained_variables()
    }

    pub(crate) fn manipulated_flags(&self) -> &[bool] {
        &self.manipulated
    }
}

impl fmt::Display for Evidence {
    /// The proposition, then `do(...)` for each manipulated variable.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.proposition)?;
        let variables = self.variables();
        for (variable, _) in self.manipulated.iter().enumerate().filter(|&(_, &m)| m) {
            write!(f, "; do({})", variables[variable].name())?;
        }
        Ok(())
    }
}
