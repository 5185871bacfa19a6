//! Conjunctive constraints over a variable list.

use crate::error::{check_index, Error, Result};
use crate::variable::VariableList;
use crate::NodeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// For every variable, the set of categories still considered possible.
///
/// A new proposition allows everything. Most mutators only narrow the allowed sets; the
/// exceptions are [`set_category`](Self::set_category) and
/// [`set_variable`](Self::set_variable), which overwrite a variable's set outright.
///
/// ```
/// use bayes_update::{Proposition, Variable, VariableList};
/// use std::sync::Arc;
///
/// let variables = Arc::new(VariableList::new(vec![
///     Variable::new("x", &["a", "b", "c"]).unwrap(),
///     Variable::new("y", &["no", "yes"]).unwrap(),
/// ]).unwrap());
/// let mut p = Proposition::tautology(&variables);
/// p.remove_category(0, 2).unwrap();
/// assert_eq!(p.to_string(), "x in {a,b}");
/// assert!(p.is_permissible_combination(&[1, 0]).unwrap());
/// assert!(!p.is_permissible_combination(&[2, 0]).unwrap());
///
/// p.disallow_complement(0, 1).unwrap();
/// p.disallow_complement(0, 0).unwrap();
/// assert!(!p.exists_combination());
/// ```
#[derive(Clone, Debug)]
pub struct Proposition {
    variables: Arc<VariableList>,
    allowed: Vec<Vec<bool>>,
}

impl Proposition {
    /// Creates a proposition allowing every category of every variable.
    pub fn tautology(variables: &Arc<VariableList>) -> Self {
        let allowed = variables
            .iter()
            .map(|v| vec![true; v.num_categories()])
            .collect();
        Proposition {
            variables: Arc::clone(variables),
            allowed,
        }
    }

    /// The variables this proposition constrains.
    pub fn variables(&self) -> &Arc<VariableList> {
        &self.variables
    }

    /// The number of variables.
    pub fn num_variables(&self) -> usize {
        self.allowed.len()
    }

    fn check(&self, variable: usize, category: usize) -> Result<()> {
        check_index("variable", variable, self.allowed.len())?;
        check_index("category", category, self.allowed[variable].len())
    }

    /// Returns `true` if `category` of `variable` is still possible.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range.
    pub fn is_allowed(&self, variable: usize, category: usize) -> bool {
        self.allowed[variable][category]
    }

    pub(crate) fn allowed(&self, variable: usize) -> &[bool] {
        &self.allowed[variable]
    }

    /// Narrows `variable` to at most `category`. If `category` was already ruled out, nothing
    /// is left.
    pub fn disallow_complement(&mut self, variable: usize, category: usize) -> Result<()> {
        self.check(variable, category)?;
        self.narrow_to(variable, category);
        Ok(())
    }

    pub(crate) fn narrow_to(&mut self, variable: usize, category: usize) {
        for (c, allowed) in self.allowed[variable].iter_mut().enumerate() {
            if c != category {
                *allowed = false;
            }
        }
    }

    pub(crate) fn widen(&mut self, variable: usize) {
        for allowed in self.allowed[variable].iter_mut() {
            *allowed = true;
        }
    }

    /// A copy constraining only `variables`, with every other variable unconditioned.
    pub(crate) fn keep_only(&self, variables: &NodeSet) -> Proposition {
        let mut kept = self.clone();
        for (variable, allowed) in kept.allowed.iter_mut().enumerate() {
            if !variables.contains(variable) {
                for a in allowed.iter_mut() {
                    *a = true;
                }
            }
        }
        kept
    }

    /// Rules out one category of `variable`.
    pub fn remove_category(&mut self, variable: usize, category: usize) -> Result<()> {
        self.check(variable, category)?;
        self.allowed[variable][category] = false;
        Ok(())
    }

    /// Resets `variable` to allow exactly `category`, even if it had been ruled out.
    pub fn set_category(&mut self, variable: usize, category: usize) -> Result<()> {
        self.check(variable, category)?;
        for (c, allowed) in self.allowed[variable].iter_mut().enumerate() {
            *allowed = c == category;
        }
        Ok(())
    }

    /// Allows every category of `variable`, or none of them.
    pub fn set_variable(&mut self, variable: usize, allowed: bool) -> Result<()> {
        check_index("variable", variable, self.allowed.len())?;
        for a in self.allowed[variable].iter_mut() {
            *a = allowed;
        }
        Ok(())
    }

    /// Narrows this proposition to the categories `other` also allows.
    pub fn restrict(&mut self, other: &Proposition) -> Result<()> {
        if !self.same_variables(other) {
            return Err(Error::IncompatibleVariables);
        }
        for (mine, theirs) in self.allowed.iter_mut().zip(other.allowed.iter()) {
            for (a, &b) in mine.iter_mut().zip(theirs) {
                *a &= b;
            }
        }
        Ok(())
    }

    /// Returns `true` if every coordinate of `point`, one category per variable, is allowed.
    pub fn is_permissible_combination(&self, point: &[usize]) -> Result<bool> {
        if point.len() != self.allowed.len() {
            return Err(Error::InvalidArgument(format!(
                "point has {} coordinates, expected {}",
                point.len(),
                self.allowed.len()
            )));
        }
        let mut permissible = true;
        for (variable, &category) in point.iter().enumerate() {
            self.check(variable, category)?;
            permissible &= self.allowed[variable][category];
        }
        Ok(permissible)
    }

    /// Returns `true` if every variable still has at least one allowed category.
    pub fn exists_combination(&self) -> bool {
        self.allowed.iter().all(|a| a.contains(&true))
    }

    /// The number of allowed categories of `variable`.
    pub fn num_allowed(&self, variable: usize) -> Result<usize> {
        check_index("variable", variable, self.allowed.len())?;
        Ok(self.allowed[variable].iter().filter(|&&a| a).count())
    }

    /// The only allowed category of `variable`, if exactly one is allowed.
    pub fn single_category(&self, variable: usize) -> Result<Option<usize>> {
        if self.num_allowed(variable)? != 1 {
            return Ok(None);
        }
        Ok(self.allowed[variable].iter().position(|&a| a))
    }

    /// Returns `true` if every category of `variable` is allowed.
    pub fn is_unconditioned(&self, variable: usize) -> Result<bool> {
        check_index("variable", variable, self.allowed.len())?;
        Ok(!self.allowed[variable].contains(&false))
    }

    /// Returns `true` if no variable is constrained.
    pub fn is_tautology(&self) -> bool {
        self.allowed.iter().all(|a| !a.contains(&false))
    }

    /// The variables that have at least one category ruled out.
    pub fn constrained_variables(&self) -> NodeSet {
        self.allowed
            .iter()
            .enumerate()
            .filter(|(_, a)| a.contains(&false))
            .map(|(variable, _)| variable)
            .collect()
    }

    pub(crate) fn same_variables(&self, other: &Proposition) -> bool {
        self.same_variables_as(&other.variables)
    }

    pub(crate) fn same_variables_as(&self, variables: &Arc<VariableList>) -> bool {
        Arc::ptr_eq(&self.variables, variables) || *self.variables == **variables
    }
}

impl PartialEq for Proposition {
    fn eq(&self, other: &Self) -> bool {
        self.allowed == other.allowed && self.same_variables(other)
    }
}

impl Eq for Proposition {}

impl Hash for Proposition {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.allowed.hash(state);
    }
}

impl fmt::Display for Proposition {
    /// Lists each constrained variable, e.g. `x=a & y in {b,c}`. A tautology prints as `true`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (variable, allowed) in self.allowed.iter().enumerate() {
            if !allowed.contains(&false) {
                continue;
            }
            if !first {
                f.write_str(" & ")?;
            }
            first = false;
            let v = &self.variables[variable];
            let names: Vec<&str> = allowed
                .iter()
                .zip(v.categories())
                .filter(|&(&a, _)| a)
                .map(|(_, name)| name.as_str())
                .collect();
            if names.len() == 1 {
                write!(f, "{}={}", v.name(), names[0])?;
            } else {
                write!(f, "{} in {{{}}}", v.name(), names.join(","))?;
            }
        }
        if first {
            f.write_str("true")?;
        }
        Ok(())
    }
}
