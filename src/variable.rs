//! Categorical variables and the ordered lists networks and evidence are built over.

use crate::error::{check_index, Error, Result};
use lasso::{Key, Rodeo, RodeoReader, Spur};
use std::fmt;

/// A categorical variable with a fixed, ordered list of category names.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Variable {
    name: String,
    categories: Vec<String>,
}

impl Variable {
    /// Creates a variable. It needs at least one category, and category names must be
    /// distinct.
    pub fn new<S: AsRef<str>>(name: &str, categories: &[S]) -> Result<Self> {
        if categories.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "variable {} needs at least one category",
                name
            )));
        }
        let categories: Vec<String> = categories.iter().map(|c| c.as_ref().to_owned()).collect();
        for (i, category) in categories.iter().enumerate() {
            if categories[..i].contains(category) {
                return Err(Error::InvalidArgument(format!(
                    "variable {} lists category {} twice",
                    name, category
                )));
            }
        }
        Ok(Variable {
            name: name.to_owned(),
            categories,
        })
    }

    /// The variable's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The category names, in index order.
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// The number of categories.
    pub fn num_categories(&self) -> usize {
        self.categories.len()
    }

    /// The name of category `index`.
    pub fn category(&self, index: usize) -> Result<&str> {
        check_index("category", index, self.categories.len())?;
        Ok(&self.categories[index])
    }

    /// Looks up a category's index by name.
    pub fn category_index(&self, name: &str) -> Option<usize> {
        self.categories.iter().position(|c| c == name)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{{}}}", self.name, self.categories.join(","))
    }
}

/// An ordered list of variables with unique names.
///
/// Names are interned once when the list is built, and a variable's position in the list is
/// its node index everywhere else in this crate. Two lists are equal when they hold equal
/// variables in the same order.
pub struct VariableList {
    variables: Vec<Variable>,
    names: RodeoReader<Spur>,
}

impl VariableList {
    /// Builds a list, rejecting duplicate names.
    ///
    /// ```
    /// use bayes_update::{Variable, VariableList};
    ///
    /// let list = VariableList::new(vec![
    ///     Variable::new("rain", &["no", "yes"]).unwrap(),
    ///     Variable::new("wet", &["no", "yes"]).unwrap(),
    /// ]).unwrap();
    /// assert_eq!(list.index_of("wet"), Some(1));
    /// assert_eq!(list.index_of("snow"), None);
    /// ```
    pub fn new(variables: Vec<Variable>) -> Result<Self> {
        let mut rodeo = Rodeo::new();
        for variable in variables.iter() {
            if rodeo.get(variable.name()).is_some() {
                return Err(Error::InvalidArgument(format!(
                    "variable name {} is used twice",
                    variable.name()
                )));
            }
            rodeo.get_or_intern(variable.name());
        }
        Ok(VariableList {
            variables,
            names: rodeo.into_reader(),
        })
    }

    /// The number of variables.
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Returns `true` if the list has no variables.
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// The variable at `index`.
    pub fn get(&self, index: usize) -> Result<&Variable> {
        check_index("variable", index, self.variables.len())?;
        Ok(&self.variables[index])
    }

    /// Returns an iterator over the variables in index order.
    pub fn iter(&self) -> std::slice::Iter<'_, Variable> {
        self.variables.iter()
    }

    /// Looks up a variable's index by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        // Names were interned in list order, so each key is its variable's index.
        self.names.get(name).map(|key| unsafe { key.into_usize() })
    }

    pub(crate) fn num_categories(&self, index: usize) -> usize {
        self.variables[index].num_categories()
    }
}

impl std::ops::Index<usize> for VariableList {
    type Output = Variable;

    fn index(&self, index: usize) -> &Variable {
        &self.variables[index]
    }
}

impl PartialEq for VariableList {
    fn eq(&self, other: &Self) -> bool {
        self.variables == other.variables
    }
}

impl Eq for VariableList {}

impl fmt::Debug for VariableList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.variables.iter()).finish()
    }
}
