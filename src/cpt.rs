//! Conditional probability tables.
//!
//! A CPT has one row per combination of parent values and one column per category of its own
//! variable. Rows are numbered by [`BayesNet::row_index`](crate::BayesNet::row_index).

use crate::error::{check_index, Error, Result};

/// A dense conditional probability table whose cells may be unset.
///
/// An unset cell (`None`) means "never estimated", which is different from a probability of
/// zero. Anything computed from an unset cell is undefined.
///
/// ```
/// use bayes_update::Cpt;
///
/// let mut cpt = Cpt::new(2, 3).unwrap();
/// cpt.set_row(0, &[0.2, 0.3, 0.5]).unwrap();
/// assert_eq!(cpt.get(0, 1).unwrap(), Some(0.3));
/// assert_eq!(cpt.get(1, 1).unwrap(), None);
/// assert!((cpt.row_sum(0).unwrap().unwrap() - 1.0).abs() < 1e-12);
/// assert_eq!(cpt.row_sum(1).unwrap(), None);
/// assert!(cpt.get(2, 0).is_err());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Cpt {
    num_rows: usize,
    num_columns: usize,
    cells: Vec<Option<f64>>,
}

impl Cpt {
    /// Creates a table with every cell unset. Fails if the cell count overflows `usize`.
    pub fn new(num_rows: usize, num_columns: usize) -> Result<Self> {
        let size = table_size(num_rows, num_columns)?;
        Ok(Cpt {
            num_rows,
            num_columns,
            cells: vec![None; size],
        })
    }

    /// The number of parent-value combinations.
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// The number of categories of the table's own variable.
    pub fn num_columns(&self) -> usize {
        self.num_columns
    }

    fn offset(&self, row: usize, column: usize) -> Result<usize> {
        check_index("row", row, self.num_rows)?;
        check_index("column", column, self.num_columns)?;
        Ok(row * self.num_columns + column)
    }

    /// Unchecked cell access for the engines, which only use indices derived from the table's
    /// own shape.
    pub(crate) fn cell(&self, row: usize, column: usize) -> Option<f64> {
        self.cells[row * self.num_columns + column]
    }

    /// The probability in a cell, or `None` if it is unset.
    pub fn get(&self, row: usize, column: usize) -> Result<Option<f64>> {
        Ok(self.cells[self.offset(row, column)?])
    }

    /// Sets or clears one cell. Probabilities must lie in `[0, 1]`.
    pub fn set(&mut self, row: usize, column: usize, probability: Option<f64>) -> Result<()> {
        let offset = self.offset(row, column)?;
        if let Some(p) = probability {
            if !(0.0..=1.0).contains(&p) {
                return Err(Error::InvalidArgument(format!(
                    "probability {} is outside [0, 1]",
                    p
                )));
            }
        }
        self.cells[offset] = probability;
        Ok(())
    }

    /// Sets every cell in a row at once.
    pub fn set_row(&mut self, row: usize, probabilities: &[f64]) -> Result<()> {
        if probabilities.len() != self.num_columns {
            return Err(Error::InvalidArgument(format!(
                "row needs {} probabilities, got {}",
                self.num_columns,
                probabilities.len()
            )));
        }
        for (column, &p) in probabilities.iter().enumerate() {
            self.set(row, column, Some(p))?;
        }
        Ok(())
    }

    /// The cells of one row.
    pub fn row(&self, row: usize) -> Result<&[Option<f64>]> {
        check_index("row", row, self.num_rows)?;
        let start = row * self.num_columns;
        Ok(&self.cells[start..start + self.num_columns])
    }

    /// The sum of a row, or `None` if any of its cells is unset.
    pub fn row_sum(&self, row: usize) -> Result<Option<f64>> {
        Ok(self.row(row)?.iter().copied().sum())
    }

    /// Returns `true` if no cell of the row is unset.
    pub fn is_row_complete(&self, row: usize) -> Result<bool> {
        Ok(self.row(row)?.iter().all(Option::is_some))
    }

    /// Returns `true` if no cell of the table is unset.
    pub fn is_complete(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    /// Unsets every cell of a row.
    pub fn clear_row(&mut self, row: usize) -> Result<()> {
        check_index("row", row, self.num_rows)?;
        let start = row * self.num_columns;
        for cell in self.cells[start..start + self.num_columns].iter_mut() {
            *cell = None;
        }
        Ok(())
    }

    /// Scales a complete row to sum to 1. A row summing to zero becomes uniform; an incomplete
    /// row is left alone.
    pub fn normalize_row(&mut self, row: usize) -> Result<()> {
        let total = match self.row_sum(row)? {
            Some(total) => total,
            None => return Ok(()),
        };
        let start = row * self.num_columns;
        let uniform = 1.0 / self.num_columns as f64;
        for cell in self.cells[start..start + self.num_columns].iter_mut() {
            *cell = cell.map(|p| if total > 0.0 { p / total } else { uniform });
        }
        Ok(())
    }
}

/// A CPT estimated from occurrence counts plus a uniform prior pseudo-count per cell.
///
/// Each cell's probability is `(count + prior) / (row_count + prior * num_columns)`. A row
/// with no observations and a zero prior has no defined probabilities.
///
/// ```
/// use bayes_update::CountingCpt;
///
/// let mut counts = CountingCpt::new(1, 2, 1.0).unwrap();
/// counts.add_count(0, 0, 3.0).unwrap();
/// assert_eq!(counts.probability(0, 0).unwrap(), Some(4.0 / 5.0));
///
/// let unobserved = CountingCpt::new(1, 2, 0.0).unwrap();
/// assert_eq!(unobserved.probability(0, 1).unwrap(), None);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct CountingCpt {
    num_columns: usize,
    counts: Vec<f64>,
    row_counts: Vec<f64>,
    prior: f64,
}

impl CountingCpt {
    /// Creates a table with no observations. The prior must be finite and non-negative.
    pub fn new(num_rows: usize, num_columns: usize, prior: f64) -> Result<Self> {
        check_prior(prior)?;
        let size = table_size(num_rows, num_columns)?;
        Ok(CountingCpt {
            num_columns,
            counts: vec![0.0; size],
            row_counts: vec![0.0; num_rows],
            prior,
        })
    }

    /// The number of parent-value combinations.
    pub fn num_rows(&self) -> usize {
        self.row_counts.len()
    }

    /// The number of categories of the table's own variable.
    pub fn num_columns(&self) -> usize {
        self.num_columns
    }

    fn offset(&self, row: usize, column: usize) -> Result<usize> {
        check_index("row", row, self.row_counts.len())?;
        check_index("column", column, self.num_columns)?;
        Ok(row * self.num_columns + column)
    }

    /// The pseudo-count added to every cell.
    pub fn prior(&self) -> f64 {
        self.prior
    }

    /// Replaces the pseudo-count added to every cell.
    pub fn set_prior(&mut self, prior: f64) -> Result<()> {
        check_prior(prior)?;
        self.prior = prior;
        Ok(())
    }

    /// Records `count` more observations of one cell. Counts must be finite and non-negative.
    pub fn add_count(&mut self, row: usize, column: usize, count: f64) -> Result<()> {
        let offset = self.offset(row, column)?;
        if !(count >= 0.0 && count.is_finite()) {
            return Err(Error::InvalidArgument(format!(
                "count {} must be finite and >= 0",
                count
            )));
        }
        self.counts[offset] += count;
        self.row_counts[row] += count;
        Ok(())
    }

    /// The observations recorded for one cell, without the prior.
    pub fn count(&self, row: usize, column: usize) -> Result<f64> {
        Ok(self.counts[self.offset(row, column)?])
    }

    /// The observations recorded across a whole row, without the prior.
    pub fn row_count(&self, row: usize) -> Result<f64> {
        check_index("row", row, self.row_counts.len())?;
        Ok(self.row_counts[row])
    }

    /// The estimated probability of one cell, or `None` if the row has neither observations
    /// nor prior mass.
    pub fn probability(&self, row: usize, column: usize) -> Result<Option<f64>> {
        let count = self.counts[self.offset(row, column)?];
        let total = self.row_counts[row] + self.prior * self.num_columns as f64;
        Ok(if total > 0.0 {
            Some((count + self.prior) / total)
        } else {
            None
        })
    }

    /// Materializes the estimates as a plain [`Cpt`].
    pub fn to_cpt(&self) -> Cpt {
        // Same shape as this table, which was already checked for overflow.
        let mut cpt = Cpt {
            num_rows: self.num_rows(),
            num_columns: self.num_columns,
            cells: vec![None; self.counts.len()],
        };
        for row in 0..self.num_rows() {
            for column in 0..self.num_columns {
                cpt.cells[row * self.num_columns + column] =
                    self.probability(row, column).unwrap_or(None);
            }
        }
        cpt
    }
}

fn table_size(num_rows: usize, num_columns: usize) -> Result<usize> {
    num_rows.checked_mul(num_columns).ok_or_else(|| {
        Error::InvalidArgument(format!(
            "a table of {} rows by {} columns is too large",
            num_rows, num_columns
        ))
    })
}

fn check_prior(prior: f64) -> Result<()> {
    if prior >= 0.0 && prior.is_finite() {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "prior {} must be finite and >= 0",
            prior
        )))
    }
}
