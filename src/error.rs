//! Error types for network construction and inference.

use thiserror::Error;

/// Errors that can occur while building a network, setting evidence, or running inference.
///
/// Probabilities that are undefined given the evidence (zero-probability evidence, unset CPT
/// cells) are not errors. Queries report those as `None`.
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum Error {
    /// A caller-supplied value doesn't make sense, such as a duplicate variable name or a
    /// probability outside `[0, 1]`.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An index into variables, categories, rows or columns was past the end.
    #[error("{what} index {index} out of range (must be less than {limit})")]
    OutOfRange {
        /// Which kind of index was out of range.
        what: &'static str,
        /// The offending index.
        index: usize,
        /// One past the largest valid index.
        limit: usize,
    },

    /// Evidence and network were built over different variable lists.
    #[error("evidence was built over a different variable list than this network")]
    IncompatibleVariables,

    /// Adding the edge `from -> to` would close a directed cycle.
    #[error("edge {from} -> {to} would create a directed cycle")]
    Cycle {
        /// Tail of the rejected edge.
        from: usize,
        /// Head of the rejected edge.
        to: usize,
    },

    /// The engine doesn't implement this query.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// Triangulation produced a clique whose potential table would be too large.
    #[error("clique over {variables} variables needs more than {limit} cells")]
    CliqueTooLarge {
        /// Number of variables in the clique.
        variables: usize,
        /// The configured cell limit.
        limit: usize,
    },

    /// The operation observed a cancelled [`CancelToken`](crate::CancelToken).
    #[error("inference cancelled")]
    Cancelled,
}

/// Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn check_index(what: &'static str, index: usize, limit: usize) -> Result<()> {
    if index < limit {
        Ok(())
    } else {
        Err(Error::OutOfRange { what, index, limit })
    }
}
