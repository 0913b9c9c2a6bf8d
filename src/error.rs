use thiserror::Error;

/// Result type local to `zoomer`.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A relation was requested for an arm that cannot carry one: a sentinel index, or an
    /// interior arm with no observations yet.
    #[error("relation requested for arm {index} with {pulls} pulls (grid size {grid_size})")]
    Precondition {
        index: usize,
        pulls: u64,
        grid_size: usize,
    },

    /// `update_arm` was called without a matching `choose_arm`.
    #[error("no pending choice: update_arm must follow exactly one choose_arm")]
    NoPendingChoice,

    /// The stored handle no longer resolves to a node in the tree.
    #[error("pending choice points at a node that does not exist (path {path:?})")]
    StaleHandle { path: Vec<usize> },

    /// A [`ZoomConfig`](crate::ZoomConfig) field is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// The KL divergence could not be evaluated for the node's target.
    #[error("divergence evaluation failed: {0}")]
    Divergence(#[from] logp::Error),
}
