//! Common result and error types for the Tessera core.

/// The standard result type for fallible core operations.
///
/// Every error in the core is fatal to the current pass: the partitioner and
/// the retimer perform no recovery, and the enclosing tool decides whether to
/// abort or report. `Err` therefore always means the pass stopped.
pub type TesseraResult<T> = Result<T, TesseraError>;

/// Errors raised by the partitioner and the retimer.
///
/// Each variant carries enough context to identify the offending entity
/// (node name, pin name, cluster id) without access to the pass state.
#[derive(Debug, thiserror::Error)]
pub enum TesseraError {
    /// A structural invariant of the netlist or a derived graph was violated.
    ///
    /// Covers self-loops in the cluster graph, missing per-pin delay or wave
    /// entries during retiming, a missing delay for a predecessor node, and
    /// node kinds the delay model cannot classify.
    #[error("invariant violated: {message}")]
    InvariantViolation {
        /// Description of the violated invariant, naming the entity.
        message: String,
    },

    /// The routed graph could not insert a pipeline register where the
    /// retimer required one.
    #[error("failed to insert pipeline register at {node}")]
    InsertionFailure {
        /// The node or pin at which the insertion was attempted.
        node: String,
    },

    /// A cluster already exceeds the maximum size when capacity merging
    /// begins, so no sequence of merges can satisfy the bound.
    #[error("cluster {cluster} holds {size} blocks, exceeding the maximum cluster size {max_size}")]
    CapacityInfeasible {
        /// The oversized cluster.
        cluster: usize,
        /// Its current block count.
        size: usize,
        /// The configured maximum.
        max_size: usize,
    },

    /// Cycle elimination swept a cyclic cluster graph without finding a
    /// loop path to collapse. Signals a bug in the merge rule, not bad input.
    #[error("cycle elimination made no progress on a cyclic cluster graph")]
    AcyclicityInfeasible,
}

impl TesseraError {
    /// Creates an [`TesseraError::InvariantViolation`] from a message.
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            message: message.into(),
        }
    }
}
