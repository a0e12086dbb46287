use thiserror::Error;

/// Why an evaluation did not produce a [`crate::BehaviorResult`].
#[derive(Debug, Error)]
pub enum TickError {
    /// The cancellation token fired. Not a failure; the tree unwinds cleanly.
    #[error("evaluation cancelled")]
    Cancelled,
    /// A node hit something it cannot recover from, e.g. a missing dependency.
    #[error("node {node} failed: {source}")]
    Node {
        node: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl TickError {
    pub fn node(
        node: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Node {
            node: node.into(),
            source: source.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AddChildError {
    #[error("Attempted to add too many nodes")]
    TooManyNodes,
}

pub type AddChildResult = Result<(), AddChildError>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoadError {
    #[error("Tree {0:?} does not exist")]
    MissingTree(String),
    #[error("Node type not found {0:?}")]
    MissingNode(String),
    #[error("{0} to {1}")]
    AddChildError(AddChildError, String),
    #[error("Port {port:?} is not provided by node {node:?}")]
    PortUnmatch { node: String, port: String },
    #[error("Port {port:?} on node {node:?} has mismatching direction")]
    PortIOUnmatch { node: String, port: String },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error(transparent)]
    Yaml(#[from] LoadYamlError),
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum LoadYamlError {
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error("Missing {0}")]
    Missing(&'static str),
    #[error("Node type not found {0:?}")]
    MissingNode(String),
    #[error(transparent)]
    AddChildError(#[from] AddChildError),
}

#[derive(Debug, Error)]
pub enum DriverError {
    /// The driver has no live tree: it was never entered, it left, or
    /// construction failed.
    #[error("behavior tree driver is not active")]
    NotActive,
    #[error("behavior tree construction failed: {0}")]
    Construction(#[from] LoadError),
}
