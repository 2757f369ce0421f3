#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("link {link} references missing node {index}")]
    MissingNode { link: usize, index: usize },

    #[error("group {group} references missing node {index}")]
    MissingGroupMember { group: usize, index: usize },

    #[error("group {group} references missing group {index}")]
    MissingGroup { group: usize, index: usize },

    #[error("group {group} is its own ancestor")]
    GroupCycle { group: usize },

    #[error("node or group {index} has more than one parent group")]
    GroupHasMultipleParents { index: usize },

    #[error("link {index} does not exist")]
    MissingLink { index: usize },

    #[error("constraint references missing node {index}")]
    ConstraintNode { index: usize },

    #[error("distance matrix must be at least {expected}x{expected}, got {rows} rows")]
    DistanceMatrixShape { expected: usize, rows: usize },

    #[error("unsatisfiable constraint: v{left} + {gap} <= v{right}")]
    Unsatisfiable { left: usize, right: usize, gap: f64 },

    #[error("layout has not been started")]
    NotStarted,

    #[error("edge routing requires prepare_edge_routing() first")]
    RoutingNotPrepared,
}

pub type Result<T> = std::result::Result<T, Error>;
