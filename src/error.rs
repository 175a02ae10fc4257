use thiserror::Error;

/// Rejected mutations and commands. Nothing here is fatal: the model is left
/// exactly as it was before the call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EditorError {
    #[error("unknown node `{0}`")]
    UnknownNode(String),
    #[error("unknown edge `{0}`")]
    UnknownEdge(String),
    #[error("unknown group `{0}`")]
    UnknownGroup(String),
    #[error("id `{0}` is already in use")]
    DuplicateId(String),
    #[error("edge would connect `{0}` to itself")]
    SelfLoop(String),
    #[error("an identical edge already connects `{from}` to `{to}`")]
    DuplicateEdge { from: String, to: String },
    #[error("making `{parent}` the parent of `{node}` would create a cycle")]
    ParentCycle { node: String, parent: String },
    #[error("{width}x{height} is below the minimum node size {min_width}x{min_height}")]
    UndersizedNode {
        width: f32,
        height: f32,
        min_width: f32,
        min_height: f32,
    },
    #[error("invalid geometry for `{0}`")]
    InvalidGeometry(String),
    #[error("`{0}` is not a #rgb, #rrggbb or #rrggbbaa color")]
    InvalidColor(String),
    #[error("operation needs at least {required} selected nodes, got {actual}")]
    SelectionTooSmall { required: usize, actual: usize },
    #[error("no project is open")]
    NoProject,
    #[error("another gesture is in progress")]
    GestureInProgress,
}

pub type EditorResult<T> = Result<T, EditorError>;
