use crate::pmx;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("pmx: {0}")]
    Pmx(#[from] pmx::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("vertex {vertex}: unsupported weight type {kind}")]
    UnsupportedWeight { vertex: usize, kind: &'static str },
    #[error("invalid {kind} index {index}")]
    InvalidIndex { kind: &'static str, index: usize },
    #[error("face {0} is not covered by any material")]
    FaceMaterial(usize),
    #[error("dependency cycle: {0}")]
    DependencyCycle(String),
    #[error("shader graph: {0}")]
    Graph(String),
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("material {0} not found")]
    MaterialNotFound(String),
    #[error("invalid options: {0}")]
    Options(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid_index(kind: &'static str, index: usize) -> Self {
        Self::InvalidIndex { kind, index }
    }

    pub(crate) fn dependency_cycle(msg: impl Into<String>) -> Self {
        Self::DependencyCycle(msg.into())
    }

    pub(crate) fn graph(msg: impl Into<String>) -> Self {
        Self::Graph(msg.into())
    }

    pub(crate) fn invalid_data(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
