use std::fmt;

/// Pipeline step a collaborator failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Loading,
    Embedding,
    Search,
    IndexLookup,
    Upsert,
    Clear,
    Generation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Loading => "document loading",
            Stage::Embedding => "embedding",
            Stage::Search => "search",
            Stage::IndexLookup => "index lookup",
            Stage::Upsert => "upsert",
            Stage::Clear => "clear",
            Stage::Generation => "generation",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RagError {
    /// Rejected before any collaborator was called.
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{stage} failed: {source:#}")]
    Collaborator {
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to parse generated output: {0}")]
    Parse(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl RagError {
    pub fn invalid(message: impl Into<String>) -> Self {
        RagError::InvalidInput(message.into())
    }

    pub fn at(stage: Stage, source: impl Into<anyhow::Error>) -> Self {
        RagError::Collaborator {
            stage,
            source: source.into(),
        }
    }

    /// Stage for collaborator errors, `None` for everything else.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            RagError::Collaborator { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

pub type RagResult<T> = std::result::Result<T, RagError>;
