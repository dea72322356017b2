use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActionError {
    #[error("Malformed action: record has no `type` field: {0}")]
    MalformedAction(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Malformed(#[from] ActionError),

    #[error("Thunk reached the reducer; no stage handled it: {0}")]
    UnhandledThunk(String),

    #[error("Stage `{stage}` failed: {source}")]
    Stage {
        stage: String,
        #[source]
        source: anyhow::Error,
    },
}

impl StoreError {
    pub fn stage(stage: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Stage {
            stage: stage.into(),
            source: source.into(),
        }
    }
}
