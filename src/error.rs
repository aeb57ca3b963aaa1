use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("invalid API url: {0}")]
    Url(#[from] url::ParseError),

    #[error("failed to build http client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest_middleware::Error),

    #[error("failed to read response body: {0}")]
    Body(#[source] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("codeforces rejected the request: {0}")]
    Api(String),

    #[error("{0}")]
    HandleNotFound(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("a student with handle {0} already exists")]
    DuplicateHandle(String),
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("notification request failed: {0}")]
    Transport(#[from] reqwest_middleware::Error),

    #[error("notification endpoint answered {0}")]
    Rejected(u16),
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("no student is registered with handle {0}")]
    NotFound(String),

    #[error("codeforces does not know handle {handle}")]
    InvalidHandle { handle: String },

    #[error("codeforces request for {handle} failed: {source}")]
    Upstream {
        handle: String,
        #[source]
        source: ClientError,
    },

    #[error("failed to persist student {handle}: {source}")]
    Persist {
        handle: String,
        #[source]
        source: StoreError,
    },
}

impl SyncError {
    pub fn from_client(handle: &str, err: ClientError) -> Self {
        match err {
            ClientError::HandleNotFound(_) => SyncError::InvalidHandle {
                handle: handle.to_string(),
            },
            source => SyncError::Upstream {
                handle: handle.to_string(),
                source,
            },
        }
    }

    pub fn persist(handle: &str, source: StoreError) -> Self {
        SyncError::Persist {
            handle: handle.to_string(),
            source,
        }
    }
}
