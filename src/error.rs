use thiserror::Error;

/// Failures a caller can see. Commands issued in the wrong state are not
/// errors; they are ignored and leave the session untouched.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no signed-in player; sign in before starting a session")]
    PermissionDenied,

    #[error("could not load track {track_id:?}: {message}")]
    LoadFailure { track_id: String, message: String },

    #[error("profile update failed: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("profile database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("profile {0:?} not found")]
    MissingProfile(String),

    #[error("profile store unavailable: {0}")]
    Unavailable(String),
}
