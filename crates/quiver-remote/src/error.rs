use thiserror::Error;

/// Errors surfaced by a remote history client.
///
/// Listing operations treat "not found" as an empty result and do not
/// produce `NotFound`; everything else propagates to the caller unchanged.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The remote has no record of the requested entity.
    #[error("remote has no {kind} named {name}")]
    NotFound { kind: &'static str, name: String },

    /// The remote rejected the operation. The message is display-ready and
    /// names the affected collection.
    #[error(
        "You no longer have permission to {action} the \"{resource}\" collection. Contact your team administrator if you think this is an error."
    )]
    Permission { action: String, resource: String },

    /// The remote could not be reached. Bubbled unchanged.
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote answered with something the client cannot interpret.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Result alias for remote operations.
pub type RemoteResult<T> = Result<T, RemoteError>;
