use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("could not connect to {addr}: {reason}")]
    Connection { addr: String, reason: String },

    #[error("command failed: {0}")]
    Command(String),

    #[error("unexpected ping reply '{0}'")]
    UnexpectedReply(String),

    #[error("subscribe failed: {0}")]
    Subscription(String),

    #[error("receive failed: {0}")]
    Receive(String),

    #[error("timed out waiting for pub/sub message")]
    ReceiveTimeout,

    #[error("ERR Protocol error: {0}")]
    Protocol(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
