use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    /// Catch-all I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Could not establish a downstream connection during session setup
    #[error("failed to connect to downstream {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Stream ended or failed before a full packet was framed
    #[error("short read while framing packet {field}: {source}")]
    Framing {
        field: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// Error writing a packet to an established downstream socket
    #[error("failed to write packet to downstream {addr}: {source}")]
    WriteDownstream {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Error forwarding a downstream reply back to the client
    #[error("failed to forward reply to client: {0}")]
    WriteClient(#[source] std::io::Error),

    /// A configured socket timeout elapsed
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
}

pub type Result<T> = std::result::Result<T, RelayError>;
