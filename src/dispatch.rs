//! Packet fan-out and response arbitration.
//!
//! Every packet framed off the client is replicated, in configured order, to
//! each downstream connection. Only the first endpoint in the list may talk
//! back: when a packet is command traffic (neither GPS nor an ordinary
//! message), one reply packet is framed off endpoint 0 immediately after the
//! write to it, and relayed to the client. Every other endpoint is a
//! fire-and-forget sink and is never read.

use crate::error::{RelayError, Result};
use crate::packet::{read_packet, Packet};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::debug;

/// One established downstream connection, tagged with its address for logs.
pub struct Downstream<S> {
    pub addr: String,
    pub stream: S,
}

/// Write `packet` to every endpoint in order and arbitrate the reply.
///
/// Returns the reply packet framed off endpoint 0, if the packet solicited
/// one. The reply read is bounded by `read_timeout`. Any write or read
/// failure is terminal to the caller's session; no delivery is attempted to
/// the remaining endpoints after a failure.
pub async fn dispatch<S>(
    packet: &Packet,
    endpoints: &mut [Downstream<S>],
    read_timeout: Duration,
) -> Result<Option<Packet>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut reply = None;
    for (position, endpoint) in endpoints.iter_mut().enumerate() {
        endpoint
            .stream
            .write_all(packet.as_bytes())
            .await
            .map_err(|source| RelayError::WriteDownstream {
                addr: endpoint.addr.clone(),
                source,
            })?;
        endpoint.stream.flush().await.ok();
        debug!(addr = %endpoint.addr, "packet sent downstream");

        if position == 0 && packet.expects_reply() {
            let response = timeout(read_timeout, read_packet(&mut endpoint.stream))
                .await
                .map_err(|_| RelayError::Timeout("downstream reply"))??;
            debug!(addr = %endpoint.addr, reply = %response.hex(), "reply captured");
            reply = Some(response);
        }
    }
    Ok(reply)
}
