//! One client lifecycle, from accept to teardown.
//!
//! A session owns the client connection and one fresh connection per
//! configured downstream endpoint. Its packet loop frames a packet off the
//! client, fans it out, and forwards the arbitrated reply, until the first
//! I/O error or timeout on any of its sockets. There is no retry: the first
//! failure is terminal, and dropping the session closes every socket it
//! opened, on every exit path.

use crate::config::RelayConfig;
use crate::dispatch::{dispatch, Downstream};
use crate::error::{RelayError, Result};
use crate::packet::read_packet;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

pub struct Session<C, S> {
    client: C,
    downstreams: Vec<Downstream<S>>,
    read_timeout: Duration,
}

impl Session<TcpStream, TcpStream> {
    /// Open one connection per configured endpoint, in list order.
    ///
    /// Each attempt is bounded by the configured read timeout. If any
    /// attempt fails the session never starts; connections opened so far are
    /// dropped (closed) along with the client socket.
    pub async fn connect(client: TcpStream, config: &RelayConfig) -> Result<Self> {
        let mut downstreams = Vec::with_capacity(config.endpoints.len());
        for endpoint in &config.endpoints {
            let addr = endpoint.addr();
            let stream = timeout(
                config.read_timeout(),
                TcpStream::connect((endpoint.host.as_str(), endpoint.port)),
            )
            .await
            .map_err(|_| RelayError::Timeout("downstream connect"))?
            .map_err(|source| RelayError::Connect {
                addr: addr.clone(),
                source,
            })?;
            stream.set_nodelay(true)?;
            debug!(%addr, "downstream connected");
            downstreams.push(Downstream { addr, stream });
        }
        Ok(Session::new(client, downstreams, config.read_timeout()))
    }
}

impl<C, S> Session<C, S>
where
    C: AsyncRead + AsyncWrite + Unpin,
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(client: C, downstreams: Vec<Downstream<S>>, read_timeout: Duration) -> Self {
        Session {
            client,
            downstreams,
            read_timeout,
        }
    }

    /// Drive packet cycles until the first failure.
    ///
    /// A session never ends successfully — the device keeps sending until a
    /// socket fails or times out — so this returns the terminating error.
    /// Consuming `self` guarantees every socket is closed on return.
    pub async fn run(mut self) -> RelayError {
        loop {
            if let Err(err) = self.cycle().await {
                return err;
            }
        }
    }

    /// One packet cycle: frame a client packet, fan it out, forward the
    /// arbitrated reply (if any) back to the client.
    async fn cycle(&mut self) -> Result<()> {
        let packet = timeout(self.read_timeout, read_packet(&mut self.client))
            .await
            .map_err(|_| RelayError::Timeout("client packet"))??;
        debug!(protocol = packet.protocol(), packet = %packet.hex(), "packet from client");

        let reply = dispatch(&packet, &mut self.downstreams, self.read_timeout).await?;
        if let Some(reply) = reply {
            self.client
                .write_all(reply.as_bytes())
                .await
                .map_err(RelayError::WriteClient)?;
            self.client.flush().await.ok();
            debug!(reply = %reply.hex(), "reply sent back to client");
        }
        Ok(())
    }
}
