//! Coordinator channel: TCP connect with a fixed retry budget, a bounded
//! handshake wait, then newline-delimited JSON in both directions.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, info};

use fedmaint_core::error::ClientError;
use fedmaint_resilience::{retry_async, ConnectionState, RetryConfig};

use crate::config::NodeConfig;
use crate::protocol::{RoundInstruction, RoundReply};

/// An established, handshaken channel to the coordinator.
#[derive(Debug)]
pub struct Channel {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Channel {
    /// Next instruction, or `None` when the coordinator closed the stream.
    pub async fn recv(&mut self) -> io::Result<Option<RoundInstruction>> {
        match self.lines.next_line().await? {
            Some(line) => {
                let instruction = serde_json::from_str(&line)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                Ok(Some(instruction))
            }
            None => Ok(None),
        }
    }

    pub async fn send(&mut self, reply: &RoundReply) -> io::Result<()> {
        let mut line = serde_json::to_vec(reply)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        line.push(b'\n');
        self.writer.write_all(&line).await?;
        self.writer.flush().await
    }
}

/// Dials the coordinator and tracks channel state across reconnects.
pub struct ConnectionManager {
    addr: String,
    retry: RetryConfig,
    handshake_timeout: Duration,
    state: ConnectionState,
}

impl ConnectionManager {
    pub fn new(cfg: &NodeConfig) -> Self {
        Self {
            addr: cfg.coordinator_addr.clone(),
            retry: RetryConfig {
                // a zero budget from the environment still means one attempt
                max_attempts: cfg.max_connect_attempts.max(1),
                delay: Duration::from_secs(cfg.connect_retry_secs),
            },
            handshake_timeout: Duration::from_secs(cfg.handshake_timeout_secs),
            state: ConnectionState::Disconnected,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Connects within the retry budget; exhaustion is fatal to the node.
    pub async fn connect(&mut self) -> Result<Channel, ClientError> {
        self.state = ConnectionState::Connecting;
        let addr = self.addr.clone();
        let timeout = self.handshake_timeout;
        let result = retry_async(&self.retry, move |attempt| {
            let addr = addr.clone();
            async move { try_connect(&addr, timeout, attempt).await }
        })
        .await;

        match result {
            Ok(channel) => {
                self.state = ConnectionState::Ready;
                info!(addr = %self.addr, "coordinator channel ready");
                Ok(channel)
            }
            Err(e) => {
                self.state = ConnectionState::Disconnected;
                Err(ClientError::Connection {
                    attempts: self.retry.max_attempts,
                    detail: e.to_string(),
                })
            }
        }
    }

    pub fn disconnect(&mut self) {
        self.state = ConnectionState::Disconnected;
        debug!(addr = %self.addr, "coordinator channel closed");
    }
}

async fn try_connect(addr: &str, handshake_timeout: Duration, attempt: usize) -> io::Result<Channel> {
    debug!(addr, attempt, "dialing coordinator");
    let stream = TcpStream::connect(addr).await?;
    let (read_half, writer) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    // The coordinator greets first; an unresponsive accept is as bad as a
    // refused connect and goes back into the retry budget.
    let greeting = tokio::time::timeout(handshake_timeout, lines.next_line())
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "handshake timed out"))??
        .ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, "coordinator closed before hello")
        })?;
    let instruction: RoundInstruction = serde_json::from_str(&greeting)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    match instruction {
        RoundInstruction::Hello { coordinator } => {
            debug!(coordinator, "handshake complete");
            Ok(Channel { lines, writer })
        }
        other => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("expected hello, got {other:?}"),
        )),
    }
}
