use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use duorpc_common::protocol::{Command, Message};
use duorpc_common::transport::conn::{split, MessageSink};
use duorpc_common::{DuorpcError, Result};

use crate::calc::Calculator;

/// Reply ids are drawn from the server's own counter, independent of client
/// request ids. Only `correlation_id` participates in matching.
static NEXT_REPLY_ID: AtomicU64 = AtomicU64::new(0);

fn next_reply_id() -> u64 {
    NEXT_REPLY_ID.fetch_add(1, Ordering::SeqCst)
}

type ReplyWriter = MessageSink<tokio::net::tcp::OwnedWriteHalf>;

/// The server dispatcher.
///
/// Accepts unlimited concurrent connections; each connection gets a
/// dedicated reader task and its own fixed-size worker pool. A failure on
/// one connection never affects the others or the accept loop.
pub struct Server {
    listener: TcpListener,
    calculator: Arc<dyn Calculator>,
    workers: usize,
}

impl Server {
    /// Binds the listening endpoint. `workers` is the per-connection pool
    /// size, a deployment parameter (values below 1 are clamped to 1).
    pub async fn bind(addr: &str, calculator: Arc<dyn Calculator>, workers: usize) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| DuorpcError::Connection(format!("Failed to bind to {}: {}", addr, e)))?;

        Ok(Self {
            listener,
            calculator,
            workers: workers.max(1),
        })
    }

    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| DuorpcError::Connection(format!("Failed to get local addr: {}", e)))
    }

    /// Accept loop. Runs until the listener itself fails.
    pub async fn run(&self) -> Result<()> {
        loop {
            let (stream, peer) = self
                .listener
                .accept()
                .await
                .map_err(|e| DuorpcError::Connection(format!("Failed to accept: {}", e)))?;

            tracing::info!(%peer, "connection established");

            let calculator = Arc::clone(&self.calculator);
            let workers = self.workers;
            tokio::spawn(async move {
                match handle_connection(stream, calculator, workers).await {
                    Ok(()) => tracing::info!(%peer, "connection closed"),
                    Err(e) => tracing::warn!(%peer, error = %e, "connection torn down"),
                }
            });
        }
    }
}

/// Per-connection session: reader, request queue, worker pool, shared
/// reply writer.
///
/// The queue is unbounded so the reader never stalls behind a full pool;
/// requests must keep arriving while earlier ones are still being computed.
async fn handle_connection(
    stream: TcpStream,
    calculator: Arc<dyn Calculator>,
    workers: usize,
) -> Result<()> {
    let (mut reader, sink) = split(stream);
    let (queue_tx, queue_rx) = mpsc::unbounded_channel::<Message>();
    let queue_rx = Arc::new(Mutex::new(queue_rx));

    let pool: Vec<JoinHandle<()>> = (0..workers)
        .map(|_| {
            tokio::spawn(worker_loop(
                Arc::clone(&queue_rx),
                sink.clone(),
                Arc::clone(&calculator),
            ))
        })
        .collect();

    let outcome = loop {
        match reader.recv().await {
            Ok(Some(request)) => {
                tracing::debug!(id = request.id, payload = %request.payload, "request received");
                if queue_tx.send(request).is_err() {
                    // All workers gone, which only happens when the write
                    // side already failed.
                    break Ok(());
                }
            }
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        }
    };

    // Closing the queue lets outstanding workers finish their requests and
    // then shuts the pool down.
    drop(queue_tx);
    for handle in pool {
        let _ = handle.await;
    }

    outcome
}

async fn worker_loop(
    queue: Arc<Mutex<mpsc::UnboundedReceiver<Message>>>,
    sink: ReplyWriter,
    calculator: Arc<dyn Calculator>,
) {
    loop {
        // The lock is only held while dequeuing, so workers compute
        // concurrently.
        let request = match queue.lock().await.recv().await {
            Some(request) => request,
            None => return,
        };

        let payload = execute(&request, calculator.as_ref()).await;
        let reply = Message::reply(next_reply_id(), request.id, payload);

        if let Err(e) = sink.send(&reply).await {
            tracing::warn!(error = %e, "failed to write reply, worker exiting");
            return;
        }
    }
}

/// Parses the command and runs it. Every failure mode (unknown verb,
/// malformed argument, handler fault) becomes reply payload text.
async fn execute(request: &Message, calculator: &dyn Calculator) -> String {
    match request.payload.parse::<Command>() {
        Ok(Command::Increment(n)) => match calculator.increment(n).await {
            Ok(result) => result.to_string(),
            Err(e) => e.to_string(),
        },
        Err(e) => e.to_string(),
    }
}
