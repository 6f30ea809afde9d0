use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::task::JoinHandle;

use duorpc_common::protocol::{CallError, Command, Message, MessageId};
use duorpc_common::transport::conn::{connect, split, MessageSink, MessageStream};
use duorpc_common::Result;

use crate::bridge::{Callback, ResultHandle};

/// Request ids are unique per client process, independent of the server's
/// reply-id counter.
static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(0);

fn next_request_id() -> MessageId {
    NEXT_REQUEST_ID.fetch_add(1, Ordering::SeqCst)
}

/// Pending entries: id -> callback, consumed exactly once by the reader.
type PendingMap = Arc<Mutex<HashMap<MessageId, Callback>>>;

/// Remote proxy for the increment operation over one persistent connection.
///
/// A single background reader task demultiplexes incoming replies by
/// `correlation_id` to the matching pending entry. If the connection is
/// lost, every still-pending entry fails with a connection error and the
/// proxy must be re-created.
pub struct CalculatorProxy {
    sink: MessageSink<OwnedWriteHalf>,
    pending: PendingMap,
    reader: JoinHandle<()>,
}

impl CalculatorProxy {
    /// Connects and spawns the background reader. Must be called from
    /// within a tokio runtime.
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = connect(addr).await?;
        let (reader_stream, sink) = split(stream);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let reader = tokio::spawn(reader_loop(reader_stream, Arc::clone(&pending)));

        Ok(Self {
            sink,
            pending,
            reader,
        })
    }

    /// Fire-and-forget increment. Registers the pending entry, sends the
    /// request, and returns immediately; a send failure is reported to the
    /// callback, never to the caller.
    pub fn increment_async(&self, n: i64, callback: Callback) {
        let id = next_request_id();
        let request = Message::request(id, Command::Increment(n).to_string());

        // Register before sending so a fast reply always finds its entry.
        self.pending
            .lock()
            .expect("pending map lock poisoned")
            .insert(id, callback);

        let sink = self.sink.clone();
        let pending = Arc::clone(&self.pending);
        tokio::spawn(async move {
            if let Err(e) = sink.send(&request).await {
                let entry = pending
                    .lock()
                    .expect("pending map lock poisoned")
                    .remove(&id);
                if let Some(callback) = entry {
                    callback(Err(CallError::Connection(e.to_string())));
                }
            }
        });
    }

    /// Deferred-result increment: a pull handle over the same one-shot cell
    /// the callback path uses.
    pub fn increment(&self, n: i64) -> ResultHandle {
        let (handle, callback) = ResultHandle::new();
        self.increment_async(n, callback);
        handle
    }
}

impl Drop for CalculatorProxy {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Continuously receives and dispatches replies. On disconnect or decode
/// failure the loop ends and all pending entries fail; the proxy is dead
/// from that point on.
async fn reader_loop(mut stream: MessageStream<OwnedReadHalf>, pending: PendingMap) {
    loop {
        match stream.recv().await {
            Ok(Some(reply)) => dispatch(&pending, reply),
            Ok(None) => {
                fail_pending(&pending, "connection closed by server");
                return;
            }
            Err(e) => {
                fail_pending(&pending, &e.to_string());
                return;
            }
        }
    }
}

/// Atomically removes the pending entry for the reply's correlation id and
/// delivers the outcome. A numeric payload is the result; anything else is
/// an error carried as text. Replies with no matching entry are dropped.
fn dispatch(pending: &PendingMap, reply: Message) {
    let entry = pending
        .lock()
        .expect("pending map lock poisoned")
        .remove(&reply.correlation_id);

    match entry {
        Some(callback) => match reply.payload.trim().parse::<i64>() {
            Ok(value) => callback(Ok(value)),
            Err(_) => callback(Err(CallError::Remote(reply.payload))),
        },
        None => {
            tracing::debug!(
                correlation_id = reply.correlation_id,
                "dropping reply with no pending entry"
            );
        }
    }
}

fn fail_pending(pending: &PendingMap, reason: &str) {
    let entries: Vec<Callback> = {
        let mut map = pending.lock().expect("pending map lock poisoned");
        map.drain().map(|(_, callback)| callback).collect()
    };
    if !entries.is_empty() {
        tracing::warn!(count = entries.len(), reason, "failing pending requests");
    }
    for callback in entries {
        callback(Err(CallError::Connection(reason.to_string())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_are_monotonic() {
        let a = next_request_id();
        let b = next_request_id();
        assert!(b > a);
    }

    #[test]
    fn dispatch_delivers_numeric_payload() {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (tx, rx) = std::sync::mpsc::channel::<std::result::Result<i64, CallError>>();
        pending.lock().unwrap().insert(
            7,
            Box::new(move |outcome| tx.send(outcome).unwrap()) as Callback,
        );

        dispatch(&pending, Message::reply(0, 7, "43"));
        assert_eq!(rx.recv().unwrap(), Ok(43));
        assert!(pending.lock().unwrap().is_empty());
    }

    #[test]
    fn dispatch_turns_non_numeric_payload_into_remote_error() {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (tx, rx) = std::sync::mpsc::channel();
        pending.lock().unwrap().insert(
            7,
            Box::new(move |outcome| tx.send(outcome).unwrap()) as Callback,
        );

        dispatch(&pending, Message::reply(0, 7, "Undefined operation"));
        assert_eq!(
            rx.recv().unwrap(),
            Err(CallError::Remote("Undefined operation".into()))
        );
    }

    #[test]
    fn dispatch_drops_unmatched_reply() {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        // Must not panic or disturb anything.
        dispatch(&pending, Message::reply(0, 999, "43"));
    }
}
