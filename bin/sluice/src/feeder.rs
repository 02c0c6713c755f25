use std::time::Duration;

use serde_json::{Map, Value};
use sluice_components::queues::{MemoryQueue, MemoryTransaction};
use sluice_core::{
    queue::{QueueError, QueueTransaction as _, SourceQueue as _},
    record::{Headers, Record},
};
use sluice_error::{ErrorContext as _, GenericError};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt as _},
    time::{sleep, timeout},
};
use tracing::{debug, warn};

const FLUSH_INTERVAL: Duration = Duration::from_millis(100);
const FULL_QUEUE_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Parses a line of input into a record.
///
/// A line holding a JSON object becomes a record whose headers are the object's fields, with non-string values kept
/// in their JSON form. A string field named `body` becomes the record body instead. Any other line becomes the body of
/// a record without headers.
pub fn parse_line(line: &str) -> Record {
    let object = match serde_json::from_str::<Map<String, Value>>(line) {
        Ok(object) => object,
        Err(_) => return Record::from_body(line.to_string()),
    };

    let mut headers = Headers::with_capacity(object.len());
    let mut body = String::new();
    for (key, value) in object {
        match value {
            Value::String(s) if key == "body" => body = s,
            Value::String(s) => {
                headers.insert(key, s);
            }
            other => {
                headers.insert(key, other.to_string());
            }
        }
    }

    Record::new(headers, body)
}

/// Feeds records read line by line from `reader` into `queue`, until the reader is exhausted.
///
/// Records are put in chunks of up to `chunk_size` records per transaction. A partial chunk is committed whenever no
/// new line arrives for a short while. When the queue is full, the commit is retried until there is room.
///
/// Returns the number of records fed.
///
/// # Errors
///
/// If reading fails, or the queue is closed or fails unrecoverably, an error is returned.
pub async fn feed<R>(reader: R, queue: &MemoryQueue, chunk_size: usize) -> Result<usize, GenericError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut pending: Option<(MemoryTransaction, usize)> = None;
    let mut fed = 0;

    loop {
        let next_line = if pending.is_some() {
            match timeout(FLUSH_INTERVAL, lines.next_line()).await {
                Ok(result) => result,
                Err(_) => {
                    if let Some((txn, count)) = pending.take() {
                        fed += commit_chunk(queue, txn, count).await?;
                    }
                    continue;
                }
            }
        } else {
            lines.next_line().await
        };

        let line = match next_line.error_context("Failed to read input line.")? {
            Some(line) => line,
            None => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let (mut txn, mut count) = match pending.take() {
            Some(chunk) => chunk,
            None => (queue.begin_transaction()?, 0),
        };
        txn.put(parse_line(&line))?;
        count += 1;

        if count >= chunk_size {
            fed += commit_chunk(queue, txn, count).await?;
        } else {
            pending = Some((txn, count));
        }
    }

    if let Some((txn, count)) = pending.take() {
        fed += commit_chunk(queue, txn, count).await?;
    }

    debug!(fed, "Input exhausted.");
    Ok(fed)
}

async fn commit_chunk(queue: &MemoryQueue, mut txn: MemoryTransaction, count: usize) -> Result<usize, GenericError> {
    loop {
        match txn.commit() {
            Ok(()) => break,
            Err(QueueError::Channel { reason }) if !queue.is_closed() => {
                warn!(%reason, count, "Failed to commit input chunk. Retrying.");
                sleep(FULL_QUEUE_RETRY_INTERVAL).await;
            }
            Err(e) => {
                txn.close();
                return Err(e.into());
            }
        }
    }

    txn.close();
    Ok(count)
}
