// src/exec/drain.rs

//! Stream drainer: forwards one child output stream to the display.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::display::LogSink;
use crate::types::{Classification, LogLine, StreamSource};

/// Read `reader` to end-of-stream and forward every non-empty trimmed line.
///
/// Returns the number of lines forwarded. A read error is reported as a
/// single error line and ends the drain; there is no retry. Invalid UTF-8
/// is replaced rather than treated as a read error.
pub async fn drain_stream<R>(
    reader: R,
    source: StreamSource,
    class: Classification,
    sink: LogSink,
) -> usize
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::with_capacity(256);
    let mut forwarded = 0usize;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&buf);
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                sink.line(LogLine::new(text, class, source));
                forwarded += 1;
            }
            Err(e) => {
                warn!(?source, error = %e, "failed to read child output");
                sink.line(LogLine::new(
                    format!("failed to read {}: {e}", stream_name(source)),
                    Classification::Error,
                    source,
                ));
                break;
            }
        }
    }

    debug!(?source, forwarded, "drainer reached end of stream");
    forwarded
}

/// Spawn [`drain_stream`] on its own Tokio task.
pub fn spawn_drainer<R>(
    reader: R,
    source: StreamSource,
    class: Classification,
    sink: LogSink,
) -> JoinHandle<usize>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(drain_stream(reader, source, class, sink))
}

fn stream_name(source: StreamSource) -> &'static str {
    match source {
        StreamSource::Stdout => "stdout",
        StreamSource::Stderr => "stderr",
        StreamSource::Supervisor => "output",
    }
}
