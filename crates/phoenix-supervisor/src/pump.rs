//! Stream pumps: read a child output stream line by line into a sink.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{trace, warn};

use crate::error::{SupervisorError, SupervisorResult};
use crate::sink::{Origin, OutputLine, SinkWriter};

/// Read `reader` until end-of-stream, appending one content line per line read.
///
/// Stops at the first read error and returns it; nothing is appended for it.
pub(crate) async fn pump_lines<R>(
    reader: R,
    origin: Origin,
    sink: &SinkWriter,
) -> SupervisorResult<()>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|source| SupervisorError::StreamRead { origin, source })?;
        if read == 0 {
            return Ok(());
        }
        let line = decode_line(&buf);
        trace!(%origin, line = %line, "pumped line");
        sink.append(OutputLine::content(origin, line));
    }
}

/// Like [`pump_lines`], but a read failure becomes a single error line.
pub(crate) async fn pump_logged<R>(reader: R, origin: Origin, sink: SinkWriter)
where
    R: AsyncRead + Unpin,
{
    if let Err(err) = pump_lines(reader, origin, &sink).await {
        warn!(error = %err, "output pump stopped");
        sink.append(OutputLine::error(Origin::System, err.to_string()));
    }
}

/// Strip the line terminator and decode lossily.
fn decode_line(buf: &[u8]) -> String {
    let line = buf.strip_suffix(b"\n").unwrap_or(buf);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}
