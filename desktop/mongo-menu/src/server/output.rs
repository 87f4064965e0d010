//! Draining of the server's stdout and stderr.

use crate::server::{Diagnosis, StatusPublisher};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{ChildStderr, ChildStdout};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const PORT_CONFLICT_SIGNATURE: &str = "Address already in use";

/// Forward stdout lines to the debug log.
pub(crate) fn drain_stdout(stdout: ChildStdout) -> JoinHandle<()> {
    tokio::spawn(read_lines(stdout, "stdout", |line| {
        debug!(target: "mongod", "{line}");
    }))
}

/// Forward stderr lines to the warning log, reporting port conflicts
/// as soon as they appear.
pub(crate) fn drain_stderr(stderr: ChildStderr, publisher: StatusPublisher) -> JoinHandle<()> {
    tokio::spawn(read_lines(stderr, "stderr", move |line| {
        warn!(target: "mongod", "{line}");
        if line.contains(PORT_CONFLICT_SIGNATURE) {
            publisher.report(Diagnosis::PortConflict);
        }
    }))
}

async fn read_lines<R, F>(stream: R, name: &'static str, mut on_line: F)
where
    R: AsyncRead + Unpin,
    F: FnMut(&str),
{
    // mongod output is not guaranteed to be UTF-8
    let mut segments = BufReader::new(stream).split(b'\n');

    loop {
        match segments.next_segment().await {
            Ok(Some(bytes)) => {
                let line = String::from_utf8_lossy(&bytes);
                on_line(line.trim_end_matches('\r'));
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Error reading MongoDB {name}: {e}");
                break;
            }
        }
    }
}
