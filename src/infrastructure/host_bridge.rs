// Native host bridge over stdio
use crate::application::event_dispatch::HostBridge;
use crate::application::telemetry_ingest::{IngestOutcome, RawMessage, TelemetryIngest};
use serde::Serialize;
use serde_json::value::RawValue;
use std::io::Write;
use std::sync::{Mutex, PoisonError};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::watch;

/// Error code reported when the host end of the pipe is gone.
pub const HOST_WRITE_FAILED: i32 = 1;

#[derive(Serialize)]
struct Envelope<'a> {
    channel: &'a str,
    payload: &'a RawValue,
}

/// Writes one `{"channel", "payload"}` JSON line per event.
pub struct StdioHostBridge {
    out: Mutex<Box<dyn Write + Send>>,
}

impl StdioHostBridge {
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self { out: Mutex::new(out) }
    }

    /// `payload` must be compact JSON; it is embedded as is.
    fn send(&self, channel: &str, payload: &str) -> Option<i32> {
        let payload: &RawValue = match serde_json::from_str(payload) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(channel, "Refusing non-JSON host payload: {}", e);
                return Some(HOST_WRITE_FAILED);
            }
        };
        let line = match serde_json::to_string(&Envelope { channel, payload }) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!("Failed to encode host message: {}", e);
                return Some(HOST_WRITE_FAILED);
            }
        };

        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        match writeln!(out, "{}", line).and_then(|_| out.flush()) {
            Ok(()) => None,
            Err(e) => {
                tracing::error!(channel, "Host write failed: {}", e);
                Some(HOST_WRITE_FAILED)
            }
        }
    }
}

impl HostBridge for StdioHostBridge {
    fn send_click(&self, payload: &str) -> Option<i32> {
        self.send("click", payload)
    }

    fn send_form(&self, payload: &str) -> Option<i32> {
        self.send("form", payload)
    }
}

/// Feed each stdin line to ingest until EOF or shutdown.
pub fn spawn_stdin_listener(
    ingest: TelemetryIngest,
    shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(listen(BufReader::new(tokio::io::stdin()), ingest, shutdown))
}

async fn listen<R>(reader: R, ingest: TelemetryIngest, mut shutdown: watch::Receiver<bool>)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut published = 0u64;
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    if ingest.ingest(RawMessage::Text(line)) == IngestOutcome::Published {
                        published += 1;
                    }
                }
                Ok(None) => {
                    tracing::info!("Host input closed");
                    break;
                }
                Err(e) => {
                    tracing::error!("Failed to read host input: {}", e);
                    break;
                }
            },
            _ = shutdown.changed() => break,
        }
    }
    tracing::debug!(published, "Host listener stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::rate_monitor::RateMonitor;
    use crate::application::state_store::ReactiveStore;
    use crate::domain::telemetry::tests::sample_payload;
    use serde_json::Value;
    use std::io;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_events_are_written_as_json_lines() {
        let buf = SharedBuf::default();
        let bridge = StdioHostBridge::new(Box::new(buf.clone()));
        assert_eq!(bridge.send_click(r#"{"type":"BUTTON_CLICK"}"#), None);
        assert_eq!(bridge.send_form(r#"{"formId":"patient"}"#), None);

        let written = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<Value> = written
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines[0]["channel"], "click");
        assert_eq!(lines[0]["payload"]["type"], "BUTTON_CLICK");
        assert_eq!(lines[1]["channel"], "form");
        assert_eq!(lines[1]["payload"]["formId"], "patient");
    }

    #[test]
    fn test_payload_is_embedded_verbatim() {
        let buf = SharedBuf::default();
        let bridge = StdioHostBridge::new(Box::new(buf.clone()));
        let payload = r#"{"type":"LOG_MESSAGE","level":"info","timestamp":1.50}"#;
        assert_eq!(bridge.send_click(payload), None);

        let written = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert_eq!(written, format!("{{\"channel\":\"click\",\"payload\":{}}}\n", payload));
    }

    #[test]
    fn test_non_json_payload_is_not_written() {
        let buf = SharedBuf::default();
        let bridge = StdioHostBridge::new(Box::new(buf.clone()));
        assert_eq!(bridge.send_form("formId=patient"), Some(HOST_WRITE_FAILED));
        assert!(buf.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_write_failure_is_error_code() {
        let bridge = StdioHostBridge::new(Box::new(BrokenPipe));
        assert_eq!(bridge.send_click("{}"), Some(HOST_WRITE_FAILED));
    }

    #[tokio::test]
    async fn test_listener_ingests_lines_until_eof() {
        let store = Arc::new(ReactiveStore::new());
        let ingest = TelemetryIngest::new(store.clone(), RateMonitor::new(0.94));
        let input = format!("{}\n\nnot json\n", sample_payload());
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        listen(BufReader::new(input.as_bytes()), ingest, shutdown_rx).await;

        assert_eq!(store.system_info.get().system_id, "TAH-01");
    }
}
