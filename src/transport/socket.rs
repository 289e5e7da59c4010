// Live transport: newline-delimited JSON over TCP.
//
// Reconnection after an established feed drops is the caller's concern; this
// source only retries the initial connect.

use std::io::{BufRead, BufReader};
use std::net::TcpStream;
use std::thread;
use std::time::{Duration, Instant};

use log::{info, warn};

use super::{MessageSource, TransportMessage};
use crate::errors::PitwallError;

const CONN_RETRY_WAIT_MS: u64 = 200;
pub(crate) const CONN_RETRY_MAX_WAIT_S: u64 = 600;

pub struct TcpLineSource {
    addr: String,
    reader: Option<BufReader<TcpStream>>,
    retry_wait_ms: u64,
    retry_timeout_s: u64,
}

impl TcpLineSource {
    pub fn new(addr: &str) -> Self {
        Self::with_retry(addr, CONN_RETRY_WAIT_MS, CONN_RETRY_MAX_WAIT_S)
    }

    pub fn with_retry(addr: &str, retry_wait_ms: u64, retry_timeout_s: u64) -> Self {
        Self {
            addr: addr.to_string(),
            reader: None,
            retry_wait_ms,
            retry_timeout_s,
        }
    }
}

impl MessageSource for TcpLineSource {
    fn start(&mut self) -> Result<(), PitwallError> {
        let deadline = Instant::now() + Duration::from_secs(self.retry_timeout_s);
        let mut last_error;

        loop {
            match TcpStream::connect(&self.addr) {
                Ok(stream) => {
                    info!("Connected to telemetry feed at {}", self.addr);
                    self.reader = Some(BufReader::new(stream));
                    return Ok(());
                }
                Err(e) => last_error = e,
            }
            if Instant::now() >= deadline {
                warn!(
                    "Giving up connecting to {} after {}s: {last_error}",
                    self.addr, self.retry_timeout_s
                );
                return Err(PitwallError::TransportConnectionTimeout {
                    addr: self.addr.clone(),
                });
            }
            thread::sleep(Duration::from_millis(self.retry_wait_ms));
        }
    }

    fn next_message(&mut self) -> Result<TransportMessage, PitwallError> {
        let reader = self
            .reader
            .as_mut()
            .ok_or(PitwallError::TransportClosed)?;

        let mut line = String::new();
        loop {
            line.clear();
            let bytes = reader
                .read_line(&mut line)
                .map_err(|e| PitwallError::TransportIo { source: e })?;
            if bytes == 0 {
                return Err(PitwallError::TransportClosed);
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            // a single bad line must never interrupt the stream
            match serde_json::from_str::<TransportMessage>(trimmed) {
                Ok(message) => return Ok(message),
                Err(e) => warn!("Discarding undecodable transport line: {e}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpListener;

    #[test]
    fn test_reads_messages_and_skips_bad_lines() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            writeln!(stream, "{{not json").unwrap();
            writeln!(
                stream,
                r#"{{"type":"sync_race_state","flag":"Yellow"}}"#
            )
            .unwrap();
        });

        let mut source = TcpLineSource::new(&addr);
        source.start().unwrap();
        let message = source.next_message().unwrap();
        match message {
            TransportMessage::SyncRaceState(sync) => {
                assert_eq!(sync.flag.as_deref(), Some("Yellow"))
            }
            other => panic!("unexpected message: {other:?}"),
        }

        // server hung up: the source reports the feed closed
        server.join().unwrap();
        assert!(matches!(
            source.next_message(),
            Err(PitwallError::TransportClosed)
        ));
    }

    #[test]
    fn test_connect_timeout_is_reported() {
        // a port nobody is listening on, with a zero-second retry budget
        let mut source = TcpLineSource::with_retry("127.0.0.1:9", 10, 0);
        assert!(matches!(
            source.start(),
            Err(PitwallError::TransportConnectionTimeout { .. })
        ));
    }
}
