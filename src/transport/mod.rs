pub(crate) mod simulator;
pub(crate) mod socket;

pub use simulator::SimulatedSource;
pub use socket::TcpLineSource;

use std::path::Path;
use std::sync::mpsc::Sender;

use log::error;
use serde::{Deserialize, Serialize};
use serde_jsonlines::json_lines;

use crate::errors::PitwallError;
use crate::roster::TelemetryPatch;
use crate::session::RaceStateSync;

/// A per-car update from the race simulator.
///
/// `car` and `driver` are the identity fields the registry resolves against;
/// the payload itself is partial by contract.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TelemetryEvent {
    pub car: String,
    pub driver: String,
    #[serde(default)]
    pub telemetry: TelemetryPatch,
}

/// The two asynchronous message kinds delivered by the transport.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportMessage {
    Telemetry(TelemetryEvent),
    SyncRaceState(RaceStateSync),
}

/// A source of transport messages.
///
/// This trait abstracts the message feed, letting the engine run against a
/// live network connection, the built-in simulator, or pre-recorded data for
/// replay and testing. Sources are pull-based and may block in
/// `next_message` until a message is available.
///
/// # Lifecycle
///
/// 1. Call `start()` to establish the connection (or prime the source)
/// 2. Call `next_message()` repeatedly; each call yields one message
/// 3. A source that can end (recordings) signals exhaustion with
///    [`PitwallError::SourceExhausted`]
pub trait MessageSource {
    /// Initialize the source and establish any underlying connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established within the
    /// source's retry budget.
    fn start(&mut self) -> Result<(), PitwallError>;

    /// Block until the next transport message is available.
    ///
    /// # Errors
    ///
    /// Returns [`PitwallError::SourceExhausted`] when a finite source has
    /// been fully drained, or a transport error if the feed fails.
    fn next_message(&mut self) -> Result<TransportMessage, PitwallError>;
}

/// A mock message source for testing and offline replay.
///
/// Yields a fixed sequence of messages, then reports exhaustion. Recorded
/// sessions written by the recorder load straight back through `from_file`.
pub struct MockMessageSource {
    cur_message: usize,
    messages: Vec<TransportMessage>,
}

impl MockMessageSource {
    pub fn from_messages(messages: Vec<TransportMessage>) -> Self {
        Self {
            cur_message: 0,
            messages,
        }
    }

    /// Load a recorded session from a JSON Lines file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or a line does not
    /// parse as a transport message.
    pub fn from_file(file: &Path) -> Result<Self, PitwallError> {
        let messages = json_lines(file)
            .map_err(|e| PitwallError::RecordingIoError { source: e })?
            .collect::<Result<Vec<TransportMessage>, _>>()
            .map_err(|_| PitwallError::InvalidRecording {
                path: format!("{file:?}"),
            })?;
        Ok(Self::from_messages(messages))
    }
}

impl MessageSource for MockMessageSource {
    fn start(&mut self) -> Result<(), PitwallError> {
        Ok(())
    }

    fn next_message(&mut self) -> Result<TransportMessage, PitwallError> {
        if self.cur_message >= self.messages.len() {
            return Err(PitwallError::SourceExhausted);
        }
        let message = self.messages[self.cur_message].clone();
        self.cur_message += 1;
        Ok(message)
    }
}

/// Drain a message source into the engine channel, optionally teeing every
/// message to a recorder channel.
///
/// Runs until the source is exhausted (clean return) or fails. Recorder
/// send failures are logged and ignored so a dead recorder thread never
/// stalls ingestion.
pub fn pump_messages(
    mut source: impl MessageSource,
    engine_sender: Sender<TransportMessage>,
    recorder_sender: Option<Sender<TransportMessage>>,
) -> Result<(), PitwallError> {
    source.start()?;

    loop {
        let message = match source.next_message() {
            Ok(message) => message,
            Err(PitwallError::SourceExhausted) => return Ok(()),
            Err(e) => return Err(e),
        };

        if let Some(ref recorder) = recorder_sender
            && let Err(e) = recorder.send(message.clone())
        {
            error!("Could not forward message to recorder: {e}");
        }
        engine_sender.send(message)?;
    }
}
