// Error types for pitwall

use crate::transport::TransportMessage;
use snafu::Snafu;
use std::{io, sync::mpsc::SendError};

#[derive(Debug, Snafu)]
pub enum PitwallError {
    // Errors for the transport connection
    #[snafu(display("Unable to connect to telemetry feed at {addr}"))]
    TransportConnect { addr: String, source: io::Error },
    #[snafu(display("Timeout waiting for telemetry feed at {addr}"))]
    TransportConnectionTimeout { addr: String },
    #[snafu(display("Telemetry feed closed by the remote end"))]
    TransportClosed,
    #[snafu(display("Error reading from telemetry feed"))]
    TransportIo { source: io::Error },

    // Errors while pumping messages into the engine
    #[snafu(display("Message source exhausted"))]
    SourceExhausted,
    #[snafu(display("Error forwarding transport message"))]
    MessageForwardError {
        source: Box<SendError<TransportMessage>>,
    },

    // Errors for the session recorder
    #[snafu(display("Error writing session recording"))]
    RecorderError { source: io::Error },
    #[snafu(display("Invalid session recording: {path}"))]
    InvalidRecording { path: String },
    #[snafu(display("Error reading session recording"))]
    RecordingIoError { source: io::Error },

    // Persisted state errors
    #[snafu(display("Could not find application data directory for persisted state"))]
    NoStateDir,
    #[snafu(display("Error writing persisted state"))]
    StoreIoError { source: io::Error },
    #[snafu(display("Error serializing persisted state"))]
    StoreSerializeError { source: serde_json::Error },

    // Config management errors
    #[snafu(display("Could not find application data directory to save config file"))]
    NoConfigDir,
    #[snafu(display("Error writing config file"))]
    ConfigIoError { source: io::Error },
    #[snafu(display("Error serializing config file"))]
    ConfigSerializeError { source: serde_json::Error },
}

impl From<SendError<TransportMessage>> for PitwallError {
    fn from(value: SendError<TransportMessage>) -> Self {
        PitwallError::MessageForwardError {
            source: Box::new(value),
        }
    }
}
