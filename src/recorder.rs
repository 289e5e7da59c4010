use std::{fs::File, io::BufWriter, path::PathBuf, sync::mpsc::Receiver};

use log::error;
use serde_jsonlines::JsonLinesWriter;

use crate::{errors::PitwallError, transport::TransportMessage};

/// Drain transport messages to a JSON Lines file until the sending side
/// hangs up. Recordings load back through `MockMessageSource::from_file`.
pub fn record_messages(
    file: &PathBuf,
    message_receiver: Receiver<TransportMessage>,
) -> Result<(), PitwallError> {
    let recording_file =
        File::create(file).map_err(|e| PitwallError::RecorderError { source: e })?;
    let mut recording_writer = JsonLinesWriter::new(BufWriter::new(recording_file));
    for message in &message_receiver {
        if let Err(e) = recording_writer.write(&message) {
            error!("Error while writing message to session recording: {e}");
        }
    }
    recording_writer
        .flush()
        .map_err(|e| PitwallError::RecorderError { source: e })?;
    Ok(())
}
