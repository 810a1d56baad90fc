//! The JSON wire envelope.
//!
//! Every request and reply is one JSON object:
//!
//! ```json
//! {"cmd": "SEND", "id": "7a73izkph3wutuh6.onion", "portno": 80, "msg": "hi", "date": null}
//! ```
//!
//! The same encoding is used on the local listener and on the relayed
//! connection to a remote peer; only the `cmd` tag and the `id` field are
//! rewritten before relaying.

use serde::{Deserialize, Serialize};

use crate::command::WireCommand;
use crate::constants::MAX_PEER_ID_LEN;
use crate::error::EnvelopeError;

/// Decoded form of a protocol message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Command tag.
    pub cmd: WireCommand,
    /// Sender id (an onion hostname), or the destination id on a `SEND`.
    pub id: String,
    /// Destination port for relayed commands.
    pub portno: u16,
    /// Payload.
    #[serde(default)]
    pub msg: String,
    /// Creation date of a stored message, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl Envelope {
    /// Decode an envelope from raw bytes and validate the id field.
    pub fn from_json(raw: &[u8]) -> Result<Self, EnvelopeError> {
        let envelope: Envelope = serde_json::from_slice(raw)?;
        if envelope.id.is_empty() {
            return Err(EnvelopeError::EmptyPeerId);
        }
        if envelope.id.len() > MAX_PEER_ID_LEN {
            return Err(EnvelopeError::PeerIdTooLong(envelope.id.len()));
        }
        Ok(envelope)
    }

    /// Encode to the JSON wire form.
    pub fn to_json(&self) -> Result<Vec<u8>, EnvelopeError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// An `END` acknowledgement addressed like this envelope, empty payload.
    pub fn ack(&self) -> Envelope {
        Envelope {
            cmd: WireCommand::End,
            id: self.id.clone(),
            portno: self.portno,
            msg: String::new(),
            date: None,
        }
    }

    /// An `ERR` reply carrying the given explanation.
    pub fn error(&self, explanation: impl Into<String>) -> Envelope {
        Envelope {
            cmd: WireCommand::Err,
            id: self.id.clone(),
            portno: self.portno,
            msg: explanation.into(),
            date: None,
        }
    }
}
