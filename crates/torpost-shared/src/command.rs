//! Command taxonomy.
//!
//! Two enumerations keep the two directions apart: [`WireCommand`] is the tag
//! that actually travels in an envelope's `cmd` field, while [`ClientRequest`]
//! is what an inbound envelope is allowed to ask for. A `Send` from the local
//! client becomes a `Recv` on the wire; the file-transfer steps advance one
//! state per hop until the arriving `FILEPORT` is terminal. The mapping lives
//! in [`ClientRequest::outbound_tag`] so the dispatcher never mutates tags
//! ad hoc.

use serde::{Deserialize, Serialize};

use crate::error::EnvelopeError;

/// Tags appearing in the JSON `cmd` field, inbound and outbound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireCommand {
    /// Local client asks the daemon to deliver a message to a peer.
    #[serde(rename = "SEND")]
    Send,
    /// A remote peer delivering a message to this node.
    #[serde(rename = "RECV")]
    Recv,
    /// Local client polls for its oldest unread message from a peer.
    #[serde(rename = "UPDATE")]
    Update,
    /// Local client asks for the list of peers with pending messages.
    #[serde(rename = "GET_PEERS")]
    GetPeers,
    /// Local client asks for this node's own onion hostname.
    #[serde(rename = "HOSTNAME")]
    Hostname,
    /// Terminate the daemon.
    #[serde(rename = "EXIT")]
    Exit,
    /// File transfer: request an upload slot from the remote peer.
    #[serde(rename = "FILEALLOC")]
    FileAlloc,
    /// File transfer: remote side is ready to receive, asks for a port.
    #[serde(rename = "FILEUP")]
    FileUp,
    /// File transfer: carries the freshly allocated upload port.
    #[serde(rename = "FILEPORT")]
    FilePort,
    /// Reply-only: an error, explanation in `msg`.
    #[serde(rename = "ERR")]
    Err,
    /// Reply-only: acknowledgement / end of data.
    #[serde(rename = "END")]
    End,
}

impl WireCommand {
    /// Wire string for this tag, as serialized into the envelope.
    pub fn as_str(&self) -> &'static str {
        match self {
            WireCommand::Send => "SEND",
            WireCommand::Recv => "RECV",
            WireCommand::Update => "UPDATE",
            WireCommand::GetPeers => "GET_PEERS",
            WireCommand::Hostname => "HOSTNAME",
            WireCommand::Exit => "EXIT",
            WireCommand::FileAlloc => "FILEALLOC",
            WireCommand::FileUp => "FILEUP",
            WireCommand::FilePort => "FILEPORT",
            WireCommand::Err => "ERR",
            WireCommand::End => "END",
        }
    }
}

impl std::fmt::Display for WireCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an inbound envelope may ask the dispatcher to do.
///
/// `Err` and `End` are reply-only tags and never decode into a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientRequest {
    /// Relay a message to a remote peer.
    Send,
    /// Store an inbound message from a remote peer.
    ReceivePush,
    /// Dequeue the oldest unread message for the peer named in the payload.
    UpdatePoll,
    /// Enumerate peers with stored messages.
    ListPeers,
    /// Report this node's own hostname.
    Hostname,
    /// Acknowledge and terminate the process.
    Exit,
    /// File transfer step 1: forward an upload-slot request.
    FileAllocRequest,
    /// File transfer step 2: allocate a local port and tell the peer.
    FileUploadReady,
    /// File transfer step 3: store the assigned port for the local client.
    FilePortAssigned,
}

impl TryFrom<WireCommand> for ClientRequest {
    type Error = EnvelopeError;

    fn try_from(cmd: WireCommand) -> Result<Self, Self::Error> {
        match cmd {
            WireCommand::Send => Ok(ClientRequest::Send),
            WireCommand::Recv => Ok(ClientRequest::ReceivePush),
            WireCommand::Update => Ok(ClientRequest::UpdatePoll),
            WireCommand::GetPeers => Ok(ClientRequest::ListPeers),
            WireCommand::Hostname => Ok(ClientRequest::Hostname),
            WireCommand::Exit => Ok(ClientRequest::Exit),
            WireCommand::FileAlloc => Ok(ClientRequest::FileAllocRequest),
            WireCommand::FileUp => Ok(ClientRequest::FileUploadReady),
            WireCommand::FilePort => Ok(ClientRequest::FilePortAssigned),
            WireCommand::Err | WireCommand::End => {
                Err(EnvelopeError::ReplyOnlyCommand(cmd.as_str()))
            }
        }
    }
}

impl ClientRequest {
    /// The tag written into the envelope when this request is relayed onward.
    ///
    /// Only the relaying requests have an outbound form; queries are answered
    /// locally and return `None`.
    pub fn outbound_tag(&self) -> Option<WireCommand> {
        match self {
            ClientRequest::Send => Some(WireCommand::Recv),
            ClientRequest::FileAllocRequest => Some(WireCommand::FileUp),
            ClientRequest::FileUploadReady => Some(WireCommand::FilePort),
            _ => None,
        }
    }

    /// Whether handling this request involves an outbound SOCKS relay.
    pub fn is_relay(&self) -> bool {
        self.outbound_tag().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_only_tags_rejected_as_input() {
        assert!(ClientRequest::try_from(WireCommand::Err).is_err());
        assert!(ClientRequest::try_from(WireCommand::End).is_err());
    }

    #[test]
    fn test_send_becomes_recv_on_the_wire() {
        let req = ClientRequest::try_from(WireCommand::Send).unwrap();
        assert_eq!(req.outbound_tag(), Some(WireCommand::Recv));
    }

    #[test]
    fn test_file_transfer_progression() {
        assert_eq!(
            ClientRequest::FileAllocRequest.outbound_tag(),
            Some(WireCommand::FileUp)
        );
        assert_eq!(
            ClientRequest::FileUploadReady.outbound_tag(),
            Some(WireCommand::FilePort)
        );
        // The port announcement is consumed where it lands.
        assert_eq!(ClientRequest::FilePortAssigned.outbound_tag(), None);
    }

    #[test]
    fn test_queries_have_no_outbound_form() {
        assert!(!ClientRequest::UpdatePoll.is_relay());
        assert!(!ClientRequest::ListPeers.is_relay());
        assert!(!ClientRequest::Exit.is_relay());
        assert!(!ClientRequest::FilePortAssigned.is_relay());
    }

    #[test]
    fn test_wire_serialization_uses_upper_case_tags() {
        let json = serde_json::to_string(&WireCommand::GetPeers).unwrap();
        assert_eq!(json, "\"GET_PEERS\"");
        let back: WireCommand = serde_json::from_str("\"FILEALLOC\"").unwrap();
        assert_eq!(back, WireCommand::FileAlloc);
    }
}
