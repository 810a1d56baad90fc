//! Protocol dispatcher.
//!
//! Interprets one decoded envelope and drives the store, the relay client
//! and the reply. The dispatcher holds no per-request state; each request is
//! handled to completion, while requests from different connections run
//! concurrently and meet only inside the mailbox lock.
//!
//! Transition table:
//!
//! | inbound        | action                                      | reply            |
//! |----------------|---------------------------------------------|------------------|
//! | `SEND`         | rewrite sender to own hostname, relay       | `END` / `ERR`    |
//! | `RECV`         | log, enqueue under sender id                | none             |
//! | `UPDATE`       | dequeue oldest for the id in the payload    | message / `END`  |
//! | `GET_PEERS`    | enumerate peer ids                          | `END` with list  |
//! | `HOSTNAME`     | report own hostname                         | `END` with name  |
//! | `EXIT`         | acknowledge, then shut the process down     | `END`            |
//! | `FILEALLOC`    | becomes `FILEUP`, destination port 80, relay| `ERR` on failure |
//! | `FILEUP`       | becomes `FILEPORT` with a fresh local port  | `ERR` on failure |
//! | `FILEPORT`     | log, enqueue under sender id                | none             |
//! | `ERR` / `END`  | ignored                                     | none             |

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use torpost_net::Relay;
use torpost_shared::constants::FILE_ALLOC_PORT;
use torpost_shared::{ClientRequest, Envelope, SocksError};
use torpost_store::{ActivityLog, Mailbox};

use crate::error::DaemonError;
use crate::upload::UploadManager;

/// Result of dispatching one request.
#[derive(Debug)]
pub struct Outcome {
    /// Reply envelope to write back, if any.
    pub reply: Option<Envelope>,
    /// Whether the daemon should terminate once the reply is written.
    pub shutdown: bool,
}

impl Outcome {
    fn reply(envelope: Envelope) -> Self {
        Self {
            reply: Some(envelope),
            shutdown: false,
        }
    }

    fn silent() -> Self {
        Self {
            reply: None,
            shutdown: false,
        }
    }
}

/// The state machine shared by all connection tasks.
pub struct Dispatcher<R: Relay> {
    hostname: String,
    mailbox: Mailbox,
    activity: ActivityLog,
    relay: Arc<R>,
    uploads: UploadManager,
}

impl<R: Relay> Dispatcher<R> {
    pub fn new(
        hostname: String,
        mailbox: Mailbox,
        activity: ActivityLog,
        relay: R,
        uploads: UploadManager,
    ) -> Self {
        Self {
            hostname,
            mailbox,
            activity,
            relay: Arc::new(relay),
            uploads,
        }
    }

    /// Handle one decoded request.
    ///
    /// Activity-log failures bubble up as errors; the caller treats them as
    /// fatal. Relay failures do not: they turn into `ERR` replies.
    pub async fn handle(&self, envelope: Envelope) -> Result<Outcome, DaemonError> {
        let request = match ClientRequest::try_from(envelope.cmd) {
            Ok(request) => request,
            Err(e) => {
                debug!(cmd = %envelope.cmd, error = %e, "Ignoring non-request envelope");
                return Ok(Outcome::silent());
            }
        };

        match request {
            ClientRequest::Send => {
                self.activity.append(&envelope.id, &envelope.msg)?;
                self.relay_outbound(request, envelope).await
            }
            ClientRequest::FileAllocRequest | ClientRequest::FileUploadReady => {
                self.relay_outbound(request, envelope).await
            }
            // An inbound FILEPORT is the last hop of the file-transfer
            // negotiation: it is delivered to the local client on its next
            // poll, never relayed onward.
            ClientRequest::ReceivePush | ClientRequest::FilePortAssigned => {
                self.activity.append(&envelope.id, &envelope.msg)?;
                self.mailbox.enqueue(
                    &envelope.id,
                    envelope.msg.clone(),
                    envelope.cmd,
                    envelope.date.clone(),
                )?;
                info!(from = %envelope.id, "Stored inbound message");
                Ok(Outcome::silent())
            }
            ClientRequest::UpdatePoll => Ok(Outcome::reply(self.poll_oldest(&envelope))),
            ClientRequest::ListPeers => {
                let mut reply = envelope.ack();
                reply.msg = self.mailbox.list_peer_ids();
                Ok(Outcome::reply(reply))
            }
            ClientRequest::Hostname => {
                let mut reply = envelope.ack();
                reply.msg = self.hostname.clone();
                Ok(Outcome::reply(reply))
            }
            ClientRequest::Exit => {
                info!("Exit requested, shutting down after ack");
                Ok(Outcome {
                    reply: Some(envelope.ack()),
                    shutdown: true,
                })
            }
        }
    }

    /// `UPDATE`: the peer whose mailbox is polled is named in the payload.
    /// An empty mailbox answers with a bare `END` ack, which keeps "nothing
    /// pending" distinguishable from a protocol error.
    fn poll_oldest(&self, envelope: &Envelope) -> Envelope {
        let peer_id = envelope.msg.trim();
        match self.mailbox.dequeue_oldest(peer_id) {
            Some(stored) => Envelope {
                cmd: stored.tag,
                id: peer_id.to_string(),
                portno: envelope.portno,
                msg: stored.content,
                date: Some(stored.date),
            },
            None => {
                let mut reply = envelope.ack();
                reply.id = peer_id.to_string();
                reply
            }
        }
    }

    /// Relay path for `SEND` and the outbound file-transfer steps.
    ///
    /// The sender id is always overwritten with our own hostname before
    /// transmission, whatever the caller put there, so the remote end records
    /// provenance correctly. The attempt runs on its own task and the reply
    /// waits on its join handle; a failed attempt is terminal and produces
    /// exactly one `ERR` reply.
    async fn relay_outbound(
        &self,
        request: ClientRequest,
        envelope: Envelope,
    ) -> Result<Outcome, DaemonError> {
        let mut outbound = envelope;
        let dest_id = outbound.id.clone();

        match request {
            ClientRequest::FileAllocRequest => {
                outbound.portno = FILE_ALLOC_PORT;
            }
            ClientRequest::FileUploadReady => {
                let port = self.uploads.allocate_port().await?;
                outbound.msg = port.to_string();
            }
            _ => {}
        }

        let Some(tag) = request.outbound_tag() else {
            error!(request = ?request, "Request without an outbound tag reached the relay path");
            return Ok(Outcome::silent());
        };
        outbound.cmd = tag;
        outbound.id = self.hostname.clone();
        let dest_port = outbound.portno;
        let payload = outbound.to_json()?;

        let relay = Arc::clone(&self.relay);
        let target = dest_id.clone();
        let handle =
            tokio::spawn(async move { relay.relay(&target, dest_port, payload).await });

        let result = match handle.await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Relay task panicked");
                Err(SocksError::Unknown)
            }
        };

        // Replies are built from the rewritten envelope, so their `id` names
        // this node, not the destination.
        match result {
            Ok(()) => {
                info!(dest = %dest_id, port = dest_port, tag = %tag, "Relay succeeded");
                // The file-transfer steps are fire-and-forward; only a plain
                // send is acknowledged to the caller.
                if request == ClientRequest::Send {
                    Ok(Outcome::reply(outbound.ack()))
                } else {
                    Ok(Outcome::silent())
                }
            }
            Err(socks_err) => {
                warn!(dest = %dest_id, error = %socks_err, "Relay failed");
                Ok(Outcome::reply(outbound.error(socks_err.to_string())))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use torpost_shared::WireCommand;

    /// Scripted relay for dispatcher tests: records every attempt and
    /// answers with a fixed result.
    struct MockRelay {
        result: Result<(), SocksError>,
        attempts: Mutex<Vec<(String, u16, Vec<u8>)>>,
    }

    impl MockRelay {
        fn succeeding() -> Self {
            Self {
                result: Ok(()),
                attempts: Mutex::new(Vec::new()),
            }
        }

        fn failing(err: SocksError) -> Self {
            Self {
                result: Err(err),
                attempts: Mutex::new(Vec::new()),
            }
        }
    }

    impl Relay for MockRelay {
        async fn relay(
            &self,
            dest_id: &str,
            dest_port: u16,
            payload: Vec<u8>,
        ) -> Result<(), SocksError> {
            self.attempts
                .lock()
                .unwrap()
                .push((dest_id.to_string(), dest_port, payload));
            self.result.clone()
        }
    }

    fn dispatcher(relay: MockRelay, dir: &std::path::Path) -> Dispatcher<MockRelay> {
        Dispatcher::new(
            "ownhost.onion".to_string(),
            Mailbox::new(),
            ActivityLog::open(dir.join("activity")).unwrap(),
            relay,
            UploadManager::new(dir.join("downloads")),
        )
    }

    fn send_request(dest: &str) -> Envelope {
        Envelope {
            cmd: WireCommand::Send,
            id: dest.into(),
            portno: 80,
            msg: "hello there".into(),
            date: None,
        }
    }

    #[tokio::test]
    async fn test_send_rewrites_sender_and_acks() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher(MockRelay::succeeding(), dir.path());

        let outcome = d.handle(send_request("dest.onion")).await.unwrap();
        let reply = outcome.reply.unwrap();
        assert_eq!(reply.cmd, WireCommand::End);
        // The ack comes from this node, not from the destination.
        assert_eq!(reply.id, "ownhost.onion");
        assert!(!outcome.shutdown);

        let attempts = d.relay.attempts.lock().unwrap();
        assert_eq!(attempts.len(), 1);
        let (dest, port, payload) = &attempts[0];
        assert_eq!(dest, "dest.onion");
        assert_eq!(*port, 80);

        let wire = Envelope::from_json(payload).unwrap();
        assert_eq!(wire.cmd, WireCommand::Recv);
        assert_eq!(wire.id, "ownhost.onion");
        assert_eq!(wire.msg, "hello there");
    }

    #[tokio::test]
    async fn test_send_failure_yields_err_with_rfc_explanation() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher(MockRelay::failing(SocksError::HostUnreachable), dir.path());

        let outcome = d.handle(send_request("dest.onion")).await.unwrap();
        let reply = outcome.reply.unwrap();
        assert_eq!(reply.cmd, WireCommand::Err);
        assert_eq!(reply.id, "ownhost.onion");
        assert_eq!(reply.msg, "Host unreachable");

        // The failed send must not leave anything stored for the peer.
        assert!(!d.mailbox.peer_exists("dest.onion"));
    }

    #[tokio::test]
    async fn test_receive_push_then_poll_then_empty_poll() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher(MockRelay::succeeding(), dir.path());

        let push = Envelope {
            cmd: WireCommand::Recv,
            id: "peerX.onion".into(),
            portno: 80,
            msg: "hello".into(),
            date: Some("2026-08-27 09:00:00".into()),
        };
        let outcome = d.handle(push).await.unwrap();
        assert!(outcome.reply.is_none());

        let poll = Envelope {
            cmd: WireCommand::Update,
            id: "client".into(),
            portno: 0,
            msg: "peerX.onion".into(),
            date: None,
        };
        let reply = d.handle(poll.clone()).await.unwrap().reply.unwrap();
        assert_eq!(reply.cmd, WireCommand::Recv);
        assert_eq!(reply.msg, "hello");
        assert_eq!(reply.date.as_deref(), Some("2026-08-27 09:00:00"));

        // Mailbox drained: the second poll is a bare ack, not an error.
        let empty = d.handle(poll).await.unwrap().reply.unwrap();
        assert_eq!(empty.cmd, WireCommand::End);
        assert!(empty.msg.is_empty());
    }

    #[tokio::test]
    async fn test_list_peers_reply() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher(MockRelay::succeeding(), dir.path());
        d.mailbox.insert_peer("a.onion");
        d.mailbox.insert_peer("b.onion");

        let req = Envelope {
            cmd: WireCommand::GetPeers,
            id: "client".into(),
            portno: 0,
            msg: String::new(),
            date: None,
        };
        let reply = d.handle(req).await.unwrap().reply.unwrap();
        assert_eq!(reply.cmd, WireCommand::End);
        let mut ids: Vec<&str> = reply.msg.split(',').collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["a.onion", "b.onion"]);
    }

    #[tokio::test]
    async fn test_hostname_reply() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher(MockRelay::succeeding(), dir.path());

        let req = Envelope {
            cmd: WireCommand::Hostname,
            id: "client".into(),
            portno: 0,
            msg: String::new(),
            date: None,
        };
        let reply = d.handle(req).await.unwrap().reply.unwrap();
        assert_eq!(reply.msg, "ownhost.onion");
    }

    #[tokio::test]
    async fn test_exit_acks_and_signals_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher(MockRelay::succeeding(), dir.path());

        let req = Envelope {
            cmd: WireCommand::Exit,
            id: "client".into(),
            portno: 0,
            msg: String::new(),
            date: None,
        };
        let outcome = d.handle(req).await.unwrap();
        assert!(outcome.shutdown);
        assert_eq!(outcome.reply.unwrap().cmd, WireCommand::End);
    }

    #[tokio::test]
    async fn test_file_alloc_forwards_as_fileup_on_port_80() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher(MockRelay::succeeding(), dir.path());

        let req = Envelope {
            cmd: WireCommand::FileAlloc,
            id: "dest.onion".into(),
            portno: 4444,
            msg: "movie.mkv".into(),
            date: None,
        };
        let outcome = d.handle(req).await.unwrap();
        // Success on a file step is silent.
        assert!(outcome.reply.is_none());

        let attempts = d.relay.attempts.lock().unwrap();
        let (_, port, payload) = &attempts[0];
        assert_eq!(*port, FILE_ALLOC_PORT);
        let wire = Envelope::from_json(payload).unwrap();
        assert_eq!(wire.cmd, WireCommand::FileUp);
        assert_eq!(wire.portno, FILE_ALLOC_PORT);
    }

    #[tokio::test]
    async fn test_fileup_allocates_a_real_port() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher(MockRelay::succeeding(), dir.path());

        let req = Envelope {
            cmd: WireCommand::FileUp,
            id: "dest.onion".into(),
            portno: 80,
            msg: String::new(),
            date: None,
        };
        d.handle(req).await.unwrap();

        let attempts = d.relay.attempts.lock().unwrap();
        let wire = Envelope::from_json(&attempts[0].2).unwrap();
        assert_eq!(wire.cmd, WireCommand::FilePort);
        let port: u16 = wire.msg.parse().unwrap();
        assert!(port > 0);
    }

    #[tokio::test]
    async fn test_inbound_fileport_is_stored_not_relayed() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher(MockRelay::succeeding(), dir.path());

        let announce = Envelope {
            cmd: WireCommand::FilePort,
            id: "peerY.onion".into(),
            portno: 80,
            msg: "40123".into(),
            date: None,
        };
        let outcome = d.handle(announce).await.unwrap();
        assert!(outcome.reply.is_none());
        // Terminal hop: nothing goes back out over the proxy.
        assert!(d.relay.attempts.lock().unwrap().is_empty());

        let poll = Envelope {
            cmd: WireCommand::Update,
            id: "client".into(),
            portno: 0,
            msg: "peerY.onion".into(),
            date: None,
        };
        let reply = d.handle(poll).await.unwrap().reply.unwrap();
        assert_eq!(reply.cmd, WireCommand::FilePort);
        assert_eq!(reply.msg, "40123");
    }

    #[tokio::test]
    async fn test_reply_only_tags_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher(MockRelay::succeeding(), dir.path());

        for cmd in [WireCommand::Err, WireCommand::End] {
            let req = Envelope {
                cmd,
                id: "client".into(),
                portno: 0,
                msg: String::new(),
                date: None,
            };
            let outcome = d.handle(req).await.unwrap();
            assert!(outcome.reply.is_none());
            assert!(!outcome.shutdown);
        }
    }
}
