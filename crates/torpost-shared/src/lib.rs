// Wire protocol types shared by the daemon, store and relay client.

pub mod command;
pub mod constants;
pub mod envelope;
pub mod error;

pub use command::{ClientRequest, WireCommand};
pub use envelope::Envelope;
pub use error::{EnvelopeError, SocksError};
