//! Wire protocol: framing, command normalization, authorization and the
//! response record shared by the connection server and the relay.

pub mod auth;
pub mod command;
pub mod frame;
pub mod response;

pub use auth::AuthGate;
pub use command::{Command, CommandBody, Verb, decode_record, normalize};
pub use frame::{FrameReader, encode_frame, write_frame};
pub use response::{FailureKind, WireResponse};
