//! NMEA GPS support: line assembly, sentence parsing, the receiver driver and
//! the recovery policy used by the main loop.

pub mod commands;
pub mod parser;
pub mod receiver;
pub mod recovery;
pub mod sentence;
pub mod types;

pub use receiver::Gps;
pub use recovery::RecoveryPolicy;
pub use sentence::{LineReader, SentenceKind};
pub use types::*;
