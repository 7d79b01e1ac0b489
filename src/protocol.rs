//! Wire format, state definitions and transcript handling.

pub mod framing;
pub mod message;
pub mod state;
pub mod transcript;
