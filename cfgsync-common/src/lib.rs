// cfgsync-common - Shared protocol types for cfgsync
//
// This crate holds the RESP value model, its reader/writer, and the
// lifecycle state shared by every long-lived client.

pub mod error;
pub mod resp;
pub mod state;

// Re-export for convenience
pub use error::*;
pub use resp::*;
pub use state::*;
