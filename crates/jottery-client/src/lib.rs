//! # jottery-client
//!
//! The Jottery client engine, shared by the terminal and browser shells:
//!
//! - [`Session`]: initialize / unlock / lock / wipe, password
//!   verification, pending-import completion
//! - [`NoteService`]: encrypt-on-write, decrypt-on-read note operations
//! - [`SyncEngine`]: registration, credential portability, bidirectional
//!   push/pull with Last-Write-Wins merging
//! - [`drivers`]: message-driven auto-lock and auto-sync loops
//!
//! The shells own presentation only; every state transition lives here.

pub mod drivers;
pub mod service;
pub mod session;
pub mod sync;
pub mod tags;

pub use service::{CreateNote, NoteService, UpdateNote};
pub use session::Session;
pub use sync::{SyncEngine, SyncOutcome};
