//! The call worker.
//!
//! One worker process handles one call: it picks a script for the room,
//! joins it, greets the caller, forwards captured leads and viewing bookings
//! to the backend, and tears the session down when the caller leaves or goes
//! quiet.
//!
//! The session logic is split in two. [`session::CallSession`] is a pure
//! transition table from named events to actions; [`controller::CallController`]
//! owns the timers and the room link and carries those actions out.

pub mod booking;
pub mod bridge;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod prompt;
pub mod router;
pub mod session;
pub mod worker;

pub use controller::{CallController, SessionOutcome, ShutdownHandle};
pub use router::{route, GreetingPolicy, ProviderConfig, Script, ScriptKind};
pub use session::{Action, CallSession, EndReason, SessionEvent, SessionSettings};
pub use worker::{JobAcceptance, WorkerContext};
