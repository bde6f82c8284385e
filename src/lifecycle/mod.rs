//! Model lifecycle state machine.
//!
//! ```text
//!  Unloaded ──load──▶ Preparing ──ok──▶ Ready ◀──────────┐
//!     ▲                   │               │ generate      │ ok / failed
//!     │                   └─fail─▶ Error  ▼               │
//!     │                          (load retries)  Generating ┘
//!     └──────────────── unload ────────── Ready
//! ```
//!
//! Admission (reject-fast and the `Preparing` transition) happens on the
//! caller side under the state lock; everything that touches the engine
//! happens on the worker.

mod controller;
mod request;
mod state;

pub use controller::{LoadSettings, ALREADY_LOADED_MESSAGE, LOADED_MESSAGE, UNLOADED_MESSAGE};
pub use state::LifecycleState;

pub(crate) use controller::LifecycleController;
pub(crate) use request::LifecycleRequest;
pub(crate) use state::{LoadAdmission, SharedState};
