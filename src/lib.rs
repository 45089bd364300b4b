//! # scene-link
//!
//! Local command bridge for a content-creation host.
//!
//! A long-lived socket server accepts newline-framed JSON commands,
//! normalizes the two accepted record shapes, checks an optional shared
//! token and executes each command against the host through a single
//! serial worker. A thin HTTP relay translates one POST into one socket
//! exchange for callers that cannot hold a socket open.
//!
//! ## Architecture
//!
//! ```text
//! HTTP callers                      Native socket clients
//!     │                                     │
//!     ├── Relay (relay/)                    │
//!     │     └── RelayClient ── one frame ──►│
//!     │                                     │
//!     └──────────────► ConnectionServer (server/)
//!                           │  per-connection task
//!                           ├── FrameReader / WireResponse (protocol/)
//!                           ├── normalize + AuthGate (protocol/)
//!                           │
//!                           ├── HostWorker (dispatch/), one thread
//!                           ├── Dispatcher (dispatch/)
//!                           │
//!                           └── HostCapability (host/)
//! ```

pub mod app_state;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod host;
pub mod protocol;
pub mod relay;
pub mod server;
