//! Frame relay
//!
//! Relay sessions connect one source to one viewer. The hub forwards each
//! frame a source addresses to a viewer, but only while their session is open.
//!
//! ```text
//!   [Source] ──webcam-frame{viewerId}──► RelayHub.frame()
//!                                            │ session open?
//!                                            ▼
//!                               peers[viewerId].try_send() ──► [Viewer]
//! ```
//!
//! There is no buffering and no backpressure: a viewer that cannot keep up
//! loses frames.

pub mod error;
pub mod frame;
pub mod hub;

pub use error::RelayError;
pub use frame::{FrameOutcome, RelayFrame};
pub use hub::RelayHub;
