//! Gateway protocol
//!
//! The event vocabulary exchanged with sources and viewers, and the
//! dispatcher that binds it to the registry and the relay.
//!
//! | Event               | Direction            | Effect                         |
//! |---------------------|----------------------|--------------------------------|
//! | `register-computer` | source → server      | live registration              |
//! | `computers-updated` | server → all         | registry changed               |
//! | `pair-computer`     | viewer → server      | resolve a pairing code         |
//! | `request-stream`    | viewer → server      | open a relay session           |
//! | `start-stream`      | server → source      | begin capture for a viewer     |
//! | `stop-stream`       | both                 | close a relay session          |
//! | `webcam-frame`      | source → viewer      | relayed frame, refreshes liveness |
//! | `heartbeat`         | source → server      | refreshes liveness             |

pub mod dispatch;
pub mod message;

pub use dispatch::{Gateway, DEFAULT_OUTBOUND_CAPACITY};
pub use message::{ClientEvent, ServerEvent};
