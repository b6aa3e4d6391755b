//! # Snap Core
//!
//! Runtime of the preview bridge: everything between the embedding page and
//! the host frame.
//!
//! ## Components
//!
//! - [`EventBus`] - ordered publish/subscribe with sequential async handlers
//! - [`Messenger`] - correlated request/response over a [`FrameTransport`]
//! - [`Actions`] - typed remote operations, the [`StatusCache`] and
//!   project info
//! - [`dom`] - the document model and its mutation observer
//! - [`DecorationController`] - overlay borders and buttons per annotated node
//! - [`dnd`] - drag-and-drop of sections and nested components
//! - [`Preview`] - the facade wiring it all together
//!
//! [`FrameTransport`]: snap_protocols::FrameTransport

pub mod actions;
pub mod decoration;
pub mod dnd;
pub mod dom;
pub mod events;
pub mod messenger;
pub mod preview;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use actions::{Actions, StatusCache};
pub use decoration::{Button, ButtonRegistry, ButtonScope, DecorationController};
pub use dom::{Document, DomObserver, NodeId};
pub use events::{EventArgs, EventBus, SubscriptionId};
pub use messenger::{HandshakeState, Messenger, SendOptions};
pub use preview::{ContentChange, ListenerKind, Preview};
