//! # Snap Protocols
//!
//! Protocol definitions shared by every layer of the preview bridge.
//! Contains only types, constants and interface definitions - no behaviour
//! that needs a runtime.
//!
//! ## Contents
//!
//! - [`consts`] - namespace, endpoint, attribute names and the event vocabulary
//! - [`Action`] - the closed set of remote operations understood by the host
//! - [`OutboundMessage`] / [`InboundMessage`] - the namespaced frame envelope
//! - [`ElementStatus`] / [`PreviewId`] - element metadata and its key
//! - [`FrameTransport`] / [`HostWindow`] - seams to the embedding environment
//! - [`DocumentWaiter`] / [`LocaleLookup`] - seams to the CaaS change stream
//! - [`error`] - the error taxonomy

pub mod action;
pub mod caas;
pub mod consts;
pub mod error;
pub mod message;
pub mod status;
pub mod transport;

pub use action::Action;
pub use caas::{DocumentWaiter, LocaleEntry, LocaleLookup};
pub use consts::BridgeEvent;
pub use error::{
    ActionError, BridgeError, ButtonError, ChangeStreamError, MessengerError, TransportError,
};
pub use message::{
    parse_if_json, validate_response, ExecuteTarget, HandshakeReceipt, InboundMessage,
    MessageType, OutboundMessage,
};
pub use status::{ElementStatus, PreviewId, StatusState};
pub use transport::{FrameTransport, HostWindow, WindowMessage};
