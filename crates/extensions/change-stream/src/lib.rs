//! CaaS change stream for the preview bridge.
//!
//! In CaaS mode the preview must not rerender before the content service
//! holds the new document. This crate subscribes to the CRUD change stream
//! of the preview collection and lets callers wait for a document to be
//! inserted or replaced.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐  securetoken   ┌──────────────────┐
//! │ ChangeStream     │ ─────────────► │  CaaS REST API   │
//! │ Adapter          │     HTTP       │                  │
//! │  (this crate)    │ ◄────────────► │  _streams/crud   │
//! └──────────────────┘   WebSocket    └──────────────────┘
//! ```
//!
//! - [`CaasEndpoints`] derives every URL from the preview collection URL
//! - [`ChangeSocket`] keeps the socket alive across reconnects
//! - [`PendingWaits`] matches inbound change events to waiting callers
//! - [`ChangeStreamAdapter`] ties them together behind
//!   [`DocumentWaiter`](snap_protocols::DocumentWaiter)
//!
//! ## Usage
//!
//! ```rust,ignore
//! let caas = config.caas.as_ref().context("CaaS not configured")?;
//! let locales = Arc::new(preview.actions().clone());
//! let adapter = ChangeStreamAdapter::connect(caas, locales)?;
//! preview.enable_caas_mode(Arc::new(adapter));
//! ```

mod adapter;
mod endpoints;
mod locales;
mod probe;
mod registry;
mod socket;
mod token;

pub use adapter::ChangeStreamAdapter;
pub use endpoints::CaasEndpoints;
pub use locales::{document_id_for, StaticLocales};
pub use probe::{DocumentProbe, HttpProbe};
pub use registry::{ChangeEvent, ChangeType, DocumentKey, PendingWaits, UPDATE_CHANGE_TYPES};
pub use socket::{ChangeSocket, SocketSettings};
pub use token::{authorization_header, fetch_secure_token};
