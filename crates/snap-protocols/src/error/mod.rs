//! Error types for the preview bridge protocol layer.

mod action;
mod bridge;
mod button;
mod change_stream;
mod messenger;
mod transport;

pub use action::*;
pub use bridge::*;
pub use button::*;
pub use change_stream::*;
pub use messenger::*;
pub use transport::*;
