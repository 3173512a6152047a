//! Chrome DevTools Protocol client
//!
//! Just enough CDP to drive one page: target management, navigation,
//! screenshots, mouse input and `Runtime` evaluation.

pub mod connection;
pub mod transport;
pub mod types;

pub use connection::{Connection, Session};
pub use transport::Transport;
