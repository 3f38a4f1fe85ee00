//! Transport layer contracts.
//!
//! # Data Flow
//! ```text
//! Host::create_connection
//!     → connection.rs (Connection handle, unique ConnectionId)
//!     → connect() handshake
//!     → ConnectionEvent fan-out to registered listeners
//!
//! Connection Events:
//!     Connected → ReadTimeout* → LocalClose | RemoteClose
//!     ConnectTimeout | ConnectFailed (handshake never completed)
//! ```
//!
//! # Design Decisions
//! - The transport itself is an external collaborator; only its contract lives here
//! - A connection is exclusively owned by one pool client
//! - Events are delivered synchronously to listeners

pub mod connection;

pub use connection::{
    CloseType, Connection, ConnectionEvent, ConnectionEventListener, ConnectionId, TransportError,
};
