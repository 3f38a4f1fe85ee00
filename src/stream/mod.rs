//! Stream-level contracts between the pool, the codec layer and callers.
//!
//! # Data Flow
//! ```text
//! Caller → ConnectionPool::new_stream(ctx, receiver, PoolEventListener)
//!     → StreamClient::new_stream (codec opens a substream)
//!     → StreamSender handed back via PoolEventListener::on_ready
//!
//! Codec → StreamEventListener (reset, destroy) → pool reducers
//! ```

pub mod client;
pub mod types;

pub use client::{ConnectionStats, Stream, StreamClient, StreamClientFactory, StreamSender};
pub use types::{
    PoolEventListener, PoolFailureReason, Protocol, StreamConnectionEventListener, StreamContext,
    StreamEventListener, StreamReceiveListener, StreamResetReason, SubProtocol,
};
