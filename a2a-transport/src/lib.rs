//! Wire framing and delivery for the A2A coordination fabric.
//!
//! A general wire protocol and peer-discovery layer are out of scope here — the same way the
//! teacher's own network crate ships a stubbed `NetworkManager` rather than a production P2P
//! stack. What this crate *does* own is the JSON-RPC 2.0 envelope every message on the wire uses
//! and a narrow `Transport` trait the consensus, SMR, and voting layers send through, with an
//! in-memory reference implementation for single-process clusters and tests.

mod error;
mod frame;
mod inmemory;
mod transport;

pub use error::{ErrorCode, TransportError};
pub use frame::{JsonRpcError, JsonRpcOutcome, JsonRpcRequest, JsonRpcResponse, JsonRpcVersion, Priority, Target};
pub use inmemory::InMemoryTransport;
pub use transport::{DeliveryOutcome, Transport};
