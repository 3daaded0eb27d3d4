//! noderpc-core: node health, rotation and failover dispatch for NodeRPC.
//!
//! # Overview
//!
//! NodeRPC keeps serving JSON-RPC calls while individual nodes of a pool are
//! slow, rate limiting, down, or running an older API surface. The core crate
//! defines:
//!
//! - [`Node`]: one endpoint with self-healing ban/unavailability flags and
//!   a one-way API downgrade
//! - [`NodeRing`]: round-robin rotation that skips unhealthy nodes and
//!   resets the whole ring when nothing works
//! - [`Dispatcher`]: sequential failover and concurrent racing strategies
//! - [`Transport`]: the async trait every transport implements
//! - [`classify`]: turns raw answers into [`Outcome`]s
//! - [`Clock`] / [`CapabilityRegistry`]: injected time and capability state

pub mod capability;
pub mod classify;
pub mod clock;
pub mod dispatch;
pub mod error;
pub mod node;
pub mod request;
pub mod ring;
pub mod transport;

pub use capability::CapabilityRegistry;
pub use classify::{classify, Outcome};
pub use clock::{Clock, ManualClock, SystemClock};
pub use dispatch::{DispatchConfig, Dispatcher, RaceMode, Strategy};
pub use error::{ClientError, Penalty, RpcError, TransportError};
pub use node::{Node, NodeConfig, NodeStatus};
pub use request::{BodyBuilder, CallRequest, JsonRpcBodyBuilder, JsonRpcError, JsonRpcRequest, Reply};
pub use ring::{Candidates, NodeRing};
pub use transport::{RawResponse, Transport};
