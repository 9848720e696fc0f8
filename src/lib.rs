//! A websocket middle tier between realtime clients and an Azure OpenAI
//! realtime deployment.
//!
//! The relay rewrites session configuration on the way up, and on the way
//! down it runs server-side tools that the upstream model calls, hiding the
//! function-call bookkeeping from the client.

mod error;
mod pending;
mod policy;
mod relay;
mod server;
mod tools;
mod translate;
pub mod upstream;

pub use realtime_middle_tier_types as types;

pub use error::RelayError;
pub use pending::{PendingCalls, PendingToolCall};
pub use policy::SessionPolicy;
pub use relay::{Frame, RelaySession, RelayState};
pub use server::MiddleTier;
pub use tools::{Tool, ToolArgs, ToolHandler, ToolRegistry, ToolRegistryBuilder, ToolResult, ToolResultDirection};
pub use translate::{ClientToUpstream, Translation, UpstreamToClient};
