//! Capability provider protocol
//!
//! Providers are local processes speaking JSON-RPC 2.0 over line-delimited stdio.
//!
//! - **Stdio client**: `stdio_client.rs` - process spawn and request/response matching
//! - **Session**: `session.rs` - handshake, tool listing and tool invocation
//! - **Types**: `types.rs` - tool catalog entries and result decoding

pub mod session;
pub mod stdio_client;
pub mod types;

pub use session::{LaunchSpec, McpStdioSession, ProviderSession};
pub use stdio_client::StdioClient;
pub use types::Tool;
