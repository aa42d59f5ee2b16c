pub mod bridge;
pub mod commands;
pub mod config;
pub mod core;
pub mod embedded;
pub mod error;
pub mod events;
pub mod hosted;
pub mod initialization;
pub mod opener;
pub mod resilience;
pub mod runtime;
pub mod token_store;

pub use bridge::{BridgeRuntime, HostBridge};
pub use config::{resolve_base_url, BridgeConfig};
pub use crate::core::{user_agent, DATA_DIR};
pub use embedded::{EmbeddedHost, EmbeddedRuntime, InProcessHost};
pub use error::{BridgeError, Result, StorageError};
pub use events::{
    AgentDonePayload, AgentStreamPayload, BridgeEvent, EventHandler, HandlerRegistry, Unlisten,
};
pub use hosted::HostedRuntime;
pub use initialization::{init_tracing_subsystem, load_dotenv};
pub use runtime::{install_embedded_host, is_embedded_runtime, runtime_mode, RuntimeMode};
pub use token_store::{FileTokenStorage, MemoryTokenStorage, TokenStorage, TokenStore};
