pub mod broker;
pub mod config;
pub mod error;
pub mod queue;
pub mod registry;
pub mod session;
pub mod timer;

pub use broker::EventBroker;
pub use config::SessionConfig;
pub use error::SessionError;
pub use queue::{RequestQueue, notice_for};
pub use registry::SignerRegistry;
pub use session::{CLEAR_DEFER, SignerSession};
