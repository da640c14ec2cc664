pub mod coordinator;
pub mod probe;
pub mod registry;
pub mod relay;

pub use coordinator::CoordinatorHandle;
pub use probe::{probe_once, spawn_probe_task};
pub use registry::{AgentRegistry, RegisterResult};
pub use relay::{RelayConfig, RelayHandle, RelayTarget};
