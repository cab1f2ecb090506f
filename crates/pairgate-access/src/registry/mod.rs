//! Registry of game servers sharing the whitelist store.

mod heartbeat;
mod servers;

pub use heartbeat::spawn_heartbeat_task;
pub use servers::ServerRegistry;
