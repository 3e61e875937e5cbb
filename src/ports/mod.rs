mod registry;

pub use registry::{PortAllocation, PortError, PortRegistry, MAX_PORT, MIN_PORT};
