mod manager;

pub use manager::{DockerError, DockerManager, HELPER_IMAGE};
