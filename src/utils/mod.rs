pub mod file;
pub mod instance_lock;
pub mod paths;
