#[macro_use]
pub mod exception;
pub mod asset;
pub mod fs;
pub mod json;
#[macro_use]
pub mod log;
pub mod shutdown;
pub mod task;
