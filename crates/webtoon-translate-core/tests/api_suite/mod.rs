pub mod batch;
pub mod common;
pub mod erase;
pub mod system;
pub mod translate;
pub mod upload;
