pub mod archive;
pub mod config;
pub mod crowdin;
pub mod generator;
pub mod installer;
pub mod pipeline;
pub mod retry;
pub mod scanner;
pub mod toolchain;
