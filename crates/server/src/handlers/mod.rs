//! HTTP request handlers.

pub mod common;
pub mod health;
pub mod hooks;
pub mod install;
pub mod scripts;

pub use common::*;
pub use health::*;
pub use hooks::*;
pub use install::*;
pub use scripts::*;
