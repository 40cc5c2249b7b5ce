//! Repository traits for metadata operations.

pub mod scripts;
pub mod users;

pub use scripts::ScriptRepo;
pub use users::UserRepo;
