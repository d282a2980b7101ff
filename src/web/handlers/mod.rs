// src/web/handlers/mod.rs

pub mod candidate_handlers;
pub mod interview_handlers;
pub mod system_handlers;

pub use candidate_handlers::*;
pub use interview_handlers::*;
pub use system_handlers::*;
