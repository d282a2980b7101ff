pub mod ai;
pub mod config;
pub mod db;
pub mod error;
pub mod notify;
pub mod service;
pub mod session;
pub mod web;

pub use config::ConfigManager;
pub use error::{SessionError, SessionResult};
pub use service::InterviewService;
pub use web::start_web_server;
