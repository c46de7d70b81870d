pub mod cancel;
pub mod error;
pub mod logger;
pub mod monitor;
pub mod prompt;
pub mod retry;
pub mod validation;
