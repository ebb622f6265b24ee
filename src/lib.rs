//! Transactional email dispatch with open/click tracking, an encrypted
//! credential vault, and SMTP/IMAP connectivity probing.

pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod probe;
pub mod serve;
pub mod tracking;
pub mod vault;

pub use config::Config;
pub use error::Error;
pub use serve::serve;
