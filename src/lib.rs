mod config;
pub use config::*;

mod firmware;
pub use firmware::*;

pub mod exploits;
pub mod listener;
pub mod payload;

pub mod logger;
