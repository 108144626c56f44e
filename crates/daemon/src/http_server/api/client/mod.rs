mod client;
mod error;

pub use client::HttpDirectory;
pub use error::HttpDirectoryError;
