pub mod client;
pub mod companion;
pub mod config;
pub mod error;
pub mod logger;
pub mod rpc;
pub mod scenario;
#[cfg(test)]
pub mod tests;
