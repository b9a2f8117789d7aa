pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod invoice_cache;
pub mod lnurl;
pub mod model;
pub mod ratelimit;
pub mod session;
pub mod wallet;

#[cfg(test)]
mod fixture;
