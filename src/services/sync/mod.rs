pub mod client;

pub use client::HttpSynchronizer;
