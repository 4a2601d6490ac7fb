// src/connectors/mod.rs

pub mod fixture;
pub mod llama;

pub use fixture::FixtureSource;
pub use llama::DefiLlamaClient;
