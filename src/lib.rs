// src/lib.rs

// 1. Data Structures (The "Nouns")
pub mod models;

// 2. Interfaces (The "Contract")
pub mod traits;

// 3. Adapters (The "Plumbing")
pub mod connectors;

// 4. Local Storage (The "Memory")
pub mod cache;

// 5. Metrics and Scoring (The "Brains")
pub mod analytics;

// 6. Output (The "Face")
pub mod report;
pub mod dashboard;

pub mod config;
