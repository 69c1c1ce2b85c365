pub mod config;
pub mod health;
pub mod rag;
pub mod search;
