pub mod config;
pub mod crawl;
pub mod db;
pub mod enrich;
pub mod errors;
pub mod generation;
pub mod llm_client;
pub mod models;
pub mod parsing;
pub mod progress;
pub mod retrieval;
pub mod routes;
pub mod skills;
pub mod state;
pub mod storage;
