pub mod base;
pub mod configs;
pub mod mock;
pub mod models;
pub mod openai;
pub mod types;
pub mod utils;
