pub mod chat;
pub mod errors;
pub mod processor;
pub mod prompt;
pub mod providers;
pub mod session;
pub mod tool;
pub mod tools;
