pub mod edit;
pub mod handlers;
pub mod models;
pub mod prompts;
pub mod store;
