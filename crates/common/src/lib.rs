pub mod actors;
pub mod events;
pub mod logger;
pub mod models;
