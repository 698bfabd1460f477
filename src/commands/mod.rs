pub mod account;
pub mod chat;
pub mod files;
pub mod settings;
