//! CLI command implementations

pub mod ask;
pub mod chat;
pub mod doctor;
pub mod document;
pub mod history;
pub mod search;
pub mod session;
