pub mod chat;
pub mod events;
pub mod history;
pub mod images;
pub mod session;
