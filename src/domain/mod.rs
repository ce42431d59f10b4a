pub mod error;
pub mod event;
pub mod id;
pub mod outbox;
pub mod vulndb;
