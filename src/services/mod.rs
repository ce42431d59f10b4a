pub mod broker;
pub mod dispatcher;
pub mod event_parser;
