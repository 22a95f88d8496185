pub mod events;
pub mod hub;
pub mod registry;
pub mod responder;
pub mod server;
