pub mod doc;
pub mod handlers;
pub mod pulse_handlers;
pub mod routes;
pub mod state;
