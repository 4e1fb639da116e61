pub mod cli;
pub mod display;
pub mod index;
pub mod live;
pub mod query;
pub mod record;
pub mod server;
pub mod status;
pub mod store;
