// Library root: configuration, upstream HTTP transport and the HTTP API,
// exposed so integration tests can assemble the service in-process.

pub mod config;
pub mod server;
pub mod upstream;
