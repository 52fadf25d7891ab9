pub mod server;

use crate::cli::globals::ServerConfig;

#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        dsn: String,
        settings: ServerConfig,
    },
}
