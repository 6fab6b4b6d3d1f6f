use clap::Parser;
use cli::{Cli, Command};

mod cli;
mod messages;
mod metrics;
mod room;
mod server;
mod session;
mod texts;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();

    let args = Cli::parse();

    match args.cmd {
        Command::Http { address } => {
            let registry = room::RoomRegistry::new();
            server::run(address, registry).await
        }
    }
}
