use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(about = "Typerace server CLI.")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Http {
        #[arg(env = "TYPERACE_SERVER_ADDRESS", default_value = "0.0.0.0:3000")]
        address: std::net::SocketAddr,
    },
}
