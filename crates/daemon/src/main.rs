mod cli;

use clap::{Parser, Subcommand};
use cli::{args::Args, op::Op, Keygen, Serve, Version};

command_enum! {
    (Keygen, Keygen),
    (Serve, Serve),
    (Version, Version),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let ctx = cli::op::OpContext::new(args.config_path);

    match args.command.execute(&ctx).await {
        Ok(output) => {
            println!("{}", output);
            std::process::exit(0);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
