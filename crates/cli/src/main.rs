mod commands;

use clap::Parser;
use commands::{Cli, Command, NamesCommand};
use rn_core::config::load_config;
use rn_core::logging::{init_console_logging, init_logging};
use rn_core::node::Node;
use rn_core::registry::serve_name_server;
use rn_core::shutdown::install_shutdown_handler;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let registry_url = cli.registry_url();

    match cli.command {
        Command::Serve(args) => {
            let config = args.apply(
                load_config(args.config.as_deref())?,
                cli.registry.as_deref(),
            );
            let _guard = init_logging(&config.log_file)?;

            let shutdown = install_shutdown_handler();
            let node = Node::new(config)?;
            node.serve(shutdown).await?;
        }
        Command::Names(NamesCommand::Serve { listen }) => {
            init_console_logging()?;
            let listener = TcpListener::bind(listen).await?;
            serve_name_server(listener, install_shutdown_handler()).await?;
        }
        Command::Names(NamesCommand::List) => {
            init_console_logging()?;
            commands::list_names(&registry_url).await?;
        }
        Command::Series { count } => {
            println!("{}", rn_protocol::series_from_count(count));
        }
        command => {
            init_console_logging()?;
            commands::call_worker(&registry_url, command).await?;
        }
    }

    Ok(())
}
