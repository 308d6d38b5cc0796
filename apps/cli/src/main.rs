mod commands;
mod render;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    session::Action, ClientError, FileCredentialStore, RelayClient, SessionController,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::commands::{parse_line, ReplCommand, HELP};

type Controller = SessionController<RelayClient, FileCredentialStore>;

#[derive(Parser, Debug)]
#[command(about = "Terminal console for a chat bot account, through the relay")]
struct Args {
    #[arg(long, env = "RELAY_URL", default_value = "http://127.0.0.1:8787")]
    relay_url: String,
    /// Where the bot token is remembered between runs.
    #[arg(long)]
    credential_file: Option<PathBuf>,
    /// Sign in with this token instead of the stored one.
    #[arg(long, env = "BOT_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

fn default_credential_file() -> Result<PathBuf> {
    let base = dirs::config_dir().context("unable to resolve the user config directory")?;
    Ok(base.join("bot_console").join("token"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let credential_file = match args.credential_file {
        Some(path) => path,
        None => default_credential_file()?,
    };
    info!(relay = %args.relay_url, credential_file = %credential_file.display(), "starting");

    let mut controller = SessionController::new(
        RelayClient::new(args.relay_url),
        FileCredentialStore::new(credential_file),
    );

    let signed_in = match args.token {
        Some(token) => controller.login(&token).await.map(|_| true),
        None => controller.resume().await,
    };
    match signed_in {
        Ok(true) => print_overview(&controller),
        Ok(false) => println!("not signed in; use /login <token>"),
        Err(err) => println!("sign-in failed: {err}"),
    }
    println!("type /help for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };
        if command == ReplCommand::Quit {
            break;
        }
        if let Err(err) = run_command(&mut controller, command).await {
            warn!(error = %err, "command failed");
            println!("error: {err}");
        }
    }
    Ok(())
}

async fn run_command(controller: &mut Controller, command: ReplCommand) -> Result<(), ClientError> {
    match command {
        ReplCommand::Help => println!("{HELP}"),
        ReplCommand::Login(token) => {
            controller.login(&token).await?;
            print_overview(controller);
        }
        ReplCommand::Logout => {
            controller.dispatch(Action::Logout).await?;
            println!("{}", render::status_line(controller.state()));
        }
        ReplCommand::Status => println!("{}", render::status_line(controller.state())),
        ReplCommand::Guilds => println!("{}", render::guilds(controller.state())),
        ReplCommand::Guild(guild_id) => {
            controller.dispatch(Action::SelectGuild(guild_id)).await?;
            print_overview(controller);
        }
        ReplCommand::Dms => println!("{}", render::direct_channels(controller.state())),
        ReplCommand::Dm(channel_id) => {
            controller.dispatch(Action::SelectDirect(channel_id)).await?;
            print_selection(controller);
        }
        ReplCommand::Hub => {
            controller.dispatch(Action::OpenDirectHub).await?;
            println!("{}", render::direct_channels(controller.state()));
        }
        ReplCommand::Channels => println!("{}", render::channels(controller.state())),
        ReplCommand::Channel(channel_id) => {
            controller.dispatch(Action::SelectChannel(channel_id)).await?;
            print_selection(controller);
        }
        ReplCommand::Messages => println!("{}", render::messages(controller.state())),
        ReplCommand::Refresh => {
            controller.dispatch(Action::Refresh).await?;
            print_selection(controller);
        }
        ReplCommand::Send(text) => {
            controller.dispatch(Action::SetDraft(text)).await?;
            controller.dispatch(Action::SubmitComposer).await?;
            print_selection(controller);
        }
        ReplCommand::Quit => {}
    }

    if let Some(err) = controller.state().last_error() {
        println!("last error: {err}");
    }
    Ok(())
}

fn print_overview(controller: &Controller) {
    let state = controller.state();
    println!("{}", render::status_line(state));
    if state.selected_guild().is_some() {
        println!("{}", render::channels(state));
    }
    if state.selected_channel_id().is_some() {
        println!("{}", render::messages(state));
    }
}

fn print_selection(controller: &Controller) {
    let state = controller.state();
    println!("{}", render::status_line(state));
    println!("{}", render::messages(state));
    if !state.draft().is_empty() {
        println!("draft kept: {}", state.draft());
    }
}
