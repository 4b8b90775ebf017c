//! Sage binary entry point

use std::{
    io::Write,
    sync::Arc,
    time::Duration,
};

use color_eyre::Result;
use tokio_util::sync::CancellationToken;

use sage::{
    cli::{Cli, Commands},
    config::GlobalConfig,
    conversation::{run_turn, Conversation},
    messages::Role,
    services::{BackendClient, ChatService},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Install error handler
    color_eyre::install()?;

    // Pick up SAGE_BASE_URL and friends from a local .env if present
    dotenv::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Resolve configuration: file, then env, then CLI flags
    let mut config = GlobalConfig::load()?;
    if let Some(base_url) = cli.base_url.clone() {
        config.base_url = base_url;
    }
    if cli.verbose {
        config.verbose = true;
    }

    // Set up logging
    if config.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("sage=debug")
            .with_writer(std::io::stderr)
            .init();
    }

    let client = Arc::new(BackendClient::new(
        config.base_url.clone(),
        Duration::from_secs(config.request_timeout_secs),
    )?);

    // Handle commands
    match cli.command {
        Some(Commands::Query { query, session }) => {
            run_query(client, &config, &query, session).await?;
        }
        Some(Commands::History { session_id }) => {
            print_history(client.as_ref(), &session_id).await?;
        }
        Some(Commands::Version) => {
            println!("sage version {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Repl) | None => {
            sage::tui::run(client, Conversation::new()).await?;
        }
    }

    Ok(())
}

/// One-shot query: stream the reply to stdout as it arrives
async fn run_query(
    client: Arc<BackendClient>,
    config: &GlobalConfig,
    query: &str,
    session: Option<String>,
) -> Result<()> {
    let conversation = match session {
        Some(id) => Conversation::with_session(id),
        None => Conversation::new(),
    };

    let final_state = if config.stream {
        let mut rendered = String::new();
        let conv = run_turn(
            client.as_ref(),
            &conversation,
            query,
            CancellationToken::new(),
            move |snapshot| {
                let Some(last) = snapshot.messages().last() else {
                    return;
                };
                if last.role != Role::Assistant || last.is_pending() {
                    return;
                }
                if let Some(suffix) = last.content.strip_prefix(rendered.as_str()) {
                    print!("{suffix}");
                } else {
                    // Terminal replacement diverged from the streamed text.
                    print!("\n{}", last.content);
                }
                rendered = last.content.clone();
                let _ = std::io::stdout().flush();
            },
        )
        .await?;
        println!();
        conv
    } else {
        let response = client.send_chat(query.trim(), conversation.session_id()).await?;
        println!("{}", response.message.content);
        conversation.apply_response(&response)
    };

    if let Some(session_id) = final_state.session_id() {
        eprintln!("(session {session_id})");
    }

    Ok(())
}

/// Print a stored session transcript
async fn print_history(client: &BackendClient, session_id: &str) -> Result<()> {
    let info = client.chat_history(session_id).await?;

    println!("Session {} (created {})", info.session_id, info.created_at);
    for message in &info.messages {
        let who = match message.role {
            Role::User => "You",
            Role::Assistant => "Assistant",
        };
        println!("[{}] {}: {}", message.timestamp, who, message.content);
    }

    Ok(())
}
