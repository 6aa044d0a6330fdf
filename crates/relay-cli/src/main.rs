//! Relay CLI - command-line interface for blueprint automations.
//!
//! Reuses the same core engine (relay-core) and server bootstrap
//! (relay-server) as the HTTP API.

use clap::{Parser, Subcommand};

use relay_cli::commands;

/// Relay CLI - run API-integration blueprints
#[derive(Parser)]
#[command(name = "relay", version, about = "Relay CLI - run API-integration blueprints")]
pub struct Cli {
    /// Path to the SQLite database file
    #[arg(long, env = "RELAY_DB_PATH", default_value = "relay.db")]
    db: String,

    /// JSON file of platform configs that take precedence over discovery
    #[arg(long, env = "RELAY_PLATFORM_CATALOG")]
    platform_catalog: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Invoke an automation and print the outcome
    Run {
        #[arg(long)]
        automation_id: String,
        #[arg(long)]
        user_id: String,
        /// Trigger data as a JSON string
        #[arg(long)]
        trigger: Option<String>,
    },

    /// Show a run's status, result and progress
    RunStatus {
        /// Run ID
        run_id: String,
    },

    /// Manage automations
    Automation {
        #[command(subcommand)]
        action: AutomationAction,
    },

    /// Manage platform credentials
    Credential {
        #[command(subcommand)]
        action: CredentialAction,
    },

    /// Manage LLM agents
    Agent {
        #[command(subcommand)]
        action: AgentAction,
    },

    /// Start the Relay HTTP server
    Server {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Port to listen on
        #[arg(long, default_value_t = 3220)]
        port: u16,
    },
}

#[derive(Subcommand)]
enum AutomationAction {
    /// Import a blueprint JSON file as an automation
    Import {
        file: String,
        #[arg(long)]
        user_id: String,
        /// Automation name (defaults to the file stem)
        #[arg(long)]
        name: Option<String>,
        /// Automation ID (generated when omitted)
        #[arg(long)]
        id: Option<String>,
    },
    /// Validate a blueprint JSON file without storing it
    Validate { file: String },
    /// List a user's automations
    List {
        #[arg(long)]
        user_id: String,
    },
}

#[derive(Subcommand)]
enum CredentialAction {
    /// Store credentials for one platform
    Add {
        #[arg(long)]
        automation_id: String,
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        platform: String,
        /// Credential fields as a JSON object, e.g. '{"access_token":"..."}'
        #[arg(long)]
        data: String,
    },
}

#[derive(Subcommand)]
enum AgentAction {
    /// Register an agent for `ai_agent_call` steps
    Add {
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        name: String,
        /// System rules sent with every prompt
        #[arg(long, default_value = "")]
        rules: String,
        #[arg(long, env = "OPENAI_API_KEY")]
        api_key: String,
        #[arg(long, default_value = "gpt-4o-mini")]
        model: String,
        #[arg(long, default_value = "openai")]
        provider: String,
        /// Agent ID (generated when omitted)
        #[arg(long)]
        id: Option<String>,
    },
    /// List a user's agents
    List {
        #[arg(long)]
        user_id: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relay_core=warn,relay_server=warn,relay_cli=info".into()),
        )
        .init();

    let catalog = cli.platform_catalog.as_deref();
    let result = match cli.command {
        Commands::Server { host, port } => {
            commands::server::run(host, port, cli.db, cli.platform_catalog).await
        }

        Commands::Run {
            automation_id,
            user_id,
            trigger,
        } => {
            let state = commands::init_state(&cli.db, catalog).await;
            commands::run::run(&state, &automation_id, &user_id, trigger.as_deref()).await
        }

        Commands::RunStatus { run_id } => {
            let state = commands::init_state(&cli.db, catalog).await;
            commands::run::status(&state, &run_id).await
        }

        Commands::Automation { action } => match action {
            AutomationAction::Validate { file } => commands::automation::validate(&file),
            AutomationAction::Import {
                file,
                user_id,
                name,
                id,
            } => {
                let state = commands::init_state(&cli.db, catalog).await;
                commands::automation::import(&state, &file, &user_id, name.as_deref(), id.as_deref())
                    .await
            }
            AutomationAction::List { user_id } => {
                let state = commands::init_state(&cli.db, catalog).await;
                commands::automation::list(&state, &user_id).await
            }
        },

        Commands::Credential { action } => {
            let state = commands::init_state(&cli.db, catalog).await;
            match action {
                CredentialAction::Add {
                    automation_id,
                    user_id,
                    platform,
                    data,
                } => commands::credential::add(&state, &automation_id, &user_id, &platform, &data).await,
            }
        }

        Commands::Agent { action } => {
            let state = commands::init_state(&cli.db, catalog).await;
            match action {
                AgentAction::Add {
                    user_id,
                    name,
                    rules,
                    api_key,
                    model,
                    provider,
                    id,
                } => {
                    commands::agent::add(
                        &state,
                        commands::agent::NewAgent {
                            id: id.as_deref(),
                            user_id: &user_id,
                            name: &name,
                            rules: &rules,
                            api_key: &api_key,
                            model: &model,
                            provider: &provider,
                        },
                    )
                    .await
                }
                AgentAction::List { user_id } => commands::agent::list(&state, &user_id).await,
            }
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
