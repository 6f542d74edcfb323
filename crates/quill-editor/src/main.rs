//! CLI entry point for the quill scenario editor.
//!
//! Each invocation opens one game, applies a single edit (or prints the
//! flow), and exits. Logs go to stderr, results to stdout.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use quill_api::{ApiClient, ApiConfig};
use quill_core::config::{load_section, DEFAULT_FILE_PREFIX};
use quill_core::events::Notifier;
use quill_core::{ExitDraft, ExitId, ExitPatch, ExitType, GameId, LocationDraft, LocationId};
use quill_editor::scenario;
use quill_editor::{Direction, ScenarioEditor};

#[derive(Parser)]
#[command(name = "quill-editor")]
#[command(about = "Edit the location graph of a narrative game")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Game to open. Required by every command except `import`.
    #[arg(long, global = true)]
    game: Option<String>,

    /// Config file prefix (default: quill).
    #[arg(short, long, default_value = DEFAULT_FILE_PREFIX, global = true)]
    config: String,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Print every location in order with where its exits lead.
    Flow {
        /// Print the overview as JSON instead of text.
        #[arg(long)]
        as_json: bool,
    },
    /// Move a location one step up or down.
    Move {
        #[arg(long)]
        location: String,
        /// up or down.
        #[arg(long)]
        direction: Direction,
    },
    /// Create, update or delete an exit.
    #[command(subcommand)]
    Exit(ExitCommand),
    /// Add or delete a location.
    #[command(subcommand)]
    Location(LocationCommand),
    /// Write the game as a scenario document.
    Export {
        #[arg(long)]
        out: PathBuf,
    },
    /// Create a new game from a scenario document.
    Import {
        #[arg(long)]
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum ExitCommand {
    Add(ExitAddArgs),
    Update(ExitUpdateArgs),
    Delete {
        #[arg(long)]
        exit: String,
    },
}

#[derive(Args)]
struct ExitAddArgs {
    /// Location the exit leaves from.
    #[arg(long)]
    location: String,
    /// BUTTON, TRIGGER or GAMEOVER.
    #[arg(long = "type")]
    exit_type: ExitType,
    /// Button label or trigger phrase, depending on the type.
    #[arg(long)]
    text: Option<String>,
    #[arg(long)]
    target: Option<String>,
    #[arg(long)]
    game_over: bool,
}

#[derive(Args)]
struct ExitUpdateArgs {
    #[arg(long)]
    exit: String,
    #[arg(long = "type")]
    exit_type: Option<ExitType>,
    #[arg(long)]
    button_text: Option<String>,
    #[arg(long)]
    trigger_text: Option<String>,
    #[arg(long, conflicts_with = "clear_target")]
    target: Option<String>,
    #[arg(long)]
    clear_target: bool,
    #[arg(long)]
    game_over: Option<bool>,
}

#[derive(Subcommand)]
enum LocationCommand {
    Add {
        #[arg(long)]
        title: String,
        /// Defaults to after the last location.
        #[arg(long)]
        order: Option<i64>,
        #[arg(long)]
        description: Option<String>,
    },
    Delete {
        #[arg(long)]
        location: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    let api_config: ApiConfig = load_section(&cli.config, "api")?;
    let client = Arc::new(ApiClient::new(&api_config)?);

    if let Command::Import { file } = &cli.command {
        let document = scenario::read_document(file)?;
        let game_id = scenario::import_scenario(client.as_ref(), &document).await?;
        println!("{game_id}");
        return Ok(());
    }

    let game_id = cli
        .game
        .as_deref()
        .map(GameId::new)
        .ok_or_else(|| anyhow::anyhow!("--game is required for this command"))?;
    let mut editor = ScenarioEditor::open(client, game_id, Notifier::disabled()).await?;

    match cli.command {
        Command::Flow { as_json } => {
            let flow = editor.flow();
            if as_json {
                println!("{}", serde_json::to_string_pretty(&flow)?);
            } else {
                print!("{flow}");
            }
        }
        Command::Move {
            location,
            direction,
        } => {
            let outcome = editor
                .move_location(&LocationId::new(location), direction)
                .await?;
            println!("{}", serde_json::to_string(&outcome)?);
        }
        Command::Exit(ExitCommand::Add(args)) => {
            let draft = exit_draft(&args);
            let exit = editor
                .create_exit(&LocationId::new(args.location), draft)
                .await?;
            println!("{}", serde_json::to_string(&exit)?);
        }
        Command::Exit(ExitCommand::Update(args)) => {
            let target_location_id = if args.clear_target {
                Some(None)
            } else {
                args.target.map(|t| Some(LocationId::new(t)))
            };
            let patch = ExitPatch {
                exit_type: args.exit_type,
                button_text: args.button_text,
                trigger_text: args.trigger_text,
                target_location_id,
                is_game_over: args.game_over,
            };
            let exit = editor.update_exit(&ExitId::new(args.exit), patch).await?;
            println!("{}", serde_json::to_string(&exit)?);
        }
        Command::Exit(ExitCommand::Delete { exit }) => {
            editor.delete_exit(&ExitId::new(exit)).await?;
        }
        Command::Location(LocationCommand::Add {
            title,
            order,
            description,
        }) => {
            let location = editor
                .add_location(LocationDraft {
                    title,
                    order,
                    description,
                    ..LocationDraft::default()
                })
                .await?;
            println!("{}", serde_json::to_string(&location)?);
        }
        Command::Location(LocationCommand::Delete { location }) => {
            editor.delete_location(&LocationId::new(location)).await?;
        }
        Command::Export { out } => {
            scenario::write_export(&editor.export(), &out)?;
        }
        // Handled before the game is opened.
        Command::Import { .. } => {}
    }

    if editor.is_stale() {
        eprintln!("Saved, but the game could not be reloaded; run `flow` to refresh.");
    }
    Ok(())
}

fn exit_draft(args: &ExitAddArgs) -> ExitDraft {
    let text = args.text.clone();
    let (button_text, trigger_text) = match args.exit_type {
        ExitType::Trigger => (None, text),
        ExitType::Button | ExitType::Gameover => (text, None),
    };
    ExitDraft {
        exit_type: args.exit_type,
        button_text,
        trigger_text,
        target_location_id: args.target.as_deref().map(LocationId::new),
        is_game_over: args.game_over || args.exit_type == ExitType::Gameover,
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
