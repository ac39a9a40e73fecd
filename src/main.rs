//! casebook - command-line shell over the progression engine.
//!
//! Each invocation loads a story, runs one engine operation against the
//! session files, and prints the result as JSON.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use casebook::cli::{CommandOutput, SessionsCommand};
use casebook::{Config, Engine, Story};

/// Knowledge progression and gating engine
#[derive(Parser)]
#[command(name = "casebook")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Story content file (JSON)
    #[arg(long, short)]
    story: PathBuf,

    /// Override the sessions directory
    #[arg(long)]
    sessions_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new session
    New {
        /// Player identifier
        #[arg(long, default_value = "player")]
        player: String,
    },

    /// Say something to a character
    Say {
        session: String,
        character: u32,
        /// What the player says
        #[arg(required = true, num_args = 1..)]
        utterance: Vec<String>,
    },

    /// Collect an object
    Take { session: String, object: u32 },

    /// Examine a collected object
    Examine { session: String, object: u32 },

    /// Look at a detail in an area
    Observe {
        session: String,
        area: u32,
        detail: u32,
    },

    /// Enter a location, or an area with --area
    Enter {
        session: String,
        id: u32,
        /// Treat the id as an area
        #[arg(long)]
        area: bool,
    },

    /// Credit specialization points for an interaction
    Credit {
        session: String,
        category: String,
        points: u32,
        interaction_id: String,
        /// Interaction type of the credit key
        #[arg(long, default_value = "manual")]
        interaction_type: String,
    },

    /// Scan an access code
    Access { session: String, code: String },

    /// Show a session summary
    Show {
        session: String,
        /// Print the full progress record
        #[arg(long)]
        full: bool,
    },

    /// List recent sessions
    Sessions {
        /// Maximum number of sessions
        #[arg(long, short, default_value_t = 20)]
        limit: usize,
        /// Output as JSON instead of a table
        #[arg(long, short)]
        json: bool,
    },

    /// Close a session
    Close { session: String },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("CASEBOOK_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("casebook error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = Config::load();
    if let Some(dir) = cli.sessions_dir {
        config.storage.sessions_dir = Some(dir);
    }
    let story = Story::load(&cli.story)?;
    let engine = Engine::from_config(story, &config)?;

    let code = match cli.command {
        Commands::New { player } => print(engine.create_session(&player)),
        Commands::Say {
            session,
            character,
            utterance,
        } => print(engine.respond(&session, character, &utterance.join(" "))),
        Commands::Take { session, object } => print(engine.collect_object(&session, object)),
        Commands::Examine { session, object } => print(engine.examine_object(&session, object)),
        Commands::Observe {
            session,
            area,
            detail,
        } => print(engine.observe_detail(&session, area, detail)),
        Commands::Enter { session, id, area } => {
            if area {
                print(engine.enter_area(&session, id))
            } else {
                print(engine.enter_location(&session, id))
            }
        }
        Commands::Credit {
            session,
            category,
            points,
            interaction_id,
            interaction_type,
        } => print(engine.credit(
            &session,
            &category,
            points,
            &interaction_type,
            &interaction_id,
        )),
        Commands::Access { session, code } => print(engine.check_access(&session, &code)),
        Commands::Show { session, full } => {
            if full {
                print(engine.progress(&session))
            } else {
                print(engine.summary(&session))
            }
        }
        Commands::Sessions { limit, json } => {
            let output = SessionsCommand::new(&engine).run(limit);
            if json {
                println!("{}", output.to_json());
            } else {
                println!("{}", output.format_text());
            }
            exit_code(output.success)
        }
        Commands::Close { session } => {
            print(engine.close_session(&session).map(|()| session))
        }
    };

    Ok(code)
}

fn print<T: Serialize>(result: casebook::Result<T>) -> ExitCode {
    let output = CommandOutput::from_result(result);
    println!("{}", output.to_json());
    exit_code(output.success)
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
