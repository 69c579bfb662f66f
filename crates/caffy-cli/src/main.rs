use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::Context;

#[derive(Parser)]
#[command(name = "caffy", version, about = "Caffeine tracker with a personal decay model")]
struct Cli {
    /// User to act for (defaults to user.default_user_id from config)
    #[arg(long, global = true)]
    user: Option<i64>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record and manage intakes
    Intake {
        #[command(subcommand)]
        action: commands::intake::IntakeAction,
    },
    /// Current remaining amount, level and sleep readiness
    Status(commands::status::StatusArgs),
    /// Sampled curve over the configured view period
    Graph(commands::status::GraphArgs),
    /// Hourly forecast from now on
    Predict(commands::status::PredictArgs),
    /// Largest dose you can take now and still be under a target later
    Budget(commands::status::BudgetArgs),
    /// Report how alert you feel (1 = sleepy .. 5 = very alert)
    Feedback(commands::learn::FeedbackArgs),
    /// Personal half-life learning
    Learn {
        #[command(subcommand)]
        action: commands::learn::LearnAction,
    },
    /// Metabolism profile
    Profile {
        #[command(subcommand)]
        action: commands::profile::ProfileAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Generate shell completions
    Completions {
        shell: clap_complete::Shell,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("CAFFY_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let ctx = Context {
        user: cli.user,
        json: cli.json,
    };
    let result = match cli.command {
        Commands::Intake { action } => commands::intake::run(&ctx, action),
        Commands::Status(args) => commands::status::status(&ctx, args),
        Commands::Graph(args) => commands::status::graph(&ctx, args),
        Commands::Predict(args) => commands::status::predict(&ctx, args),
        Commands::Budget(args) => commands::status::budget(&ctx, args),
        Commands::Feedback(args) => commands::learn::feedback(&ctx, args),
        Commands::Learn { action } => commands::learn::run(&ctx, action),
        Commands::Profile { action } => commands::profile::run(&ctx, action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "caffy", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
