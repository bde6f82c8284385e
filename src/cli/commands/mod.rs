use clap::{Args, Subcommand};

#[derive(Subcommand)]
pub enum Commands {
    /// Copy the bundled model into writable storage and print its path
    Stage,
    /// Load the model, run one prompt and unload
    Generate(GenerateCommand),
    /// Interactive prompt loop against a loaded model
    Chat,
}

#[derive(Debug, Args)]
pub struct GenerateCommand {
    /// Prompt text
    #[arg(short, long)]
    pub prompt: String,

    /// Print the result (or failure) as JSON
    #[arg(long)]
    pub json: bool,
}

/// Logging flags shared by every subcommand.
#[derive(Debug, Clone, Default, Args)]
pub struct LoggingArgs {
    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long = "log-level", env = "LLM_BRIDGE_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Log filter directives
    #[arg(long = "log-filter", env = "LLM_BRIDGE_LOG_FILTER", global = true)]
    pub log_filter: Option<String>,
}

impl LoggingArgs {
    pub fn get_effective_level(&self) -> &str {
        match (self.verbose, self.log_level.as_deref()) {
            (v, _) if v >= 2 => "trace",
            (1, _) => "debug",
            (0, Some(level)) => level,
            _ => "warn",
        }
    }
}
