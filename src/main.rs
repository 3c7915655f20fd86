use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod expr;
mod markup;
mod render;
mod services;
mod template;
mod util;
mod variables;

#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// The command to execute
    #[command(subcommand)]
    command: FormadocCommand,
}

#[derive(Parser)]
struct InitArgs {
    /// The path to initialize the project in
    path: PathBuf,

    /// Whether to create the directory if it doesn't exist
    #[arg(short, long, default_value = "false")]
    create: bool,
}

#[derive(Parser)]
struct RenderArgs {
    /// Template file (YAML or JSON)
    #[arg(short, long)]
    template: PathBuf,

    /// Variables file (JSON or YAML)
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Where to write the HTML (default: the template path with `.html`)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Signatures and attachments file, used instead of the hosted database
    #[arg(short, long)]
    records: Option<PathBuf>,

    /// Organization whose attachments are looked up
    #[arg(long)]
    organization_id: Option<String>,

    /// Document whose signatures and attachments are looked up
    #[arg(long)]
    document_id: Option<String>,

    /// Open the rendered document in the default browser
    #[arg(long, default_value = "false")]
    open: bool,

    /// The path to the configuration file
    #[arg(short, long)]
    config_file: Option<PathBuf>,
}

#[derive(Parser)]
struct ServeArgs {
    /// The address to bind to (default: serve.bind from the config)
    #[arg(short, long)]
    bind: Option<String>,

    /// The port to bind to (default: serve.port from the config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Template previewed at `/`
    #[arg(short, long)]
    template: Option<PathBuf>,

    /// Variables of the preview
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Signatures and attachments file, used instead of the hosted database
    #[arg(short, long)]
    records: Option<PathBuf>,

    /// Open the preview in the default browser
    #[arg(short, long, default_value = "false")]
    open: bool,

    /// The path to the configuration file
    #[arg(short, long)]
    config_file: Option<PathBuf>,

    /// Watch the preview files and reload the browser on changes
    #[arg(short, long, default_value = "false")]
    watch: bool,
}

#[derive(Subcommand)]
enum FormadocCommand {
    /// Initialize a new project with sample files
    Init(InitArgs),

    /// Render a template to an HTML file
    Render(RenderArgs),

    /// Serve the render API and a live preview on a local port
    Serve(ServeArgs),
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("formadoc=info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();

    match args.command {
        FormadocCommand::Init(args) => {
            commands::init::run(&args).await?;
        }
        FormadocCommand::Render(args) => {
            commands::render::run(&args).await?;
        }
        FormadocCommand::Serve(args) => {
            commands::serve::run(&args).await?;
        }
    }

    Ok(())
}
