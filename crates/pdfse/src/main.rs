use crate::prelude::*;
use clap::Parser;

mod cache;
mod dataset;
mod document;
mod error;
mod extract;
mod layout;
mod llm;
mod prelude;
mod run;

#[cfg(test)]
mod testing;

#[derive(Debug, clap::Parser)]
#[command(
    author,
    version,
    about,
    long_about = "Extract structured fields from PDF documents by replaying cached cursor heuristics"
)]
pub struct App {
    #[command(subcommand)]
    pub command: SubCommands,

    #[clap(flatten)]
    global: Global,
}

#[derive(Debug, Clone, clap::Args)]
pub struct Global {
    /// Heuristics cache file (defaults to <cache dir>/pdfse/heuristics.json)
    #[clap(long, env = "PDFSE_CACHE", global = true)]
    cache: Option<std::path::PathBuf>,

    /// Whether to display additional information.
    #[clap(long, env = "PDFSE_VERBOSE", global = true, default_value = "false")]
    verbose: bool,
}

#[derive(Debug, clap::Parser)]
pub enum SubCommands {
    /// Extract the fields of every dataset entry, generating missing heuristics
    Extract(crate::extract::ExtractOptions),

    /// Remove heuristics from the cache
    Clear(crate::cache::ClearOptions),

    /// Print the positioned words of a PDF page
    Layout(crate::layout::LayoutOptions),

    /// Replay a heuristic file against one PDF
    Run(crate::run::RunOptions),
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    color_eyre::install()?;

    let app = App::parse();

    match app.command {
        SubCommands::Extract(options) => crate::extract::run(options, app.global).await,
        SubCommands::Clear(options) => crate::cache::run(options, app.global).await,
        SubCommands::Layout(options) => crate::layout::run(options, app.global).await,
        SubCommands::Run(options) => crate::run::run(options, app.global).await,
    }
    .map_err(|err: color_eyre::eyre::Report| eyre!(err))
}
