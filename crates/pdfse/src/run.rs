use crate::prelude::{eprintln, println, *};
use log::debug;
use pdfse_core::heuristics::{heuristic_from_value, Extraction, Heuristic};
use pdfse_core::interpreter::Machine;
use pdfse_core::word::PageLayout;
use pdfse_core::wordspace::WordSpace;
use std::path::PathBuf;

#[derive(Debug, clap::Parser)]
pub struct RunOptions {
    /// Path to the PDF file
    pub path: PathBuf,

    /// JSON file mapping field names to command trees
    #[clap(long)]
    pub heuristic: PathBuf,

    /// Page to read (0-based)
    #[clap(long, default_value = "0")]
    pub page: usize,
}

pub async fn run(options: RunOptions, global: crate::Global) -> Result<()> {
    let content = std::fs::read_to_string(&options.heuristic)
        .with_context(|| f!("Failed to read heuristic {}", options.heuristic.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| f!("Invalid heuristic JSON in {}", options.heuristic.display()))?;
    let heuristic = heuristic_from_value(&value);

    if global.verbose {
        eprintln!("Fields: {}", heuristic.len());
    }

    let path = options.path.clone();
    let page = options.page;
    let layout =
        tokio::task::spawn_blocking(move || crate::document::load_page_layout(&path, page))
            .await??;

    let extraction = replay(layout, &heuristic);
    println!("{}", serde_json::to_string_pretty(&extraction)?);

    Ok(())
}

/// Run every tree of `heuristic` against one page.
fn replay(layout: PageLayout, heuristic: &Heuristic) -> Extraction {
    let mut ws = WordSpace::from_layout(layout);
    let mut machine = Machine::new(&mut ws);
    let extraction = machine.run(heuristic);
    debug!("replayed {} fields", extraction.len());
    extraction
}
