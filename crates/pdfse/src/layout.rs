use crate::prelude::{println, *};
use pdfse_core::word::PageLayout;
use std::path::PathBuf;

#[derive(Debug, clap::Parser)]
pub struct LayoutOptions {
    /// Path to the PDF file
    pub path: PathBuf,

    /// Page to read (0-based)
    #[clap(long, default_value = "0")]
    pub page: usize,

    /// Output as JSON
    #[clap(long)]
    pub json: bool,
}

pub async fn run(options: LayoutOptions, _global: crate::Global) -> Result<()> {
    let path = options.path.clone();
    let page = options.page;
    let layout =
        tokio::task::spawn_blocking(move || crate::document::load_page_layout(&path, page))
            .await??;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&layout)?);
        return Ok(());
    }

    if layout.words.is_empty() {
        println!("No words found (page {} has no text layer).", options.page);
        return Ok(());
    }

    println!("Page {} ({:.1} x {:.1})", options.page, layout.width, layout.height);
    layout_table(&layout).printstd();

    Ok(())
}

fn layout_table(layout: &PageLayout) -> prettytable::Table {
    let mut table = new_table();
    table.add_row(prettytable::row![
        "#".bold().cyan(),
        "x0".bold().cyan(),
        "y0".bold().cyan(),
        "x1".bold().cyan(),
        "y1".bold().cyan(),
        "Text".bold().cyan()
    ]);

    for (index, word) in layout.words.iter().enumerate() {
        let b = &word.bbox;
        table.add_row(prettytable::row![
            index.to_string().green(),
            f!("{:.1}", b.x0),
            f!("{:.1}", b.y0),
            f!("{:.1}", b.x1),
            f!("{:.1}", b.y1),
            word.text.bright_white()
        ]);
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdfse_core::word::Word;

    #[test]
    fn test_layout_table_rows() {
        let layout = PageLayout::new(
            100.0,
            100.0,
            vec![
                Word::new("Total:", (10.0, 10.0, 40.0, 20.0)),
                Word::new("42", (45.0, 10.0, 55.26, 20.0)),
            ],
        );

        let table = layout_table(&layout);
        assert_eq!(table.len(), 3);

        let rendered = table.to_string();
        assert!(rendered.contains("Total:"));
        assert!(rendered.contains("55.3"));
    }
}
