//! Text-only page rendering: the positioned words of a layout drawn onto a
//! white PNG, each word outlined and numbered by its reading-order index.
//!
//! ```text
//! PageLayout -> SVG (layout_svg) -> usvg tree -> tiny-skia pixmap -> PNG
//! ```

use std::io::Cursor;
use std::sync::{Arc, OnceLock};

use log::debug;
use pdfse_core::word::PageLayout;
use resvg::render;
use tiny_skia::{Pixmap, Transform};
use usvg::{fontdb, Options, Tree};

use crate::PdfError;

/// Pixels per PDF point.
pub const RENDER_SCALE: f64 = 2.0;

/// Share of the word box height below the baseline.
const DESCENT_RATIO: f64 = 0.2;

const INDEX_FONT_SIZE: f64 = 4.0;

fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// SVG document for `layout`, in page points scaled by `scale`.
pub fn layout_svg(layout: &PageLayout, scale: f64) -> String {
    let (width, height) = layout.extents();
    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{pw:.0}" height="{ph:.0}" viewBox="0 0 {w:.2} {h:.2}">"#,
        pw = (width * scale).ceil(),
        ph = (height * scale).ceil(),
        w = width,
        h = height
    );
    svg.push_str(r#"<rect x="0" y="0" width="100%" height="100%" fill="white"/>"#);

    for (i, word) in layout.words.iter().enumerate() {
        let b = &word.bbox;
        let size = (b.y1 - b.y0).max(1.0);
        svg.push_str(&format!(
            r##"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="none" stroke="#e53935" stroke-width="0.5"/>"##,
            b.x0,
            b.y0,
            b.x1 - b.x0,
            size
        ));
        svg.push_str(&format!(
            r#"<text x="{:.2}" y="{:.2}" font-family="Helvetica, Arial, sans-serif" font-size="{:.2}" fill="black">{}</text>"#,
            b.x0,
            b.y1 - size * DESCENT_RATIO,
            size,
            escape_xml(&word.text)
        ));
        svg.push_str(&format!(
            r##"<text x="{:.2}" y="{:.2}" font-family="Helvetica, Arial, sans-serif" font-size="{}" fill="#1e88e5">{}</text>"##,
            b.x0,
            b.y0 - 0.5,
            INDEX_FONT_SIZE,
            i
        ));
    }

    svg.push_str("</svg>");
    svg
}

fn font_database() -> Arc<fontdb::Database> {
    static FONTS: OnceLock<Arc<fontdb::Database>> = OnceLock::new();
    FONTS
        .get_or_init(|| {
            let mut db = fontdb::Database::new();
            db.load_system_fonts();
            debug!("loaded {} font faces", db.len());
            Arc::new(db)
        })
        .clone()
}

/// Render `layout` to PNG bytes at [`RENDER_SCALE`].
pub fn render_png(layout: &PageLayout) -> Result<Vec<u8>, PdfError> {
    let svg = layout_svg(layout, RENDER_SCALE);
    let options = Options {
        fontdb: font_database(),
        ..Options::default()
    };
    let tree = Tree::from_str(&svg, &options).map_err(|e| PdfError::Render(e.to_string()))?;

    let size = tree.size().to_int_size();
    let mut pixmap = Pixmap::new(size.width(), size.height())
        .ok_or_else(|| PdfError::Render("empty page size".into()))?;
    // The viewBox already maps points to pixels.
    render(&tree, Transform::identity(), &mut pixmap.as_mut());

    let image = image::RgbaImage::from_raw(size.width(), size.height(), pixmap.data().to_vec())
        .ok_or_else(|| PdfError::Render("pixel buffer size mismatch".into()))?;
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(image)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .map_err(|e| PdfError::Render(e.to_string()))?;

    debug!(
        "rendered {} words to {}x{} PNG ({} bytes)",
        layout.words.len(),
        size.width(),
        size.height(),
        bytes.len()
    );
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdfse_core::word::Word;

    fn layout() -> PageLayout {
        PageLayout::new(
            100.0,
            50.0,
            vec![
                Word::new("Total:", (10.0, 10.0, 40.0, 20.0)),
                Word::new("R$<5>", (45.0, 10.0, 70.0, 20.0)),
            ],
        )
    }

    #[test]
    fn test_layout_svg() {
        let svg = layout_svg(&layout(), 2.0);
        assert!(svg.starts_with(r#"<svg xmlns="http://www.w3.org/2000/svg" width="200" height="100" viewBox="0 0 100.00 50.00">"#));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains(r#"<text x="10.00" y="18.00" font-family="Helvetica, Arial, sans-serif" font-size="10.00" fill="black">Total:</text>"#));
        assert!(svg.contains(">R$&lt;5&gt;</text>"));
        assert!(svg.contains(r#"width="30.00" height="10.00""#));
        assert!(svg.contains(r##"fill="#1e88e5">1</text>"##));
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml(r#"a&b "c" 'd'"#), "a&amp;b &quot;c&quot; &apos;d&apos;");
    }

    #[test]
    fn test_render_png() {
        let png = render_png(&layout()).unwrap();
        assert_eq!(&png[..8], &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]);

        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (200, 100));
    }

    #[test]
    fn test_render_empty_layout() {
        let png = render_png(&PageLayout::new(20.0, 10.0, vec![])).unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(5, 5).0, [255, 255, 255, 255]);
    }
}
