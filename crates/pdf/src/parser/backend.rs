use std::collections::BTreeMap;

use lopdf::content::Content;
use lopdf::{Document, Object};

use crate::PdfError;

/// A page identifier mirroring `lopdf::ObjectId`: (object number, generation number).
pub type PageId = (u32, u16);

/// A content-stream operand, reduced to what text extraction reads.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Number(f32),
    Name(Vec<u8>),
    Str(Vec<u8>),
    Array(Vec<Operand>),
    /// Anything text operators never take (dictionaries, booleans, ...).
    Other,
}

impl Operand {
    pub fn number(&self) -> Option<f32> {
        match self {
            Operand::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<&Object> for Operand {
    fn from(obj: &Object) -> Self {
        match obj {
            Object::Integer(i) => Operand::Number(*i as f32),
            Object::Real(f) => Operand::Number(*f),
            Object::Name(n) => Operand::Name(n.clone()),
            Object::String(s, _) => Operand::Str(s.clone()),
            Object::Array(items) => Operand::Array(items.iter().map(Operand::from).collect()),
            _ => Operand::Other,
        }
    }
}

/// One content-stream operator with its operands.
#[derive(Debug, Clone)]
pub struct ContentOp {
    pub operator: String,
    pub operands: Vec<Operand>,
}

/// Decode string bytes without font information: UTF-16BE when the BOM is
/// present, then UTF-8, then Latin-1.
pub fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(payload) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return utf16_be(payload);
    }

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Decode big-endian UTF-16, ignoring an odd trailing byte.
fn utf16_be(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

/// What word extraction needs from a parsed PDF.
///
/// Span extraction only talks to this trait, so it runs against hand-built
/// operator lists in tests.
pub trait PdfBackend {
    /// 1-based page number to [`PageId`].
    fn pages(&self) -> BTreeMap<u32, PageId>;

    /// Page `(width, height)` in points.
    fn page_size(&self, page: PageId) -> Result<(f32, f32), PdfError>;

    /// The page's content stream as operators.
    fn page_operations(&self, page: PageId) -> Result<Vec<ContentOp>, PdfError>;

    /// Turn the bytes of a shown string into text, using whatever the page's
    /// font `font_key` says about its encoding.
    fn decode_text(&self, page: PageId, font_key: &[u8], bytes: &[u8]) -> String;
}

/// [`PdfBackend`] over a [`lopdf::Document`].
pub struct LopdfBackend {
    doc: Document,
}

impl LopdfBackend {
    pub fn load_bytes(data: &[u8]) -> Result<Self, PdfError> {
        let doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        if doc.is_encrypted() {
            return Err(PdfError::Encrypted);
        }

        Ok(Self { doc })
    }

    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    fn resolve<'a>(&'a self, obj: &'a Object) -> &'a Object {
        match obj {
            Object::Reference(id) => self.doc.get_object(*id).unwrap_or(obj),
            other => other,
        }
    }

    /// MediaBox of a page, inherited from its ancestors when absent.
    fn media_box(&self, page: PageId) -> Option<[f32; 4]> {
        let mut node = self.doc.get_object(page).ok()?.as_dict().ok()?;

        loop {
            if let Ok(obj) = node.get(b"MediaBox") {
                let values: Vec<f32> = self
                    .resolve(obj)
                    .as_array()
                    .ok()?
                    .iter()
                    .filter_map(|item| Operand::from(self.resolve(item)).number())
                    .collect();
                return <[f32; 4]>::try_from(values).ok();
            }

            let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
            node = self.doc.get_object(parent).ok()?.as_dict().ok()?;
        }
    }

    /// `/Encoding` name of a page font, e.g. `Identity-H`.
    fn font_encoding(&self, page: PageId, font_key: &[u8]) -> Option<Vec<u8>> {
        let fonts = self.doc.get_page_fonts(page).ok()?;
        match self.resolve(fonts.get(font_key)?.get(b"Encoding").ok()?) {
            Object::Name(name) => Some(name.clone()),
            _ => None,
        }
    }
}

impl PdfBackend for LopdfBackend {
    fn pages(&self) -> BTreeMap<u32, PageId> {
        self.doc.get_pages()
    }

    fn page_size(&self, page: PageId) -> Result<(f32, f32), PdfError> {
        let [llx, lly, urx, ury] = self
            .media_box(page)
            .ok_or_else(|| PdfError::Parse(format!("no usable MediaBox for page {:?}", page)))?;

        Ok(((urx - llx).abs(), (ury - lly).abs()))
    }

    fn page_operations(&self, page: PageId) -> Result<Vec<ContentOp>, PdfError> {
        let data = self
            .doc
            .get_page_content(page)
            .map_err(|e| PdfError::Parse(format!("cannot get page content: {}", e)))?;
        let content = Content::decode(&data)
            .map_err(|e| PdfError::Parse(format!("content stream decode error: {}", e)))?;

        Ok(content
            .operations
            .into_iter()
            .map(|op| ContentOp {
                operands: op.operands.iter().map(Operand::from).collect(),
                operator: op.operator,
            })
            .collect())
    }

    fn decode_text(&self, page: PageId, font_key: &[u8], bytes: &[u8]) -> String {
        // Identity-encoded (CID) fonts carry 2-byte codes, usually Unicode.
        let identity = self
            .font_encoding(page, font_key)
            .is_some_and(|name| name.starts_with(b"Identity"));

        if identity && !bytes.is_empty() && bytes.len() % 2 == 0 {
            let decoded = utf16_be(bytes);
            if decoded.chars().any(|c| c != '\u{FFFD}' && c != '\0') {
                return decoded;
            }
        }

        decode_pdf_string(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_utf8_and_latin1() {
        assert_eq!(decode_pdf_string("Inscrição".as_bytes()), "Inscrição");
        // "çã" in Latin-1 is not valid UTF-8.
        let latin1: &[u8] = &[0x49, 0x6E, 0x73, 0x63, 0x72, 0x69, 0xE7, 0xE3, 0x6F];
        assert_eq!(decode_pdf_string(latin1), "Inscrição");
    }

    #[test]
    fn decodes_utf16_with_bom() {
        assert_eq!(
            decode_pdf_string(&[0xFE, 0xFF, 0x00, 0x43, 0x00, 0x50, 0x00, 0x46]),
            "CPF"
        );
        assert_eq!(decode_pdf_string(&[0xFE, 0xFF, 0x00, 0x41, 0x00]), "A");
        assert_eq!(decode_pdf_string(&[0xFE, 0xFF]), "");
        assert_eq!(decode_pdf_string(&[]), "");
    }

    #[test]
    fn operands_from_objects() {
        assert_eq!(Operand::from(&Object::Integer(-10)).number(), Some(-10.0));
        assert_eq!(Operand::from(&Object::Real(2.5)).number(), Some(2.5));
        assert_eq!(Operand::from(&Object::Name(b"F1".to_vec())).number(), None);
        assert_eq!(Operand::from(&Object::Null), Operand::Other);

        let tj = Object::Array(vec![
            Object::String(b"A".to_vec(), lopdf::StringFormat::Hexadecimal),
            Object::Integer(-250),
        ]);
        assert_eq!(
            Operand::from(&tj),
            Operand::Array(vec![Operand::Str(b"A".to_vec()), Operand::Number(-250.0)])
        );
    }

    #[test]
    fn load_bytes_rejects_garbage() {
        assert!(matches!(
            LopdfBackend::load_bytes(b"not a pdf"),
            Err(PdfError::Parse(_))
        ));
    }
}
