pub mod backend;
pub mod spans;

/// Hand-built backends and content-stream operators for tests.
#[cfg(test)]
pub(crate) mod testing {
    use std::collections::BTreeMap;

    pub use super::backend::{ContentOp, Operand, PageId, PdfBackend};
    use crate::PdfError;

    /// Serves the same pre-decoded operators for every page.
    pub struct MockBackend {
        pub page_ids: BTreeMap<u32, PageId>,
        pub size: (f32, f32),
        pub ops: Vec<ContentOp>,
    }

    impl MockBackend {
        /// One US Letter page.
        pub fn new(ops: Vec<ContentOp>) -> Self {
            Self {
                page_ids: BTreeMap::from([(1, (1, 0))]),
                size: (612.0, 792.0),
                ops,
            }
        }
    }

    impl PdfBackend for MockBackend {
        fn pages(&self) -> BTreeMap<u32, PageId> {
            self.page_ids.clone()
        }

        fn page_size(&self, _page: PageId) -> Result<(f32, f32), PdfError> {
            Ok(self.size)
        }

        fn page_operations(&self, _page: PageId) -> Result<Vec<ContentOp>, PdfError> {
            Ok(self.ops.clone())
        }

        fn decode_text(&self, _page: PageId, _font_key: &[u8], bytes: &[u8]) -> String {
            super::backend::decode_pdf_string(bytes)
        }
    }

    pub fn make_op(operator: &str, operands: Vec<Operand>) -> ContentOp {
        ContentOp {
            operator: operator.to_string(),
            operands,
        }
    }

    pub fn bt_op() -> ContentOp {
        make_op("BT", vec![])
    }

    pub fn et_op() -> ContentOp {
        make_op("ET", vec![])
    }

    pub fn tf_op(font: &[u8], size: f32) -> ContentOp {
        make_op(
            "Tf",
            vec![Operand::Name(font.to_vec()), Operand::Number(size)],
        )
    }

    pub fn tm_op(a: f32, b: f32, c: f32, d: f32, tx: f32, ty: f32) -> ContentOp {
        make_op(
            "Tm",
            [a, b, c, d, tx, ty].into_iter().map(Operand::Number).collect(),
        )
    }

    pub fn td_op(tx: f32, ty: f32) -> ContentOp {
        make_op("Td", vec![Operand::Number(tx), Operand::Number(ty)])
    }

    pub fn tj_op(text: &[u8]) -> ContentOp {
        make_op("Tj", vec![Operand::Str(text.to_vec())])
    }

    pub fn tj_array_op(elements: Vec<Operand>) -> ContentOp {
        make_op("TJ", vec![Operand::Array(elements)])
    }
}
