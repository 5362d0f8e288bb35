use crate::heuristics::ExtractionSchema;
use crate::word::PageLayout;

/// How a sample document is shown to the generator.
#[derive(Debug, Clone)]
pub enum SampleContent {
    /// Positioned words, rendered into the prompt text.
    Layout(PageLayout),
    /// PNG rendering of the positioned words, sent as an image attachment.
    Image(Vec<u8>),
}

/// One sample document shown to the generator.
#[derive(Debug, Clone)]
pub struct LayoutSample {
    /// Display name, usually the PDF file name.
    pub name: String,
    pub content: SampleContent,
}

impl LayoutSample {
    pub fn text(name: impl Into<String>, layout: PageLayout) -> Self {
        Self {
            name: name.into(),
            content: SampleContent::Layout(layout),
        }
    }

    pub fn image(name: impl Into<String>, png: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content: SampleContent::Image(png),
        }
    }

    pub fn png(&self) -> Option<&[u8]> {
        match &self.content {
            SampleContent::Image(png) => Some(png),
            SampleContent::Layout(_) => None,
        }
    }
}

/// A request for command trees covering the fields of `schema`.
#[derive(Debug, Clone)]
pub struct HeuristicRequest {
    /// Fields to generate trees for, with their descriptions.
    pub schema: ExtractionSchema,
    /// Documents of the same label to learn the layout from.
    pub samples: Vec<LayoutSample>,
}

impl HeuristicRequest {
    /// PNG attachments in sample order.
    pub fn images(&self) -> Vec<&[u8]> {
        self.samples.iter().filter_map(LayoutSample::png).collect()
    }
}
