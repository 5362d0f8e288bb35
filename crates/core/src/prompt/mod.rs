//! Prompt assembly and response parsing for command-tree generation.
//!
//! Pure string work only: the shell owns the model client and feeds raw
//! responses back through [`parse_heuristic_response`].

pub mod build;
pub mod extract;
pub mod types;

pub use build::{build_prompt, render_layout, SYSTEM_PREAMBLE};
pub use extract::{extract_json, parse_heuristic_response, PromptError};
pub use types::{HeuristicRequest, LayoutSample, SampleContent};
