//! Core library for pdfse
//!
//! This crate implements the **Functional Core** of the pdfse application,
//! following the Functional Core - Imperative Shell architectural pattern.
//!
//! # Architecture Overview
//!
//! The pdfse project splits into three crates:
//!
//! - **`pdfse_core`** (this crate): word navigation, command interpretation and
//!   batch planning, with zero I/O
//! - **`pdf`**: the page-layout provider turning PDF bytes into positioned words
//! - **`pdfse`**: I/O operations and orchestration (the Imperative Shell)
//!
//! ## Functional Core Principles
//!
//! - **Pure functions**: planning and prompt assembly take all their inputs as
//!   arguments (randomness comes in as an `Rng`)
//! - **No I/O**: cache files, PDFs and model calls live in the shell
//! - **Infallible engine**: [`wordspace`] and [`interpreter`] never fail on
//!   foreign command trees; bad input degrades to absent fields
//!
//! # Module Organization
//!
//! - [`geometry`]: points, boxes, distances and text folding
//! - [`word`]: positioned words and page layouts
//! - [`wordspace`]: the spatial cursor engine
//! - [`command`]: command trees and their JSON form
//! - [`interpreter`]: replays command trees against a [`wordspace::WordSpace`]
//! - [`heuristics`]: heuristic cache model and dataset planning
//! - [`prompt`]: prompt assembly and response parsing for tree generation
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use pdfse_core::command::parse_commands;
//! use pdfse_core::interpreter::Machine;
//! use pdfse_core::word::Word;
//! use pdfse_core::wordspace::WordSpace;
//!
//! let mut ws = WordSpace::new(
//!     vec![
//!         Word::new("Total:", (10.0, 10.0, 40.0, 20.0)),
//!         Word::new("42", (45.0, 10.0, 55.0, 20.0)),
//!     ],
//!     100.0,
//!     100.0,
//! );
//!
//! let tree = parse_commands(&serde_json::json!([
//!     {"type": "command", "name": "anchor_to_text", "args": {"text": "total:"}},
//!     {"type": "command", "name": "move_right"},
//!     {"type": "command", "name": "collect"}
//! ]));
//!
//! assert_eq!(Machine::new(&mut ws).run_field(&tree).as_deref(), Some("42"));
//! ```

pub mod command;
pub mod geometry;
pub mod heuristics;
pub mod interpreter;
pub mod prompt;
pub mod word;
pub mod wordspace;
