//! Tree-walking evaluator that replays command trees on a [`WordSpace`].
//!
//! Each field runs in isolation: the cursor is sent back to the top-left
//! corner and the buffer is cleared before the tree executes, and whatever
//! text was collected is drained afterwards. Execution never fails. Inert
//! nodes are skipped, and loops stop after [`MAX_LOOP_ITERATIONS`].

use std::collections::BTreeMap;

use log::debug;

use crate::command::{Action, Check, Condition, Node};
use crate::heuristics::{Extraction, ExtractionSchema, Heuristic};
use crate::wordspace::WordSpace;

/// Upper bound on loop body executions per loop node.
pub const MAX_LOOP_ITERATIONS: usize = 100;

/// Counters gathered while executing a tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionStats {
    /// Whitelisted actions dispatched. Inert actions are not counted.
    pub actions: usize,
    /// Loops that stopped because they hit the iteration cap.
    pub loops_capped: usize,
}

pub struct Machine<'a> {
    ws: &'a mut WordSpace,
    stats: ExecutionStats,
}

impl<'a> Machine<'a> {
    pub fn new(ws: &'a mut WordSpace) -> Self {
        Self {
            ws,
            stats: ExecutionStats::default(),
        }
    }

    /// Execute `tree` from the current state and report what happened.
    pub fn execute(&mut self, tree: &[Node]) -> ExecutionStats {
        self.stats = ExecutionStats::default();
        self.execute_list(tree);
        self.stats
    }

    /// Reset, execute, drain. Returns `None` when nothing was collected;
    /// collected text is trimmed and may come back empty.
    pub fn run_field(&mut self, tree: &[Node]) -> Option<String> {
        self.ws.move_cursor_to_corner_top();
        self.ws.move_cursor_to_corner_left();
        self.ws.clear_text_buffer();

        let stats = self.execute(tree);
        if stats.loops_capped > 0 {
            debug!("{} loop(s) hit the iteration cap", stats.loops_capped);
        }

        let text = self.ws.drain_text();
        if text.is_empty() {
            None
        } else {
            Some(text.trim().to_string())
        }
    }

    /// Run every field of `heuristic` independently.
    pub fn run(&mut self, heuristic: &Heuristic) -> BTreeMap<String, Option<String>> {
        heuristic
            .iter()
            .map(|(field, tree)| (field.clone(), self.run_field(tree)))
            .collect()
    }

    fn execute_list(&mut self, nodes: &[Node]) {
        for node in nodes {
            self.execute_node(node);
        }
    }

    fn execute_node(&mut self, node: &Node) {
        match node {
            Node::Action(action) => self.dispatch(action),
            Node::Loop { condition, body } => {
                if body.is_empty() {
                    return;
                }
                let mut iterations = 0;
                while self.holds(condition) {
                    if iterations == MAX_LOOP_ITERATIONS {
                        self.stats.loops_capped += 1;
                        break;
                    }
                    self.execute_list(body);
                    iterations += 1;
                }
            }
            Node::Conditional {
                condition,
                then,
                otherwise,
            } => {
                if then.is_empty() {
                    return;
                }
                if self.holds(condition) {
                    self.execute_list(then);
                } else {
                    self.execute_list(otherwise);
                }
            }
        }
    }

    /// Unknown checks never hold, whatever result they were expected to give.
    fn holds(&self, condition: &Condition) -> bool {
        match &condition.check {
            Check::CurrentWordMatchesRegex { pattern, fallback } => {
                condition.accepts(self.ws.check_current_word_matches_regex(pattern, *fallback))
            }
            Check::Unknown { .. } => false,
        }
    }

    fn dispatch(&mut self, action: &Action) {
        let ws = &mut *self.ws;
        match action {
            Action::AnchorToRegex {
                pattern,
                occurrence,
                include_normalized,
            } => ws.anchor_to_regex(pattern, *occurrence, *include_normalized),
            Action::AnchorToText {
                text,
                occurrence,
                include_normalized,
            } => ws.anchor_to_text(text, *occurrence, *include_normalized),
            Action::AnchorToNearest => ws.anchor_to_nearest(),
            Action::MoveFirst => ws.move_first(),
            Action::MoveLast => ws.move_last(),
            Action::MoveLeft { jump } => ws.move_left(*jump),
            Action::MoveRight { jump } => ws.move_right(*jump),
            Action::MoveUp { jump } => ws.move_up(*jump),
            Action::MoveDown { jump } => ws.move_down(*jump),
            Action::MoveNext { jump } => ws.move_next(*jump),
            Action::MovePrevious { jump } => ws.move_previous(*jump),
            Action::MoveToSentenceBegin => ws.move_to_sentence_begin(),
            Action::MoveToSentenceEnd => ws.move_to_sentence_end(),
            Action::Collect => ws.collect(),
            Action::CollectLeadingSentence => ws.collect_leading_sentence(),
            Action::CollectTrailingSentence => ws.collect_trailing_sentence(),
            Action::CollectWholeSentence => ws.collect_whole_sentence(),
            Action::ClearTextBuffer => ws.clear_text_buffer(),
            Action::MoveCursorToCornerLeft => ws.move_cursor_to_corner_left(),
            Action::MoveCursorToCornerRight => ws.move_cursor_to_corner_right(),
            Action::MoveCursorToCornerTop => ws.move_cursor_to_corner_top(),
            Action::MoveCursorToCornerBottom => ws.move_cursor_to_corner_bottom(),
            Action::Unknown { name, .. } => {
                debug!("skipping inert command {:?}", name);
                return;
            }
        }
        self.stats.actions += 1;
    }
}

/// Extract every field of `schema` from one document.
///
/// Fields without a command tree resolve to `None` without touching the
/// interpreter. Trees for fields outside the schema are ignored.
pub fn extract_fields(
    ws: &mut WordSpace,
    heuristic: &Heuristic,
    schema: &ExtractionSchema,
) -> Extraction {
    let mut machine = Machine::new(ws);
    schema
        .keys()
        .map(|field| {
            let value = heuristic
                .get(field)
                .and_then(|tree| machine.run_field(tree));
            (field.clone(), value)
        })
        .collect()
}
