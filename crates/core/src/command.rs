//! Command trees: the per-field programs replayed against a [`WordSpace`].
//!
//! The JSON shape is shared with the heuristic cache and the generator:
//!
//! ```text
//! {"type":"command","name":<string>,"args":{...}}
//! {"type":"loop","condition":{"name":<string>,"args":{...},"check":<bool>},"body":[...]}
//! {"type":"if","condition":{...},"then":[...],"else":[...]}
//! ```
//!
//! Parsing happens in two tiers. A node with the wrong *structure* (not an
//! object, unknown `type`, missing `condition`, non-list branches) is a
//! [`CommandError`] and gets dropped by [`parse_commands`]. A well-formed node
//! naming an operation outside the whitelist, or calling one with the wrong
//! arguments, parses into [`Action::Unknown`] / [`Check::Unknown`], which the
//! interpreter treats as inert.
//!
//! [`WordSpace`]: crate::wordspace::WordSpace

use log::{debug, warn};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};
use thiserror::Error;

/// An ordered list of nodes executed in sequence.
pub type CommandTree = Vec<Node>;

#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("command node must be a JSON object")]
    NotAnObject,
    #[error("unknown node type: {0:?}")]
    UnknownType(String),
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("field `{field}` must be {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },
}

/// A single node of a command tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Action(Action),
    Loop {
        condition: Condition,
        body: CommandTree,
    },
    /// An empty `then` branch makes the whole node inert.
    Conditional {
        condition: Condition,
        then: CommandTree,
        otherwise: CommandTree,
    },
}

/// The whitelisted WordSpace operations, with typed arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    AnchorToRegex {
        pattern: String,
        occurrence: usize,
        include_normalized: bool,
    },
    AnchorToText {
        text: String,
        occurrence: usize,
        include_normalized: bool,
    },
    AnchorToNearest,
    MoveFirst,
    MoveLast,
    MoveLeft { jump: usize },
    MoveRight { jump: usize },
    MoveUp { jump: usize },
    MoveDown { jump: usize },
    MoveNext { jump: usize },
    MovePrevious { jump: usize },
    MoveToSentenceBegin,
    MoveToSentenceEnd,
    Collect,
    CollectLeadingSentence,
    CollectTrailingSentence,
    CollectWholeSentence,
    ClearTextBuffer,
    MoveCursorToCornerLeft,
    MoveCursorToCornerRight,
    MoveCursorToCornerTop,
    MoveCursorToCornerBottom,
    /// Anything outside the whitelist or with mismatched arguments. Kept
    /// verbatim so the tree can be written back unchanged.
    Unknown { name: String, args: Map<String, Value> },
}

/// A check predicate plus the result it is expected to produce.
///
/// `expected` is kept as written. Anything but a JSON boolean never equals a
/// check result, so such a condition never holds.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub check: Check,
    pub expected: Value,
}

impl Condition {
    /// Whether a check that produced `result` satisfies this condition.
    pub fn accepts(&self, result: bool) -> bool {
        self.expected == Value::Bool(result)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Check {
    CurrentWordMatchesRegex { pattern: String, fallback: bool },
    /// Always evaluates to "condition does not hold".
    Unknown { name: String, args: Map<String, Value> },
}

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

/// Typed view over a node's `args` object. Every accessor returns `None` on a
/// type mismatch so a single `?` chain rejects the whole call.
struct Args<'a>(&'a Map<String, Value>);

impl<'a> Args<'a> {
    fn only(&self, allowed: &[&str]) -> Option<()> {
        self.0
            .keys()
            .all(|k| allowed.contains(&k.as_str()))
            .then_some(())
    }

    fn string(&self, key: &str) -> Option<String> {
        self.0.get(key)?.as_str().map(str::to_string)
    }

    fn count(&self, key: &str, default: usize) -> Option<usize> {
        match self.0.get(key) {
            None => Some(default),
            Some(v) => v.as_u64().and_then(|n| usize::try_from(n).ok()),
        }
    }

    fn flag(&self, key: &str, default: bool) -> Option<bool> {
        match self.0.get(key) {
            None => Some(default),
            Some(v) => v.as_bool(),
        }
    }

    fn jump(&self) -> Option<usize> {
        self.only(&["jump"])?;
        self.count("jump", 0)
    }

    fn none(&self) -> Option<()> {
        self.only(&[])
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

impl Action {
    /// Resolve a command name and its arguments against the whitelist.
    pub fn parse(name: &str, args: &Map<String, Value>) -> Self {
        Self::parse_known(name, &Args(args)).unwrap_or_else(|| {
            debug!("inert command {:?} with args {:?}", name, args);
            Action::Unknown {
                name: name.to_string(),
                args: args.clone(),
            }
        })
    }

    fn parse_known(name: &str, a: &Args<'_>) -> Option<Self> {
        let action = match name {
            "anchor_to_regex" => {
                a.only(&["pattern", "occurrence", "include_normalized"])?;
                Action::AnchorToRegex {
                    pattern: a.string("pattern")?,
                    occurrence: a.count("occurrence", 0)?,
                    include_normalized: a.flag("include_normalized", true)?,
                }
            }
            "anchor_to_text" => {
                a.only(&["text", "occurrence", "include_normalized"])?;
                Action::AnchorToText {
                    text: a.string("text")?,
                    occurrence: a.count("occurrence", 0)?,
                    include_normalized: a.flag("include_normalized", true)?,
                }
            }
            "move_left" => Action::MoveLeft { jump: a.jump()? },
            "move_right" => Action::MoveRight { jump: a.jump()? },
            "move_up" => Action::MoveUp { jump: a.jump()? },
            "move_down" => Action::MoveDown { jump: a.jump()? },
            "move_next" => Action::MoveNext { jump: a.jump()? },
            "move_previous" => Action::MovePrevious { jump: a.jump()? },
            other => {
                let action = match other {
                    "anchor_to_nearest" => Action::AnchorToNearest,
                    "move_first" => Action::MoveFirst,
                    "move_last" => Action::MoveLast,
                    "move_to_sentence_begin" => Action::MoveToSentenceBegin,
                    "move_to_sentence_end" => Action::MoveToSentenceEnd,
                    "collect" => Action::Collect,
                    "collect_leading_sentence" => Action::CollectLeadingSentence,
                    "collect_trailing_sentence" => Action::CollectTrailingSentence,
                    "collect_whole_sentence" => Action::CollectWholeSentence,
                    "clear_text_buffer" => Action::ClearTextBuffer,
                    "move_cursor_to_corner_left" => Action::MoveCursorToCornerLeft,
                    "move_cursor_to_corner_right" => Action::MoveCursorToCornerRight,
                    "move_cursor_to_corner_top" => Action::MoveCursorToCornerTop,
                    "move_cursor_to_corner_bottom" => Action::MoveCursorToCornerBottom,
                    _ => return None,
                };
                a.none()?;
                action
            }
        };
        Some(action)
    }

    pub fn name(&self) -> &str {
        match self {
            Action::AnchorToRegex { .. } => "anchor_to_regex",
            Action::AnchorToText { .. } => "anchor_to_text",
            Action::AnchorToNearest => "anchor_to_nearest",
            Action::MoveFirst => "move_first",
            Action::MoveLast => "move_last",
            Action::MoveLeft { .. } => "move_left",
            Action::MoveRight { .. } => "move_right",
            Action::MoveUp { .. } => "move_up",
            Action::MoveDown { .. } => "move_down",
            Action::MoveNext { .. } => "move_next",
            Action::MovePrevious { .. } => "move_previous",
            Action::MoveToSentenceBegin => "move_to_sentence_begin",
            Action::MoveToSentenceEnd => "move_to_sentence_end",
            Action::Collect => "collect",
            Action::CollectLeadingSentence => "collect_leading_sentence",
            Action::CollectTrailingSentence => "collect_trailing_sentence",
            Action::CollectWholeSentence => "collect_whole_sentence",
            Action::ClearTextBuffer => "clear_text_buffer",
            Action::MoveCursorToCornerLeft => "move_cursor_to_corner_left",
            Action::MoveCursorToCornerRight => "move_cursor_to_corner_right",
            Action::MoveCursorToCornerTop => "move_cursor_to_corner_top",
            Action::MoveCursorToCornerBottom => "move_cursor_to_corner_bottom",
            Action::Unknown { name, .. } => name,
        }
    }

    pub fn args(&self) -> Map<String, Value> {
        let value = match self {
            Action::AnchorToRegex {
                pattern,
                occurrence,
                include_normalized,
            } => json!({
                "pattern": pattern,
                "occurrence": occurrence,
                "include_normalized": include_normalized,
            }),
            Action::AnchorToText {
                text,
                occurrence,
                include_normalized,
            } => json!({
                "text": text,
                "occurrence": occurrence,
                "include_normalized": include_normalized,
            }),
            Action::MoveLeft { jump }
            | Action::MoveRight { jump }
            | Action::MoveUp { jump }
            | Action::MoveDown { jump }
            | Action::MoveNext { jump }
            | Action::MovePrevious { jump } => json!({ "jump": jump }),
            Action::Unknown { args, .. } => return args.clone(),
            _ => return Map::new(),
        };
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Action::Unknown { .. })
    }
}

// ---------------------------------------------------------------------------
// Condition
// ---------------------------------------------------------------------------

impl Check {
    pub fn parse(name: &str, args: &Map<String, Value>) -> Self {
        let a = Args(args);
        let known = match name {
            "check_current_word_matches_regex" => a
                .only(&["pattern", "fallback"])
                .and_then(|_| {
                    Some(Check::CurrentWordMatchesRegex {
                        pattern: a.string("pattern")?,
                        fallback: a.flag("fallback", true)?,
                    })
                }),
            _ => None,
        };
        known.unwrap_or_else(|| {
            debug!("inert check {:?} with args {:?}", name, args);
            Check::Unknown {
                name: name.to_string(),
                args: args.clone(),
            }
        })
    }

    pub fn name(&self) -> &str {
        match self {
            Check::CurrentWordMatchesRegex { .. } => "check_current_word_matches_regex",
            Check::Unknown { name, .. } => name,
        }
    }

    pub fn args(&self) -> Map<String, Value> {
        match self {
            Check::CurrentWordMatchesRegex { pattern, fallback } => {
                let mut map = Map::new();
                map.insert("pattern".into(), Value::from(pattern.as_str()));
                map.insert("fallback".into(), Value::from(*fallback));
                map
            }
            Check::Unknown { args, .. } => args.clone(),
        }
    }
}

impl Condition {
    pub fn from_value(value: &Value) -> Result<Self, CommandError> {
        let obj = value.as_object().ok_or(CommandError::InvalidField {
            field: "condition",
            expected: "an object",
        })?;
        // A missing name is well-formed but can never hold.
        let name = match obj.get("name") {
            None | Some(Value::Null) => "",
            Some(Value::String(s)) => s.as_str(),
            Some(_) => {
                return Err(CommandError::InvalidField {
                    field: "name",
                    expected: "a string",
                })
            }
        };
        let expected = obj.get("check").cloned().unwrap_or(Value::Bool(true));
        if !expected.is_boolean() {
            debug!("condition {:?} compares against non-boolean {}", name, expected);
        }
        Ok(Condition {
            check: Check::parse(name, &args_of(obj)?),
            expected,
        })
    }

    pub fn to_value(&self) -> Value {
        json!({
            "name": self.check.name(),
            "args": self.check.args(),
            "check": self.expected,
        })
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

fn args_of(obj: &Map<String, Value>) -> Result<Map<String, Value>, CommandError> {
    match obj.get("args") {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(_) => Err(CommandError::InvalidField {
            field: "args",
            expected: "an object",
        }),
    }
}

fn branch_of(obj: &Map<String, Value>, field: &'static str) -> Result<CommandTree, CommandError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(v @ Value::Array(_)) => Ok(parse_commands(v)),
        Some(_) => Err(CommandError::InvalidField {
            field,
            expected: "a list of commands",
        }),
    }
}

fn condition_of(obj: &Map<String, Value>) -> Result<Condition, CommandError> {
    let value = obj
        .get("condition")
        .ok_or(CommandError::MissingField("condition"))?;
    Condition::from_value(value)
}

impl Node {
    /// Parse one node. Nested lists are parsed leniently: structurally
    /// invalid children are dropped, not propagated.
    pub fn from_value(value: &Value) -> Result<Self, CommandError> {
        let obj = value.as_object().ok_or(CommandError::NotAnObject)?;
        let node_type = obj
            .get("type")
            .ok_or(CommandError::MissingField("type"))?
            .as_str()
            .ok_or(CommandError::InvalidField {
                field: "type",
                expected: "a string",
            })?;

        match node_type {
            "command" => {
                let name = obj
                    .get("name")
                    .ok_or(CommandError::MissingField("name"))?
                    .as_str()
                    .ok_or(CommandError::InvalidField {
                        field: "name",
                        expected: "a string",
                    })?;
                Ok(Node::Action(Action::parse(name, &args_of(obj)?)))
            }
            "loop" => Ok(Node::Loop {
                condition: condition_of(obj)?,
                body: branch_of(obj, "body")?,
            }),
            "if" => Ok(Node::Conditional {
                condition: condition_of(obj)?,
                then: branch_of(obj, "then")?,
                otherwise: branch_of(obj, "else")?,
            }),
            other => Err(CommandError::UnknownType(other.to_string())),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Node::Action(action) => json!({
                "type": "command",
                "name": action.name(),
                "args": action.args(),
            }),
            Node::Loop { condition, body } => json!({
                "type": "loop",
                "condition": condition.to_value(),
                "body": body.iter().map(Node::to_value).collect::<Vec<_>>(),
            }),
            Node::Conditional {
                condition,
                then,
                otherwise,
            } => json!({
                "type": "if",
                "condition": condition.to_value(),
                "then": then.iter().map(Node::to_value).collect::<Vec<_>>(),
                "else": otherwise.iter().map(Node::to_value).collect::<Vec<_>>(),
            }),
        }
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Node::from_value(&value).map_err(D::Error::custom)
    }
}

/// Parse a list of nodes from foreign input, dropping structurally invalid
/// entries. Anything other than a JSON array yields an empty tree.
pub fn parse_commands(value: &Value) -> CommandTree {
    let Some(items) = value.as_array() else {
        warn!("expected a list of commands, got {}", value);
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match Node::from_value(item) {
            Ok(node) => Some(node),
            Err(e) => {
                warn!("dropping malformed command node: {}", e);
                None
            }
        })
        .collect()
}

/// Serialize a tree back to its JSON list form.
pub fn commands_to_value(tree: &[Node]) -> Value {
    Value::Array(tree.iter().map(Node::to_value).collect())
}
