// src/parse/flame.rs

//! Flame graph construction from collapsed stacks.
//!
//! Each input line is `frame;frame;...;frame <weight>`, outermost frame
//! first. The result is a weighted tree rooted at `"all"` whose children
//! keep first-seen order.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::{ProbeflowError, Result};

/// Name of the root node.
pub const ROOT_NAME: &str = "all";

// Stack part, whitespace, integer weight at the end of the line.
static STACK_LINE: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^(.*\S)\s+(\d+)\s*$"));

/// A node of the call tree.
///
/// `value` is the sum of the children's values plus the samples whose
/// stack ends at this node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlameNode {
    pub name: String,
    pub value: u64,
    #[serde(default)]
    pub children: Vec<FlameNode>,
}

impl FlameNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: 0,
            children: Vec::new(),
        }
    }

    pub fn child(&self, name: &str) -> Option<&FlameNode> {
        self.children.iter().find(|c| c.name == name)
    }

    fn child_mut_or_insert(&mut self, name: &str) -> &mut FlameNode {
        let idx = match self.children.iter().position(|c| c.name == name) {
            Some(idx) => idx,
            None => {
                self.children.push(FlameNode::new(name));
                self.children.len() - 1
            }
        };
        &mut self.children[idx]
    }

    /// Samples that end exactly at this node.
    pub fn self_value(&self) -> u64 {
        let children: u64 = self.children.iter().map(|c| c.value).sum();
        self.value.saturating_sub(children)
    }
}

/// Accumulates stack samples into a [`FlameNode`] tree.
#[derive(Debug, Clone)]
pub struct FlameGraphBuilder {
    root: FlameNode,
}

impl Default for FlameGraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FlameGraphBuilder {
    pub fn new() -> Self {
        Self {
            root: FlameNode::new(ROOT_NAME),
        }
    }

    /// Add `weight` along the path `frames`, creating missing nodes.
    ///
    /// Fails without touching the tree if any node on the path would
    /// overflow.
    pub fn add_sample<S: AsRef<str>>(&mut self, frames: &[S], weight: u64) -> Result<()> {
        let overflow = || {
            ProbeflowError::ParseError(format!(
                "sample weight {weight} overflows the accumulated total {}",
                self.root.value
            ))
        };

        let mut node = &self.root;
        node.value.checked_add(weight).ok_or_else(overflow)?;
        for frame in frames {
            match node.child(frame.as_ref()) {
                Some(child) => {
                    child.value.checked_add(weight).ok_or_else(overflow)?;
                    node = child;
                }
                None => break,
            }
        }

        let mut node = &mut self.root;
        node.value += weight;
        for frame in frames {
            node = node.child_mut_or_insert(frame.as_ref());
            node.value += weight;
        }
        Ok(())
    }

    /// Add one collapsed-stack line. Blank lines are ignored.
    pub fn add_line(&mut self, line: &str) -> Result<()> {
        if line.trim().is_empty() {
            return Ok(());
        }

        let pattern = STACK_LINE
            .as_ref()
            .map_err(|e| ProbeflowError::ParseError(format!("stack line pattern: {e}")))?;
        let caps = pattern.captures(line).ok_or_else(|| {
            ProbeflowError::ParseError(format!("missing trailing sample weight in '{line}'"))
        })?;
        let stack = caps.get(1).map_or("", |m| m.as_str());
        let weight: u64 = caps
            .get(2)
            .map_or("", |m| m.as_str())
            .parse()
            .map_err(|e| ProbeflowError::ParseError(format!("bad sample weight in '{line}': {e}")))?;

        let frames: Vec<&str> = stack.split(';').collect();
        if frames.iter().any(|f| f.is_empty()) {
            return Err(ProbeflowError::ParseError(format!(
                "empty frame in '{line}'"
            )));
        }

        self.add_sample(&frames, weight)
    }

    /// Add every line of a collapsed-stack file.
    pub fn add_file(&mut self, path: &Path) -> Result<()> {
        let contents = fs::read_to_string(path)?;
        for (idx, line) in contents.lines().enumerate() {
            self.add_line(line).map_err(|e| match e {
                ProbeflowError::ParseError(msg) => {
                    ProbeflowError::ParseError(format!("{}:{}: {msg}", path.display(), idx + 1))
                }
                other => other,
            })?;
        }
        Ok(())
    }

    /// Total weight seen so far.
    pub fn total(&self) -> u64 {
        self.root.value
    }

    pub fn build(self) -> FlameNode {
        self.root
    }
}
