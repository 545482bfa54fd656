//! Turns the raw text of an assistant reply into the text shown to the user.
//!
//! The model requests a tool by writing `<tool>NAME</tool>ARGUMENT` inline,
//! where the argument runs to the end of the line. While a reply streams in,
//! [`ToolStreamProcessor::process`] is called with every longer prefix of the
//! same buffer. Each call re-scans the whole buffer, so the processor keeps a
//! record of every occurrence it has already dealt with and replays that
//! outcome instead of running the tool again.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::tool::ToolRegistry;

pub const MARKER_OPEN: &str = "<tool>";
pub const MARKER_CLOSE: &str = "</tool>";

lazy_static! {
    static ref MARKER: Regex = Regex::new(r"<tool>([^<\n]*)</tool>([^\n]*)").unwrap();
}

/// Render a marker the way the model is told to write it.
pub fn marker(name: &str, argument: &str) -> String {
    format!("{}{}{}{}", MARKER_OPEN, name, MARKER_CLOSE, argument)
}

/// A marker occurrence, identified by where it starts in the raw buffer and
/// the exact text of its span. Streaming only ever appends to the buffer, so
/// both stay fixed once the argument is terminated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Occurrence {
    start: usize,
    span: String,
}

/// A marker match in the current buffer, before it is checked for completeness.
struct Found<'a> {
    start: usize,
    end: usize,
    name: &'a str,
    argument: &'a str,
}

#[derive(Debug, Clone)]
enum Resolution {
    /// The tool ran; this text replaces the span.
    Substituted(String),
    /// No tool by that name; the span stays verbatim.
    Unknown,
}

/// Per-turn state of the marker scanner. Create one when the assistant turn
/// starts and drop it when the turn ends.
pub struct ToolStreamProcessor {
    tools: ToolRegistry,
    resolved: HashMap<Occurrence, Resolution>,
    invocations: usize,
}

impl ToolStreamProcessor {
    pub fn new(tools: ToolRegistry) -> Self {
        Self {
            tools,
            resolved: HashMap::new(),
            invocations: 0,
        }
    }

    /// Number of tool invocations performed so far this turn.
    pub fn invocations(&self) -> usize {
        self.invocations
    }

    /// Produce the display text for `buffer`, the full reply received so far.
    ///
    /// `is_final` tells whether more text may still arrive. An argument that
    /// runs to the end of the buffer is only considered terminated on the
    /// final call; before that the marker is shown verbatim.
    ///
    /// Tool failures are rendered inline and never returned as errors.
    pub async fn process(&mut self, buffer: &str, is_final: bool) -> String {
        let mut output = String::with_capacity(buffer.len());
        let mut cursor = 0;

        let found: Vec<Found<'_>> = MARKER
            .captures_iter(buffer)
            .filter_map(|caps| {
                Some(Found {
                    start: caps.get(0)?.start(),
                    end: caps.get(0)?.end(),
                    name: caps.get(1)?.as_str(),
                    argument: caps.get(2)?.as_str(),
                })
            })
            .collect();

        for Found {
            start,
            end,
            name,
            argument: raw_argument,
        } in found
        {
            let terminated = buffer[end..].starts_with('\n') || is_final;
            if !terminated {
                debug!(tool = name, "marker argument still streaming");
                break;
            }

            // Keep a CR of a CRLF line ending outside the span.
            let span_end = if raw_argument.ends_with('\r') {
                end - 1
            } else {
                end
            };
            let occurrence = Occurrence {
                start,
                span: buffer[start..span_end].to_string(),
            };

            let resolution = match self.resolved.get(&occurrence) {
                Some(resolution) => resolution.clone(),
                None => {
                    let resolution = self.resolve(name, raw_argument.trim()).await;
                    self.resolved.insert(occurrence, resolution.clone());
                    resolution
                }
            };

            output.push_str(&buffer[cursor..start]);
            match resolution {
                Resolution::Substituted(text) => output.push_str(&text),
                Resolution::Unknown => output.push_str(&buffer[start..span_end]),
            }
            cursor = span_end;
        }

        output.push_str(&buffer[cursor..]);
        output
    }

    async fn resolve(&mut self, name: &str, argument: &str) -> Resolution {
        let Some(tool) = self.tools.get(name).cloned() else {
            warn!(tool = name, "model requested an unknown tool, leaving marker in place");
            return Resolution::Unknown;
        };

        info!(tool = name, argument, "invoking tool");
        self.invocations += 1;

        match tool.invoke(argument).await {
            Ok(text) if text.trim().is_empty() => {
                Resolution::Substituted(format!("[tool {} returned no content]", name))
            }
            Ok(text) => Resolution::Substituted(text),
            Err(e) => {
                warn!(tool = name, error = %e, "tool invocation failed");
                Resolution::Substituted(format!("[tool {} failed: {}]", name, e))
            }
        }
    }
}
