//! Packing rendered lines into channel-sized messages.

use crate::formatting::FormattedLine;

/// Telegram's limit on message text, in UTF-16 code units.
pub const DEFAULT_MAX_LENGTH: usize = 4096;
/// Telegram's limit on entities per message.
pub const DEFAULT_MAX_ENTITIES: usize = 100;

/// Splits line lists by length and entity budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageSplitter {
    pub max_length: usize,
    pub max_entities: usize,
}

impl Default for MessageSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LENGTH, DEFAULT_MAX_ENTITIES)
    }
}

impl MessageSplitter {
    pub fn new(max_length: usize, max_entities: usize) -> Self {
        Self {
            max_length,
            max_entities,
        }
    }

    /// Join lines with newlines into as few chunks as the limits allow.
    ///
    /// A line is never split; one that alone exceeds a limit gets a chunk
    /// of its own.
    pub fn split(&self, lines: &[FormattedLine]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut length = 0;
        let mut entities = 0;

        for line in lines {
            let separator = usize::from(!current.is_empty());
            let overflows = length + separator + line.visible_length > self.max_length
                || entities + line.entity_cost > self.max_entities;

            if overflows && !current.is_empty() {
                chunks.push(current.join("\n"));
                current.clear();
                length = 0;
                entities = 0;
            }

            length += usize::from(!current.is_empty()) + line.visible_length;
            entities += line.entity_cost;
            current.push(&line.text);
        }

        if !current.is_empty() {
            chunks.push(current.join("\n"));
        }
        chunks
    }
}
