//! Normalized stream events and their wire form.

use serde::Serialize;

/// One event of a normalized generation stream.
///
/// A stream ends with exactly one [`StreamEvent::Done`] or
/// [`StreamEvent::Error`]; nothing follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A piece of generated text.
    Chunk { text: String },
    /// Generation finished normally.
    Done,
    /// Generation failed after the stream had started.
    Error { message: String },
}

#[derive(Serialize)]
struct WireLine<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    content: &'a str,
    done: bool,
}

impl StreamEvent {
    /// Build a chunk event.
    pub fn chunk(text: impl Into<String>) -> Self {
        StreamEvent::Chunk { text: text.into() }
    }

    /// Build an error event.
    pub fn error(message: impl Into<String>) -> Self {
        StreamEvent::Error {
            message: message.into(),
        }
    }

    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done | StreamEvent::Error { .. })
    }

    /// Encode as one newline-terminated JSON line for the caller.
    pub fn to_line(&self) -> String {
        let wire = match self {
            StreamEvent::Chunk { text } => WireLine {
                kind: "chunk",
                content: text,
                done: false,
            },
            StreamEvent::Done => WireLine {
                kind: "chunk",
                content: "",
                done: true,
            },
            StreamEvent::Error { message } => WireLine {
                kind: "error",
                content: message,
                done: true,
            },
        };

        // Serializing a struct of strings and a bool cannot fail.
        let mut line = serde_json::to_string(&wire).unwrap_or_default();
        line.push('\n');
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn parse(event: &StreamEvent) -> Value {
        let line = event.to_line();
        assert!(line.ends_with('\n'));
        serde_json::from_str(line.trim_end()).unwrap()
    }

    #[test]
    fn test_chunk_line() {
        let value = parse(&StreamEvent::chunk("hi \"there\""));
        assert_eq!(value["type"], "chunk");
        assert_eq!(value["content"], "hi \"there\"");
        assert_eq!(value["done"], false);
    }

    #[test]
    fn test_done_line() {
        let value = parse(&StreamEvent::Done);
        assert_eq!(value["type"], "chunk");
        assert_eq!(value["content"], "");
        assert_eq!(value["done"], true);
    }

    #[test]
    fn test_error_line() {
        let value = parse(&StreamEvent::error("Stream error occurred"));
        assert_eq!(value["type"], "error");
        assert_eq!(value["content"], "Stream error occurred");
        assert_eq!(value["done"], true);
    }

    #[test]
    fn test_is_terminal() {
        assert!(!StreamEvent::chunk("x").is_terminal());
        assert!(StreamEvent::Done.is_terminal());
        assert!(StreamEvent::error("x").is_terminal());
    }
}
