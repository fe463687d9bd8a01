//! Sentinel-framed payload extraction from an unstructured text stream.
//!
//! A query command wraps its JSON output between two token-suffixed sentinel
//! lines. The stream arrives in arbitrary chunks; lines may be split across
//! chunk boundaries, and the host echoes typed commands back prefixed with
//! its prompt. The parser buffers between the sentinels, drops echo lines,
//! and parses the remainder as a single JSON object or array.

use serde_json::Value;

use crate::marker::{CompletionToken, MarkerLine};

/// Prompt prefixes whose lines are echoes of our own input, not host output.
const ECHO_PREFIXES: &[&str] = &["PS ", ">> ", ">"];

/// Errors surfaced by the frame parser. None of these affect session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Buffered payload between the sentinels was not valid JSON.
    MalformedPayload(String),
    /// A second begin sentinel arrived while already buffering.
    UnexpectedBegin,
    /// An end sentinel arrived with nothing open.
    UnexpectedEnd,
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedPayload(e) => write!(f, "could not interpret host response: {e}"),
            Self::UnexpectedBegin => write!(f, "nested payload begin sentinel"),
            Self::UnexpectedEnd => write!(f, "payload end sentinel without begin"),
        }
    }
}

impl std::error::Error for FrameError {}

/// Events produced while feeding chunks through the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// A complete JSON payload (object or array) was framed and parsed.
    Payload(Value),
    /// A marker line for this parser's token.
    Marker(MarkerLine),
    Error(FrameError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Buffering,
}

/// Incremental parser for one command's framed output.
#[derive(Debug)]
pub struct FrameParser {
    token: CompletionToken,
    state: State,
    /// Partial line carried across chunk boundaries.
    carry: String,
    /// Payload lines accumulated between the JSON sentinels.
    payload: Vec<String>,
}

impl FrameParser {
    pub fn new(token: CompletionToken) -> Self {
        Self {
            token,
            state: State::Idle,
            carry: String::new(),
            payload: Vec::new(),
        }
    }

    pub fn token(&self) -> &CompletionToken {
        &self.token
    }

    /// Feeds one raw chunk, returning any events completed by it.
    pub fn feed(&mut self, chunk: &str) -> Vec<FrameEvent> {
        let mut events = Vec::new();
        self.carry.push_str(chunk);

        while let Some(pos) = self.carry.find('\n') {
            let line: String = self.carry.drain(..=pos).collect();
            self.process_line(line.trim_end_matches(['\n', '\r']), &mut events);
        }

        events
    }

    /// Flushes a trailing unterminated line (call at stream end).
    pub fn finish(&mut self) -> Vec<FrameEvent> {
        let mut events = Vec::new();
        if !self.carry.is_empty() {
            let line = std::mem::take(&mut self.carry);
            self.process_line(line.trim_end_matches(['\n', '\r']), &mut events);
        }
        events
    }

    fn process_line(&mut self, line: &str, events: &mut Vec<FrameEvent>) {
        if is_echo_line(line) {
            return;
        }

        match MarkerLine::parse(line, &self.token) {
            Some(MarkerLine::JsonBegin) => match self.state {
                State::Idle => {
                    self.payload.clear();
                    self.state = State::Buffering;
                }
                State::Buffering => events.push(FrameEvent::Error(FrameError::UnexpectedBegin)),
            },
            Some(MarkerLine::JsonEnd) => match self.state {
                State::Buffering => {
                    self.state = State::Idle;
                    let text = self.payload.join("\n");
                    self.payload.clear();
                    match serde_json::from_str::<Value>(text.trim()) {
                        Ok(value) if value.is_object() || value.is_array() => {
                            events.push(FrameEvent::Payload(value));
                        }
                        Ok(other) => events.push(FrameEvent::Error(FrameError::MalformedPayload(
                            format!("expected object or array, got {other}"),
                        ))),
                        Err(e) => events.push(FrameEvent::Error(FrameError::MalformedPayload(
                            e.to_string(),
                        ))),
                    }
                }
                State::Idle => events.push(FrameEvent::Error(FrameError::UnexpectedEnd)),
            },
            Some(marker) => events.push(FrameEvent::Marker(marker)),
            None => {
                if self.state == State::Buffering {
                    self.payload.push(line.to_string());
                }
            }
        }
    }
}

/// Lines the host types back at us (prompt-prefixed echo) are excluded from
/// both payload and marker matching to avoid false positives.
pub fn is_echo_line(line: &str) -> bool {
    ECHO_PREFIXES.iter().any(|p| line.starts_with(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parser() -> FrameParser {
        FrameParser::new(CompletionToken::from_raw("tok"))
    }

    #[test]
    fn frames_payload_in_single_chunk() {
        let mut p = parser();
        let events = p.feed(
            "LINECTL_JSON_BEGIN_tok\n{\"lineUri\":\"+15551230000\"}\nLINECTL_JSON_END_tok\n",
        );
        assert_eq!(
            events,
            vec![FrameEvent::Payload(json!({"lineUri": "+15551230000"}))]
        );
    }

    #[test]
    fn frames_payload_split_across_many_chunks() {
        let mut p = parser();
        let mut events = Vec::new();
        for chunk in [
            "LINECTL_JSON_BEG",
            "IN_tok\n[{\"a\"",
            ":1},{\"a\":2}",
            "]\nLINECTL_JSON_END_tok\n",
        ] {
            events.extend(p.feed(chunk));
        }
        assert_eq!(events, vec![FrameEvent::Payload(json!([{"a":1},{"a":2}]))]);
    }

    #[test]
    fn noise_outside_frame_is_ignored() {
        let mut p = parser();
        let events = p.feed("Welcome banner\nsome diagnostics\n");
        assert!(events.is_empty());
    }

    #[test]
    fn echo_lines_are_stripped_from_payload() {
        let mut p = parser();
        let events = p.feed(
            "LINECTL_JSON_BEGIN_tok\nPS C:\\> Get-Numbers | ConvertTo-Json\n{\"a\":1}\nLINECTL_JSON_END_tok\n",
        );
        assert_eq!(events, vec![FrameEvent::Payload(json!({"a":1}))]);
    }

    #[test]
    fn echo_lines_never_match_markers() {
        let mut p = parser();
        let events = p.feed("PS C:\\> echo LINECTL_RESULT_SUCCESS_tok\n");
        assert!(events.is_empty());
    }

    #[test]
    fn malformed_payload_is_an_error_event() {
        let mut p = parser();
        let events = p.feed("LINECTL_JSON_BEGIN_tok\nnot json at all\nLINECTL_JSON_END_tok\n");
        assert!(matches!(
            events.as_slice(),
            [FrameEvent::Error(FrameError::MalformedPayload(_))]
        ));
    }

    #[test]
    fn scalar_json_is_rejected() {
        let mut p = parser();
        let events = p.feed("LINECTL_JSON_BEGIN_tok\n42\nLINECTL_JSON_END_tok\n");
        assert!(matches!(
            events.as_slice(),
            [FrameEvent::Error(FrameError::MalformedPayload(_))]
        ));
    }

    #[test]
    fn markers_pass_through_outside_frames() {
        let mut p = parser();
        let events = p.feed("LINECTL_STEP_OK_phone_tok\nLINECTL_RESULT_SUCCESS_tok\n");
        assert_eq!(
            events,
            vec![
                FrameEvent::Marker(MarkerLine::StepOk {
                    step: "phone".into()
                }),
                FrameEvent::Marker(MarkerLine::ResultSuccess),
            ]
        );
    }

    #[test]
    fn end_without_begin_is_an_error() {
        let mut p = parser();
        let events = p.feed("LINECTL_JSON_END_tok\n");
        assert_eq!(events, vec![FrameEvent::Error(FrameError::UnexpectedEnd)]);
    }

    #[test]
    fn finish_flushes_trailing_line() {
        let mut p = parser();
        assert!(p.feed("LINECTL_RESULT_SUCCESS_tok").is_empty());
        let events = p.finish();
        assert_eq!(events, vec![FrameEvent::Marker(MarkerLine::ResultSuccess)]);
    }

    #[test]
    fn parse_failure_leaves_parser_usable() {
        let mut p = parser();
        p.feed("LINECTL_JSON_BEGIN_tok\nbroken\nLINECTL_JSON_END_tok\n");
        let events = p.feed("LINECTL_JSON_BEGIN_tok\n{\"ok\":true}\nLINECTL_JSON_END_tok\n");
        assert_eq!(events, vec![FrameEvent::Payload(json!({"ok": true}))]);
    }
}
