//! Extraction and repair of JSON embedded in free-form model output.
//!
//! Hosted models wrap structured answers in markdown fences, lead with prose,
//! and occasionally truncate mid-structure when a token budget runs out. This
//! module strips the wrapping, locates the payload, and applies a narrow
//! best-effort repair before parsing.
//!
//! The repair is deliberately conservative: it closes a dangling trailing
//! string and appends closers for structures still open at end of input. It
//! never rewrites interior content, and a mismatched-but-present closer is
//! left untouched, so corruption in the middle of a document still fails the
//! final parse. That narrowness is relied on by callers; do not extend it.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

/// Raised when model output cannot be parsed even after repair.
///
/// Carries both the pre- and post-repair text so a failed step record can be
/// diagnosed from the log alone.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unparseable model output: {message}")]
pub struct JsonParseError {
    /// The parse error from the original (pre-repair) attempt.
    pub message: String,
    /// Payload as located, before repair.
    pub raw: String,
    /// Payload after repair, which also failed to parse.
    pub repaired: String,
}

fn fence_pattern() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"```[a-zA-Z]*").expect("static fence pattern"))
}

/// Extract and parse the JSON payload from raw model text.
///
/// Strips code-fence markers, discards any preamble before the first `{` or
/// `[` (whichever comes first), and parses. If the direct parse fails, runs
/// [`repair`] once and re-parses; a second failure raises [`JsonParseError`].
///
/// Never raises on well-formed input. Recovers truncation that falls strictly
/// after the last fully-closed structural element or inside a single trailing
/// string; anything else is out of scope.
pub fn extract_json(text: &str) -> Result<Value, JsonParseError> {
    let unfenced = fence_pattern().replace_all(text, "");
    let unfenced = unfenced.as_ref();

    let payload = match locate_payload(unfenced) {
        Some(start) => unfenced[start..].trim(),
        None => unfenced.trim(),
    };

    let original_err = match parse_leading_value(payload) {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };

    let repaired = repair(payload);
    parse_leading_value(&repaired).map_err(|_| JsonParseError {
        message: original_err.to_string(),
        raw: payload.to_string(),
        repaired,
    })
}

/// Parse the first complete JSON value in `text`, ignoring trailing prose.
fn parse_leading_value(text: &str) -> Result<Value, serde_json::Error> {
    let mut stream = serde_json::Deserializer::from_str(text).into_iter::<Value>();
    match stream.next() {
        Some(result) => result,
        // Nothing but whitespace; let the plain parser produce the error.
        None => serde_json::from_str::<Value>(text),
    }
}

/// Byte offset of the earlier of the first `{` or `[`, if any.
fn locate_payload(text: &str) -> Option<usize> {
    match (text.find('{'), text.find('[')) {
        (Some(obj), Some(arr)) => Some(obj.min(arr)),
        (Some(obj), None) => Some(obj),
        (None, Some(arr)) => Some(arr),
        (None, None) => None,
    }
}

/// Best-effort repair of a truncated JSON payload.
///
/// In order: drop a trailing comma, close a dangling string if the unescaped
/// quote count is odd, then append closers for every structure still open at
/// end of input (LIFO). Mismatched closers already present are not corrected.
fn repair(payload: &str) -> String {
    let mut text = payload.trim().to_string();

    if let Some(stripped) = text.strip_suffix(',') {
        text = stripped.to_string();
    }

    if count_unescaped_quotes(&text) % 2 == 1 {
        text.push('"');
    }

    text.push_str(&missing_closers(&text));
    text
}

/// Count `"` characters not preceded by an escaping backslash.
fn count_unescaped_quotes(text: &str) -> usize {
    let mut count = 0;
    let mut escaped = false;
    for ch in text.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '"' => count += 1,
            _ => {}
        }
    }
    count
}

/// Closers for structures still open at end of input, in LIFO order.
fn missing_closers(text: &str) -> String {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for ch in text.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        if in_string {
            match ch {
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                // Pop only on an exact match; a closer that does not match
                // the expected one stays in the text untouched.
                if stack.last() == Some(&ch) {
                    stack.pop();
                }
            }
            _ => {}
        }
    }

    stack.iter().rev().collect()
}
