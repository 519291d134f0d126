//! Parser for the control tool's verbose listing.
//!
//! Input looks like (wide-decoded, possibly with a BOM and NUL artifacts):
//!
//! ```text
//!   NAME      STATE           VERSION
//! * Ubuntu    Running         2
//!   Debian    Stopped         2
//! ```
//!
//! The parser is total: malformed lines are dropped, never raised. Duplicate
//! names pass through; the registry is not the place that enforces
//! uniqueness (the tool is).

use crate::model::{Instance, InstanceState};

const DEFAULT_MARKER: char = '*';
const BOM: char = '\u{feff}';

/// Converts raw listing text into instances, in encounter order.
///
/// Empty or error-shaped input yields an empty vec; the first line is always
/// treated as the header and discarded.
pub fn parse_listing(raw: &str) -> Vec<Instance> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    trimmed
        .lines()
        .skip(1) // header
        .filter_map(parse_line)
        .collect()
}

fn parse_line(line: &str) -> Option<Instance> {
    let cleaned = line.trim().trim_start_matches(BOM).trim_start();
    if cleaned.is_empty() {
        return None;
    }

    let (is_default, rest) = match cleaned.strip_prefix(DEFAULT_MARKER) {
        Some(rest) => (true, rest.trim_start()),
        None => (false, cleaned),
    };

    let fields = split_columns(rest);
    // Exactly three columns or the line is garbage; skip, don't fail.
    let [name, state, version]: [String; 3] = fields.try_into().ok()?;

    Some(Instance {
        name: sanitize_name(&name),
        state: InstanceState::parse(clean_field(&state).as_str()),
        version: clean_field(&version),
        is_default,
    })
}

/// Splits on runs of 2+ whitespace characters; single whitespace stays
/// inside a field (names may contain one embedded space in the raw output).
fn split_columns(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut pending_ws = String::new();

    for ch in line.chars() {
        if ch.is_whitespace() {
            pending_ws.push(ch);
            continue;
        }
        if pending_ws.chars().count() >= 2 {
            if !current.is_empty() {
                fields.push(std::mem::take(&mut current));
            }
        } else {
            current.push_str(&pending_ws);
        }
        pending_ws.clear();
        current.push(ch);
    }
    if !current.is_empty() {
        fields.push(current);
    }
    fields
}

/// Restricts a name to `[A-Za-z0-9._-]`, dropping control/NUL artifacts the
/// wide decoding can leave behind.
fn sanitize_name(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect()
}

fn clean_field(raw: &str) -> String {
    raw.replace('\0', "").trim().to_string()
}
