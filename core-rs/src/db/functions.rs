/**
 * functions.rs
 * SPARQL helper functions registered as SQLite UDFs
 *
 * Registered once per interface at open. Errors surface through the SQL
 * result-error channel prefixed with the function's SPARQL name. Compiled
 * regexes are cached per SQL call site through SQLite's auxdata mechanism.
 */

use std::path::Path;
use std::sync::Arc;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::{Regex, RegexBuilder};
use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{Connection, OptionalExtension};
use sha2::Digest;
use uuid::Uuid;

use crate::collation;
use crate::datetime;
use crate::db::value::{LangString, BNODE_PREFIX};
use crate::ontology::PropertyType;

/// Earth radius in meters shared by both distance functions.
const EARTH_RADIUS: f64 = 6_371_000.0;

/// Characters percent-encoded by fn:encode-for-uri: everything but
/// unreserved.
const ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// The path-reserved set preserved by ontodb:uri.
const URI_SET: &AsciiSet = &ENCODE_SET
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b';')
    .remove(b'=')
    .remove(b':')
    .remove(b'@')
    .remove(b'/');

/// Register every SPARQL helper on a connection.
pub fn register_all(conn: &Connection) -> rusqlite::Result<()> {
    let det = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;
    let nondet = FunctionFlags::SQLITE_UTF8;

    // Geolocation
    conn.create_scalar_function("SparqlHaversineDistance", 4, det, haversine_distance)?;
    conn.create_scalar_function("SparqlCartesianDistance", 4, det, cartesian_distance)?;

    // Date/time
    conn.create_scalar_function("SparqlFormatTime", 1, det, format_time)?;
    conn.create_scalar_function("SparqlTimestamp", 1, det, timestamp)?;
    conn.create_scalar_function("SparqlTimeSort", 1, det, time_sort)?;
    conn.create_scalar_function("SparqlTimezoneDuration", 1, det, timezone_duration)?;
    conn.create_scalar_function("SparqlTimezoneString", 1, det, timezone_string)?;
    conn.create_scalar_function("SparqlTimezone", 1, det, timezone)?;

    // Paths and filenames
    conn.create_scalar_function("SparqlStringFromFilename", 1, det, string_from_filename)?;
    conn.create_scalar_function("SparqlUriIsParent", 2, det, uri_is_parent)?;
    conn.create_scalar_function("SparqlUriIsDescendant", -1, det, uri_is_descendant)?;
    conn.create_scalar_function("SparqlEncodeForUri", 1, det, encode_for_uri)?;
    conn.create_scalar_function("SparqlUri", 1, det, uri)?;

    // Strings
    conn.create_scalar_function("SparqlRegex", -1, det, sparql_regex)?;
    conn.create_scalar_function("SparqlStringJoin", -1, det, string_join)?;
    conn.create_scalar_function("SparqlLowerCase", 1, det, lower_case)?;
    conn.create_scalar_function("SparqlUpperCase", 1, det, upper_case)?;
    conn.create_scalar_function("SparqlCaseFold", 1, det, case_fold)?;
    conn.create_scalar_function("SparqlStripPunctuation", 1, det, strip_punctuation)?;
    conn.create_scalar_function("SparqlNormalize", 2, det, normalize)?;
    conn.create_scalar_function("SparqlUnaccent", 1, det, unaccent)?;
    conn.create_scalar_function("SparqlStringBefore", 2, det, string_before)?;
    conn.create_scalar_function("SparqlStringAfter", 2, det, string_after)?;
    conn.create_scalar_function("SparqlReplace", -1, det, sparql_replace)?;
    conn.create_scalar_function("SparqlChecksum", 2, det, checksum)?;
    conn.create_scalar_function("SparqlLangMatches", 2, det, langmatches)?;
    conn.create_scalar_function("SparqlStrLang", 2, det, strlang)?;
    conn.create_scalar_function("SparqlPrintIRI", 1, det, print_iri)?;

    // Numbers
    conn.create_scalar_function("SparqlCeil", 1, det, ceil)?;
    conn.create_scalar_function("SparqlFloor", 1, det, floor)?;
    conn.create_scalar_function("SparqlRand", 0, nondet, rand_value)?;

    // Types
    conn.create_scalar_function("SparqlDataType", 1, det, data_type)?;

    // UUID
    conn.create_scalar_function("SparqlUUID", 1, nondet, sparql_uuid)?;
    conn.create_scalar_function("SparqlBNODE", 0, nondet, sparql_bnode)?;

    Ok(())
}

fn fn_error(function: &str, message: impl std::fmt::Display) -> rusqlite::Error {
    rusqlite::Error::UserFunctionError(format!("{}: {}", function, message).into())
}

/// Coerce to text the way sqlite3_value_text does; a blob stops at the
/// embedded NUL.
fn text_arg(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(v) => Some(v.to_string()),
        ValueRef::Real(v) => Some(v.to_string()),
        ValueRef::Text(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => {
            let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
            Some(String::from_utf8_lossy(&bytes[..end]).into_owned())
        }
    }
}

fn f64_arg(value: ValueRef<'_>) -> f64 {
    match value {
        ValueRef::Integer(v) => v as f64,
        ValueRef::Real(v) => v,
        ValueRef::Text(bytes) => String::from_utf8_lossy(bytes).trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn owned_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Integer(v),
        ValueRef::Real(v) => Value::Real(v),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}

// Geolocation

fn haversine_distance(ctx: &Context<'_>) -> rusqlite::Result<Value> {
    let lat1 = f64_arg(ctx.get_raw(0)).to_radians();
    let lat2 = f64_arg(ctx.get_raw(1)).to_radians();
    let lon1 = f64_arg(ctx.get_raw(2)).to_radians();
    let lon2 = f64_arg(ctx.get_raw(3)).to_radians();

    let d_lat = lat2 - lat1;
    let d_lon = lon2 - lon1;
    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    Ok(Value::Real(EARTH_RADIUS * c))
}

fn cartesian_distance(ctx: &Context<'_>) -> rusqlite::Result<Value> {
    let lat1 = f64_arg(ctx.get_raw(0)).to_radians();
    let lat2 = f64_arg(ctx.get_raw(1)).to_radians();
    let lon1 = f64_arg(ctx.get_raw(2)).to_radians();
    let lon2 = f64_arg(ctx.get_raw(3)).to_radians();

    let a = std::f64::consts::FRAC_PI_2 - lat1;
    let b = std::f64::consts::FRAC_PI_2 - lat2;
    let c = (a * a + b * b - 2.0 * a * b * (lon2 - lon1).cos()).sqrt();

    Ok(Value::Real(EARTH_RADIUS * c))
}

// Date/time

fn format_time(ctx: &Context<'_>) -> rusqlite::Result<Value> {
    const FN: &str = "SparqlFormatTime";

    match ctx.get_raw(0) {
        ValueRef::Null => Ok(Value::Null),
        ValueRef::Integer(epoch) => match datetime::format_epoch_iso8601(epoch) {
            Ok(text) => Ok(Value::Text(text)),
            Err(_) => Ok(Value::Null),
        },
        ValueRef::Text(bytes) => Ok(Value::Text(String::from_utf8_lossy(bytes).into_owned())),
        _ => Err(fn_error(FN, "Invalid argument type")),
    }
}

fn timestamp(ctx: &Context<'_>) -> rusqlite::Result<Value> {
    const FN: &str = "SparqlTimestamp";

    match ctx.get_raw(0) {
        ValueRef::Null => Ok(Value::Null),
        ValueRef::Integer(seconds) => Ok(Value::Real(seconds as f64)),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes);
            let parsed = datetime::parse_iso8601(&text)
                .map_err(|_| fn_error(FN, "Failed time string conversion"))?;
            Ok(Value::Integer(datetime::epoch_with_offset(&parsed)))
        }
        _ => Err(fn_error(FN, "Invalid argument type")),
    }
}

fn time_sort(ctx: &Context<'_>) -> rusqlite::Result<Value> {
    const FN: &str = "SparqlTimeSort";

    let sort_key = match ctx.get_raw(0) {
        ValueRef::Null => return Ok(Value::Null),
        ValueRef::Integer(v) => v * 1_000_000,
        ValueRef::Real(v) => (v * 1_000_000.0) as i64,
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes);
            let parsed = datetime::parse_iso8601(&text).map_err(|e| fn_error(FN, e))?;
            datetime::sort_key(&parsed)
        }
        _ => return Err(fn_error(FN, "Invalid argument type")),
    };

    Ok(Value::Integer(sort_key))
}

fn timezone_duration(ctx: &Context<'_>) -> rusqlite::Result<Value> {
    const FN: &str = "timezone-from-dateTime";

    match ctx.get_raw(0) {
        ValueRef::Null => Ok(Value::Null),
        ValueRef::Integer(_) => Ok(Value::Integer(0)),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes);
            let parsed =
                datetime::parse_iso8601(&text).map_err(|_| fn_error(FN, "Invalid date"))?;
            Ok(Value::Integer(datetime::utc_offset_seconds(&parsed)))
        }
        _ => Err(fn_error(FN, "Invalid argument type")),
    }
}

fn timezone_string(ctx: &Context<'_>) -> rusqlite::Result<Value> {
    match ctx.get_raw(0) {
        ValueRef::Null => Ok(Value::Null),
        ValueRef::Integer(_) => Ok(Value::Text(String::new())),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes);
            Ok(Value::Text(datetime::timezone_suffix(&text).to_string()))
        }
        _ => Err(rusqlite::Error::UserFunctionError(
            "Invalid argument type converting timezone to string".into(),
        )),
    }
}

fn timezone(ctx: &Context<'_>) -> rusqlite::Result<Value> {
    const FN: &str = "SparqlTimezone";

    match ctx.get_raw(0) {
        ValueRef::Null => Ok(Value::Null),
        ValueRef::Integer(_) => Ok(Value::Text("PT0S".to_string())),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes);
            let parsed =
                datetime::parse_iso8601(&text).map_err(|_| fn_error(FN, "Invalid date"))?;
            let offset = datetime::utc_offset_seconds(&parsed);
            Ok(Value::Text(datetime::offset_to_duration(offset)))
        }
        _ => Err(fn_error(FN, "Invalid argument type")),
    }
}

// Paths and URIs

/// "/home/user/title_of_the_movie.movie" → "title of the movie"
fn string_from_filename(ctx: &Context<'_>) -> rusqlite::Result<Value> {
    let path = match text_arg(ctx.get_raw(0)) {
        Some(path) => path,
        None => return Ok(Value::Null),
    };

    let name = Path::new(&path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or(path);

    let stem = match name.rfind('.') {
        Some(index) => name[..index].to_string(),
        None => name,
    };

    let spaced: String = stem
        .chars()
        .map(|c| if c == '.' || c == '_' { ' ' } else { c })
        .collect();

    Ok(Value::Text(spaced))
}

fn has_uri_scheme(uri: &str) -> bool {
    let bytes = uri.as_bytes();
    (bytes.len() >= 7 && bytes[4] == b':' && bytes[5] == b'/' && bytes[6] == b'/')
        || uri.contains("://")
}

/// Matching prefix length after trimming the parent's trailing slashes, or
/// None when `uri` does not live under `parent`.
fn child_offset(parent: &str, uri: &str) -> Option<usize> {
    if !has_uri_scheme(parent) {
        return None;
    }

    let parent_bytes = parent.as_bytes();
    let uri_bytes = uri.as_bytes();

    let mut parent_len = parent.len();
    while parent_len > 0 && parent_bytes[parent_len - 1] == b'/' {
        parent_len -= 1;
    }

    if uri_bytes.len() <= parent_len
        || uri_bytes[..parent_len] != parent_bytes[..parent_len]
        || uri_bytes[parent_len] != b'/'
    {
        return None;
    }

    let mut index = parent_len;
    while index < uri_bytes.len() && uri_bytes[index] == b'/' {
        index += 1;
    }

    Some(index)
}

fn check_uri_is_parent(parent: &str, uri: &str) -> bool {
    let Some(offset) = child_offset(parent, uri) else {
        return false;
    };

    let remaining = &uri[offset..];
    if remaining.is_empty() {
        // Exact match, not a child
        return false;
    }

    match remaining.find('/') {
        // No separator left: a direct child
        None => true,
        // Only trailing slashes also count
        Some(slash) => remaining[slash..].bytes().all(|b| b == b'/'),
    }
}

fn check_uri_is_descendant(parent: &str, uri: &str) -> bool {
    match child_offset(parent, uri) {
        Some(offset) => !uri[offset..].is_empty(),
        None => false,
    }
}

fn uri_is_parent(ctx: &Context<'_>) -> rusqlite::Result<Value> {
    let parent = text_arg(ctx.get_raw(0));
    let uri = text_arg(ctx.get_raw(1));

    let matched = match (parent, uri) {
        (Some(parent), Some(uri)) => check_uri_is_parent(&parent, &uri),
        _ => false,
    };

    Ok(Value::Integer(matched as i64))
}

/// SparqlUriIsDescendant(parent1, ..., parentN, child): true iff any parent
/// is a strict ancestor of child.
fn uri_is_descendant(ctx: &Context<'_>) -> rusqlite::Result<Value> {
    const FN: &str = "ontodb:uri-is-descendant";

    if ctx.len() < 2 {
        return Err(fn_error(FN, "Invalid argument count"));
    }

    for index in 0..ctx.len() {
        match ctx.get_raw(index) {
            ValueRef::Null => return Ok(Value::Integer(0)),
            ValueRef::Text(_) => {}
            _ => return Err(fn_error(FN, "Invalid non-text argument")),
        }
    }

    let child = text_arg(ctx.get_raw(ctx.len() - 1)).unwrap_or_default();

    for index in 0..ctx.len() - 1 {
        let parent = text_arg(ctx.get_raw(index)).unwrap_or_default();
        if check_uri_is_descendant(&parent, &child) {
            return Ok(Value::Integer(1));
        }
    }

    Ok(Value::Integer(0))
}

fn encode_for_uri(ctx: &Context<'_>) -> rusqlite::Result<Value> {
    let text = text_arg(ctx.get_raw(0)).unwrap_or_default();
    Ok(Value::Text(
        utf8_percent_encode(&text, ENCODE_SET).to_string(),
    ))
}

fn uri(ctx: &Context<'_>) -> rusqlite::Result<Value> {
    let text = text_arg(ctx.get_raw(0)).unwrap_or_default();
    Ok(Value::Text(utf8_percent_encode(&text, URI_SET).to_string()))
}

// Strings

fn compile_regex(function: &str, pattern: &str, flags: &str) -> Result<Regex, String> {
    let mut builder = RegexBuilder::new(pattern);

    for flag in flags.chars() {
        match flag {
            's' => {
                builder.dot_matches_new_line(true);
            }
            'm' => {
                builder.multi_line(true);
            }
            'i' => {
                builder.case_insensitive(true);
            }
            'x' => {
                builder.ignore_whitespace(true);
            }
            other => {
                return Err(format!(
                    "{}: Invalid SPARQL regex flag '{}'",
                    function, other
                ))
            }
        }
    }

    builder
        .build()
        .map_err(|e| format!("{}: {}", function, e))
}

fn sparql_regex(ctx: &Context<'_>) -> rusqlite::Result<Value> {
    const FN: &str = "fn:matches";

    if ctx.len() != 2 && ctx.len() != 3 {
        return Err(fn_error(FN, "Invalid argument count"));
    }

    let flags = if ctx.len() == 3 {
        text_arg(ctx.get_raw(2)).unwrap_or_default()
    } else {
        String::new()
    };

    let regex: Arc<Regex> = ctx.get_or_create_aux(1, |vr| -> Result<Regex, String> {
        let pattern = text_arg(vr).unwrap_or_default();
        compile_regex(FN, &pattern, &flags)
    })?;

    let matched = match text_arg(ctx.get_raw(0)) {
        Some(text) => regex.is_match(&text),
        None => false,
    };

    Ok(Value::Integer(matched as i64))
}

/// Rewrite an XPath 2.0 replacement string into the backend's replacement
/// syntax: `$N` becomes `${N}`, `\$` unescapes to a literal dollar.
///
/// For backreferences above the capture count the last digit is taken as a
/// literal character and the rule is reapplied, so captures beyond 9 stay
/// addressable when the pattern defines them.
fn rewrite_replacement(
    function: &str,
    replacement: &str,
    capture_count: usize,
) -> Result<String, String> {
    let mut out = String::with_capacity(replacement.len());
    let mut chars = replacement.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if chars.peek() == Some(&'$') {
                    chars.next();
                    // Literal dollar in the backend's syntax
                    out.push_str("$$");
                } else {
                    out.push('\\');
                }
            }
            '$' => {
                let mut digits = String::new();
                while let Some(d) = chars.peek().copied().filter(|d| d.is_ascii_digit()) {
                    digits.push(d);
                    chars.next();
                }

                if digits.is_empty() {
                    return Err(format!(
                        "{}: The replacement string '{}' contains a \"$\" character that is not \
                         immediately followed by a digit 0-9 and not immediately preceded by a \
                         \"\\\".",
                        function, replacement
                    ));
                }

                let mut end = digits.len();
                while end > 1
                    && digits[..end]
                        .parse::<usize>()
                        .map(|n| n > capture_count)
                        .unwrap_or(true)
                {
                    end -= 1;
                }

                let group: usize = digits[..end].parse().map_err(|_| {
                    format!("{}: invalid backreference '${}'", function, digits)
                })?;
                if group > capture_count {
                    return Err(format!(
                        "{}: backreference '${}' exceeds the pattern's {} capture(s)",
                        function, group, capture_count
                    ));
                }

                out.push_str(&format!("${{{}}}", group));
                out.push_str(&digits[end..]);
            }
            other => out.push(other),
        }
    }

    Ok(out)
}

fn sparql_replace(ctx: &Context<'_>) -> rusqlite::Result<Value> {
    const FN: &str = "fn:replace";

    if ctx.len() != 3 && ctx.len() != 4 {
        return Err(fn_error(FN, "Invalid argument count"));
    }

    let flags = if ctx.len() == 4 {
        text_arg(ctx.get_raw(3)).unwrap_or_default()
    } else {
        String::new()
    };

    let regex: Arc<Regex> = ctx.get_or_create_aux(1, |vr| -> Result<Regex, String> {
        let pattern = text_arg(vr).unwrap_or_default();
        let regex = compile_regex(FN, &pattern, &flags)?;

        // XPath 2.0: a pattern matching the zero-length string is an error
        if regex.is_match("") {
            return Err(format!(
                "{}: The given pattern '{}' matches a zero-length string.",
                FN, pattern
            ));
        }

        Ok(regex)
    })?;

    let input = match text_arg(ctx.get_raw(0)) {
        Some(input) => input,
        None => return Ok(Value::Null),
    };
    let replacement = text_arg(ctx.get_raw(2)).unwrap_or_default();

    let capture_count = regex.captures_len() - 1;
    let rewritten = rewrite_replacement(FN, &replacement, capture_count)
        .map_err(|e| rusqlite::Error::UserFunctionError(e.into()))?;

    let output = regex.replace_all(&input, rewritten.as_str()).into_owned();
    Ok(Value::Text(output))
}

/// fn:string-join(str1, str2, ..., separator): NULL arguments are skipped.
fn string_join(ctx: &Context<'_>) -> rusqlite::Result<Value> {
    const FN: &str = "fn:string-join";

    if ctx.len() < 1 {
        return Err(fn_error(FN, "Invalid argument count"));
    }

    let separator = match ctx.get_raw(ctx.len() - 1) {
        ValueRef::Text(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        _ => return Err(fn_error(FN, "Invalid separator")),
    };

    let mut parts = Vec::new();
    for index in 0..ctx.len() - 1 {
        if let Some(text) = text_arg(ctx.get_raw(index)) {
            parts.push(text);
        }
    }

    if parts.is_empty() {
        Ok(Value::Null)
    } else {
        Ok(Value::Text(parts.join(&separator)))
    }
}

fn lower_case(ctx: &Context<'_>) -> rusqlite::Result<Value> {
    match text_arg(ctx.get_raw(0)) {
        Some(text) => Ok(Value::Text(text.to_lowercase())),
        None => Ok(Value::Null),
    }
}

fn upper_case(ctx: &Context<'_>) -> rusqlite::Result<Value> {
    match text_arg(ctx.get_raw(0)) {
        Some(text) => Ok(Value::Text(text.to_uppercase())),
        None => Ok(Value::Null),
    }
}

fn case_fold(ctx: &Context<'_>) -> rusqlite::Result<Value> {
    match text_arg(ctx.get_raw(0)) {
        Some(text) => Ok(Value::Text(collation::case_fold(&text))),
        None => Ok(Value::Null),
    }
}

fn strip_punctuation(ctx: &Context<'_>) -> rusqlite::Result<Value> {
    match text_arg(ctx.get_raw(0)) {
        Some(text) => Ok(Value::Text(collation::strip_punctuation(&text))),
        None => Ok(Value::Null),
    }
}

fn normalize(ctx: &Context<'_>) -> rusqlite::Result<Value> {
    const FN: &str = "ontodb:normalize";

    let text = match text_arg(ctx.get_raw(0)) {
        Some(text) => text,
        None => return Ok(Value::Null),
    };
    let form = text_arg(ctx.get_raw(1)).unwrap_or_default();

    collation::normalize(&text, &form)
        .map(Value::Text)
        .map_err(|e| fn_error(FN, e))
}

fn unaccent(ctx: &Context<'_>) -> rusqlite::Result<Value> {
    match text_arg(ctx.get_raw(0)) {
        Some(text) => Ok(Value::Text(collation::unaccent(&text))),
        None => Ok(Value::Null),
    }
}

fn string_before(ctx: &Context<'_>) -> rusqlite::Result<Value> {
    const FN: &str = "fn:substring-before";

    let (text, sub) = match (ctx.get_raw(0), ctx.get_raw(1)) {
        (ValueRef::Text(a), ValueRef::Text(b)) => (
            String::from_utf8_lossy(a).into_owned(),
            String::from_utf8_lossy(b).into_owned(),
        ),
        _ => return Err(fn_error(FN, "Invalid argument types")),
    };

    if sub.is_empty() {
        return Ok(Value::Text(String::new()));
    }

    match text.find(&sub) {
        Some(index) => Ok(Value::Text(text[..index].to_string())),
        None => Ok(Value::Text(String::new())),
    }
}

fn string_after(ctx: &Context<'_>) -> rusqlite::Result<Value> {
    const FN: &str = "fn:substring-after";

    let (text, sub) = match (ctx.get_raw(0), ctx.get_raw(1)) {
        (ValueRef::Text(a), ValueRef::Text(b)) => (
            String::from_utf8_lossy(a).into_owned(),
            String::from_utf8_lossy(b).into_owned(),
        ),
        _ => return Err(fn_error(FN, "Invalid argument types")),
    };

    if sub.is_empty() {
        return Ok(Value::Text(text));
    }

    match text.find(&sub) {
        Some(index) => Ok(Value::Text(text[index + sub.len()..].to_string())),
        None => Ok(Value::Text(String::new())),
    }
}

fn checksum(ctx: &Context<'_>) -> rusqlite::Result<Value> {
    const FN: &str = "SparqlChecksum";

    let (text, algorithm) = match (text_arg(ctx.get_raw(0)), text_arg(ctx.get_raw(1))) {
        (Some(text), Some(algorithm)) => (text, algorithm),
        _ => return Err(fn_error(FN, "Invalid arguments")),
    };

    let digest = match algorithm.to_ascii_lowercase().as_str() {
        "md5" => hex::encode(md5::Md5::digest(text.as_bytes())),
        "sha1" => hex::encode(sha1::Sha1::digest(text.as_bytes())),
        "sha256" => hex::encode(sha2::Sha256::digest(text.as_bytes())),
        "sha384" => hex::encode(sha2::Sha384::digest(text.as_bytes())),
        "sha512" => hex::encode(sha2::Sha512::digest(text.as_bytes())),
        _ => return Err(fn_error(FN, "Invalid checksum method specified")),
    };

    Ok(Value::Text(digest))
}

/// langMatches over the langString blob layout; plain text carries no
/// language information and never matches.
fn langmatches(ctx: &Context<'_>) -> rusqlite::Result<Value> {
    match ctx.get_raw(0) {
        ValueRef::Text(_) => Ok(Value::Integer(0)),
        ValueRef::Blob(blob) => {
            let tag = text_arg(ctx.get_raw(1)).unwrap_or_default();
            Ok(Value::Integer(
                LangString::blob_matches_tag(blob, &tag) as i64
            ))
        }
        _ => Ok(Value::Null),
    }
}

fn strlang(ctx: &Context<'_>) -> rusqlite::Result<Value> {
    let text = text_arg(ctx.get_raw(0)).unwrap_or_default();
    let tag = text_arg(ctx.get_raw(1)).unwrap_or_default();

    Ok(Value::Blob(LangString::new(text, tag).to_blob()))
}

/// Row ids resolve through the Resource table; an empty URI renders the
/// blank node form. Text passes through.
fn print_iri(ctx: &Context<'_>) -> rusqlite::Result<Value> {
    const FN: &str = "SparqlPrintIRI";

    match ctx.get_raw(0) {
        ValueRef::Integer(id) => {
            let conn = unsafe { ctx.get_connection() }.map_err(|e| fn_error(FN, e))?;

            let row: Option<Option<String>> = conn
                .query_row("SELECT Uri FROM Resource WHERE ID = ?1", [id], |row| {
                    row.get(0)
                })
                .optional()
                .map_err(|e| fn_error(FN, e))?;

            match row {
                None => Ok(Value::Null),
                Some(uri) => match uri.filter(|uri| !uri.is_empty()) {
                    Some(uri) => Ok(Value::Text(uri)),
                    None => Ok(Value::Text(format!("{}{}", BNODE_PREFIX, id))),
                },
            }
        }
        other => Ok(owned_value(other)),
    }
}

// Numbers

fn ceil(ctx: &Context<'_>) -> rusqlite::Result<Value> {
    Ok(Value::Real(f64_arg(ctx.get_raw(0)).ceil()))
}

fn floor(ctx: &Context<'_>) -> rusqlite::Result<Value> {
    Ok(Value::Real(f64_arg(ctx.get_raw(0)).floor()))
}

fn rand_value(_: &Context<'_>) -> rusqlite::Result<Value> {
    Ok(Value::Real(rand::random::<f64>()))
}

// Types

/// Map a property type code to its XSD/RDF URI.
fn data_type(ctx: &Context<'_>) -> rusqlite::Result<Value> {
    let code = match ctx.get_raw(0) {
        ValueRef::Integer(code) => code,
        _ => return Ok(Value::Null),
    };

    match PropertyType::from_code(code).and_then(|t| t.uri()) {
        Some(uri) => Ok(Value::Text(uri.to_string())),
        None => Ok(Value::Null),
    }
}

// UUID / blank nodes

/// Generate "{prefix}:{v4 uuid}", retrying until the URI is absent from the
/// Resource table.
fn generate_unique_uri(
    ctx: &Context<'_>,
    function: &str,
    prefix: &str,
) -> rusqlite::Result<Value> {
    let conn = unsafe { ctx.get_connection() }.map_err(|e| fn_error(function, e))?;

    let mut stmt = conn
        .prepare_cached("SELECT ID FROM Resource WHERE Uri = ?1")
        .map_err(|e| fn_error(function, e))?;

    loop {
        let candidate = format!("{}:{}", prefix, Uuid::new_v4());
        let taken = stmt.exists([&candidate]).map_err(|e| fn_error(function, e))?;

        if !taken {
            return Ok(Value::Text(candidate));
        }
    }
}

fn sparql_uuid(ctx: &Context<'_>) -> rusqlite::Result<Value> {
    const FN: &str = "SparqlUUID";

    let prefix = text_arg(ctx.get_raw(0)).unwrap_or_default();
    generate_unique_uri(ctx, FN, &prefix)
}

fn sparql_bnode(ctx: &Context<'_>) -> rusqlite::Result<Value> {
    const FN: &str = "SparqlBNODE";

    generate_unique_uri(ctx, FN, "urn:bnode")
}
