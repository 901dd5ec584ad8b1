use std::borrow::Cow;

const REDACTED: &str = "REDACTED";

fn is_token_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '~' | '+' | '/' | '=')
}

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let hay = haystack.as_bytes();
    let nee = needle.as_bytes();
    if nee.is_empty() {
        return Some(0);
    }
    if nee.len() > hay.len() {
        return None;
    }

    (0..=hay.len() - nee.len()).find(|&i| {
        hay[i..i + nee.len()]
            .iter()
            .zip(nee)
            .all(|(a, b)| a.to_ascii_lowercase() == b.to_ascii_lowercase())
    })
}

/// Replaces the credential following every `Bearer ` marker.
pub fn redact_bearer(input: &str) -> Cow<'_, str> {
    const MARKER: &str = "bearer ";
    if find_ascii_case_insensitive(input, MARKER).is_none() {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(idx) = find_ascii_case_insensitive(rest, MARKER) {
        let end = idx + MARKER.len();
        out.push_str(&rest[..end]);
        rest = &rest[end..];

        let consumed: usize = rest
            .chars()
            .take_while(|ch| is_token_char(*ch))
            .map(char::len_utf8)
            .sum();
        if consumed > 0 {
            out.push_str(REDACTED);
        }
        rest = &rest[consumed..];
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Replaces anything shaped like a JWT (`eyJ<header>.<payload>.<signature>`).
pub fn redact_jwt(input: &str) -> Cow<'_, str> {
    const PREFIX: &str = "eyJ";
    if !input.contains(PREFIX) {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    let mut changed = false;
    while let Some(idx) = rest.find(PREFIX) {
        out.push_str(&rest[..idx]);
        rest = &rest[idx..];

        let candidate_len: usize = rest
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'))
            .map(char::len_utf8)
            .sum();
        let candidate = &rest[..candidate_len];
        if candidate.split('.').filter(|part| !part.is_empty()).count() >= 3 {
            out.push_str(REDACTED);
            changed = true;
        } else {
            out.push_str(candidate);
        }
        rest = &rest[candidate_len..];
    }
    out.push_str(rest);

    if changed {
        Cow::Owned(out)
    } else {
        Cow::Borrowed(input)
    }
}

/// Replaces the string value of every JSON `"token"` field.
fn redact_token_fields(input: &str) -> Cow<'_, str> {
    const FIELD: &str = "\"token\"";
    if !input.contains(FIELD) {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(idx) = rest.find(FIELD) {
        let end = idx + FIELD.len();
        out.push_str(&rest[..end]);
        rest = &rest[end..];

        let after_colon = rest.trim_start();
        let Some(value) = after_colon.strip_prefix(':') else {
            continue;
        };
        let value = value.trim_start();
        let Some(body) = value.strip_prefix('"') else {
            continue;
        };
        let Some(close) = body.find('"') else {
            continue;
        };
        out.push_str(&rest[..rest.len() - value.len()]);
        out.push('"');
        out.push_str(REDACTED);
        out.push('"');
        rest = &body[close + 1..];
    }
    out.push_str(rest);
    Cow::Owned(out)
}

pub fn redact_secrets(input: &str) -> Cow<'_, str> {
    let value = redact_bearer(input).into_owned();
    let value = redact_token_fields(&value).into_owned();
    let value = redact_jwt(&value).into_owned();

    if value == input {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(value)
    }
}
