use crate::error::TycoError;

pub fn parse_integer(token: &str) -> Result<i64, TycoError> {
    let cleaned = token.trim().replace('_', "");
    let (negative, body) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
    };

    let (digits, radix) = match body.get(..2) {
        Some("0x" | "0X") => (&body[2..], 16),
        Some("0o" | "0O") => (&body[2..], 8),
        Some("0b" | "0B") => (&body[2..], 2),
        _ => (body, 10),
    };

    // Keep the sign attached so i64::MIN stays representable.
    let signed = if negative {
        format!("-{digits}")
    } else {
        digits.to_string()
    };
    i64::from_str_radix(&signed, radix)
        .map_err(|e| TycoError::lex(format!("Failed to parse integer '{token}': {e}")))
}

pub fn parse_float(token: &str) -> Result<f64, TycoError> {
    let value = token
        .replace('_', "")
        .parse::<f64>()
        .map_err(|e| TycoError::lex(format!("Invalid float literal '{token}': {e}")))?;
    if !value.is_finite() {
        return Err(TycoError::lex(format!(
            "Float literal '{token}' is out of range"
        )));
    }
    Ok(value)
}

/// Renders a float the way templates show it: integral values keep one
/// fractional digit.
pub fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

pub fn normalize_time(value: &str) -> String {
    if let Some(idx) = value.find('.') {
        let (head, tail) = value.split_at(idx + 1);
        let mut fractional = tail.to_string();
        fractional.truncate(
            fractional
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(fractional.len()),
        );
        if fractional.len() < 6 {
            fractional.push_str(&"0".repeat(6 - fractional.len()));
        } else if fractional.len() > 6 {
            fractional.truncate(6);
        }
        format!("{head}{fractional}")
    } else {
        value.to_string()
    }
}

pub fn normalize_datetime(value: &str) -> String {
    let mut result = value.replace(' ', "T");
    if result.ends_with('Z') {
        result.pop();
        result.push_str("+00:00");
    }
    if let Some(idx) = result.find('.') {
        let tz_start = result[idx..]
            .find(|c: char| c == '+' || c == '-')
            .map(|offset| idx + offset)
            .unwrap_or(result.len());
        let fractional = normalize_time(&result[idx..tz_start]);
        format!("{}{}{}", &result[..idx], fractional, &result[tz_start..])
    } else {
        result
    }
}

pub fn unescape_basic_string(value: &str) -> Result<String, TycoError> {
    let mut chars = value.chars().peekable();
    let mut output = String::with_capacity(value.len());

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            output.push(ch);
            continue;
        }

        match chars.next() {
            Some('n') => output.push('\n'),
            Some('t') => output.push('\t'),
            Some('r') => output.push('\r'),
            Some('b') => output.push('\u{0008}'),
            Some('f') => output.push('\u{000C}'),
            Some('"') => output.push('"'),
            Some('\\') => output.push('\\'),
            Some('u') => output.push(take_codepoint(&mut chars, 4, 'u')?),
            Some('U') => output.push(take_codepoint(&mut chars, 8, 'U')?),
            // Line continuation: drop the newline and the next line's indentation.
            Some('\n') | Some('\r') => {
                while chars.peek().is_some_and(|c| c.is_whitespace()) {
                    chars.next();
                }
            }
            Some(other) => {
                output.push('\\');
                output.push(other);
            }
            None => output.push('\\'),
        }
    }

    Ok(output)
}

fn take_codepoint(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    len: usize,
    marker: char,
) -> Result<char, TycoError> {
    let mut code = String::new();
    for _ in 0..len {
        let Some(ch) = chars.next() else {
            return Err(TycoError::lex("Incomplete unicode escape"));
        };
        code.push(ch);
    }
    let value = u32::from_str_radix(&code, 16)
        .map_err(|_| TycoError::lex(format!("Invalid unicode escape: \\{marker}{code}")))?;
    char::from_u32(value)
        .ok_or_else(|| TycoError::lex(format!("Invalid unicode codepoint: {code}")))
}

/// Drops the newline right after an opening `"""`/`'''` and the final line
/// break (plus its trailing indentation) before the closing delimiter.
pub fn trim_multiline(raw: &str) -> &str {
    let body = raw
        .strip_prefix("\r\n")
        .or_else(|| raw.strip_prefix('\n'))
        .unwrap_or(raw);
    match body.rfind('\n') {
        Some(idx) if body[idx + 1..].trim().is_empty() => body[..idx].trim_end_matches('\r'),
        _ => body,
    }
}
