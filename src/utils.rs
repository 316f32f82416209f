//! Utility functions for the design compiler
//!
//! Identifier casing, JavaScript literal escaping and small text helpers used
//! by every emitter.

use crate::types::UNIQUE_ID_LEN;

const JS_RESERVED: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete", "do",
    "else", "enum", "export", "extends", "false", "finally", "for", "function", "if", "import",
    "in", "instanceof", "new", "null", "return", "super", "switch", "this", "throw", "true", "try",
    "typeof", "var", "void", "while", "with", "yield", "let", "static", "await", "args",
    "variants", "globalVariants",
];

/// Check if a string is a valid identifier
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => return false,
    };

    if !first.is_ascii_alphabetic() && first != '_' && first != '$' {
        return false;
    }

    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn words(name: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for ch in name.chars() {
        if !ch.is_ascii_alphanumeric() {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if ch.is_ascii_uppercase() && prev_lower && !current.is_empty() {
            out.push(std::mem::take(&mut current));
        }
        prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
        current.push(ch);
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase(),
        None => String::new(),
    }
}

/// `"my fancy-button"` -> `"myFancyButton"`
pub fn to_var_name(name: &str) -> String {
    let parts = words(name);
    let mut out = String::new();
    for (i, word) in parts.iter().enumerate() {
        if i == 0 {
            out.push_str(&word.to_ascii_lowercase());
        } else {
            out.push_str(&capitalize(word));
        }
    }
    if out.is_empty() {
        return "_".to_string();
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    if JS_RESERVED.contains(&out.as_str()) {
        out.push('_');
    }
    out
}

/// `"my fancy-button"` -> `"MyFancyButton"`
pub fn to_class_name(name: &str) -> String {
    let mut out: String = words(name).iter().map(|w| capitalize_keep(w)).collect();
    if out.is_empty() {
        return "Component".to_string();
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

fn capitalize_keep(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// Safe fragment for a css class name; non-alphanumerics collapse to `_`.
pub fn to_css_ident(name: &str) -> String {
    let mut out = String::new();
    let mut last_sep = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
            last_sep = false;
        } else if !last_sep && !out.is_empty() {
            out.push('_');
            last_sep = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// Double-quoted JavaScript string literal.
pub fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// `obj.name` when `name` is an identifier, `obj["na-me"]` otherwise.
pub fn js_member(object: &str, name: &str) -> String {
    if is_valid_identifier(name) {
        format!("{}.{}", object, name)
    } else {
        format!("{}[{}]", object, js_string(name))
    }
}

/// Object key, quoted only when it must be.
pub fn js_key(name: &str) -> String {
    if is_valid_identifier(name) {
        name.to_string()
    } else {
        js_string(name)
    }
}

/// JSX attribute name; anything that isn't a plain identifier is spread in.
pub fn jsx_attr(name: &str, value: &str) -> String {
    if name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':')
        && name.starts_with(|c: char| c.is_ascii_alphabetic())
    {
        format!("{}={{{}}}", name, value)
    } else {
        format!("{{...{{ {}: {} }}}}", js_string(name), value)
    }
}

/// Fixed-length prefix of a stable uuid.
pub fn short_id(uuid: &str) -> String {
    uuid.chars().take(UNIQUE_ID_LEN).collect()
}

/// Indent every non-empty line by `spaces`.
pub fn indent(text: &str, spaces: usize) -> String {
    let pad = " ".repeat(spaces);
    text.lines()
        .map(|l| if l.is_empty() { String::new() } else { format!("{}{}", pad, l) })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Wrap in parentheses unless already trivially atomic.
pub fn paren(expr: &str) -> String {
    let trimmed = expr.trim();
    if is_valid_identifier(trimmed)
        || trimmed.parse::<f64>().is_ok()
        || (trimmed.len() >= 2
            && trimmed.starts_with('"')
            && trimmed.ends_with('"')
            && !trimmed[1..trimmed.len() - 1].contains('"'))
        || is_wrapped(trimmed)
    {
        trimmed.to_string()
    } else {
        format!("({})", trimmed)
    }
}

/// Whether the first `(` closes at the very end, ignoring quoted text.
fn is_wrapped(expr: &str) -> bool {
    if !expr.starts_with('(') || !expr.ends_with(')') {
        return false;
    }
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, ch) in expr.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' | '`' => quote = Some(ch),
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i == expr.len() - 1;
                }
            }
            _ => {}
        }
    }
    false
}

/// Make `candidate` unique against `taken` by appending a counter.
pub fn uniquify(candidate: &str, taken: &dyn Fn(&str) -> bool) -> String {
    if !taken(candidate) {
        return candidate.to_string();
    }
    let mut n = 2;
    loop {
        let next = format!("{}{}", candidate, n);
        if !taken(&next) {
            return next;
        }
        n += 1;
    }
}
