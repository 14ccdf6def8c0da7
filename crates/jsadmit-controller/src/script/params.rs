//! Extract declared parameter names from a function's source text.
//!
//! Handles `function f(a, b)`, methods `f(a) {}`, arrows `(a, b) => ...`
//! and `a => ...`, optionally `async`. Default values and rest markers are
//! dropped; destructuring patterns yield an empty name.
//!
//! Default values may contain strings, template literals (with nested
//! `${...}`), regex literals and comments. A `/` is read as a regex only
//! where an expression can start (after `(`, `,`, `=`, an operator or
//! nothing), so `a / b` stays a division.

/// Parameter names in declaration order.
pub fn parameter_names(source: &str) -> Vec<String> {
    let src = strip_comments(source);
    let text = src.trim_start();
    let text = text
        .strip_prefix("async")
        .filter(|rest| rest.starts_with(char::is_whitespace) || rest.starts_with('('))
        .map(str::trim_start)
        .unwrap_or(text);

    let paren = text.find('(');
    let arrow = text.find("=>");
    match (paren, arrow) {
        (Some(p), Some(a)) if a < p => single_arrow_param(&text[..a]),
        (Some(p), _) => split_list(&text[p + 1..]),
        (None, Some(a)) => single_arrow_param(&text[..a]),
        (None, None) => vec![],
    }
}

fn single_arrow_param(head: &str) -> Vec<String> {
    let name = head.trim();
    if name.is_empty() {
        vec![]
    } else {
        vec![name.to_string()]
    }
}

/// Split the text following `(` at top-level commas, up to the matching `)`.
fn split_list(rest: &str) -> Vec<String> {
    let chars: Vec<char> = rest.chars().collect();
    let mut names = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut prev: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        if let Some(end) = literal_end(&chars, i, prev) {
            current.extend(&chars[i..end]);
            prev = chars.get(end - 1).copied();
            i = end;
            continue;
        }
        let c = chars[i];
        match c {
            '(' | '[' | '{' => {
                depth += 1;
                current.push(c);
            }
            ')' if depth == 0 => {
                push_param(&mut names, &current);
                return names;
            }
            ')' | ']' | '}' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => {
                push_param(&mut names, &current);
                current.clear();
            }
            _ => current.push(c),
        }
        if !c.is_whitespace() {
            prev = Some(c);
        }
        i += 1;
    }
    push_param(&mut names, &current);
    names
}

fn push_param(names: &mut Vec<String>, raw: &str) {
    let raw = raw.trim();
    if raw.is_empty() {
        // trailing comma
        return;
    }
    let raw = raw.strip_prefix("...").unwrap_or(raw).trim_start();
    if raw.starts_with('{') || raw.starts_with('[') {
        names.push(String::new());
        return;
    }
    let name = raw.split('=').next().unwrap_or("").trim();
    names.push(name.to_string());
}

/// Remove `//` and `/* */` comments outside literals.
fn strip_comments(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len());
    let mut prev: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        match (chars[i], chars.get(i + 1)) {
            ('/', Some('/')) => {
                i = line_comment_end(&chars, i);
                out.push('\n');
                continue;
            }
            ('/', Some('*')) => {
                i = block_comment_end(&chars, i);
                out.push(' ');
                continue;
            }
            _ => {}
        }
        if let Some(end) = literal_end(&chars, i, prev) {
            out.extend(&chars[i..end]);
            prev = chars.get(end - 1).copied();
            i = end;
            continue;
        }
        let c = chars[i];
        out.push(c);
        if !c.is_whitespace() {
            prev = Some(c);
        }
        i += 1;
    }
    out
}

/// Index just past the string, template or regex literal opening at `i`,
/// or `None` when `chars[i]` opens none. `prev` is the last significant
/// character before `i`.
fn literal_end(chars: &[char], i: usize, prev: Option<char>) -> Option<usize> {
    match chars[i] {
        q @ ('"' | '\'') => Some(quoted_end(chars, i + 1, q)),
        '`' => Some(template_end(chars, i + 1)),
        '/' if regex_allowed(prev) && !matches!(chars.get(i + 1), Some('/' | '*')) => {
            Some(regex_end(chars, i + 1))
        }
        _ => None,
    }
}

fn regex_allowed(prev: Option<char>) -> bool {
    prev.map_or(true, |c| "(,=:[!&|?{};+-*%<>~^".contains(c))
}

fn quoted_end(chars: &[char], mut j: usize, quote: char) -> usize {
    while j < chars.len() {
        match chars[j] {
            '\\' => j += 2,
            c if c == quote => return j + 1,
            _ => j += 1,
        }
    }
    chars.len()
}

fn template_end(chars: &[char], mut j: usize) -> usize {
    while j < chars.len() {
        match (chars[j], chars.get(j + 1)) {
            ('\\', _) => j += 2,
            ('`', _) => return j + 1,
            ('$', Some('{')) => j = expression_end(chars, j + 2),
            _ => j += 1,
        }
    }
    chars.len()
}

fn regex_end(chars: &[char], mut j: usize) -> usize {
    let mut in_class = false;
    while j < chars.len() {
        match chars[j] {
            '\\' => j += 2,
            '\n' => return j,
            '[' => {
                in_class = true;
                j += 1;
            }
            ']' => {
                in_class = false;
                j += 1;
            }
            '/' if !in_class => return j + 1,
            _ => j += 1,
        }
    }
    chars.len()
}

/// Index just past the `}` closing a `${` substitution.
fn expression_end(chars: &[char], mut j: usize) -> usize {
    let mut depth = 0usize;
    let mut prev: Option<char> = None;
    while j < chars.len() {
        match (chars[j], chars.get(j + 1)) {
            ('/', Some('/')) => {
                j = line_comment_end(chars, j);
                continue;
            }
            ('/', Some('*')) => {
                j = block_comment_end(chars, j);
                continue;
            }
            _ => {}
        }
        if let Some(end) = literal_end(chars, j, prev) {
            prev = chars.get(end - 1).copied();
            j = end;
            continue;
        }
        let c = chars[j];
        match c {
            '(' | '[' | '{' => depth += 1,
            '}' if depth == 0 => return j + 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
        if !c.is_whitespace() {
            prev = Some(c);
        }
        j += 1;
    }
    chars.len()
}

/// Index of the newline ending a `//` comment (or the end).
fn line_comment_end(chars: &[char], j: usize) -> usize {
    chars[j..]
        .iter()
        .position(|&c| c == '\n')
        .map_or(chars.len(), |n| j + n + 1)
}

/// Index just past the `*/` closing a block comment (or the end).
fn block_comment_end(chars: &[char], j: usize) -> usize {
    let mut k = j + 2;
    while k + 1 < chars.len() {
        if chars[k] == '*' && chars[k + 1] == '/' {
            return k + 2;
        }
        k += 1;
    }
    chars.len()
}
