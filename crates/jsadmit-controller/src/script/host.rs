//! Host utilities exposed to scripts.
//!
//! Scripts get `log`, `logf`, `debug`, `debugf` and `error`. Arguments are
//! rendered in the sandbox (objects as JSON) and handed to a single native
//! sink that emits them under the `script` tracing target.

/// Log level requested by a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptLevel {
    Debug,
    Info,
    Error,
}

impl ScriptLevel {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => ScriptLevel::Debug,
            2 => ScriptLevel::Error,
            _ => ScriptLevel::Info,
        }
    }
}

/// Name of the native sink; removed from the global scope by the prelude.
pub const SINK_NAME: &str = "__jsadmit_emit";

/// Binds the public logging functions on top of the native sink.
pub const PRELUDE: &str = r#"
(function (g) {
  const emit = g.__jsadmit_emit;
  delete g.__jsadmit_emit;
  const str = (a) => (typeof a === "object" && a !== null) ? JSON.stringify(a) : String(a);
  const bind = (level, formatted) => (...args) => { emit(level, formatted, ...args.map(str)); };
  g.log = bind(1, false);
  g.logf = bind(1, true);
  g.debug = bind(0, false);
  g.debugf = bind(0, true);
  g.error = bind(2, false);
})(globalThis);
"#;

/// Emit one script log line.
pub fn emit(policy: &str, level: ScriptLevel, formatted: bool, args: Vec<String>) {
    let line = if formatted {
        match args.split_first() {
            Some((fmt, rest)) => sprintf(fmt, rest),
            None => String::new(),
        }
    } else {
        args.join(" ")
    };
    match level {
        ScriptLevel::Debug => tracing::debug!(target: "script", %policy, "{line}"),
        ScriptLevel::Info => tracing::info!(target: "script", %policy, "{line}"),
        ScriptLevel::Error => tracing::error!(target: "script", %policy, "{line}"),
    }
}

/// Minimal printf: `%s`, `%v`, `%d`, `%f` consume arguments in order,
/// `%%` is a literal percent sign.
pub fn sprintf(fmt: &str, args: &[String]) -> String {
    let mut out = String::with_capacity(fmt.len());
    let mut args = args.iter();
    let mut chars = fmt.chars();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let Some(verb) = chars.next() else {
            out.push('%');
            break;
        };
        match verb {
            '%' => out.push('%'),
            's' | 'v' | 'd' | 'f' => match args.next() {
                Some(arg) => out.push_str(&render(verb, arg)),
                None => {
                    out.push_str("%!");
                    out.push(verb);
                    out.push_str("(MISSING)");
                }
            },
            other => {
                out.push('%');
                out.push(other);
            }
        }
    }
    out
}

fn render(verb: char, arg: &str) -> String {
    match verb {
        'd' => match arg.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => format!("{}", n.trunc() as i64),
            _ => format!("%!d({arg})"),
        },
        'f' => match arg.trim().parse::<f64>() {
            Ok(n) => format!("{n:.6}"),
            Err(_) => format!("%!f({arg})"),
        },
        _ => arg.to_string(),
    }
}
