/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    pub fn from_flag(json: bool) -> Self {
        if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, OutputFormat::Json)
    }
}

/// Trait for formatting CLI output
pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    fn print_json(&self, value: &serde_json::Value);
}

/// Human-readable output with status marks and indented detail lines
///
/// With `quiet` set, detail lines are dropped and only the status line,
/// warnings and errors remain.
pub struct HumanFormatter {
    quiet: bool,
}

impl HumanFormatter {
    fn success_line(message: &str) -> String {
        format!("\u{2713} {message}")
    }

    fn error_line(message: &str) -> String {
        format!("\u{2717} Error: {message}")
    }

    fn warn_line(message: &str) -> String {
        format!("\u{26a0} Warning: {message}")
    }

    fn info_line(message: &str) -> String {
        format!("  {message}")
    }
}

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("{}", Self::success_line(message));
    }
    fn error(&self, message: &str) {
        eprintln!("{}", Self::error_line(message));
    }
    fn warn(&self, message: &str) {
        eprintln!("{}", Self::warn_line(message));
    }
    fn info(&self, message: &str) {
        if !self.quiet {
            println!("{}", Self::info_line(message));
        }
    }
    fn print_json(&self, _value: &serde_json::Value) {}
}

/// JSON output; commands print their result document with `print_json`
pub struct JsonFormatter;

impl JsonFormatter {
    fn success_doc(message: &str) -> serde_json::Value {
        serde_json::json!({"success": true, "message": message})
    }

    fn error_doc(message: &str) -> serde_json::Value {
        serde_json::json!({"success": false, "error": message})
    }

    fn warn_doc(message: &str) -> serde_json::Value {
        serde_json::json!({"level": "warning", "message": message})
    }
}

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        println!("{}", Self::success_doc(message));
    }
    fn error(&self, message: &str) {
        eprintln!("{}", Self::error_doc(message));
    }
    fn warn(&self, message: &str) {
        eprintln!("{}", Self::warn_doc(message));
    }
    fn info(&self, _message: &str) {}
    fn print_json(&self, value: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string_pretty(value).unwrap_or_default()
        );
    }
}

pub fn get_formatter(format: OutputFormat, quiet: bool) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Human => Box::new(HumanFormatter { quiet }),
    }
}

/// `"1 record"` / `"3 records"`
pub fn plural(count: u64, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

/// Milliseconds as `"850ms"` or `"2.4s"`
pub fn format_duration_ms(ms: u64) -> String {
    if ms >= 1000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{ms}ms")
    }
}
