//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use serde::Serialize;

use horizons_core::Task;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print a single task
    pub fn print_task(&self, task: &Task) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:          {}", task.id);
                println!("Title:       {}", task.title);
                if !task.description.is_empty() {
                    println!("Description: {}", task.description);
                }
                println!("Horizon:     {}", task.horizon);
                if !task.cascades_to.is_empty() {
                    let cascades: Vec<&str> = task.cascades_to.iter().map(|h| h.as_str()).collect();
                    println!("Also in:     {}", cascades.join(", "));
                }
                println!("Priority:    {}", task.priority);
                println!(
                    "Status:      {}",
                    if task.completed { "done" } else { "open" }
                );
            }
            OutputFormat::Json => print_json(task),
            OutputFormat::Quiet => println!("{}", task.id),
        }
    }

    /// Print a list of tasks
    pub fn print_tasks(&self, tasks: &[&Task]) {
        match self.format {
            OutputFormat::Human => {
                if tasks.is_empty() {
                    println!("No tasks found.");
                    return;
                }
                for task in tasks {
                    println!(
                        "[{}] {} | {} | {} | {}",
                        if task.completed { "x" } else { " " },
                        short_id(&task.id),
                        truncate(&task.title, 40),
                        task.horizon,
                        task.priority
                    );
                }
                println!("\n{} task(s)", tasks.len());
            }
            OutputFormat::Json => print_json(&tasks),
            OutputFormat::Quiet => {
                for task in tasks {
                    println!("{}", task.id);
                }
            }
        }
    }

    /// Report a change made to one task (`Added`, `Completed`, ...)
    pub fn task_changed(&self, verb: &str, task: &Task) {
        match self.format {
            OutputFormat::Human => {
                self.success(&format!("{} {}: {}", verb, short_id(&task.id), task.title))
            }
            OutputFormat::Json => print_json(task),
            OutputFormat::Quiet => println!("{}", task.id),
        }
    }

    /// Print any serializable value as JSON, regardless of format
    pub fn json<T: Serialize + ?Sized>(&self, value: &T) {
        print_json(value);
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a non-fatal warning to stderr
    pub fn warn(&self, msg: &str) {
        if !self.is_quiet() {
            eprintln!("⚠ {}", msg);
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("⚠ Could not encode output: {}", e),
    }
}

/// First eight characters of a task id
pub fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

/// Truncate a string to max length, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_flags() {
        assert_eq!(OutputFormat::from_flags(false, false), OutputFormat::Human);
        assert_eq!(OutputFormat::from_flags(true, false), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flags(false, true), OutputFormat::Quiet);
        // Quiet takes precedence
        assert_eq!(OutputFormat::from_flags(true, true), OutputFormat::Quiet);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("this is a long string", 10), "this is...");
        assert_eq!(truncate("ünïcödé títlé", 8), "ünïcö...");
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0f3c9a2e-1111-2222"), "0f3c9a2e");
        assert_eq!(short_id("abc"), "abc");
    }
}
