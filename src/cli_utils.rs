use std::fmt::Display;
use std::process;

use handled::Handle;

use crate::commands::errors::{UserError, format_cli_error};

/// Exits the program with an error message
pub fn exit_with_error(message: &str) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}

/// Exits the program with an error message and usage information
pub fn exit_with_usage_error(message: &str, usage: &str) -> ! {
    eprintln!("Error: {}", message);
    eprintln!("{}", usage);
    process::exit(1);
}

/// Exits the program with `context` followed by the error's message and hint
pub fn exit_with_handled_error<E>(context: &str, error: &E) -> !
where
    E: Handle<UserError> + Display,
{
    eprintln!("{}", context);
    eprintln!("{}", format_cli_error(error));
    process::exit(1);
}

/// Renders a value as pretty JSON, or as YAML when `yaml` is set
pub fn render<T>(value: &T, yaml: bool) -> Result<String, String>
where
    T: serde::Serialize,
{
    if yaml {
        serde_yml::to_string(value).map_err(|e| e.to_string())
    } else {
        serde_json::to_string_pretty(value).map_err(|e| e.to_string())
    }
}

/// Prints a value in the selected format or exits with error
pub fn print_or_exit<T>(value: &T, yaml: bool, context: &str)
where
    T: serde::Serialize,
{
    match render(value, yaml) {
        Ok(text) => println!("{}", text.trim_end()),
        Err(e) => exit_with_error(&format!("Failed to format {}: {}", context, e)),
    }
}
