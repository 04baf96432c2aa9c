use serde::Serialize;

use super::error::CliError;

pub fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let out = serde_json::to_string_pretty(value)?;
    println!("{out}");
    Ok(())
}

pub fn print_line(value: &str) {
    println!("{value}");
}
