use slurmwatch_types::ConfigText;

use crate::error::ParseError;

/// Pass the configuration dump through verbatim, rejecting blank output.
pub fn parse_config(text: &str) -> Result<ConfigText, ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::Empty);
    }
    Ok(ConfigText::new(text))
}
