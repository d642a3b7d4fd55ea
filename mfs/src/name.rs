use crate::config::MAX_NAME_LEN;
use crate::error::{FsError, NameError, Result};

/// Stored names are 1..=32 bytes of ASCII alphanumerics and `.`.
pub fn validate_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        Some(NameError::Empty)
    } else if name.len() > MAX_NAME_LEN {
        Some(NameError::TooLong)
    } else {
        name.chars()
            .find(|c| !c.is_ascii_alphanumeric() && *c != '.')
            .map(NameError::IllegalChar)
    };
    match reason {
        Some(reason) => Err(FsError::NameInvalid {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}
