use crate::TransferError;

/// Validates a single object name as sent to a remote (file or folder name).
///
/// Rejects:
/// - Empty or whitespace-only names
/// - `.` and `..`
/// - Path separators (`/` or `\`)
/// - Control characters, including NUL
pub fn validate_object_name(name: &str) -> Result<(), TransferError> {
    if name.trim().is_empty() {
        return Err(TransferError::InvalidName("empty name".into()));
    }

    if name == "." || name == ".." {
        return Err(TransferError::InvalidName(format!(
            "reserved name not allowed: {name}"
        )));
    }

    if name.contains(['/', '\\']) {
        return Err(TransferError::InvalidName(format!(
            "path separator not allowed: {name}"
        )));
    }

    if name.chars().any(char::is_control) {
        return Err(TransferError::InvalidName(format!(
            "control character not allowed: {name:?}"
        )));
    }

    Ok(())
}
