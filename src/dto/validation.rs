//! Validation helpers for DTOs.

use validator::ValidationError;

/// Validates that a room code is 4 to 12 uppercase alphanumeric characters.
///
/// # Examples
///
/// ```ignore
/// validate_room_code("ROOM42") // Ok
/// validate_room_code("room42") // Err - lowercase
/// validate_room_code("AB")     // Err - too short
/// ```
pub fn validate_room_code(code: &str) -> Result<(), ValidationError> {
    if !(4..=12).contains(&code.len()) {
        let mut err = ValidationError::new("room_code_length");
        err.message = Some(
            format!(
                "Room code must be between 4 and 12 characters (got {})",
                code.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    {
        let mut err = ValidationError::new("room_code_format");
        err.message = Some("Room code must contain only uppercase letters and digits".into());
        return Err(err);
    }

    Ok(())
}
