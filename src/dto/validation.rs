//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::dao::models::SideId;

/// Validates that a side identifier is `home`, `opponent` or a team UUID.
///
/// # Examples
///
/// ```ignore
/// validate_side_id("home")                                 // Ok
/// validate_side_id("0199a3c2-6f0e-7cc4-9d6b-2f1e1f0a9a10") // Ok
/// validate_side_id("visitors")                             // Err
/// ```
pub fn validate_side_id(side: &str) -> Result<(), ValidationError> {
    if side.is_empty() {
        let mut err = ValidationError::new("side_empty");
        err.message = Some("Side identifier must not be empty".into());
        return Err(err);
    }

    if side.parse::<SideId>().is_err() {
        let mut err = ValidationError::new("side_format");
        err.message = Some(
            format!("Side `{side}` must be `home`, `opponent` or a team identifier").into(),
        );
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_validate_side_id_valid() {
        assert!(validate_side_id("home").is_ok());
        assert!(validate_side_id("opponent").is_ok());
        assert!(validate_side_id(&Uuid::new_v4().to_string()).is_ok());
    }

    #[test]
    fn test_validate_side_id_invalid() {
        assert!(validate_side_id("").is_err());
        assert!(validate_side_id("Home").is_err()); // literals are lowercase
        assert!(validate_side_id("team-a").is_err());
    }
}
