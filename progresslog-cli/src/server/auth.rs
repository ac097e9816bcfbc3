use super::error::ApiError;

/// Check the `key` query parameter of a bulk delete against the configured
/// delete secret.
///
/// A missing or empty key is a bad request; a wrong key is forbidden.
pub fn check_delete_key(configured: &str, provided: Option<&str>) -> Result<(), ApiError> {
    let Some(key) = provided.filter(|k| !k.is_empty()) else {
        return Err(ApiError::BadRequest("Secret key required".to_string()));
    };

    if key != configured {
        tracing::warn!("rejected delete attempt with an invalid secret key");
        return Err(ApiError::Forbidden("Invalid secret key".to_string()));
    }

    Ok(())
}
