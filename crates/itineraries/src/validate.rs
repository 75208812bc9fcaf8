use url::Url;

use travel_core::{DomainError, DomainResult};

pub(crate) const MAX_NAME_LEN: usize = 200;
pub(crate) const MAX_DESCRIPTION_LEN: usize = 2500;
pub(crate) const MAX_USER_ID_LEN: usize = 100;

/// Length is checked on the value as submitted; the stored value is trimmed.
pub(crate) fn required(field: &str, value: &str, max_len: usize) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    if value.chars().count() > max_len {
        return Err(DomainError::validation(format!(
            "{field} cannot exceed {max_len} characters"
        )));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn optional(field: &str, value: Option<&str>, max_len: usize) -> DomainResult<Option<String>> {
    match value {
        None => Ok(None),
        Some(v) if v.trim().is_empty() => Ok(None),
        Some(v) => required(field, v, max_len).map(Some),
    }
}

/// Blank means "no image"; anything else must be an absolute URI.
pub(crate) fn image_uri(value: Option<&str>) -> DomainResult<Option<Url>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => Url::parse(v)
            .map(Some)
            .map_err(|_| DomainError::validation("image_uri must be a valid absolute URI")),
    }
}
