//! Bearer token extraction for authenticated routes.

const BEARER_PREFIX: &str = "Bearer ";

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum AuthHeaderError {
    #[error("missing Authorization header")]
    Missing,
    #[error("Authorization header must use the Bearer scheme")]
    WrongScheme,
    #[error("bearer token is empty")]
    EmptyToken,
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
///
/// The scheme name is matched case-insensitively.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthHeaderError> {
    let header = header.ok_or(AuthHeaderError::Missing)?.trim_start();
    let scheme = header
        .get(..BEARER_PREFIX.len())
        .ok_or(AuthHeaderError::WrongScheme)?;
    if !scheme.eq_ignore_ascii_case(BEARER_PREFIX) {
        return Err(AuthHeaderError::WrongScheme);
    }

    let token = header[BEARER_PREFIX.len()..].trim();
    if token.is_empty() {
        return Err(AuthHeaderError::EmptyToken);
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_extracts_token() {
        assert_eq!(bearer_token(Some("Bearer abc.def")), Ok("abc.def"));
        assert_eq!(bearer_token(Some("bearer   abc ")), Ok("abc"));
    }

    #[test]
    fn test_bearer_token_errors() {
        assert_eq!(bearer_token(None), Err(AuthHeaderError::Missing));
        assert_eq!(bearer_token(Some("Basic dXNlcg==")), Err(AuthHeaderError::WrongScheme));
        assert_eq!(bearer_token(Some("Bear")), Err(AuthHeaderError::WrongScheme));
        assert_eq!(bearer_token(Some("Bearer    ")), Err(AuthHeaderError::EmptyToken));
    }
}
