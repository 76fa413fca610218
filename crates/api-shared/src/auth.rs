//! Caller capability check.
//!
//! Identity is established outside this system. The portal only needs to know who the caller is
//! and whether they hold the admin role, so the check is modelled as the [`Authenticator`] trait
//! and the REST layer asks it for a [`Caller`] per request.

use portal_types::Role;

/// Authentication and authorisation failures.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    /// The `Authorization` header is present but unusable
    #[error("invalid authorization header: {0}")]
    Unauthorized(String),

    /// The caller is known but lacks the required role
    #[error("{role} callers may not perform this operation")]
    Forbidden { role: Role },
}

/// Who is calling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// Register number of the caller, `None` for guests
    pub identity: Option<String>,
    pub role: Role,
}

impl Caller {
    pub fn guest() -> Self {
        Self {
            identity: None,
            role: Role::Guest,
        }
    }

    /// Fails with [`AuthError::Forbidden`] unless the caller is an admin.
    pub fn require_admin(&self) -> Result<(), AuthError> {
        match self.role {
            Role::Admin => Ok(()),
            role => Err(AuthError::Forbidden { role }),
        }
    }
}

/// External capability check yielding `{identity, role}` for a request.
pub trait Authenticator: Send + Sync + std::fmt::Debug {
    /// Maps the raw `Authorization` header value (if any) to a caller.
    fn authenticate(&self, authorization: Option<&str>) -> Result<Caller, AuthError>;
}

/// Reads `Authorization: Bearer <registerno>:<role>`.
///
/// A missing header yields a guest. Account verification against the student store is the
/// responsibility of whoever issues the token.
#[derive(Debug, Clone, Default)]
pub struct HeaderAuthenticator;

impl Authenticator for HeaderAuthenticator {
    fn authenticate(&self, authorization: Option<&str>) -> Result<Caller, AuthError> {
        let Some(value) = authorization else {
            return Ok(Caller::guest());
        };

        let token = value
            .trim()
            .strip_prefix("Bearer ")
            .ok_or_else(|| AuthError::Unauthorized("expected a Bearer token".into()))?
            .trim();

        let (identity, role) = token
            .rsplit_once(':')
            .ok_or_else(|| AuthError::Unauthorized("token must be <registerno>:<role>".into()))?;

        let identity = identity.trim();
        if identity.is_empty() {
            return Err(AuthError::Unauthorized("register number is empty".into()));
        }
        let role = role
            .parse::<Role>()
            .map_err(|e| AuthError::Unauthorized(e.to_string()))?;

        tracing::debug!("authenticated {} as {}", identity, role);
        Ok(Caller {
            identity: Some(identity.to_owned()),
            role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_header_is_guest() {
        let caller = HeaderAuthenticator.authenticate(None).unwrap();
        assert_eq!(caller, Caller::guest());
        assert!(matches!(
            caller.require_admin(),
            Err(AuthError::Forbidden { role: Role::Guest })
        ));
    }

    #[test]
    fn bearer_token_yields_identity_and_role() {
        let caller = HeaderAuthenticator
            .authenticate(Some("Bearer 21CS042:admin"))
            .unwrap();
        assert_eq!(caller.identity.as_deref(), Some("21CS042"));
        assert_eq!(caller.role, Role::Admin);
        assert!(caller.require_admin().is_ok());
    }

    #[test]
    fn malformed_headers_are_unauthorized() {
        for header in ["Basic abc", "Bearer", "Bearer 21CS042", "Bearer :admin", "Bearer x:root"] {
            assert!(
                matches!(
                    HeaderAuthenticator.authenticate(Some(header)),
                    Err(AuthError::Unauthorized(_))
                ),
                "{header}"
            );
        }
    }

    #[test]
    fn students_are_forbidden_from_admin_operations() {
        let caller = HeaderAuthenticator
            .authenticate(Some("Bearer 21CS042:student"))
            .unwrap();
        assert_eq!(
            caller.require_admin(),
            Err(AuthError::Forbidden {
                role: Role::Student
            })
        );
    }
}
