use std::fmt;
use serde::{Deserialize, Serialize};

/// How requests are authenticated
#[derive(Clone, PartialEq, Eq, Default)]
pub enum Authentication {
    #[default]
    None,
    /// HTTP basic authentication on every request
    Basic { username: String, password: String },
    /// Exchange credentials for a JWT at `/_open/auth` and send it as bearer token
    Jwt { username: String, password: String },
    /// Value used verbatim as `Authorization` header, e.g. `bearer <token>`
    Raw(String),
}

impl Authentication {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Authentication::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn jwt(username: impl Into<String>, password: impl Into<String>) -> Self {
        Authentication::Jwt {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Use a superuser JWT obtained elsewhere
    pub fn bearer(token: impl AsRef<str>) -> Self {
        Authentication::Raw(format!("bearer {}", token.as_ref()))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Authentication::None)
    }
}

impl fmt::Debug for Authentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authentication::None => write!(f, "None"),
            Authentication::Basic { username, .. } => write!(f, "Basic({})", username),
            Authentication::Jwt { username, .. } => write!(f, "Jwt({})", username),
            Authentication::Raw(_) => write!(f, "Raw(***)"),
        }
    }
}

/// Body of `POST /_open/auth`
#[derive(Debug, Serialize)]
pub(crate) struct JwtRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JwtResponse {
    pub jwt: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_secrets() {
        let auth = Authentication::basic("root", "secret");
        assert_eq!(format!("{:?}", auth), "Basic(root)");
        assert_eq!(format!("{:?}", Authentication::bearer("tok")), "Raw(***)");
        assert_eq!(Authentication::bearer("tok"), Authentication::Raw("bearer tok".into()));
        assert!(Authentication::default().is_none());
    }
}
