//! Scopes a client may request, with the wording shown on the consent screen.

/// A permission requested by a client.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    /// First and last name
    Public,
    /// Email address
    Email,
    /// Profile changes
    Modify,
    /// Anything the portal has no wording for; shown verbatim.
    Other(String),
}

impl Scope {
    pub fn parse(s: &str) -> Self {
        match s {
            "public" => Scope::Public,
            "email" => Scope::Email,
            "modify" => Scope::Modify,
            other => Scope::Other(other.to_string()),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Scope::Public => "Public Information",
            Scope::Email => "Email Address",
            Scope::Modify => "Modify Account",
            Scope::Other(name) => name,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Scope::Public => "Read your first and last name",
            Scope::Email => "Read your email address",
            Scope::Modify => "Update your first and last name",
            Scope::Other(_) => "Access requested by the client",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_scopes() {
        assert_eq!(Scope::parse("public"), Scope::Public);
        assert_eq!(Scope::parse("email").title(), "Email Address");
        assert_eq!(Scope::parse("modify").description(), "Update your first and last name");
    }

    #[test]
    fn test_unknown_scope_shown_verbatim() {
        let scope = Scope::parse("calendar.read");
        assert_eq!(scope.title(), "calendar.read");
    }

    #[test]
    fn test_known_scopes_sort_before_unknown() {
        let mut scopes = vec![Scope::parse("zzz"), Scope::Modify, Scope::Public];
        scopes.sort();
        assert_eq!(scopes, vec![Scope::Public, Scope::Modify, Scope::Other("zzz".into())]);
    }
}
