//! Permission scopes requested from the authorization endpoint.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Create,
    Update,
    Delete,
}

impl Scope {
    /// Every scope this client knows how to use.
    pub const ALL: [Scope; 3] = [Scope::Create, Scope::Update, Scope::Delete];

    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Create => "create",
            Scope::Update => "update",
            Scope::Delete => "delete",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Render scopes as the space-separated `scope` parameter, skipping repeats.
pub fn join_scopes(scopes: &[Scope]) -> String {
    let mut seen: Vec<Scope> = Vec::with_capacity(scopes.len());
    for scope in scopes {
        if !seen.contains(scope) {
            seen.push(*scope);
        }
    }
    seen.iter()
        .map(|scope| scope.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_with_single_spaces() {
        assert_eq!(join_scopes(&Scope::ALL), "create update delete");
    }

    #[test]
    fn drops_duplicate_scopes() {
        assert_eq!(
            join_scopes(&[Scope::Update, Scope::Update, Scope::Delete]),
            "update delete"
        );
    }

    #[test]
    fn empty_scope_list_renders_empty_string() {
        assert_eq!(join_scopes(&[]), "");
    }
}
