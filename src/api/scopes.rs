//! OAuth scope normalization and subsumption.

/// A normalized set of OAuth scope names, as carried in the granted- and
/// required-scopes response headers. Entries are trimmed, lowercased, and
/// deduplicated; first-seen order is preserved so reports stay stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeSet {
    scopes: Vec<String>,
}

impl ScopeSet {
    /// Parse a comma-separated scope header.
    pub fn parse(raw: &str) -> Self {
        let mut scopes = Vec::new();
        for item in raw.split(',') {
            let scope = item.trim().to_ascii_lowercase();
            if !scope.is_empty() && !scopes.contains(&scope) {
                scopes.push(scope);
            }
        }
        Self { scopes }
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.scopes.iter().map(String::as_str)
    }

    /// Whether a wanted scope is granted, directly or through the
    /// corresponding `admin:` scope (`admin:org` carries `read:org`).
    pub fn satisfies(&self, wanted: &str) -> bool {
        let wanted = wanted.trim().to_ascii_lowercase();
        if self.scopes.contains(&wanted) {
            return true;
        }
        if let Some(resource) = wanted.strip_prefix("read:") {
            return self.scopes.contains(&format!("admin:{resource}"));
        }
        false
    }

    /// The scopes in `self` that `granted` does not satisfy, in this set's
    /// order.
    pub fn missing_from(&self, granted: &ScopeSet) -> Vec<String> {
        self.scopes
            .iter()
            .filter(|scope| !granted.satisfies(scope))
            .cloned()
            .collect()
    }
}
