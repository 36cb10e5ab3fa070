/// Approver allow-list.
/// A small static set of emails permitted to record decisions.
/// Comparison is case-insensitive; surrounding whitespace is ignored.
#[derive(Debug, Clone, Default)]
pub struct ApproverAllowList {
    emails: Vec<String>,
}

impl ApproverAllowList {
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut emails: Vec<String> = emails
            .into_iter()
            .map(|e| e.as_ref().trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        emails.sort();
        emails.dedup();
        Self { emails }
    }

    /// Parse a comma-separated list (e.g. the `RELAY_APPROVERS` env var).
    pub fn from_csv(raw: &str) -> Self {
        Self::new(raw.split(','))
    }

    pub fn contains(&self, identity: &str) -> bool {
        let needle = identity.trim().to_lowercase();
        !needle.is_empty() && self.emails.iter().any(|e| *e == needle)
    }

    pub fn len(&self) -> usize {
        self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_ignores_case() {
        let list = ApproverAllowList::new(["Alice@Example.com"]);
        assert!(list.contains("alice@example.com"));
        assert!(list.contains("ALICE@EXAMPLE.COM"));
        assert!(!list.contains("bob@example.com"));
    }

    #[test]
    fn test_from_csv_trims_and_dedups() {
        let list = ApproverAllowList::from_csv(" a@x.io, b@x.io ,,A@x.io");
        assert_eq!(list.len(), 2);
        assert!(list.contains("b@x.io"));
    }

    #[test]
    fn test_empty_identity_never_matches() {
        let list = ApproverAllowList::from_csv("");
        assert!(list.is_empty());
        assert!(!list.contains(""));
        let list = ApproverAllowList::new(["a@x.io"]);
        assert!(!list.contains("   "));
    }
}
