/// Decides whether a conversation belongs to test traffic (simulations, QA
/// numbers) rather than a real customer. Test phones are stored with a
/// textual prefix instead of digits, e.g. `test_001` or `conflict-3`.
#[derive(Debug, Clone)]
pub struct TestPhoneMatcher {
    prefixes: Vec<String>,
}

impl TestPhoneMatcher {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let prefixes = prefixes
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self { prefixes }
    }

    pub fn is_test(&self, phone: &str) -> bool {
        let phone = phone.trim().to_lowercase();
        self.prefixes.iter().any(|prefix| phone.starts_with(prefix.as_str()))
    }
}

impl Default for TestPhoneMatcher {
    fn default() -> Self {
        Self::new(crate::config::InboxConfig::default().test_phone_prefixes)
    }
}
