/// Assigns a sector label to a holding by its display name.
///
/// Must be total: every name maps to some label.
pub trait SectorClassifier: Send + Sync {
    fn classify(&self, holding_name: &str) -> String;
}

/// Sector label used when no keyword matches.
pub const OTHER_SECTOR: &str = "Others";

/// Classifies by case-sensitive substring match against keyword lists.
/// Rules are checked in order; the first matching sector wins.
#[derive(Debug, Clone)]
pub struct KeywordSectorClassifier {
    rules: Vec<(String, Vec<String>)>,
    fallback: String,
}

impl KeywordSectorClassifier {
    pub fn new(rules: Vec<(String, Vec<String>)>, fallback: impl Into<String>) -> Self {
        Self {
            rules,
            fallback: fallback.into(),
        }
    }
}

impl Default for KeywordSectorClassifier {
    /// The rule set for the tracked Indian equity portfolio.
    fn default() -> Self {
        let table: [(&str, &[&str]); 5] = [
            ("Financial", &["Bank", "Finance", "Housing", "Financials"]),
            (
                "Technology",
                &["Tech", "Mindtree", "Affle", "KPIT", "Tata Tech", "BLS", "Tanla"],
            ),
            ("Consumer", &["Dmart", "Consumer", "Pidilite"]),
            ("Power", &["Power", "Green", "Suzlon", "Gensol"]),
            ("Pipe", &["Pipes", "Astral", "Polycab"]),
        ];
        let rules = table
            .iter()
            .map(|(sector, keywords)| {
                (
                    sector.to_string(),
                    keywords.iter().map(|k| k.to_string()).collect(),
                )
            })
            .collect();
        Self::new(rules, OTHER_SECTOR)
    }
}

impl SectorClassifier for KeywordSectorClassifier {
    fn classify(&self, holding_name: &str) -> String {
        self.rules
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| holding_name.contains(k.as_str())))
            .map(|(sector, _)| sector.clone())
            .unwrap_or_else(|| self.fallback.clone())
    }
}
