//! Name references the index does not record, found by scanning source text

use regex::Regex;

/// `@selector(name)` literals
pub const SELECTOR_PATTERN: &str = r"@selector\(([^)]*)\)";

/// A regex whose first capture group (or whole match, without groups) is a
/// referenced symbol name
#[derive(Debug, Clone)]
pub struct TextPattern {
    regex: Regex,
}

impl TextPattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }

    /// Compile every pattern, logging and skipping invalid ones
    pub fn compile_all(patterns: &[String]) -> Vec<Self> {
        patterns
            .iter()
            .filter_map(|p| match Self::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    tracing::error!("Invalid extra pattern {:?}: {}", p, e);
                    None
                }
            })
            .collect()
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    pub fn extract_names(&self, content: &str) -> Vec<String> {
        let mut names = Vec::new();
        for caps in self.regex.captures_iter(content) {
            let Some(m) = caps.get(1).or_else(|| caps.get(0)) else {
                continue;
            };
            let name = m.as_str().trim();
            if name.is_empty() {
                tracing::warn!(
                    "Empty name extracted by {:?} from {:?}",
                    self.as_str(),
                    caps.get(0).map(|m| m.as_str()).unwrap_or_default()
                );
                continue;
            }
            names.push(name.to_string());
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_names() {
        let pattern = TextPattern::new(SELECTOR_PATTERN).unwrap();
        let source = r#"
            [self performSelector:@selector(reloadData) withObject:nil];
            SEL s = @selector(tableView:didSelectRowAtIndexPath:);
            [button addTarget:self action:@selector( tap: ) forControlEvents:0];
        "#;
        assert_eq!(
            pattern.extract_names(source),
            vec!["reloadData", "tableView:didSelectRowAtIndexPath:", "tap:"]
        );
    }

    #[test]
    fn test_empty_name_is_skipped() {
        let pattern = TextPattern::new(SELECTOR_PATTERN).unwrap();
        assert!(pattern.extract_names("@selector()").is_empty());
    }

    #[test]
    fn test_pattern_without_group_uses_whole_match() {
        let pattern = TextPattern::new(r"NS[A-Z]\w+").unwrap();
        assert_eq!(pattern.extract_names("x = NSString; y"), vec!["NSString"]);
    }

    #[test]
    fn test_invalid_patterns_are_skipped() {
        let patterns = vec![
            SELECTOR_PATTERN.to_string(),
            "@selector\\((".to_string(),
        ];
        let compiled = TextPattern::compile_all(&patterns);
        assert_eq!(compiled.len(), 1);
        assert_eq!(compiled[0].as_str(), SELECTOR_PATTERN);
    }
}
