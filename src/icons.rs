//! Window-icon rendering for workspace listings.
//!
//! Maps window titles onto configured icon glyphs and joins them into the
//! short summary shown by the `window_icons` field of `list-workspaces`.
//! Purely cosmetic: nothing here feeds back into the ordering engine.

use crate::config::IconsConfig;

/// Resolves window titles to icons according to the configured rules.
#[derive(Debug, Clone)]
pub struct IconsResolver {
    /// Lower-cased matcher plus icon, in rule order.  First match wins.
    rules: Vec<(String, String)>,
    default_icon: String,
    delimiter: String,
    min_duplicates_count: usize,
}

impl IconsResolver {
    pub fn new(config: &IconsConfig) -> Self {
        Self {
            rules: config
                .rules
                .iter()
                .map(|rule| (rule.matcher.to_lowercase(), rule.icon.clone()))
                .collect(),
            default_icon: config.default_icon.clone(),
            delimiter: config.delimiter.clone(),
            min_duplicates_count: config.min_duplicates_count.max(2),
        }
    }

    /// Icon for a single window title.
    pub fn window_icon(&self, title: &str) -> &str {
        let title = title.to_lowercase();
        self.rules
            .iter()
            .find(|(matcher, _)| title.contains(matcher))
            .map(|(_, icon)| icon.as_str())
            .unwrap_or(&self.default_icon)
    }

    /// Icon summary for a whole workspace.  Runs of the same icon collapse
    /// into an `Nx` count once they reach `min_duplicates_count`.
    pub fn workspace_icons(&self, titles: &[String]) -> String {
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for title in titles {
            let icon = self.window_icon(title);
            match counts.iter_mut().find(|(known, _)| *known == icon) {
                Some((_, count)) => *count += 1,
                None => counts.push((icon, 1)),
            }
        }
        let parts: Vec<String> = counts
            .iter()
            .map(|(icon, count)| {
                if *count >= self.min_duplicates_count {
                    format!("{}x{}", count, icon)
                } else {
                    vec![*icon; *count].join(self.delimiter.as_str())
                }
            })
            .collect();
        parts.join(self.delimiter.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IconRule;

    fn resolver() -> IconsResolver {
        IconsResolver::new(&IconsConfig {
            delimiter: " ".to_string(),
            default_icon: "?".to_string(),
            min_duplicates_count: 3,
            rules: vec![
                IconRule {
                    matcher: "Firefox".to_string(),
                    icon: "F".to_string(),
                },
                IconRule {
                    matcher: "term".to_string(),
                    icon: ">".to_string(),
                },
            ],
        })
    }

    #[test]
    fn first_matching_rule_wins() {
        let icons = resolver();
        assert_eq!(icons.window_icon("Mozilla Firefox"), "F");
        assert_eq!(icons.window_icon("xterm"), ">");
    }

    #[test]
    fn matching_is_case_insensitive() {
        let icons = resolver();
        assert_eq!(icons.window_icon("FIREFOX - mail"), "F");
    }

    #[test]
    fn unmatched_titles_get_default_icon() {
        let icons = resolver();
        assert_eq!(icons.window_icon("gimp"), "?");
    }

    #[test]
    fn empty_workspace_renders_nothing() {
        assert_eq!(resolver().workspace_icons(&[]), "");
    }

    #[test]
    fn duplicates_collapse_into_counts() {
        let icons = resolver();
        let titles: Vec<String> = vec![
            "xterm".into(),
            "xterm 2".into(),
            "another term".into(),
            "Firefox".into(),
        ];
        assert_eq!(icons.workspace_icons(&titles), "3x> F");
    }

    #[test]
    fn few_duplicates_are_repeated() {
        let icons = resolver();
        let titles: Vec<String> = vec!["xterm".into(), "xterm 2".into()];
        assert_eq!(icons.workspace_icons(&titles), "> >");
    }
}
