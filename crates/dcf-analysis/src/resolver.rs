//! Metric resolution across provider-specific line-item labels.
//!
//! Providers label the same concept differently ("Operating Cash Flow",
//! "Cash Flow From Operating Activities", "operatingCashFlow"), and none of
//! them treat their schema as a contract. Resolution is therefore layered:
//! exact label, then normalized equality, then normalized substring, then
//! compound fragment groups. The first label in label order wins at every
//! stage, so the same table and query always resolve to the same column.

/// A canonical metric and the alternative labels it may appear under.
#[derive(Debug, Clone, Copy)]
pub struct MetricQuery<'a> {
    pub canonical: &'a str,
    pub fallbacks: &'a [&'a str],
    /// Each group matches a label whose normalized form contains every
    /// fragment of the group, e.g. `["ebit", "da"]`.
    pub fragment_groups: &'a [&'a [&'a str]],
}

impl<'a> MetricQuery<'a> {
    pub const fn new(canonical: &'a str) -> Self {
        Self {
            canonical,
            fallbacks: &[],
            fragment_groups: &[],
        }
    }

    pub const fn with_fallbacks(mut self, fallbacks: &'a [&'a str]) -> Self {
        self.fallbacks = fallbacks;
        self
    }

    pub const fn with_fragments(mut self, fragment_groups: &'a [&'a [&'a str]]) -> Self {
        self.fragment_groups = fragment_groups;
        self
    }

    /// Canonical name followed by the fallbacks, in resolution order.
    pub fn candidates(&self) -> impl Iterator<Item = &'a str> + '_ {
        std::iter::once(self.canonical).chain(self.fallbacks.iter().copied())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStage {
    Exact,
    Normalized,
    Substring,
    Fragments,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution<'t> {
    pub index: usize,
    pub label: &'t str,
    pub stage: MatchStage,
}

/// Lowercase and drop everything that is not a letter or digit, so
/// `"Long-Term Debt"`, `"long_term_debt"` and `"longTermDebt"` coincide.
pub fn normalize_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Resolve `canonical` (then `fallbacks`) against `labels`.
///
/// Returns `None` when nothing matches; never panics on odd input.
pub fn resolve<'t>(labels: &'t [String], canonical: &str, fallbacks: &[&str]) -> Option<&'t str> {
    let query = MetricQuery::new(canonical).with_fallbacks(fallbacks);
    resolve_query(labels, &query).map(|r| r.label)
}

pub fn resolve_query<'t>(labels: &'t [String], query: &MetricQuery<'_>) -> Option<Resolution<'t>> {
    let found = |index: usize, stage: MatchStage| Resolution {
        index,
        label: labels[index].as_str(),
        stage,
    };

    for candidate in query.candidates() {
        if let Some(i) = labels.iter().position(|l| l == candidate) {
            return Some(found(i, MatchStage::Exact));
        }
    }

    let normalized: Vec<String> = labels.iter().map(|l| normalize_label(l)).collect();

    for candidate in query.candidates() {
        let wanted = normalize_label(candidate);
        if wanted.is_empty() {
            continue;
        }
        if let Some(i) = normalized.iter().position(|l| *l == wanted) {
            return Some(found(i, MatchStage::Normalized));
        }
        if let Some(i) = normalized.iter().position(|l| l.contains(&wanted)) {
            tracing::debug!(
                "Resolved '{}' to '{}' by substring match",
                query.canonical,
                labels[i]
            );
            return Some(found(i, MatchStage::Substring));
        }
    }

    for group in query.fragment_groups {
        if group.is_empty() {
            continue;
        }
        let fragments: Vec<String> = group.iter().map(|f| normalize_label(f)).collect();
        if let Some(i) = normalized
            .iter()
            .position(|l| fragments.iter().all(|f| l.contains(f.as_str())))
        {
            tracing::debug!(
                "Resolved '{}' to '{}' by fragments {:?}",
                query.canonical,
                labels[i],
                group
            );
            return Some(found(i, MatchStage::Fragments));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_cash_resolves_to_cash_on_hand() {
        let table = labels(&["Cash On Hand", "Long-Term Debt"]);
        assert_eq!(resolve(&table, "cash", &[]), Some("Cash On Hand"));
    }

    #[test]
    fn test_no_match_returns_none() {
        let table = labels(&["Cash On Hand", "Long-Term Debt"]);
        assert_eq!(resolve(&table, "Revenue", &["Net Sales"]), None);
        assert_eq!(resolve(&[], "Revenue", &[]), None);
    }

    #[test]
    fn test_exact_match_beats_earlier_substring() {
        let table = labels(&["Basic Shares Outstanding", "Shares Outstanding"]);
        let r = resolve_query(&table, &MetricQuery::new("Shares Outstanding")).unwrap();
        assert_eq!(r.label, "Shares Outstanding");
        assert_eq!(r.stage, MatchStage::Exact);
    }

    #[test]
    fn test_normalized_equality_beats_earlier_substring() {
        // camelCase API keys sort "costOfRevenue" before "revenue"
        let table = labels(&["costOfRevenue", "revenue"]);
        let r = resolve_query(&table, &MetricQuery::new("Revenue")).unwrap();
        assert_eq!(r.label, "revenue");
        assert_eq!(r.stage, MatchStage::Normalized);
    }

    #[test]
    fn test_fallbacks_tried_in_order() {
        let table = labels(&["CFO", "Cash Flow From Operating Activities"]);
        let query = MetricQuery::new("Operating Cash Flow")
            .with_fallbacks(&["Cash Flow From Operating Activities", "CFO"]);
        let r = resolve_query(&table, &query).unwrap();
        assert_eq!(r.index, 1);
        assert_eq!(r.stage, MatchStage::Exact);
    }

    #[test]
    fn test_punctuation_and_case_ignored() {
        let table = labels(&["Goodwill", "Long-Term Debt"]);
        assert_eq!(resolve(&table, "long_term_debt", &[]), Some("Long-Term Debt"));
    }

    #[test]
    fn test_compound_fragments() {
        let table = labels(&["EBIT", "Earnings (EBIT) + D&A"]);
        let query = MetricQuery::new("EBITDA").with_fragments(&[&["ebit", "da"]]);
        let r = resolve_query(&table, &query).unwrap();
        assert_eq!(r.label, "Earnings (EBIT) + D&A");
        assert_eq!(r.stage, MatchStage::Fragments);
    }

    #[test]
    fn test_capex_fragment_group_matches_ppe_label() {
        let table = labels(&[
            "Net Income",
            "Net Change In Property, Plant, And Equipment",
        ]);
        let query = MetricQuery::new("Capital Expenditure")
            .with_fragments(&[&["property", "plant", "equipment"], &["capital", "expenditure"]]);
        assert_eq!(resolve_query(&table, &query).unwrap().index, 1);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let table = labels(&["Cash And Equivalents", "Cash On Hand", "Restricted Cash"]);
        let first = resolve(&table, "cash", &[]);
        for _ in 0..10 {
            assert_eq!(resolve(&table, "cash", &[]), first);
        }
        assert_eq!(first, Some("Cash And Equivalents"));
    }

    #[test]
    fn test_empty_candidate_never_matches_everything() {
        let table = labels(&["Revenue"]);
        assert_eq!(resolve(&table, "--", &[]), None);
    }
}
