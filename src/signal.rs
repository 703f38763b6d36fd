//! Lexical signal classification of commit messages.
//!
//! Every match is traceable to a named regex in a [`PatternTable`]. Tables are
//! versioned and can be loaded from JSON, so the reference set below is only
//! the default.

use crate::error::{DebtError, Result};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

pub const REFERENCE_TABLE_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalCategory {
    Debt,
    BugFix,
    Revert,
    Frustration,
    Positive,
}

impl SignalCategory {
    pub const ALL: [SignalCategory; 5] = [
        SignalCategory::Debt,
        SignalCategory::BugFix,
        SignalCategory::Revert,
        SignalCategory::Frustration,
        SignalCategory::Positive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalCategory::Debt => "debt",
            SignalCategory::BugFix => "bug_fix",
            SignalCategory::Revert => "revert",
            SignalCategory::Frustration => "frustration",
            SignalCategory::Positive => "positive",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SignalCategory::Debt => "Debt",
            SignalCategory::BugFix => "Bug/fix",
            SignalCategory::Revert => "Revert",
            SignalCategory::Frustration => "Frustration",
            SignalCategory::Positive => "Positive",
        }
    }
}

impl fmt::Display for SignalCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const DEBT_PATTERNS: &[(&str, &str)] = &[
    ("todo", r"\btodo\b"),
    ("fixme", r"\bfixme\b"),
    ("hack", r"\bhack\b"),
    ("xxx", r"\bxxx\b"),
    ("temporary", r"\btemporar(y|ily)\b"),
    ("workaround", r"\bworkaround\b"),
    ("kludge", r"\bkludge\b"),
    ("broken", r"\bbroken\b"),
    ("ugly", r"\bugly\b"),
    ("dirty", r"\bdirty\b"),
    ("tech.debt", r"\btech(nical)?\s*debt\b"),
];

const BUG_FIX_PATTERNS: &[(&str, &str)] = &[
    ("fix", r"\bfix(e[sd])?\b"),
    ("bug", r"\bbug\b"),
    ("issue", r"\bissue\b"),
    ("patch", r"\bpatch\b"),
    ("hotfix", r"\bhotfix\b"),
    ("resolve", r"\bresolv(e[sd]?|ing)\b"),
    ("repair", r"\brepair\b"),
];

const REVERT_PATTERNS: &[(&str, &str)] = &[
    ("revert", r"\brevert\b"),
    ("undo", r"\bundo\b"),
    ("rollback", r"\brollback\b"),
    ("back.out", r"\bback(ed|ing)?\s*out\b"),
];

const FRUSTRATION_PATTERNS: &[(&str, &str)] = &[
    ("finally", r"\bfinally\b"),
    ("stupid", r"\bstupid\b"),
    ("wtf", r"\bwtf\b"),
    ("why", r"^why\b"),
    ("ugh", r"\bu+gh+\b"),
    ("argh", r"\ba+rgh+\b"),
    ("damn", r"\bdamn\b"),
    ("crap", r"\bcrap\b"),
    ("cmon", r"\bc'?mon\b"),
    ("ffs", r"\bffs\b"),
    ("sigh", r"\bsigh\b"),
    ("hate", r"\bhate\b"),
    ("horrible", r"\bhorrible\b"),
    ("terrible", r"\bterrible\b"),
    ("nightmare", r"\bnightmare\b"),
];

const POSITIVE_PATTERNS: &[(&str, &str)] = &[
    ("improve", r"\bimprov(e[sd]?|ing|ement)\b"),
    ("enhance", r"\benhance[sd]?\b"),
    ("optimize", r"\boptimiz(e[sd]?|ation)\b"),
    ("refactor", r"\brefactor(ed|ing)?\b"),
    ("clean", r"\bclean(ed|ing|up)?\b"),
    ("simplify", r"\bsimplif(y|ied|ies)\b"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternSpec {
    pub name: String,
    pub pattern: String,
}

impl PatternSpec {
    pub fn new(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternTableSpec {
    pub version: u32,
    pub categories: BTreeMap<SignalCategory, Vec<PatternSpec>>,
}

impl PatternTableSpec {
    pub fn from_categories<I>(version: u32, categories: I) -> Self
    where
        I: IntoIterator<Item = (SignalCategory, Vec<PatternSpec>)>,
    {
        Self {
            version,
            categories: categories.into_iter().collect(),
        }
    }

    /// The pattern set used by the published reference report.
    pub fn reference() -> Self {
        let table = [
            (SignalCategory::Debt, DEBT_PATTERNS),
            (SignalCategory::BugFix, BUG_FIX_PATTERNS),
            (SignalCategory::Revert, REVERT_PATTERNS),
            (SignalCategory::Frustration, FRUSTRATION_PATTERNS),
            (SignalCategory::Positive, POSITIVE_PATTERNS),
        ];
        Self::from_categories(
            REFERENCE_TABLE_VERSION,
            table.into_iter().map(|(category, patterns)| {
                let specs = patterns
                    .iter()
                    .map(|(name, pattern)| PatternSpec::new(*name, *pattern))
                    .collect();
                (category, specs)
            }),
        )
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            DebtError::Configuration(format!("pattern table is not valid JSON: {e}"))
        })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DebtError::Configuration(format!(
                "cannot read pattern table {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json(&raw)
    }

    pub fn compile(&self) -> Result<PatternTable> {
        let mut categories = BTreeMap::new();
        let mut total = 0usize;

        for (category, specs) in &self.categories {
            let mut seen = HashSet::new();
            let mut compiled = Vec::with_capacity(specs.len());
            for spec in specs {
                if spec.name.trim().is_empty() || spec.pattern.is_empty() {
                    return Err(DebtError::Configuration(format!(
                        "{category}: pattern entries need a name and a pattern"
                    )));
                }
                if !seen.insert(spec.name.as_str()) {
                    return Err(DebtError::Configuration(format!(
                        "{category}: duplicate pattern name '{}'",
                        spec.name
                    )));
                }
                let regex = RegexBuilder::new(&spec.pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| {
                        DebtError::Configuration(format!(
                            "{category}/{}: invalid pattern: {e}",
                            spec.name
                        ))
                    })?;
                compiled.push(SignalPattern {
                    name: spec.name.clone(),
                    regex,
                });
            }
            total += compiled.len();
            categories.insert(*category, compiled);
        }

        if total == 0 {
            return Err(DebtError::Configuration(
                "pattern table has no patterns".to_string(),
            ));
        }

        Ok(PatternTable {
            version: self.version,
            categories,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SignalPattern {
    name: String,
    regex: Regex,
}

impl SignalPattern {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }
}

#[derive(Debug, Clone)]
pub struct PatternTable {
    version: u32,
    categories: BTreeMap<SignalCategory, Vec<SignalPattern>>,
}

impl PatternTable {
    pub fn reference() -> Result<Self> {
        PatternTableSpec::reference().compile()
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn patterns(&self, category: SignalCategory) -> &[SignalPattern] {
        self.categories
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn to_spec(&self) -> PatternTableSpec {
        PatternTableSpec::from_categories(
            self.version,
            self.categories.iter().map(|(category, patterns)| {
                let specs = patterns
                    .iter()
                    .map(|p| PatternSpec::new(p.name(), p.pattern()))
                    .collect();
                (*category, specs)
            }),
        )
    }

    /// Matches every pattern against the lowercased raw message. Punctuation,
    /// markdown and issue suffixes are left in place.
    pub fn classify<'t>(&'t self, message: &str) -> SignalMatch<'t> {
        let lowered = message.to_lowercase();
        let mut terms = BTreeMap::new();

        for (category, patterns) in &self.categories {
            let fired: Vec<&'t str> = patterns
                .iter()
                .filter(|p| p.regex.is_match(&lowered))
                .map(|p| p.name.as_str())
                .collect();
            if !fired.is_empty() {
                terms.insert(*category, fired);
            }
        }

        SignalMatch { terms }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignalMatch<'t> {
    terms: BTreeMap<SignalCategory, Vec<&'t str>>,
}

impl<'t> SignalMatch<'t> {
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn contains(&self, category: SignalCategory) -> bool {
        self.terms.contains_key(&category)
    }

    pub fn categories(&self) -> impl Iterator<Item = SignalCategory> + '_ {
        self.terms.keys().copied()
    }

    pub fn terms(&self, category: SignalCategory) -> &[&'t str] {
        self.terms
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (SignalCategory, &[&'t str])> + '_ {
        self.terms.iter().map(|(c, t)| (*c, t.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn reference() -> PatternTable {
        PatternTable::reference().unwrap()
    }

    #[test]
    fn conventional_fix_with_todo_hits_bug_fix_and_debt() {
        let table = reference();
        let m = table
            .classify("fix(curriculum): add assert to prevent empty editor pass in todo list (#64193)");

        assert_eq!(
            m.categories().collect::<Vec<_>>(),
            vec![SignalCategory::Debt, SignalCategory::BugFix]
        );
        assert_eq!(m.terms(SignalCategory::BugFix), &["fix"]);
        assert_eq!(m.terms(SignalCategory::Debt), &["todo"]);
    }

    #[test]
    fn broken_alone_is_debt_only() {
        let table = reference();
        let m = table.classify("Remove MFaaS, it's broken");

        assert_eq!(
            m.categories().collect::<Vec<_>>(),
            vec![SignalCategory::Debt]
        );
        assert_eq!(m.terms(SignalCategory::Debt), &["broken"]);
    }

    #[test]
    fn matching_ignores_case() {
        let table = reference();
        let m = table.classify("TODO: Revert this HACK");
        assert_eq!(m.terms(SignalCategory::Debt), &["todo", "hack"]);
        assert_eq!(m.terms(SignalCategory::Revert), &["revert"]);
    }

    #[test]
    fn anchored_pattern_only_matches_message_start() {
        let table = reference();
        assert!(table
            .classify("Why does this even work")
            .contains(SignalCategory::Frustration));
        assert!(!table
            .classify("explain why\nwhy is this here")
            .contains(SignalCategory::Frustration));
    }

    #[test]
    fn word_boundaries_are_respected() {
        let table = reference();
        // "prefix" and "debugger" must not count as fix/bug
        let m = table.classify("prefix the debugger output");
        assert!(m.is_empty());
    }

    #[test]
    fn punctuation_is_not_stripped() {
        let table = reference();
        let m = table.classify("`fixes` (#12)");
        assert_eq!(m.terms(SignalCategory::BugFix), &["fix"]);
        let m = table.classify("c'mon, really");
        assert_eq!(m.terms(SignalCategory::Frustration), &["cmon"]);
    }

    const MIXED_MESSAGES: &[&str] = &[
        "Revert \"fix: workaround for broken cache\"",
        "finally cleaned up the ugly hack, todo: tests",
        "WTF, ffs. Bug fixed after a terrible refactor",
        "Improve perf",
        "nothing to see",
    ];

    fn sorted_terms(m: &SignalMatch<'_>, category: SignalCategory) -> Vec<String> {
        let mut terms: Vec<String> = m.terms(category).iter().map(|t| t.to_string()).collect();
        terms.sort();
        terms
    }

    #[test]
    fn pattern_order_within_category_does_not_change_matches() {
        let forward_spec = PatternTableSpec::reference();
        let mut reversed_spec = forward_spec.clone();
        for specs in reversed_spec.categories.values_mut() {
            specs.reverse();
        }
        assert_ne!(forward_spec, reversed_spec);

        let forward = forward_spec.compile().unwrap();
        let reversed = reversed_spec.compile().unwrap();

        for message in MIXED_MESSAGES {
            let (a, b) = (forward.classify(message), reversed.classify(message));
            assert_eq!(a.categories().collect::<Vec<_>>(), b.categories().collect::<Vec<_>>());
            for category in SignalCategory::ALL {
                assert_eq!(sorted_terms(&a, category), sorted_terms(&b, category), "{message}");
            }
        }
    }

    #[test]
    fn categories_classify_independently() {
        let reference = PatternTableSpec::reference();
        let full = reference.compile().unwrap();
        let singles: Vec<(SignalCategory, PatternTable)> = SignalCategory::ALL
            .iter()
            .rev()
            .map(|category| {
                let specs = reference.categories[category].clone();
                let table = PatternTableSpec::from_categories(reference.version, [(*category, specs)])
                    .compile()
                    .unwrap();
                (*category, table)
            })
            .collect();

        for message in MIXED_MESSAGES {
            let combined = full.classify(message);
            for (category, table) in &singles {
                let alone = table.classify(message);
                assert_eq!(alone.terms(*category), combined.terms(*category), "{message}");
            }
        }
    }

    #[test]
    fn empty_table_is_rejected() {
        let spec = PatternTableSpec::from_categories(1, Vec::new());
        assert!(matches!(spec.compile(), Err(DebtError::Configuration(_))));

        let spec = PatternTableSpec::from_categories(1, vec![(SignalCategory::Debt, vec![])]);
        assert!(matches!(spec.compile(), Err(DebtError::Configuration(_))));
    }

    #[test]
    fn invalid_or_duplicate_patterns_are_rejected() {
        let spec = PatternTableSpec::from_categories(
            1,
            vec![(SignalCategory::Debt, vec![PatternSpec::new("bad", "(unclosed")])],
        );
        assert!(matches!(spec.compile(), Err(DebtError::Configuration(_))));

        let spec = PatternTableSpec::from_categories(
            1,
            vec![(
                SignalCategory::Debt,
                vec![
                    PatternSpec::new("todo", r"\btodo\b"),
                    PatternSpec::new("todo", r"\bfixme\b"),
                ],
            )],
        );
        assert!(matches!(spec.compile(), Err(DebtError::Configuration(_))));
    }

    #[test]
    fn json_round_trip_keeps_table() {
        let spec = PatternTableSpec::reference();
        let json = serde_json::to_string(&spec).unwrap();
        assert!(json.contains("\"bug_fix\""));
        let parsed = PatternTableSpec::from_json(&json).unwrap();
        assert_eq!(parsed, spec);
        assert_eq!(parsed.compile().unwrap().to_spec(), spec);
    }

    #[test]
    fn fixture_table_replaces_reference() {
        let spec = PatternTableSpec::from_json(
            r#"{"version": 7, "categories": {"positive": [{"name": "lgtm", "pattern": "\\blgtm\\b"}]}}"#,
        )
        .unwrap();
        let table = spec.compile().unwrap();
        assert_eq!(table.version(), 7);
        assert!(table.patterns(SignalCategory::Debt).is_empty());

        let m = table.classify("LGTM, fix later");
        assert_eq!(
            m.categories().collect::<Vec<_>>(),
            vec![SignalCategory::Positive]
        );
    }
}
