//! Specialty synonym groups.
//!
//! Institutions name the same specialty differently ("ENT" vs "Otolaryngology").
//! Every phrase in a group maps to the full group, so a lookup from any member
//! yields the same match class. Unknown phrases degrade to matching themselves.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

const SPECIALTY_GROUPS: &[&[&str]] = &[
    &[
        "cardiology",
        "cardiovascular disease",
        "interventional cardiology",
        "cardiovascular medicine",
    ],
    &[
        "pulmonology",
        "pulmonary medicine",
        "pulmonary",
        "pulmonary/critical care",
        "pccm",
    ],
    &["otolaryngology", "ent", "ear nose throat"],
    &["gastroenterology", "gi", "digestive diseases"],
    &["nephrology", "renal medicine", "kidney disease"],
    &[
        "endocrinology",
        "endocrinology, diabetes & metabolism",
        "diabetes & metabolism",
    ],
    &[
        "hematology/oncology",
        "heme/onc",
        "oncology",
        "medical oncology",
        "hematology",
    ],
    &[
        "pm&r",
        "physical medicine & rehabilitation",
        "physical medicine and rehabilitation",
        "physiatry",
    ],
    &[
        "ob/gyn",
        "obstetrics and gynecology",
        "obstetrics & gynecology",
        "gynecology",
        "obstetrics",
    ],
    &[
        "orthopedic surgery",
        "orthopedics",
        "orthopaedics",
        "orthopaedic surgery",
    ],
    &["family medicine", "family practice"],
    &["internal medicine", "internist"],
    &["emergency medicine", "er"],
    &["general surgery", "surgery"],
    &["pediatrics", "peds"],
    &["dermatology", "derm"],
    &["rheumatology", "rheum"],
    &["infectious disease", "id"],
    &["anesthesiology", "anesthesia"],
    &["pain medicine", "pain management"],
    &["neurology", "neuro"],
    &["psychiatry", "psych"],
    &["psychology", "clinical psychology", "behavioral health"],
];

static DEFAULT_TABLE: LazyLock<SynonymTable> =
    LazyLock::new(|| SynonymTable::from_groups(SPECIALTY_GROUPS));

/// Lowercase phrase -> every phrase in its group (itself included).
#[derive(Debug, Clone, Default)]
pub struct SynonymTable {
    groups: BTreeMap<String, BTreeSet<String>>,
    // normalized key -> table key, for the "and"/whitespace fallback
    normalized_keys: BTreeMap<String, String>,
}

impl SynonymTable {
    /// Build a table from phrase groups.
    ///
    /// A phrase listed in more than one group maps to the group listed last.
    pub fn from_groups<G, S>(groups: &[G]) -> Self
    where
        G: AsRef<[S]>,
        S: AsRef<str>,
    {
        let mut table = Self::default();
        for group in groups {
            let members: BTreeSet<String> = group
                .as_ref()
                .iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
            for phrase in &members {
                table.groups.insert(phrase.clone(), members.clone());
            }
        }
        for key in table.groups.keys() {
            table
                .normalized_keys
                .entry(normalize_phrase(key))
                .or_insert_with(|| key.clone());
        }
        table
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// The synonym set for one raw specialty string.
    ///
    /// Returns an owned copy; callers cannot reach the table through it.
    pub fn expand(&self, raw: &str) -> BTreeSet<String> {
        let phrase = raw.trim().to_lowercase();
        if phrase.is_empty() {
            return BTreeSet::new();
        }
        if let Some(group) = self.groups.get(&phrase) {
            return group.clone();
        }
        self.normalized_keys
            .get(&normalize_phrase(&phrase))
            .and_then(|key| self.groups.get(key))
            .cloned()
            .unwrap_or_else(|| BTreeSet::from([phrase]))
    }

    /// Union of every specialty's expansion plus its literal lowercase form.
    pub fn build_index<I, S>(&self, specialties: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out = BTreeSet::new();
        for specialty in specialties {
            let specialty = specialty.as_ref();
            out.extend(self.expand(specialty));
            let literal = specialty.to_lowercase();
            if !literal.is_empty() {
                out.insert(literal);
            }
        }
        out
    }
}

/// The built-in specialty table.
pub fn default_table() -> &'static SynonymTable {
    &DEFAULT_TABLE
}

pub fn expand(raw: &str) -> BTreeSet<String> {
    DEFAULT_TABLE.expand(raw)
}

pub fn build_index<I, S>(specialties: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    DEFAULT_TABLE.build_index(specialties)
}

/// Rewrite the standalone word "and" to "&" and collapse whitespace runs.
fn normalize_phrase(s: &str) -> String {
    let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut out = String::with_capacity(collapsed.len());
    let mut rest = collapsed.as_str();
    let mut prev_is_word = false;
    while let Some(ch) = rest.chars().next() {
        if !prev_is_word
            && rest.starts_with("and")
            && !rest[3..].chars().next().is_some_and(is_word_char)
        {
            out.push('&');
            rest = &rest[3..];
            prev_is_word = false;
            continue;
        }
        out.push(ch);
        prev_is_word = is_word_char(ch);
        rest = &rest[ch.len_utf8()..];
    }
    out
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn every_member_of_a_group_expands_to_the_same_set() {
        let table = default_table();
        for group in SPECIALTY_GROUPS {
            let first = table.expand(group[0]);
            for phrase in group.iter() {
                assert_eq!(table.expand(phrase), first, "group of {phrase}");
                assert!(first.contains(*phrase));
            }
        }
    }

    #[rstest]
    #[case("ENT", "otolaryngology")]
    #[case("  Ear Nose Throat ", "ent")]
    #[case("Heme/Onc", "oncology")]
    #[case("Obstetrics and Gynecology", "ob/gyn")]
    fn known_phrases_expand_case_insensitively(#[case] raw: &str, #[case] member: &str) {
        assert!(expand(raw).contains(member));
    }

    #[rstest]
    #[case("Endocrinology, Diabetes and Metabolism")]
    #[case("endocrinology,   diabetes   &   metabolism")]
    #[case("Diabetes and   Metabolism")]
    fn and_and_whitespace_variants_fall_back_to_normalized_keys(#[case] raw: &str) {
        assert_eq!(expand(raw), expand("endocrinology"));
    }

    #[test]
    fn unknown_specialty_is_its_own_group() {
        assert_eq!(
            expand("  Aerospace Medicine "),
            BTreeSet::from(["aerospace medicine".to_string()])
        );
    }

    #[test]
    fn blank_input_expands_to_nothing() {
        assert!(expand("").is_empty());
        assert!(expand("   ").is_empty());
    }

    #[test]
    fn expansion_is_a_copy() {
        let mut set = expand("ent");
        set.insert("not a synonym".to_string());
        assert!(!expand("ent").contains("not a synonym"));
    }

    #[test]
    fn and_inside_a_word_is_left_alone() {
        assert_eq!(normalize_phrase("hand  surgery and x"), "hand surgery & x");
        assert_eq!(normalize_phrase("andrology"), "andrology");
        assert_eq!(normalize_phrase("r and/d"), "r &/d");
    }

    #[test]
    fn build_index_unions_groups_and_literals() {
        let index = build_index(["Cardiology", "Sleep Medicine"]);
        assert!(index.contains("cardiology"));
        assert!(index.contains("cardiovascular disease"));
        assert!(index.contains("sleep medicine"));
        assert!(!index.contains("ent"));
    }

    #[test]
    fn build_index_is_order_independent() {
        assert_eq!(
            build_index(["ENT", "Peds", "ENT"]),
            build_index(["Peds", "ENT"])
        );
    }

    #[test]
    fn overlapping_groups_resolve_to_the_last_group() {
        let table = SynonymTable::from_groups(&[vec!["a", "shared"], vec!["b", "Shared"]]);
        assert_eq!(table.len(), 3);
        assert_eq!(
            table.expand("shared"),
            BTreeSet::from(["b".to_string(), "shared".to_string()])
        );
        assert!(table.expand("a").contains("shared"));
    }
}
