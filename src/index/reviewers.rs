use std::cmp::Reverse;
use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;

use crate::display::{self, DisplayOptions};
use crate::index::synonyms;
use crate::record::Reviewer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortColumn {
    #[default]
    Name,
    Specialties,
    States,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortState {
    pub column: SortColumn,
    pub direction: SortDirection,
}

impl SortState {
    /// Same column flips direction; a new column starts ascending.
    pub fn toggle(&mut self, column: SortColumn) {
        if self.column == column {
            self.direction = match self.direction {
                SortDirection::Asc => SortDirection::Desc,
                SortDirection::Desc => SortDirection::Asc,
            };
        } else {
            self.column = column;
            self.direction = SortDirection::Asc;
        }
    }
}

/// User-selected filters. Empty selections and blank search text always pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    pub selected_specialties: Vec<String>,
    pub selected_states: Vec<String>,
    pub search_text: String,
}

impl FilterState {
    pub fn toggle_specialty(&mut self, specialty: &str) {
        toggle(&mut self.selected_specialties, specialty);
    }

    pub fn toggle_state(&mut self, state: &str) {
        toggle(&mut self.selected_states, state);
    }

    pub fn is_empty(&self) -> bool {
        self.selected_specialties.is_empty()
            && self.selected_states.is_empty()
            && self.search_text.trim().is_empty()
    }
}

fn toggle(selection: &mut Vec<String>, value: &str) {
    if let Some(pos) = selection.iter().position(|s| s == value) {
        selection.remove(pos);
    } else if !value.trim().is_empty() {
        selection.push(value.to_string());
    }
}

/// A normalized reviewer plus the derived text used to match it.
#[derive(Debug, Clone)]
pub struct IndexedReviewer {
    reviewer: Reviewer,
    key: String,
    haystack: String,
}

impl IndexedReviewer {
    fn new(reviewer: Reviewer, position: usize) -> Self {
        let key = row_key(&reviewer, position);
        let haystack = haystack(&reviewer);
        Self {
            reviewer,
            key,
            haystack,
        }
    }

    pub fn reviewer(&self) -> &Reviewer {
        &self.reviewer
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn haystack(&self) -> &str {
        &self.haystack
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SpecialtyChip {
    pub label: String,
    pub color: &'static str,
    pub text_color: &'static str,
}

/// One display-ready row.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewerView {
    pub key: String,
    pub id: Option<Value>,
    pub name: String,
    pub display_name: String,
    pub specialties: Vec<SpecialtyChip>,
    pub states: Vec<String>,
}

impl ReviewerView {
    pub fn new(row: &IndexedReviewer, opts: DisplayOptions) -> Self {
        let r = &row.reviewer;
        let specialties = r
            .specialties()
            .iter()
            .map(|label| {
                let color = display::color_for_specialty(label, opts.high_contrast);
                let text_color = if opts.high_contrast {
                    display::contrast_text(color)
                } else {
                    "#fff"
                };
                SpecialtyChip {
                    label: label.clone(),
                    color,
                    text_color,
                }
            })
            .collect();
        Self {
            key: row.key.clone(),
            id: r.id().cloned(),
            name: r.name().to_string(),
            display_name: display::format_display_name(r.name(), opts.reorder_names),
            specialties,
            states: r.states().to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewerSearchResponse {
    pub matched: usize,
    pub total: usize,
    pub hits: Vec<ReviewerView>,
}

/// In-memory search over one normalized collection.
///
/// Haystacks are built once here; a new collection means a new engine.
#[derive(Debug, Clone, Default)]
pub struct ReviewerEngine {
    rows: Vec<IndexedReviewer>,
}

impl ReviewerEngine {
    pub fn new(reviewers: Vec<Reviewer>) -> Self {
        let rows = reviewers
            .into_iter()
            .enumerate()
            .map(|(position, r)| IndexedReviewer::new(r, position))
            .collect();
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[IndexedReviewer] {
        &self.rows
    }

    /// Rows passing every active predicate, in sort order.
    pub fn matching(&self, filter: &FilterState, sort: SortState) -> Vec<&IndexedReviewer> {
        let predicate = RowPredicate::new(filter);
        let mut hits: Vec<&IndexedReviewer> =
            self.rows.iter().filter(|r| predicate.matches(r)).collect();
        sort_rows(&mut hits, sort);
        hits
    }

    pub fn search(
        &self,
        filter: &FilterState,
        sort: SortState,
        opts: DisplayOptions,
    ) -> ReviewerSearchResponse {
        let hits: Vec<ReviewerView> = self
            .matching(filter, sort)
            .into_iter()
            .map(|row| ReviewerView::new(row, opts))
            .collect();
        ReviewerSearchResponse {
            matched: hits.len(),
            total: self.rows.len(),
            hits,
        }
    }

    /// Distinct specialties across the collection, for filter options.
    pub fn all_specialties(&self) -> Vec<String> {
        self.distinct(|r| r.specialties())
    }

    pub fn all_states(&self) -> Vec<String> {
        self.distinct(|r| r.states())
    }

    fn distinct(&self, field: impl Fn(&Reviewer) -> &[String]) -> Vec<String> {
        let values: BTreeSet<&String> = self
            .rows
            .iter()
            .flat_map(|row| field(&row.reviewer))
            .collect();
        values.into_iter().cloned().collect()
    }
}

struct RowPredicate {
    // one synonym set per selected specialty; a row must hit each of them
    specialty_groups: Vec<BTreeSet<String>>,
    states: Vec<String>,
    terms: Vec<String>,
}

impl RowPredicate {
    fn new(filter: &FilterState) -> Self {
        Self {
            specialty_groups: filter
                .selected_specialties
                .iter()
                .map(|s| synonyms::expand(s))
                .collect(),
            states: filter
                .selected_states
                .iter()
                .map(|s| s.to_uppercase())
                .collect(),
            terms: search_terms(&filter.search_text),
        }
    }

    fn matches(&self, row: &IndexedReviewer) -> bool {
        let r = &row.reviewer;
        let specialties_ok = self
            .specialty_groups
            .iter()
            .all(|group| group.is_empty() || !group.is_disjoint(r.specialty_index()));
        if !specialties_ok {
            return false;
        }
        if !self.states.iter().all(|s| r.states().contains(s)) {
            return false;
        }
        self.terms.iter().all(|t| row.haystack.contains(t.as_str()))
    }
}

pub fn search_terms(text: &str) -> Vec<String> {
    text.trim()
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Lowercase name, states, specialties and synonyms, space-joined.
pub fn haystack(r: &Reviewer) -> String {
    std::iter::once(r.name().to_lowercase())
        .chain(r.states().iter().map(|s| s.to_lowercase()))
        .chain(r.specialties().iter().map(|s| s.to_lowercase()))
        .chain(r.specialty_index().iter().cloned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Stable list identity. Not used for matching or ordering.
pub fn row_key(r: &Reviewer, position: usize) -> String {
    if let Some(id) = r.id() {
        let id = match id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return format!("id:{id}");
    }
    format!(
        "sig:{}|{}|{}#{position}",
        r.name().trim().to_lowercase(),
        r.specialties().join("|").to_lowercase(),
        r.states().join("|").to_lowercase(),
    )
}

/// Last whitespace token of the name before any credentials, lowercased.
pub fn last_name_key(full: &str) -> String {
    let (base, _) = display::split_name_and_cred(full);
    base.split_whitespace()
        .next_back()
        .unwrap_or("")
        .to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortKey {
    Name { last: String, full: String },
    Joined(String),
}

pub fn sort_key(r: &Reviewer, column: SortColumn) -> SortKey {
    match column {
        SortColumn::Name => SortKey::Name {
            last: last_name_key(r.name()),
            full: r.name().to_lowercase(),
        },
        SortColumn::Specialties => SortKey::Joined(r.specialties().join(", ").to_lowercase()),
        SortColumn::States => SortKey::Joined(r.states().join(", ").to_lowercase()),
    }
}

/// Stable sort; descending inverts the comparison so ties keep their order.
pub fn sort_rows(rows: &mut [&IndexedReviewer], sort: SortState) {
    match sort.direction {
        SortDirection::Asc => rows.sort_by_cached_key(|row| sort_key(&row.reviewer, sort.column)),
        SortDirection::Desc => {
            rows.sort_by_cached_key(|row| Reverse(sort_key(&row.reviewer, sort.column)))
        }
    }
}

/// Parse `sort`/`dir` request parameters, falling back to name ascending.
pub fn parse_sort(column: Option<&str>, direction: Option<&str>) -> SortState {
    let column = match column.unwrap_or("name").to_ascii_lowercase().as_str() {
        "specialties" | "specialty" => SortColumn::Specialties,
        "states" | "state" => SortColumn::States,
        _ => SortColumn::Name,
    };
    let direction = match direction.unwrap_or("asc").to_ascii_lowercase().as_str() {
        "desc" => SortDirection::Desc,
        _ => SortDirection::Asc,
    };
    SortState { column, direction }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reviewer(name: &str, specs: &[&str], states: &[&str]) -> Reviewer {
        Reviewer::new(
            None,
            name,
            specs.iter().map(|s| s.to_string()).collect(),
            states.iter().map(|s| s.to_string()).collect(),
        )
    }

    fn engine() -> ReviewerEngine {
        ReviewerEngine::new(vec![
            reviewer("Jane Doe, MD", &["Cardiology"], &["TX", "OK"]),
            reviewer("John Lee", &["Otolaryngology", "Pediatrics"], &["TX"]),
            reviewer("Ann Adams, DO", &["Family Practice"], &["OK", "CA"]),
        ])
    }

    fn names(hits: &[&IndexedReviewer]) -> Vec<String> {
        hits.iter().map(|r| r.reviewer().name().to_string()).collect()
    }

    #[test]
    fn haystack_includes_synonyms() {
        let r = reviewer("John Lee", &["Otolaryngology"], &["tx"]);
        let hay = haystack(&r);
        assert!(hay.starts_with("john lee tx otolaryngology"));
        assert!(hay.contains("ear nose throat"));
    }

    #[test]
    fn row_keys() {
        let with_id = Reviewer::new(Some(json!("abc")), "X", vec![], vec![]);
        assert_eq!(row_key(&with_id, 3), "id:abc");
        let numeric = Reviewer::new(Some(json!(7)), "X", vec![], vec![]);
        assert_eq!(row_key(&numeric, 0), "id:7");
        let r = reviewer(" Jane Doe ", &["ENT", "Cardiology"], &["tx", "ok"]);
        assert_eq!(row_key(&r, 4), "sig:jane doe|cardiology|ent|ok|tx#4");
    }

    #[test]
    fn specialty_filter_matches_synonym_group() {
        let e = engine();
        let filter = FilterState {
            selected_specialties: vec!["ENT".into()],
            ..Default::default()
        };
        assert_eq!(names(&e.matching(&filter, SortState::default())), ["John Lee"]);
    }

    #[test]
    fn specialty_selections_are_anded() {
        let e = engine();
        let mut filter = FilterState::default();
        filter.toggle_specialty("Peds");
        filter.toggle_specialty("ENT");
        assert_eq!(names(&e.matching(&filter, SortState::default())), ["John Lee"]);
        filter.toggle_specialty("Cardiology");
        assert!(e.matching(&filter, SortState::default()).is_empty());
    }

    #[test]
    fn state_selections_are_anded() {
        let e = engine();
        let mut filter = FilterState::default();
        filter.toggle_state("TX");
        filter.toggle_state("ok");
        assert_eq!(
            names(&e.matching(&filter, SortState::default())),
            ["Jane Doe, MD"]
        );
    }

    #[test]
    fn text_terms_are_anded() {
        let e = engine();
        let filter = FilterState {
            search_text: "  Family  ok ".into(),
            ..Default::default()
        };
        assert_eq!(
            names(&e.matching(&filter, SortState::default())),
            ["Ann Adams, DO"]
        );
        let filter = FilterState {
            search_text: "family tx".into(),
            ..Default::default()
        };
        assert!(e.matching(&filter, SortState::default()).is_empty());
    }

    #[test]
    fn empty_filter_passes_everything() {
        let e = engine();
        let filter = FilterState {
            search_text: "   ".into(),
            ..Default::default()
        };
        assert!(filter.is_empty());
        assert_eq!(e.matching(&filter, SortState::default()).len(), 3);
    }

    #[test]
    fn toggle_removes_and_ignores_blank() {
        let mut filter = FilterState::default();
        filter.toggle_state("TX");
        filter.toggle_state("  ");
        assert_eq!(filter.selected_states, ["TX"]);
        filter.toggle_state("TX");
        assert!(filter.selected_states.is_empty());
    }

    #[test]
    fn name_sort_uses_last_name_then_full_name() {
        let e = ReviewerEngine::new(vec![
            reviewer("Zed Smith", &[], &["TX"]),
            reviewer("Amy Smith, MD", &[], &["TX"]),
            reviewer("Bob Jones", &[], &["TX"]),
        ]);
        let hits = e.matching(&FilterState::default(), SortState::default());
        assert_eq!(names(&hits), ["Bob Jones", "Amy Smith, MD", "Zed Smith"]);
    }

    #[test]
    fn descending_keeps_ties_in_original_order() {
        let e = ReviewerEngine::new(vec![
            reviewer("A One", &["ENT"], &["TX"]),
            reviewer("B Two", &["Cardiology"], &["TX"]),
            reviewer("C Three", &["ENT"], &["OK"]),
        ]);
        let sort = SortState {
            column: SortColumn::States,
            direction: SortDirection::Desc,
        };
        let hits = e.matching(&FilterState::default(), sort);
        assert_eq!(names(&hits), ["A One", "B Two", "C Three"]);
    }

    #[test]
    fn specialties_sort_key_joins_members() {
        let r = reviewer("X", &["Pediatrics", "Cardiology"], &["TX", "CA"]);
        assert_eq!(
            sort_key(&r, SortColumn::Specialties),
            SortKey::Joined("cardiology, pediatrics".into())
        );
        assert_eq!(sort_key(&r, SortColumn::States), SortKey::Joined("ca, tx".into()));
    }

    #[test]
    fn last_name_key_ignores_credentials() {
        assert_eq!(last_name_key("Jane Q Doe, MD, FACC"), "doe");
        assert_eq!(last_name_key("Doe, Jane"), "doe");
        assert_eq!(last_name_key(""), "");
    }

    #[test]
    fn sort_toggle() {
        let mut sort = SortState::default();
        sort.toggle(SortColumn::Name);
        assert_eq!(sort.direction, SortDirection::Desc);
        sort.toggle(SortColumn::States);
        assert_eq!(
            sort,
            SortState {
                column: SortColumn::States,
                direction: SortDirection::Asc
            }
        );
        sort.toggle(SortColumn::States);
        assert_eq!(sort.direction, SortDirection::Desc);
    }

    #[test]
    fn parses_sort_params() {
        assert_eq!(parse_sort(None, None), SortState::default());
        assert_eq!(
            parse_sort(Some("STATES"), Some("desc")),
            SortState {
                column: SortColumn::States,
                direction: SortDirection::Desc
            }
        );
        assert_eq!(parse_sort(Some("bogus"), Some("sideways")), SortState::default());
    }

    #[test]
    fn facets_are_distinct_and_sorted() {
        let e = engine();
        assert_eq!(e.all_states(), ["CA", "OK", "TX"]);
        assert_eq!(
            e.all_specialties(),
            ["Cardiology", "Family Practice", "Otolaryngology", "Pediatrics"]
        );
    }

    #[test]
    fn search_builds_views_and_counts() {
        let e = engine();
        let filter = FilterState {
            search_text: "doe".into(),
            ..Default::default()
        };
        let opts = DisplayOptions {
            reorder_names: true,
            high_contrast: true,
        };
        let resp = e.search(&filter, SortState::default(), opts);
        assert_eq!((resp.matched, resp.total), (1, 3));
        let view = &resp.hits[0];
        assert_eq!(view.display_name, "Doe, Jane, MD");
        assert_eq!(view.name, "Jane Doe, MD");
        assert_eq!(view.specialties[0].label, "Cardiology");
        assert_eq!(
            view.specialties[0].text_color,
            display::contrast_text(view.specialties[0].color)
        );
    }
}
