use anyhow::Context;

use crate::cli::QueryArgs;
use crate::display::DisplayOptions;
use crate::index::reviewers::{FilterState, SortDirection, parse_sort};
use crate::live::DirectorySnapshot;
use crate::store::{AvailabilityPolicy, listable_reviewers, source_from_args};

/// One-shot fetch and search; prints the response JSON to stdout.
pub async fn run(opts: QueryArgs) -> anyhow::Result<()> {
    let source = source_from_args(&opts.source)?;
    let policy = if opts.source.include_unavailable {
        AvailabilityPolicy::All
    } else {
        AvailabilityPolicy::AvailableOnly
    };

    let rows = source.fetch().await.context("fetch reviewers")?;
    let snapshot = DirectorySnapshot::new(
        1,
        listable_reviewers(rows, policy),
        std::time::SystemTime::now(),
    );
    tracing::info!("Fetched {} listable reviewers", snapshot.engine.len());

    let filter = filter_from_args(&opts);
    let mut sort = parse_sort(Some(&opts.sort), None);
    if opts.desc {
        sort.direction = SortDirection::Desc;
    }
    let display = DisplayOptions {
        reorder_names: opts.reorder_names,
        high_contrast: false,
    };

    let resp = snapshot.engine.search(&filter, sort, display);
    println!("{}", serde_json::to_string_pretty(&resp)?);
    Ok(())
}

fn filter_from_args(opts: &QueryArgs) -> FilterState {
    let mut filter = FilterState {
        search_text: opts.q.clone().unwrap_or_default(),
        ..Default::default()
    };
    for s in opts.specialties.iter().map(|s| s.trim()) {
        if !filter.selected_specialties.iter().any(|v| v == s) {
            filter.toggle_specialty(s);
        }
    }
    for s in opts.states.iter().map(|s| s.trim()) {
        if !filter.selected_states.iter().any(|v| v == s) {
            filter.toggle_state(s);
        }
    }
    filter
}
