use std::collections::HashSet;

use crate::fetcher::NewsItem;

/// Links observed across all refresh cycles in this process. Grows
/// monotonically for the process lifetime; an item surfaced once is never
/// resurfaced, even while it is still inside the lookback window.
pub type SeenSet = HashSet<String>;

/// Drop items whose link has already been observed, inserting every passed
/// item's link into `seen`. First occurrence within a batch wins; later
/// duplicates are dropped silently.
pub fn filter(items: Vec<NewsItem>, seen: &mut SeenSet) -> Vec<NewsItem> {
    items
        .into_iter()
        .filter(|item| seen.insert(item.link.clone()))
        .collect()
}
