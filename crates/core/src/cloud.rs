//! Tag cloud bucketing.

use crate::tag::TagCount;

/// Pair each tag count with a class proportional to its frequency.
///
/// The most used tag gets the last class; a tag used `n` times gets the class
/// at `round(n / max * (classes.len() - 1))`.
pub fn tag_cloud<'a, C>(counts: &'a [TagCount], classes: &'a [C]) -> Vec<(&'a TagCount, &'a C)> {
    let max_count = counts.iter().map(|c| c.count).max().unwrap_or(0);
    if max_count == 0 || classes.is_empty() {
        return Vec::new();
    }
    let steps = (classes.len() - 1) as f64;
    counts
        .iter()
        .map(|c| {
            let index = ((c.count as f64 / max_count as f64) * steps).round() as usize;
            (c, &classes[index.min(classes.len() - 1)])
        })
        .collect()
}
