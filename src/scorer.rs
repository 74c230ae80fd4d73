use std::collections::BTreeMap;

/// Votes per offset (`indexed position - sampled x`), ascending by offset.
/// Only offsets that received a vote are present.
pub type OffsetHistogram = BTreeMap<i64, u32>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ranked<K> {
    pub candidate: K,
    pub score: u32,
}

/// Largest sum over `window` consecutive populated buckets. Gaps between
/// offsets are ignored: the window counts buckets, not offset span.
///
/// A histogram with no more than `window` buckets scores its total rather
/// than zero. With the default region size a true crop often lands on only a
/// few offsets, and a zero score would leave every candidate tied at nothing.
pub fn window_score(histogram: &OffsetHistogram, window: usize) -> u32 {
    let votes: Vec<u32> = histogram.values().copied().collect();
    if votes.len() <= window {
        return votes.iter().sum();
    }

    let mut running: u32 = votes[..window].iter().sum();
    let mut best = running;
    for i in window..votes.len() {
        running = running + votes[i] - votes[i - window];
        best = best.max(running);
    }
    best
}

/// Score every candidate and order them best first. Ties keep the order in
/// which candidates were supplied, so the first one seen wins.
pub fn rank<'a, K, I>(histograms: I, window: usize) -> Vec<Ranked<K>>
where
    K: Copy + 'a,
    I: IntoIterator<Item = (&'a K, &'a OffsetHistogram)>,
{
    let mut ranked: Vec<Ranked<K>> = histograms
        .into_iter()
        .filter(|(_, histogram)| !histogram.is_empty())
        .map(|(&candidate, histogram)| Ranked {
            candidate,
            score: window_score(histogram, window),
        })
        .collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked
}
