//! Linear-time top-K selection.
//!
//! Quickselect with a Hoare-style partition around the midpoint element.
//! Only the side holding the target rank is revisited. Past `max_depth`
//! rounds the remaining range is fully sorted instead.

use std::cmp::Ordering;

pub const DEFAULT_MAX_DEPTH: usize = 50;

#[derive(Debug, Clone, Copy)]
pub struct Partitioner {
    max_depth: usize,
}

impl Default for Partitioner {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Partitioner {
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Reorder `items[..size]` so the `n` highest-scoring elements occupy
    /// `items[..n]`, in no particular order. Returns how many elements that
    /// prefix holds (`n` clamped to `size`).
    pub fn partition<T, F>(&self, items: &mut [T], size: usize, n: usize, score: F) -> usize
    where
        F: Fn(&T) -> f32,
    {
        let size = size.min(items.len());
        if n == 0 {
            return 0;
        }
        if n >= size {
            return size;
        }
        self.select(&mut items[..size], n, &score);
        n
    }

    fn select<T, F>(&self, items: &mut [T], n: usize, score: &F)
    where
        F: Fn(&T) -> f32,
    {
        let mut start = 0;
        let mut end = items.len() - 1;
        let mut target = n;
        let mut depth = 0;

        // Invariant: 1 <= target <= end - start + 1.
        loop {
            if depth > self.max_depth {
                items[start..=end].sort_by(|a, b| descending(score(a), score(b)));
                return;
            }
            if start == end {
                return;
            }
            let pivot = mid_point_partition(items, start, end, score);
            let kept = pivot - start + 1;
            match target.cmp(&kept) {
                Ordering::Equal => return,
                Ordering::Less => end = pivot - 1,
                Ordering::Greater => {
                    start = pivot + 1;
                    target -= kept;
                }
            }
            depth += 1;
        }
    }
}

fn descending(a: f32, b: f32) -> Ordering {
    b.total_cmp(&a)
}

fn mid_point_partition<T, F>(items: &mut [T], start: usize, end: usize, score: &F) -> usize
where
    F: Fn(&T) -> f32,
{
    let middle = start + (end - start) / 2;
    items.swap(middle, end);
    end_point_partition(items, start, end, score)
}

/// Partition `items[start..=end]` around `items[end]`: higher-or-equal
/// scores to the left. Returns the pivot's final index. Requires `start < end`.
fn end_point_partition<T, F>(items: &mut [T], start: usize, end: usize, score: &F) -> usize
where
    F: Fn(&T) -> f32,
{
    let pivot = score(&items[end]);
    let mut i = start;
    let mut j = end - 1;
    loop {
        while i < end && score(&items[i]) >= pivot {
            i += 1;
        }
        while j > i && score(&items[j]) < pivot {
            j -= 1;
        }
        if j <= i {
            break;
        }
        items.swap(i, j);
    }
    items.swap(i, end);
    i
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn top_sorted(scores: &[f32], n: usize) -> Vec<f32> {
        let mut all = scores.to_vec();
        all.sort_by(|a, b| b.total_cmp(a));
        all.truncate(n);
        all
    }

    fn prefix_sorted(items: &[f32], n: usize) -> Vec<f32> {
        let mut prefix = items[..n].to_vec();
        prefix.sort_by(|a, b| b.total_cmp(a));
        prefix
    }

    #[test]
    fn selects_top_three() {
        let mut scores = vec![5.0f32, 2.0, 8.0, 1.0, 9.0];
        let kept = Partitioner::default().partition(&mut scores, 5, 3, |s| *s);
        assert_eq!(kept, 3);
        assert_eq!(prefix_sorted(&scores, 3), vec![9.0, 8.0, 5.0]);
    }

    #[test]
    fn zero_and_full_selection() {
        let mut scores = vec![3.0f32, 1.0, 2.0];
        assert_eq!(Partitioner::default().partition(&mut scores, 3, 0, |s| *s), 0);
        assert_eq!(Partitioner::default().partition(&mut scores, 3, 3, |s| *s), 3);
        assert_eq!(Partitioner::default().partition(&mut scores, 3, 10, |s| *s), 3);
    }

    #[test]
    fn presorted_input() {
        let mut ascending: Vec<f32> = (0..1000).map(|i| i as f32).collect();
        Partitioner::default().partition(&mut ascending, 1000, 10, |s| *s);
        let expected: Vec<f32> = (990..1000).rev().map(|i| i as f32).collect();
        assert_eq!(prefix_sorted(&ascending, 10), expected);

        let mut descending: Vec<f32> = (0..1000).rev().map(|i| i as f32).collect();
        Partitioner::default().partition(&mut descending, 1000, 10, |s| *s);
        assert_eq!(prefix_sorted(&descending, 10), expected);
    }

    #[test]
    fn depth_fallback_sorts() {
        let mut scores: Vec<f32> = vec![4.0, 7.0, 1.0, 9.0, 3.0, 8.0, 2.0];
        let kept = Partitioner::with_max_depth(0).partition(&mut scores, 7, 4, |s| *s);
        assert_eq!(kept, 4);
        assert_eq!(prefix_sorted(&scores, 4), vec![9.0, 8.0, 7.0, 4.0]);
    }

    #[test]
    fn respects_size_argument() {
        let mut scores = vec![1.0f32, 2.0, 3.0, 100.0];
        Partitioner::default().partition(&mut scores, 3, 1, |s| *s);
        assert_eq!(scores[0], 3.0);
        assert_eq!(scores[3], 100.0);
    }

    proptest! {
        #[test]
        fn prefix_equals_top_n(
            scores in prop::collection::vec(-1000i32..1000, 1..200),
            pick in 0usize..200,
        ) {
            let scores: Vec<f32> = scores.into_iter().map(|s| s as f32).collect();
            let n = pick % (scores.len() + 1);
            let mut items = scores.clone();
            let kept = Partitioner::default().partition(&mut items, scores.len(), n, |s| *s);
            prop_assert_eq!(kept, n);
            prop_assert_eq!(prefix_sorted(&items, n), top_sorted(&scores, n));
        }

        #[test]
        fn shallow_depth_still_correct(
            scores in prop::collection::vec(-50i32..50, 1..100),
            pick in 0usize..100,
        ) {
            let scores: Vec<f32> = scores.into_iter().map(|s| s as f32).collect();
            let n = pick % (scores.len() + 1);
            let mut items = scores.clone();
            Partitioner::with_max_depth(1).partition(&mut items, scores.len(), n, |s| *s);
            prop_assert_eq!(prefix_sorted(&items, n), top_sorted(&scores, n));
        }
    }
}
