// Explicit join utilities used in place of wide/long reshaping.

use std::collections::{BTreeMap, BTreeSet};

/// All `k`-element combinations of `items`, in index order.
pub fn combinations<T: Copy>(items: &[T], k: usize) -> Vec<Vec<T>> {
    let n = items.len();
    if k == 0 || k > n {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut idx: Vec<usize> = (0..k).collect();
    loop {
        out.push(idx.iter().map(|&i| items[i]).collect());
        // Rightmost index that can still move.
        let Some(pos) = (0..k).rev().find(|&i| idx[i] != i + n - k) else {
            break;
        };
        idx[pos] += 1;
        for j in pos + 1..k {
            idx[j] = idx[j - 1] + 1;
        }
    }
    out
}

/// Cartesian product of two key lists.
pub fn cross_pairs<A: Clone, B: Clone>(left: &[A], right: &[B]) -> Vec<(A, B)> {
    left.iter()
        .flat_map(|a| right.iter().map(move |b| (a.clone(), b.clone())))
        .collect()
}

/// Complete a two-key table to every combination of the distinct left and
/// right keys it already contains, filling missing cells with `fill`.
///
/// Running it on a complete table returns the same table.
pub fn complete_grid<A, B, V>(table: &BTreeMap<(A, B), V>, fill: V) -> BTreeMap<(A, B), V>
where
    A: Ord + Clone,
    B: Ord + Clone,
    V: Clone,
{
    let lefts: Vec<A> = table
        .keys()
        .map(|(a, _)| a.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let rights: Vec<B> = table
        .keys()
        .map(|(_, b)| b.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    cross_pairs(&lefts, &rights)
        .into_iter()
        .map(|key| {
            let value = table.get(&key).cloned().unwrap_or_else(|| fill.clone());
            (key, value)
        })
        .collect()
}
