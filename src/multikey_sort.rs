//! Multikey quicksort over variable-length keys.
//!
//! Keys are compared one unit at a time from a starting depth. A
//! [`KeyHandler`] extracts the unit of a key at a given depth and says which
//! unit value terminates a key, so the same routine sorts byte strings
//! (terminated by NUL) and id sequences (terminated by a sentinel).

use std::cmp::Ordering;

/// Ranges at or below this length are finished with an insertion sort.
const INSERTION_SORT_THRESHOLD: usize = 10;

pub trait KeyHandler<K> {
    type Unit: Copy + Ord;

    /// Unit of `key` at `depth`. Must return the terminal unit at and past
    /// the logical end of the key.
    fn unit(&self, key: &K, depth: usize) -> Self::Unit;

    fn is_terminal(&self, unit: Self::Unit) -> bool;
}

/// Called with every run of two or more keys that compare equal all the way
/// to their terminator. Returning `false` aborts the sort.
pub trait DuplicateHandler<K> {
    fn duplicates(&mut self, run: &[K]) -> bool;
}

/// Ignores duplicate keys.
pub struct AllowDuplicates;

impl<K> DuplicateHandler<K> for AllowDuplicates {
    fn duplicates(&mut self, _run: &[K]) -> bool {
        true
    }
}

/// Aborts the sort on the first run of duplicate keys.
pub struct RejectDuplicates;

impl<K> DuplicateHandler<K> for RejectDuplicates {
    fn duplicates(&mut self, _run: &[K]) -> bool {
        false
    }
}

/// NUL-terminated byte keys. Bytes past the end of a key read as 0.
pub struct ByteKeys;

impl<K: AsRef<[u8]>> KeyHandler<K> for ByteKeys {
    type Unit = u8;

    #[inline]
    fn unit(&self, key: &K, depth: usize) -> u8 {
        key.as_ref().get(depth).copied().unwrap_or(0)
    }

    #[inline]
    fn is_terminal(&self, unit: u8) -> bool {
        unit == 0
    }
}

/// Sorts `keys` from depth 0, ignoring duplicates.
pub fn sort<K, H>(keys: &mut [K], handler: &H)
where
    H: KeyHandler<K>,
{
    sort_with(keys, 0, handler, &mut AllowDuplicates);
}

/// Sorts `keys` comparing units from `depth` on. Returns `false` if
/// `dups` aborted the sort, in which case the order of `keys` is
/// unspecified.
pub fn sort_with<K, H, D>(keys: &mut [K], depth: usize, handler: &H, dups: &mut D) -> bool
where
    H: KeyHandler<K>,
    D: DuplicateHandler<K>,
{
    if keys.len() < 2 {
        return true;
    }
    let len = keys.len();
    sort_range(keys, 0, len, depth, handler, dups)
}

/// Compares two keys unit by unit from `depth`, stopping at a terminator.
pub fn compare_keys<K, H>(lhs: &K, rhs: &K, mut depth: usize, handler: &H) -> Ordering
where
    H: KeyHandler<K>,
{
    loop {
        let l = handler.unit(lhs, depth);
        let r = handler.unit(rhs, depth);
        depth += 1;
        if handler.is_terminal(l) || l != r {
            return l.cmp(&r);
        }
    }
}

fn median<T: Ord + Copy>(x: T, y: T, z: T) -> T {
    if x < y {
        if y < z {
            y
        } else if x < z {
            z
        } else {
            x
        }
    } else if x < z {
        x
    } else if y < z {
        z
    } else {
        y
    }
}

fn sort_range<K, H, D>(
    keys: &mut [K],
    mut l: usize,
    mut r: usize,
    mut depth: usize,
    handler: &H,
    dups: &mut D,
) -> bool
where
    H: KeyHandler<K>,
    D: DuplicateHandler<K>,
{
    while r - l > INSERTION_SORT_THRESHOLD {
        let pivot = median(
            handler.unit(&keys[l], depth),
            handler.unit(&keys[l + (r - l) / 2], depth),
            handler.unit(&keys[r - 1], depth),
        );

        // Equal units are parked at both ends while scanning:
        // [l, pivot_l) == pivot, [pivot_l, pl) < pivot,
        // [pr, pivot_r) > pivot, [pivot_r, r) == pivot.
        let mut pl = l;
        let mut pr = r;
        let mut pivot_l = l;
        let mut pivot_r = r;
        loop {
            while pl < pr {
                let unit = handler.unit(&keys[pl], depth);
                if unit > pivot {
                    break;
                } else if unit == pivot {
                    keys.swap(pl, pivot_l);
                    pivot_l += 1;
                }
                pl += 1;
            }
            while pl < pr {
                pr -= 1;
                let unit = handler.unit(&keys[pr], depth);
                if unit < pivot {
                    break;
                } else if unit == pivot {
                    pivot_r -= 1;
                    keys.swap(pr, pivot_r);
                }
            }
            if pl >= pr {
                break;
            }
            keys.swap(pl, pr);
            pl += 1;
        }

        while pivot_l > l {
            pivot_l -= 1;
            pl -= 1;
            keys.swap(pivot_l, pl);
        }
        while pivot_r < r {
            keys.swap(pivot_r, pr);
            pivot_r += 1;
            pr += 1;
        }

        // Now [l, pl) < pivot, [pl, pr) == pivot, [pr, r) > pivot.
        let num_less = pl - l;
        let num_equal = pr - pl;
        let num_greater = r - pr;

        if num_less > num_equal || num_greater > num_equal {
            if num_equal > 1 {
                if !handler.is_terminal(pivot) {
                    if !sort_range(keys, pl, pr, depth + 1, handler, dups) {
                        return false;
                    }
                } else if !dups.duplicates(&keys[pl..pr]) {
                    return false;
                }
            }
            // Recurse into the smaller side, loop on the larger one.
            if num_less < num_greater {
                if num_less > 1 && !sort_range(keys, l, pl, depth, handler, dups) {
                    return false;
                }
                l = pr;
            } else {
                if num_greater > 1 && !sort_range(keys, pr, r, depth, handler, dups) {
                    return false;
                }
                r = pl;
            }
        } else {
            if num_less > 1 && !sort_range(keys, l, pl, depth, handler, dups) {
                return false;
            }
            if num_greater > 1 && !sort_range(keys, pr, r, depth, handler, dups) {
                return false;
            }
            l = pl;
            r = pr;
            if num_equal > 1 {
                if !handler.is_terminal(pivot) {
                    depth += 1;
                } else {
                    if !dups.duplicates(&keys[pl..pr]) {
                        return false;
                    }
                    l = r;
                }
            }
        }
    }

    if r - l > 1 {
        return insertion_sort(keys, l, r, depth, handler, dups);
    }
    true
}

fn insertion_sort<K, H, D>(
    keys: &mut [K],
    l: usize,
    r: usize,
    depth: usize,
    handler: &H,
    dups: &mut D,
) -> bool
where
    H: KeyHandler<K>,
    D: DuplicateHandler<K>,
{
    let mut has_ties = false;
    for i in l + 1..r {
        let mut j = i;
        while j > l {
            let order = compare_keys(&keys[j - 1], &keys[j], depth, handler);
            if order == Ordering::Equal {
                has_ties = true;
            }
            if order != Ordering::Greater {
                break;
            }
            keys.swap(j - 1, j);
            j -= 1;
        }
    }
    if has_ties {
        return report_duplicates(&keys[l..r], depth, handler, dups);
    }
    true
}

/// `keys` must already be sorted.
fn report_duplicates<K, H, D>(keys: &[K], depth: usize, handler: &H, dups: &mut D) -> bool
where
    H: KeyHandler<K>,
    D: DuplicateHandler<K>,
{
    let mut begin = 0;
    for i in 1..keys.len() {
        if compare_keys(&keys[begin], &keys[i], depth, handler) != Ordering::Equal {
            if i - begin > 1 && !dups.duplicates(&keys[begin..i]) {
                return false;
            }
            begin = i;
        }
    }
    if keys.len() - begin > 1 {
        return dups.duplicates(&keys[begin..]);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sentinel-terminated integer keys stored inline.
    struct IntKeys;

    impl KeyHandler<Vec<i32>> for IntKeys {
        type Unit = i32;

        fn unit(&self, key: &Vec<i32>, depth: usize) -> i32 {
            key.get(depth).copied().filter(|&v| v >= 0).unwrap_or(-1)
        }

        fn is_terminal(&self, unit: i32) -> bool {
            unit == -1
        }
    }

    struct CountRuns(Vec<usize>);

    impl<K> DuplicateHandler<K> for CountRuns {
        fn duplicates(&mut self, run: &[K]) -> bool {
            self.0.push(run.len());
            true
        }
    }

    #[test]
    fn sorts_short_byte_keys() {
        let mut keys = vec!["pear", "apple", "", "app", "banana", "apple"];
        sort(&mut keys, &ByteKeys);
        assert_eq!(keys, vec!["", "app", "apple", "apple", "banana", "pear"]);
    }

    #[test]
    fn sorts_long_byte_keys() {
        let mut keys: Vec<String> = (0..500).rev().map(|i| format!("k{}", i * 7 % 311)).collect();
        let mut expected = keys.clone();
        expected.sort();
        sort(&mut keys, &ByteKeys);
        assert_eq!(keys, expected);
    }

    #[test]
    fn sorts_from_depth() {
        let mut keys = vec!["xb", "xa", "yc"];
        sort_with(&mut keys, 1, &ByteKeys, &mut AllowDuplicates);
        assert_eq!(keys, vec!["xa", "xb", "yc"]);
    }

    #[test]
    fn sorts_id_sequences_shorter_first() {
        let mut keys = vec![vec![1, 2], vec![1], vec![0, 5, 5], vec![1, 2, 0], vec![0]];
        sort(&mut keys, &IntKeys);
        assert_eq!(
            keys,
            vec![vec![0], vec![0, 5, 5], vec![1], vec![1, 2], vec![1, 2, 0]]
        );
    }

    #[test]
    fn reports_every_duplicate_run() {
        let mut keys = vec!["b", "a", "b", "c", "a", "a"];
        let mut runs = CountRuns(Vec::new());
        assert!(sort_with(&mut keys, 0, &ByteKeys, &mut runs));
        runs.0.sort();
        assert_eq!(runs.0, vec![2, 3]);
    }

    #[test]
    fn reports_duplicates_in_large_ranges() {
        let mut keys: Vec<String> = (0..200).map(|i| format!("w{}", i % 50)).collect();
        let mut runs = CountRuns(Vec::new());
        assert!(sort_with(&mut keys, 0, &ByteKeys, &mut runs));
        assert_eq!(runs.0.len(), 50);
        assert!(runs.0.iter().all(|&n| n == 4));
    }

    #[test]
    fn reject_duplicates_aborts() {
        let mut unique: Vec<String> = (0..100).map(|i| format!("u{}", i)).collect();
        assert!(sort_with(&mut unique, 0, &ByteKeys, &mut RejectDuplicates));

        let mut keys = unique.clone();
        keys.push("u42".to_string());
        assert!(!sort_with(&mut keys, 0, &ByteKeys, &mut RejectDuplicates));
    }

    #[test]
    fn compare_stops_at_terminator() {
        assert_eq!(compare_keys(&"ab", &"ab", 0, &ByteKeys), Ordering::Equal);
        assert_eq!(compare_keys(&"ab", &"abc", 0, &ByteKeys), Ordering::Less);
        assert_eq!(compare_keys(&"b", &"abc", 0, &ByteKeys), Ordering::Greater);
    }

    #[test]
    fn median_of_three() {
        assert_eq!(median(1, 2, 3), 2);
        assert_eq!(median(3, 1, 2), 2);
        assert_eq!(median(2, 3, 1), 2);
        assert_eq!(median(5, 5, 1), 5);
    }
}
