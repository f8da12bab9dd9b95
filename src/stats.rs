//! Derived views over the record list

use crate::models::ReadLog;
use std::collections::BTreeMap;

/// ジュズごとの読誦回数を数える
///
/// ログリストのみから決定的に導出される。ジュズ番号の昇順で
/// `(juz_number, count)` の列を返す。
pub fn counts_by_juz(logs: &[ReadLog]) -> Vec<(i32, usize)> {
    let mut counts: BTreeMap<i32, usize> = BTreeMap::new();
    for log in logs {
        *counts.entry(log.juz_number).or_insert(0) += 1;
    }
    counts.into_iter().collect()
}
