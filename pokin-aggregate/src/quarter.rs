use pokin_types::QuarterSplit;

/// Zero-based quarter for a calendar month, `None` outside 1..=12.
pub fn quarter_of(month: i64) -> Option<usize> {
    match month {
        1..=3 => Some(0),
        4..=6 => Some(1),
        7..=9 => Some(2),
        10..=12 => Some(3),
        _ => None,
    }
}

/// Sums `(month, weight)` pairs per quarter. Pairs with an out-of-range month are dropped.
pub fn bucket_quarters<I>(pairs: I) -> QuarterSplit
where
    I: IntoIterator<Item = (i64, i64)>,
{
    let mut split = QuarterSplit::default();
    for (month, weight) in pairs {
        match quarter_of(month) {
            Some(0) => split.tw1 += weight,
            Some(1) => split.tw2 += weight,
            Some(2) => split.tw3 += weight,
            Some(3) => split.tw4 += weight,
            _ => {}
        }
    }
    split
}
