//! Declarative index paths into the schema-less review payload.
//!
//! Every "magic number" the decoder relies on lives in [`fields`]. Each field
//! maps to an ordered list of [`PathSpec`] candidates; the first candidate
//! that yields a value of the expected type wins. Navigation never panics:
//! an out-of-bounds index, a non-array step, or a trailing `null` simply
//! means "not found".

use chrono::NaiveDate;
use serde_json::Value;

/// One way of locating a value inside a nested array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathSpec {
    /// Follow these indices from the record root.
    Index(&'static [usize]),
    /// Follow `container`, then try `tail` under each of its first `n`
    /// children in order. Absorbs off-by-one shifts inside a container.
    SearchFirstN {
        container: &'static [usize],
        n: usize,
        tail: &'static [usize],
    },
}

impl PathSpec {
    /// All non-null values this path can reach, in priority order.
    #[must_use]
    pub fn resolve<'a>(&self, root: &'a Value) -> Vec<&'a Value> {
        match *self {
            PathSpec::Index(path) => navigate(root, path).into_iter().collect(),
            PathSpec::SearchFirstN { container, n, tail } => navigate(root, container)
                .and_then(Value::as_array)
                .map(|children| {
                    children
                        .iter()
                        .take(n)
                        .filter_map(|child| navigate(child, tail))
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

/// Safely walks `path` through nested arrays.
///
/// Returns `None` if any step is not an array, any index is out of bounds,
/// or the final value is `null`.
#[must_use]
pub fn navigate<'a>(root: &'a Value, path: &[usize]) -> Option<&'a Value> {
    let found = path
        .iter()
        .try_fold(root, |node, &i| node.as_array()?.get(i))?;
    (!found.is_null()).then_some(found)
}

/// Tries each path in order and returns the first value `extract` accepts.
pub fn first_match<T>(
    root: &Value,
    paths: &[PathSpec],
    extract: impl Fn(&Value) -> Option<T>,
) -> Option<T> {
    paths
        .iter()
        .flat_map(|path| path.resolve(root))
        .find_map(extract)
}

/// A non-blank string.
#[must_use]
pub fn as_text(value: &Value) -> Option<String> {
    value
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .map(str::to_owned)
}

/// An integer, an integral-looking float, or a numeric string such as
/// `"1,234"`.
#[must_use]
pub fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64().filter(|f| f.is_finite()).map(|f| {
                #[allow(clippy::cast_possible_truncation)]
                let truncated = f.trunc() as i64;
                truncated
            })
        }),
        Value::String(s) => {
            let digits: String = s.trim().chars().filter(|c| *c != ',').collect();
            digits.parse::<i64>().ok()
        }
        _ => None,
    }
}

/// The length of an array value.
#[must_use]
pub fn as_len(value: &Value) -> Option<i64> {
    value
        .as_array()
        .map(|a| i64::try_from(a.len()).unwrap_or(i64::MAX))
}

/// A `[year, month, day, ...]` array within plausible ranges that names a
/// real calendar day.
#[must_use]
pub fn as_date_parts(value: &Value) -> Option<NaiveDate> {
    let parts = value.as_array()?;
    let year = as_int(parts.first()?)?;
    let month = as_int(parts.get(1)?)?;
    let day = as_int(parts.get(2)?)?;
    if !(2000..=2100).contains(&year) || !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }
    NaiveDate::from_ymd_opt(
        i32::try_from(year).ok()?,
        u32::try_from(month).ok()?,
        u32::try_from(day).ok()?,
    )
}

/// Field path table for one review record.
///
/// Observed record layout (`r` is the record, `b = r[0]` the review block):
///
/// ```text
/// b[0]                 review id
/// b[1][2], b[1][3]     created / edited timestamp (usually µs since epoch)
/// b[1][4][5]           author: [name, photo, [profile url], _, _, review count]
/// b[1][6]              relative date text ("2 weeks ago")
/// b[1][21][6][8]       older editions: structured date
/// b[2][0][0]           rating
/// b[2][14][0]          language tag
/// b[2][15][0][0]       review text
/// b[2][21][k][8]       structured date [y, m, d, h]; k = 6 today, drifts
/// b[2][22]             attached photos
/// b[3][14][0][0]       owner response text
/// b[4][1]              like count
/// ```
pub mod fields {
    use super::PathSpec::{self, Index, SearchFirstN};

    pub const ID: &[PathSpec] = &[Index(&[0, 0]), Index(&[0])];

    pub const AUTHOR_NAME: &[PathSpec] = &[Index(&[0, 1, 4, 5, 0]), Index(&[0, 1, 4, 0, 4])];

    pub const AUTHOR_PROFILE_URL: &[PathSpec] =
        &[Index(&[0, 1, 4, 5, 2, 0]), Index(&[0, 1, 4, 2, 0])];

    pub const AUTHOR_REVIEW_COUNT: &[PathSpec] =
        &[Index(&[0, 1, 4, 5, 5]), Index(&[0, 1, 4, 15, 1])];

    pub const RATING: &[PathSpec] = &[Index(&[0, 2, 0, 0]), Index(&[0, 2, 0])];

    pub const TEXT: &[PathSpec] = &[Index(&[0, 2, 15, 0, 0]), Index(&[0, 2, 1, 0])];

    pub const LANGUAGE: &[PathSpec] = &[Index(&[0, 2, 14, 0])];

    pub const LIKE_COUNT: &[PathSpec] = &[Index(&[0, 4, 1]), Index(&[0, 1, 15, 0])];

    pub const PHOTOS: &[PathSpec] = &[Index(&[0, 2, 22])];

    pub const OWNER_RESPONSE: &[PathSpec] = &[Index(&[0, 3, 14, 0, 0]), Index(&[0, 3, 1])];

    /// Date tier 1.
    pub const DATE_PRIMARY: PathSpec = Index(&[0, 2, 21, 6, 8]);

    /// Date tier 2.
    pub const DATE_SIBLINGS: PathSpec = SearchFirstN {
        container: &[0, 2, 21],
        n: 4,
        tail: &[8],
    };

    /// Date tier 3.
    pub const DATE_SECONDARY: PathSpec = Index(&[0, 1, 21, 6, 8]);

    /// Date tier 4.
    pub const DATE_RELATIVE: &[PathSpec] = &[Index(&[0, 1, 6])];

    pub const DATE_TIMESTAMP: &[PathSpec] = &[Index(&[0, 1, 2]), Index(&[0, 1, 3])];
}
