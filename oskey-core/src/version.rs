//! Firmware version comparison
//!
//! Versions are dot separated numeric components compared one by one.
//! Missing components count as 0 and non-numeric components parse as 0, so
//! `"1.0"` equals `"1.0.0"` and `"0.10.0"` is newer than `"0.9.9"`.

use std::cmp::Ordering;

fn parse(version: &str) -> Vec<u64> {
    version
        .split('.')
        .map(|part| {
            let digits: &str = part
                .trim()
                .split(|c: char| !c.is_ascii_digit())
                .next()
                .unwrap_or("");
            digits.parse().unwrap_or(0)
        })
        .collect()
}

/// Compare two version strings component-wise
///
/// # Examples
///
/// ```
/// use std::cmp::Ordering;
/// use oskey_core::version::compare_versions;
///
/// assert_eq!(compare_versions("0.4.0", "0.4.0"), Ordering::Equal);
/// assert_eq!(compare_versions("0.3.9", "0.4.0"), Ordering::Less);
/// assert_eq!(compare_versions("1.0", "0.9.9"), Ordering::Greater);
/// ```
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let a = parse(a);
    let b = parse(b);
    let len = a.len().max(b.len());

    (0..len)
        .map(|i| {
            let x = a.get(i).copied().unwrap_or(0);
            let y = b.get(i).copied().unwrap_or(0);
            x.cmp(&y)
        })
        .find(|ord| *ord != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

/// `true` when `current` is at least `minimum`
pub fn is_version_compatible(current: &str, minimum: &str) -> bool {
    compare_versions(current, minimum) != Ordering::Less
}

/// User-facing message shown when the firmware is too old
pub fn upgrade_message(current: &str, minimum: &str) -> String {
    format!(
        "Current firmware version {current} is too low, please upgrade to {minimum} or higher."
    )
}
