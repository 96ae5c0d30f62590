//! Track position classifier
//!
//! Turns one catalog position token into a (format, raw disk) guess. The
//! catalog encodes positions inconsistently ("A1", "CD2-3", "1-04",
//! "7\"1-A", "LP-B2", "DVD-1", "Video"), so the checks run as an ordered
//! rule table and the first rule that recognises a token wins. Reordering
//! the table changes results on ambiguous tokens.

use once_cell::sync::Lazy;
use regex::Regex;

pub const VINYL: &str = "Vinyl";
pub const CD: &str = "CD";
pub const DVD: &str = "DVD";
pub const BLU_RAY: &str = "BR";
pub const TAPE: &str = "Tape";

static VINYL_SIDE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]\d*$").expect("valid regex"));

/// Result of classifying one position token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Detected format; `None` means "use the release's base format"
    pub format: Option<&'static str>,
    /// Disk number as printed in the token, if one could be read
    pub disk: Option<i32>,
    /// Whether this position becomes an output file; video content does not
    pub emit: bool,
}

impl Classification {
    fn audio(format: &'static str, disk: Option<i32>) -> Self {
        Self {
            format: Some(format),
            disk,
            emit: true,
        }
    }

    fn excluded(format: Option<&'static str>, disk: Option<i32>) -> Self {
        Self {
            format,
            disk,
            emit: false,
        }
    }

    fn unknown() -> Self {
        Self {
            format: None,
            disk: None,
            emit: true,
        }
    }
}

type Rule = fn(&str) -> Option<Classification>;

/// Rules in priority order
const RULES: &[(&str, Rule)] = &[
    ("vinyl-side", vinyl_side),
    ("cd-prefix", cd_prefix),
    ("video", video),
    ("dashed", dashed),
];

/// Classify a position token; unmatched tokens are `Unknown`
pub fn classify(position: &str) -> Classification {
    RULES
        .iter()
        .find_map(|(_, rule)| rule(position))
        .unwrap_or_else(Classification::unknown)
}

/// Name of the rule that recognises a token (diagnostics)
pub fn matching_rule(position: &str) -> Option<&'static str> {
    RULES
        .iter()
        .find(|(_, rule)| rule(position).is_some())
        .map(|(name, _)| *name)
}

/// Disk bucket from a vinyl side letter: A/B is disk 1, C/D disk 2, ...
pub fn side_disk(token: &str) -> i32 {
    match token.chars().next() {
        Some('C') | Some('D') => 2,
        Some('E') | Some('F') => 3,
        Some('G') | Some('H') => 4,
        Some('I') | Some('J') => 5,
        _ => 1,
    }
}

/// Numeric parse that never fails: garbage reads as disk 0
fn lenient_disk(digits: &str) -> i32 {
    digits.parse().unwrap_or(0)
}

fn vinyl_side(position: &str) -> Option<Classification> {
    VINYL_SIDE
        .is_match(position)
        .then(|| Classification::audio(VINYL, Some(side_disk(position))))
}

fn cd_prefix(position: &str) -> Option<Classification> {
    let rest = position.strip_prefix("CD")?;
    if rest.is_empty() {
        return None;
    }
    let disk = rest.split('-').next().unwrap_or_default();
    Some(Classification::audio(CD, Some(lenient_disk(disk))))
}

fn video(position: &str) -> Option<Classification> {
    if let Some(rest) = position.strip_prefix("DVD") {
        let disk = rest.split('-').next().unwrap_or_default();
        return Some(Classification::excluded(Some(DVD), Some(lenient_disk(disk))));
    }
    if let Some(rest) = position.strip_prefix("BR") {
        if !rest.is_empty() {
            let disk = rest.split('-').next().unwrap_or_default();
            return Some(Classification::excluded(Some(BLU_RAY), Some(lenient_disk(disk))));
        }
        return Some(Classification::excluded(None, None));
    }
    if position.starts_with("BD") || position.starts_with("Video") {
        return Some(Classification::excluded(None, None));
    }
    None
}

fn dashed(position: &str) -> Option<Classification> {
    let mut segments = position.split('-');
    let left = segments.next()?;
    let next = segments.next()?;

    if left.starts_with(|c: char| c.is_ascii_digit()) && !left.contains('"') {
        return Some(Classification::audio(CD, Some(lenient_disk(left))));
    }

    if let Some(size) = left.strip_prefix("7\"").or_else(|| left.strip_prefix("5\"")) {
        let disk = (!size.is_empty()).then(|| lenient_disk(size));
        return Some(Classification::audio(VINYL, disk));
    }

    if left == "Vinyl" || left.starts_with("LP") || left.starts_with("4.72") {
        return Some(Classification::audio(VINYL, Some(side_disk(next))));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vinyl_sides_bucket_by_letter_pair() {
        assert_eq!(classify("A1"), Classification::audio(VINYL, Some(1)));
        assert_eq!(classify("B"), Classification::audio(VINYL, Some(1)));
        assert_eq!(classify("D12"), Classification::audio(VINYL, Some(2)));
        assert_eq!(classify("F3").disk, Some(3));
        assert_eq!(classify("H1").disk, Some(4));
        assert_eq!(classify("J2").disk, Some(5));
        assert_eq!(classify("K1").disk, Some(1));
    }

    #[test]
    fn test_cd_prefix_reads_disk() {
        assert_eq!(classify("CD2-5"), Classification::audio(CD, Some(2)));
        assert_eq!(classify("CD1"), Classification::audio(CD, Some(1)));
        assert_eq!(classify("CD-4"), Classification::audio(CD, Some(0)));
        assert_eq!(matching_rule("CD"), None);
    }

    #[test]
    fn test_video_positions_are_excluded() {
        let dvd = classify("DVD1-3");
        assert!(!dvd.emit);
        assert_eq!(dvd.format, Some(DVD));
        assert_eq!(dvd.disk, Some(1));

        assert!(!classify("BR2-1").emit);
        assert!(!classify("BD-1").emit);
        assert!(!classify("Video").emit);
        assert_eq!(classify("Video").format, None);
    }

    #[test]
    fn test_dashed_numeric_is_cd() {
        assert_eq!(classify("2-07"), Classification::audio(CD, Some(2)));
        // Leading digits with trailing junk still classify, disk reads as 0
        assert_eq!(classify("1a-3"), Classification::audio(CD, Some(0)));
    }

    #[test]
    fn test_dashed_vinyl_prefixes() {
        assert_eq!(classify("7\"2-A"), Classification::audio(VINYL, Some(2)));
        assert_eq!(classify("7\"-B"), Classification::audio(VINYL, None));
        assert_eq!(classify("5\"1-A"), Classification::audio(VINYL, Some(1)));
        assert_eq!(classify("LP-C1"), Classification::audio(VINYL, Some(2)));
        assert_eq!(classify("Vinyl-E2"), Classification::audio(VINYL, Some(3)));
        assert_eq!(classify("4.72\"-A1"), Classification::audio(VINYL, Some(1)));
    }

    #[test]
    fn test_unrecognised_tokens_are_unknown() {
        assert_eq!(classify("1"), Classification::unknown());
        assert_eq!(classify("1A"), Classification::unknown());
        assert_eq!(classify(""), Classification::unknown());
        assert_eq!(classify("Bonus-1"), Classification::unknown());
    }

    #[test]
    fn test_rule_precedence() {
        // Single capital letter beats every later rule
        assert_eq!(matching_rule("C"), Some("vinyl-side"));
        // CD prefix beats the dashed rule
        assert_eq!(matching_rule("CD1-2"), Some("cd-prefix"));
        // DVD beats dashed even though it has a dash
        assert_eq!(matching_rule("DVD-2"), Some("video"));
        assert_eq!(matching_rule("3-1"), Some("dashed"));
    }
}
