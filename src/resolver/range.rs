use node_semver::{Range, Version};
use regex::Regex;
use std::sync::LazyLock;

/// A comparator (possibly empty) followed by a version-like token, e.g. `>=8.0.0`, `^7.x`, `v1`.
static COMPARATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?P<op><=|>=|~>|[<>=^~])?\s*(?P<ver>v?(?:\d+|[xX*])(?:\.(?:\d+|[xX*])){0,2}(?:-[0-9A-Za-z.-]+)?(?:\+[0-9A-Za-z.-]+)?)",
    )
    .expect("comparator pattern is valid")
});

/// Where a version token sits in its alternative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    /// Stands alone, bounded only by its own operator.
    Plain,
    /// Left side of `a - b`.
    HyphenLower,
    /// Right side of `a - b`.
    HyphenUpper,
}

/// One comparator of a `||` alternative.
struct Token<'t> {
    op: &'t str,
    ver: regex::Match<'t>,
    position: Position,
}

impl Token<'_> {
    fn is_upper_bound(&self) -> bool {
        self.position == Position::HyphenUpper || matches!(self.op, "<" | "<=")
    }

    /// The token as a standalone comparator. Each hyphen side is checked on its own.
    fn comparator(&self) -> Option<String> {
        let ver = self.ver.as_str().trim_start_matches('v');
        match self.position {
            Position::Plain => Some(format!("{}{}", self.op, ver)),
            Position::HyphenLower => floor(ver).map(|v| format!(">={v}")),
            Position::HyphenUpper => Some(format!("0.0.0 - {ver}")),
        }
    }
}

fn tokens(alternative: &str) -> Vec<Token<'_>> {
    let matches: Vec<_> = COMPARATOR
        .captures_iter(alternative)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let ver = caps.name("ver")?;
            let op = caps.name("op").map(|m| m.as_str()).unwrap_or("");
            Some((whole, ver, op))
        })
        .collect();

    let dash_between = |left: usize, right: usize| {
        alternative[matches[left].0.end()..matches[right].0.start()].trim() == "-"
    };

    (0..matches.len())
        .map(|i| {
            let (_, ver, op) = matches[i];
            let position = if i > 0 && dash_between(i - 1, i) {
                Position::HyphenUpper
            } else if i + 1 < matches.len() && dash_between(i, i + 1) {
                Position::HyphenLower
            } else {
                Position::Plain
            };
            Token { op, ver, position }
        })
        .collect()
}

/// Lowest full version a partial or wildcard token stands for, e.g. `8.9.x` is 8.9.0.
fn floor(ver: &str) -> Option<String> {
    let mut kept: Vec<&str> = ver
        .split('.')
        .take_while(|c| !matches!(*c, "x" | "X" | "*"))
        .collect();
    if kept.is_empty() {
        return None;
    }
    while kept.len() < 3 {
        kept.push("0");
    }
    Some(kept.join("."))
}

/// Whether every comparator of one alternative admits `version` on its own.
///
/// Checked comparator by comparator: a contradictory pair such as
/// `>=9.4.6 <9` must not count as admitting anything. A pre-release is
/// compared by its release numbers unless the comparator names a pre-release
/// too, so `<2` still admits `1.1.0-rc.1`.
fn admits(alternative: &str, version: &Version) -> bool {
    let release = parse_version(&format!(
        "{}.{}.{}",
        version.major, version.minor, version.patch
    ));

    tokens(alternative).iter().all(|token| {
        let Some(comparator) = token.comparator() else {
            return true;
        };
        let subject = match &release {
            Some(release) if !token.ver.as_str().contains('-') => release,
            _ => version,
        };
        Range::parse(&comparator).is_ok_and(|range| range.satisfies(subject))
    })
}

/// Parses `candidate` as a version, tolerating a leading `v` or `=`.
pub fn parse_version(candidate: &str) -> Option<Version> {
    let trimmed = candidate.trim().trim_start_matches(['=', 'v']);
    Version::parse(trimmed).ok()
}

/// The version a single-comparator specifier pins its floor to.
///
/// `^8.9.4`, `~8.9.4`, `>=8.9.4`, `=8.9.4` and `8.9.4` all normalize to 8.9.4.
/// Compound and partial specifiers normalize to nothing.
pub fn normalize(specifier: &str) -> Option<Version> {
    let trimmed = specifier.trim();
    let stripped = ["~>", ">=", "^", "~", "="]
        .iter()
        .find_map(|op| trimmed.strip_prefix(op))
        .unwrap_or(trimmed)
        .trim_start();
    if stripped.contains(char::is_whitespace) {
        return None;
    }
    parse_version(stripped)
}

/// Rewrites the version tokens of `original` to `candidate`, keeping its comparators.
///
/// Returns `None` when no confident rewrite exists: the specifier is empty,
/// is not a valid range, has no version token that bounds it from below, or
/// the rewritten range would no longer admit `candidate`.
pub fn preserve_range(original: &str, candidate: &str) -> Option<String> {
    let trimmed = original.trim();
    if trimmed.is_empty() || Range::parse(trimmed).is_err() {
        return None;
    }
    let version = parse_version(candidate)?;
    let candidate = candidate.trim().trim_start_matches(['=', 'v']);

    let alternatives: Vec<&str> = original.split("||").collect();
    let index = alternatives
        .iter()
        .rposition(|alt| admits(alt, &version))
        .unwrap_or(alternatives.len() - 1);

    let rewritten = rewrite_alternative(alternatives[index], candidate)?;
    if !admits(&rewritten, &version) {
        return None;
    }

    let mut parts: Vec<String> = alternatives.iter().map(|alt| alt.to_string()).collect();
    parts[index] = rewritten;
    let result = parts.join("||");

    Range::parse(result.trim()).ok().map(|_| result)
}

/// Replaces every lower-bound token of one `||` alternative.
fn rewrite_alternative(alternative: &str, candidate: &str) -> Option<String> {
    let mut out = String::with_capacity(alternative.len() + candidate.len());
    let mut last = 0;
    let mut replaced = false;

    for token in tokens(alternative) {
        if token.is_upper_bound() {
            continue;
        }
        let Some(substituted) = substitute(token.ver.as_str(), candidate) else {
            continue;
        };

        out.push_str(&alternative[last..token.ver.start()]);
        out.push_str(&substituted);
        last = token.ver.end();
        replaced = true;
    }

    if !replaced {
        return None;
    }
    out.push_str(&alternative[last..]);
    Some(out)
}

/// Candidate text for one version token, keeping `v` prefixes and wildcard precision.
fn substitute(token: &str, candidate: &str) -> Option<String> {
    let (prefix, body) = match token.strip_prefix('v') {
        Some(rest) => ("v", rest),
        None => ("", token),
    };

    let core = body.split(['-', '+']).next().unwrap_or(body);
    let components: Vec<&str> = core.split('.').collect();
    let is_wildcard = |c: &&str| matches!(*c, "x" | "X" | "*");

    if components.first().is_none_or(is_wildcard) {
        return None;
    }

    if !components.iter().any(is_wildcard) {
        return Some(format!("{prefix}{candidate}"));
    }

    let candidate_core = candidate.split(['-', '+']).next().unwrap_or(candidate);
    let mut numbers = candidate_core.split('.');
    let rewritten: Vec<&str> = components
        .iter()
        .map(|component| {
            let number = numbers.next().unwrap_or("0");
            if is_wildcard(component) {
                *component
            } else {
                number
            }
        })
        .collect();

    Some(format!("{prefix}{}", rewritten.join(".")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewrite(original: &str, candidate: &str) -> String {
        preserve_range(original, candidate).unwrap_or_default()
    }

    #[test]
    fn keeps_single_comparators() {
        assert_eq!(rewrite("^8.0.0", "8.9.4"), "^8.9.4");
        assert_eq!(rewrite("~8.0.0", "8.0.7"), "~8.0.7");
        assert_eq!(rewrite(">=8.0.0", "9.4.6"), ">=9.4.6");
        assert_eq!(rewrite("=8.0.0", "9.4.6"), "=9.4.6");
        assert_eq!(rewrite("8.0.0", "9.4.6"), "9.4.6");
        assert_eq!(rewrite("^8.0.0", "v9.4.6"), "^9.4.6");
    }

    #[test]
    fn partial_versions_take_the_full_candidate() {
        assert_eq!(rewrite("^8", "9.4.6"), "^9.4.6");
        assert_eq!(rewrite("~1.2", "1.2.9"), "~1.2.9");
        assert_eq!(rewrite("7", "9.4.6"), "9.4.6");
    }

    #[test]
    fn wildcards_keep_their_precision() {
        assert_eq!(rewrite("8.x", "9.4.6"), "9.x");
        assert_eq!(rewrite("8.1.x", "8.9.4"), "8.9.x");
        assert_eq!(rewrite("^7.x", "9.4.6"), "^9.x");
    }

    #[test]
    fn pre_release_tokens_are_replaced_whole() {
        assert_eq!(rewrite("^1.0.0-beta.1", "1.0.0"), "^1.0.0");
        assert_eq!(rewrite("^1.0.0", "1.1.0-rc.1"), "^1.1.0-rc.1");
    }

    #[test]
    fn compound_ranges_move_only_the_lower_bound() {
        assert_eq!(rewrite(">=7 <9", "8.9.4"), ">=8.9.4 <9");
        assert_eq!(rewrite(">=7.0.0 <=8.9.4", "8.9.4"), ">=8.9.4 <=8.9.4");
    }

    #[test]
    fn compound_range_that_would_exclude_candidate_is_ambiguous() {
        assert_eq!(rewrite(">=7 <9", "9.4.6"), "");
        assert_eq!(rewrite("<9", "8.9.4"), "");
        assert_eq!(rewrite(">8.0.0", "8.9.4"), "");
        assert_eq!(rewrite(">=1 <2", "2.0.1"), "");
        assert_eq!(preserve_range(">=7.0.0 <8.0.0", "9.4.6"), None);
    }

    #[test]
    fn contradictory_pairs_admit_nothing() {
        let version = parse_version("9.4.6").unwrap();
        assert!(!admits(">=9.4.6 <9", &version));
        assert!(!admits("9.4.6 - 8", &version));
        assert!(admits(">=9.4.6 <10", &version));
        assert!(admits("8.9.x - 9", &version));

        let rc = parse_version("1.1.0-rc.1").unwrap();
        assert!(admits(">=1.1.0-rc.1 <2", &rc));
    }

    #[test]
    fn hyphen_ranges_keep_their_upper_end() {
        assert_eq!(rewrite("7 - 9", "9.4.6"), "9.4.6 - 9");
        assert_eq!(rewrite("7.2.x - 9", "8.9.4"), "8.9.x - 9");
        assert_eq!(rewrite("7 - 8", "9.4.6"), "");
        assert_eq!(rewrite("7.2.1 - 8", "9.4.6"), "");
    }

    #[test]
    fn unions_rewrite_the_alternative_holding_the_candidate() {
        assert_eq!(rewrite("^1.0.0 || ^2.0.0", "2.3.0"), "^1.0.0 || ^2.3.0");
        assert_eq!(rewrite("^1.0.0 || ^2.0.0", "1.4.0"), "^1.4.0 || ^2.0.0");
        assert_eq!(rewrite("^1.0.0 || ^2.0.0", "3.0.0"), "^1.0.0 || ^3.0.0");
    }

    #[test]
    fn unsubstitutable_shapes_are_ambiguous() {
        assert_eq!(preserve_range("", "9.4.6"), None);
        assert_eq!(preserve_range("   ", "9.4.6"), None);
        assert_eq!(preserve_range("*", "9.4.6"), None);
        assert_eq!(preserve_range("x", "9.4.6"), None);
        assert_eq!(preserve_range("latest", "9.4.6"), None);
        assert_eq!(preserve_range("github:user/repo", "9.4.6"), None);
        assert_eq!(preserve_range("^8.0.0", "not-a-version"), None);
    }

    #[test]
    fn normalizes_single_comparator_specifiers() {
        let expected = parse_version("8.9.4");
        assert_eq!(normalize("^8.9.4"), expected);
        assert_eq!(normalize("~8.9.4"), expected);
        assert_eq!(normalize(">=8.9.4"), expected);
        assert_eq!(normalize("8.9.4"), expected);
        assert_eq!(normalize("v8.9.4"), expected);
        assert_eq!(normalize(">=8.9.4 <9"), None);
        assert_eq!(normalize("<8.9.4"), None);
    }
}
