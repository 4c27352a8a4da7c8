//! Module-group heading normalization
//!
//! Catalog editors phrase the same grouping instruction in many ways
//! ("Select any two of the following modules:", "Choose 2 modules from the
//! list below"). The ordered rewrites below fold them into one vocabulary. Later
//! rules rely on earlier ones having already fixed spacing and number words, so
//! the order of [`RULES`] is significant.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Upper bound on rewrite passes before giving up on reaching a fixed point
const MAX_PASSES: usize = 4;

enum Replacement {
    /// Literal text with `${n}` capture expansion
    Text(&'static str),
    /// "Group X." with the captured letter upper-cased
    GroupLetter,
}

struct Rule {
    pattern: Regex,
    replacement: Replacement,
}

fn rule(pattern: &str, replacement: &'static str) -> Rule {
    Rule {
        pattern: Regex::new(pattern).expect("heading rule must compile"),
        replacement: Replacement::Text(replacement),
    }
}

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        rule(
            r"(?i)\b(?:compulsory|compulsary|compulsry|compulsoy|compolsory|complusory|compusory|compuslory)\b",
            "Compulsory",
        ),
        rule(r"(?i)\bone\b", "1"),
        rule(r"(?i)\btwo\b", "2"),
        rule(r"(?i)\bthree\b", "3"),
        rule(r"(?i)\bfour\b", "4"),
        rule(r"(?i)\bfive\b", "5"),
        rule(r"(?i)\bsix\b", "6"),
        rule(r"(?i)\bseven\b", "7"),
        rule(r"(?i)\beight\b", "8"),
        rule(r"(?i)\bnine\b", "9"),
        rule(r"(?i)\bselect\b", "Choose"),
        rule(r"^\.+$", "Compulsory"),
        rule(r"\s*[.:;]$", ""),
        Rule {
            pattern: Regex::new(r"(?i)\bgroup\s+([a-z])\b[.:]?").expect("group letter regex"),
            replacement: Replacement::GroupLetter,
        },
        rule(r"(?i)\bfrom\s+the\s+list\s+below\b", "from the following"),
        rule(r"\(\s+", "("),
        rule(r"\s+\)", ")"),
        rule(r"(?i)\bthe\s+following\s+module$", "the following modules"),
        rule(r"(?i)\bchoose\s+any\b", "Choose"),
        rule(
            r"(?i)\bchoose\s+(\d+)\s+(?:modules?\s+)?(?:of|from)\s+the\s+following(?:\s+(?:modules?|groups\s+of\s+modules|subjects))?\b",
            "Choose ${1} from the following",
        ),
        rule(
            r"(?i)\b(group\s+[a-z]\.)\s*compulsory[\s:.,-]*choose\s+all\s+(?:the\s+)?modules\s+(?:from|under|in)\s+this\s+group\b",
            "${1} Compulsory",
        ),
        rule(r"(?i)\bcompulsory\s+modules$", "Compulsory"),
        rule(
            r"(?i)\bcompulsory\s+modules\s+to\s+major\s+in\s+(.+)$",
            "Compulsory for ${1} major",
        ),
        rule(r"(?i)\bchoose?e?d\b", "chosen"),
        rule(r"\.{2,}", "."),
        rule(r"^([A-Z])\.(\s|$)", "Group ${1}.${2}"),
        rule(r"^([A-Z])$", "Group ${1}."),
    ]
});

/// Canonicalizes a free-text module-group heading
///
/// The rewrite pass is repeated until the text stops changing, so the result is
/// a fixed point: `normalize_heading(&normalize_heading(x)) == normalize_heading(x)`.
///
/// # Examples
///
/// ```
/// use catalog_harvest::crawler::normalize_heading;
///
/// assert_eq!(
///     normalize_heading("Select any two modules from the list below:"),
///     "Choose 2 from the following"
/// );
/// assert_eq!(normalize_heading("compulsary modules."), "Compulsory");
/// ```
pub fn normalize_heading(text: &str) -> String {
    let mut current = rewrite_once(text);
    for _ in 1..MAX_PASSES {
        let next = rewrite_once(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn rewrite_once(text: &str) -> String {
    let mut heading = WHITESPACE.replace_all(text.trim(), " ").into_owned();

    for rule in RULES.iter() {
        let rewritten = match &rule.replacement {
            Replacement::Text(replacement) => rule.pattern.replace_all(&heading, *replacement),
            Replacement::GroupLetter => rule.pattern.replace_all(&heading, |caps: &Captures| {
                format!("Group {}.", caps[1].to_uppercase())
            }),
        }
        .trim()
        .to_string();
        heading = rewritten;
    }

    heading
}
