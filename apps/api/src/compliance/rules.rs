//! Content rules checked on the generated source, independent of compilation.

use std::sync::OnceLock;

use regex::Regex;

/// Literal tokens that mean the generator left template filler behind.
pub const PLACEHOLDERS: &[&str] = &["lorem ipsum", "insert here", "[date]", "[company]", "[name]"];

/// List openers immediately followed by a closer. Group 1 names the opener
/// and group 2 the closer; a list is empty only when the two agree.
fn empty_list_patterns() -> &'static [Regex; 2] {
    static PATTERNS: OnceLock<[Regex; 2]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"\\begin\{(itemize|enumerate)\}(?:\[[^\]]*\])?\s*\\end\{(itemize|enumerate)\}")
                .expect("empty environment regex is valid"),
            Regex::new(r"\\resume(SubHeading|Item)ListStart\s*\\resume(SubHeading|Item)ListEnd")
                .expect("empty resume list regex is valid"),
        ]
    })
}

fn has_empty_list(source: &str) -> bool {
    empty_list_patterns()
        .iter()
        .any(|re| re.captures_iter(source).any(|c| c[1] == c[2]))
}

/// Lowercases and collapses every whitespace run to one space.
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Returns one warning per rule violation, in rule order.
///
/// The target-organization check is a plain substring match over the whole
/// source, header included, so it can fire on legitimate mentions.
pub fn check_content_rules(source: &str, target_company: Option<&str>) -> Vec<String> {
    let mut warnings = Vec::new();

    if let Some(company) = target_company.map(str::trim).filter(|c| !c.is_empty()) {
        if normalize(source).contains(&normalize(company)) {
            warnings.push(format!(
                "Target company '{company}' appears in the document. Verify it is not listed as a past employer."
            ));
        }
    }

    let lowered = source.to_lowercase();
    for placeholder in PLACEHOLDERS {
        if lowered.contains(placeholder) {
            warnings.push(format!("Placeholder found: '{placeholder}'"));
        }
    }

    if has_empty_list(source) {
        warnings.push("Found an empty experience/education list.".to_string());
    }

    warnings
}
