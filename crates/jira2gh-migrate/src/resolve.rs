//! Cross-issue reference rewriting.
//!
//! Pure text transformation with no I/O, so it can be tested independently
//! of any network call.

use crate::mapping::IssueMapping;
use once_cell::sync::Lazy;
use regex::Regex;

/// Matches an issue reference: an optional scheme+host prefix (so bare keys
/// and browse URLs are both caught), the key itself, and any trailing
/// non-whitespace such as a query string or fragment. The host part is lazy
/// so the capture group always holds the full key rather than its tail.
static KEY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:https?://[a-zA-Z0-9./]+?)?([A-Z0-9]+-\d+)(?:\\?\S+)?")
        .expect("issue key pattern is valid")
});

/// Rewrite every resolvable issue reference in `text` to the target's
/// `#<number>` short form.
///
/// A matched key present in `mapping` replaces the entire matched span
/// (including any URL prefix and trailing non-whitespace); a key absent from
/// the mapping leaves the matched text untouched. Unresolved references are
/// expected during pass 1 and are corrected in pass 2, so a miss is never an
/// error. Text outside matches is preserved byte-for-byte, and the output is
/// stable under re-application with the same mapping.
pub fn rewrite(text: &str, mapping: &IssueMapping) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in KEY_PATTERN.captures_iter(text) {
        let (Some(whole), Some(key)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&text[last..whole.start()]);
        match mapping.lookup(key.as_str()) {
            Some(number) => {
                out.push('#');
                out.push_str(&number.to_string());
            }
            None => out.push_str(whole.as_str()),
        }
        last = whole.end();
    }
    out.push_str(&text[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(entries: &[(&str, u64)]) -> IssueMapping {
        entries.iter().map(|(k, n)| (k.to_string(), *n)).collect()
    }

    #[test]
    fn test_text_without_tokens_is_unchanged() {
        let m = mapping(&[("PROJ-1", 10)]);
        let text = "No references here, just prose with numbers like 42.";
        assert_eq!(rewrite(text, &m), text);
    }

    #[test]
    fn test_bare_key_and_browse_url_are_rewritten() {
        let m = mapping(&[("PROJ-1", 10), ("PROJ-2", 11)]);
        let text = "See PROJ-1 and https://old.example.com/browse/PROJ-2 for details";
        assert_eq!(rewrite(text, &m), "See #10 and #11 for details");
    }

    #[test]
    fn test_unmapped_key_is_left_alone() {
        let m = IssueMapping::new();
        let text = "Duplicate of PROJ-9";
        assert_eq!(rewrite(text, &m), text);
    }

    #[test]
    fn test_mixed_mapped_and_unmapped() {
        let m = mapping(&[("PROJ-1", 10)]);
        let text = "PROJ-1 blocks PROJ-2";
        assert_eq!(rewrite(text, &m), "#10 blocks PROJ-2");
    }

    #[test]
    fn test_surrounding_text_preserved_exactly() {
        let m = mapping(&[("ABC-7", 3)]);
        let text = "before\tABC-7\nafter  with  spacing";
        assert_eq!(rewrite(text, &m), "before\t#3\nafter  with  spacing");
    }

    #[test]
    fn test_trailing_non_whitespace_is_part_of_the_match() {
        let m = mapping(&[("PROJ-2", 11)]);
        let text = "link: https://jira.example.com/browse/PROJ-2?focusedId=1 end";
        assert_eq!(rewrite(text, &m), "link: #11 end");
    }

    #[test]
    fn test_idempotent_for_a_fixed_mapping() {
        let m = mapping(&[("PROJ-1", 10), ("PROJ-2", 11)]);
        let text = "PROJ-1 depends on https://jira.example.com/browse/PROJ-2 and PROJ-3";
        let once = rewrite(text, &m);
        assert_eq!(rewrite(&once, &m), once);
    }

    #[test]
    fn test_short_form_does_not_rematch() {
        let m = mapping(&[("PROJ-1", 10)]);
        assert_eq!(rewrite("#10", &m), "#10");
    }
}
