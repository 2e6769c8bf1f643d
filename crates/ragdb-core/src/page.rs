//! Page-number recovery from page markers left in converted text.
//!
//! Document conversion writes a heading such as `# 第 12 页` or `# Page 12`
//! at each page break. An explicit page field always wins over this parser;
//! see [`resolve_page`].

use regex::Regex;
use std::sync::OnceLock;

fn page_marker() -> Option<&'static Regex> {
    static MARKER: OnceLock<Option<Regex>> = OnceLock::new();
    MARKER
        .get_or_init(|| Regex::new(r"(?i)#\s*(?:第\s*(\d+)\s*页|page\s+(\d+))").ok())
        .as_ref()
}

/// First page marker found in `text`, if any.
pub fn infer_page(text: &str) -> Option<u32> {
    let caps = page_marker()?.captures(text)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .and_then(|m| m.as_str().parse().ok())
}

/// Explicit page when present, otherwise the inferred one.
pub fn resolve_page(explicit: Option<u32>, text: &str) -> Option<u32> {
    explicit.or_else(|| infer_page(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cjk_marker() {
        assert_eq!(infer_page("# 第 12 页\n正文"), Some(12));
        assert_eq!(infer_page("前言 #第3页"), Some(3));
    }

    #[test]
    fn latin_marker() {
        assert_eq!(infer_page("intro\n# Page 7\nbody"), Some(7));
        assert_eq!(infer_page("## page 40"), Some(40));
    }

    #[test]
    fn first_marker_wins() {
        assert_eq!(infer_page("# 第 2 页 ... # 第 3 页"), Some(2));
    }

    #[test]
    fn no_marker() {
        assert_eq!(infer_page("page 4 without a heading"), None);
        assert_eq!(infer_page(""), None);
    }

    #[test]
    fn explicit_field_takes_precedence() {
        assert_eq!(resolve_page(Some(9), "# 第 2 页"), Some(9));
        assert_eq!(resolve_page(None, "# 第 2 页"), Some(2));
    }
}
