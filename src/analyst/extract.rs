use once_cell::sync::Lazy;
use regex::Regex;

// ```python / ```py / ```python3 with optional trailing info on the fence line
static SCRIPT_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)```[ \t]*(?:python3?|py)\b[^\n]*\n(.*?)```").expect("valid regex")
});

static ANY_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[^\n`]*\n(.*?)```").expect("valid regex"));

// Single-line fence such as ```print(1)```
static INLINE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(.*?)```").expect("valid regex"));

/// Pull a runnable script out of a model reply.
///
/// Preference order: a fence tagged as Python, then any fenced block, then the
/// whole reply. Never fails; malformed replies still yield something to run so
/// the resulting failure can be fed back.
pub fn extract_script(text: &str) -> String {
    for pattern in [&*SCRIPT_FENCE, &*ANY_FENCE, &*INLINE_FENCE] {
        if let Some(body) = pattern.captures(text).and_then(|caps| caps.get(1)) {
            return body.as_str().trim().to_string();
        }
    }
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_fence_is_extracted_and_trimmed() {
        let reply = "Here you go:\n```python\n\nimport json\nprint(json.dumps([1]))\n\n```\nDone.";
        assert_eq!(
            extract_script(reply),
            "import json\nprint(json.dumps([1]))"
        );
    }

    #[test]
    fn tagged_fence_wins_over_earlier_generic_fence() {
        let reply = "Input:\n```\na,b\n1,2\n```\nScript:\n```python\nprint('{}')\n```";
        assert_eq!(extract_script(reply), "print('{}')");
    }

    #[test]
    fn tag_match_is_case_insensitive() {
        let reply = "```Python3\nprint(2)\n```";
        assert_eq!(extract_script(reply), "print(2)");
        assert_eq!(extract_script("```py\nprint(3)\n```"), "print(3)");
    }

    #[test]
    fn generic_fence_drops_its_info_string() {
        let reply = "```bash\necho '{}'\n```";
        assert_eq!(extract_script(reply), "echo '{}'");
        assert_eq!(extract_script("```\nx = 1\n```"), "x = 1");
    }

    #[test]
    fn pythonic_prefix_in_other_tags_is_not_a_script_tag() {
        let reply = "```pyproject\nname = 'x'\n```\n```python\nprint(1)\n```";
        assert_eq!(extract_script(reply), "print(1)");
    }

    #[test]
    fn single_line_fence() {
        assert_eq!(extract_script("```print(1)```"), "print(1)");
    }

    #[test]
    fn unfenced_reply_is_returned_trimmed() {
        assert_eq!(
            extract_script("\n  import sys\nprint(1)  \n"),
            "import sys\nprint(1)"
        );
        assert_eq!(extract_script(""), "");
        assert_eq!(extract_script("   \n"), "");
    }

    #[test]
    fn unterminated_fence_falls_back_to_whole_text() {
        let reply = "```python\nprint(1)";
        assert_eq!(extract_script(reply), reply);
    }
}
