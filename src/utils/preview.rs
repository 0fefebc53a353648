use std::fmt::{self, Write};

// ======================== 输出截断工具函数 ========================
/// 空白字符折叠 + 截断，用于日志与错误信息中的长文本预览
/// 逻辑：
/// 1. 连续空白折叠为单个空格（不修改原字符串，仅格式化输出）
/// 2. 超过最大长度时截断并追加 `...`
pub fn preview_compact<'a>(s: &'a str, max_len: usize) -> impl fmt::Display + 'a {
    struct CompactView<'a> {
        source: &'a str,
        max_length: usize,
    }

    impl<'a> fmt::Display for CompactView<'a> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let mut char_count = 0;
            let mut last_was_whitespace = false;

            for ch in self.source.trim().chars() {
                if ch.is_whitespace() && last_was_whitespace {
                    continue;
                }
                if char_count >= self.max_length {
                    return f.write_str("...");
                }

                if ch.is_whitespace() {
                    f.write_char(' ')?;
                    last_was_whitespace = true;
                } else {
                    f.write_char(ch)?;
                    last_was_whitespace = false;
                }
                char_count += 1;
            }
            Ok(())
        }
    }

    CompactView {
        source: s,
        max_length: max_len,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_collapses_whitespace() {
        let text = "rules:\n\n   - column_name: amount";
        assert_eq!(preview_compact(text, 100).to_string(), "rules: - column_name: amount");
    }

    #[test]
    fn test_preview_truncates() {
        assert_eq!(preview_compact("abcdefgh", 3).to_string(), "abc...");
        assert_eq!(preview_compact("abc", 3).to_string(), "abc");
        assert_eq!(preview_compact("  ", 3).to_string(), "");
    }
}
