//! 随机填充数据：推特用户名、证明文本

use uuid::Uuid;

const FIRST: &[&str] = &[
    "alex", "maria", "john", "sofia", "liam", "emma", "noah", "olivia", "lucas", "mia",
    "ethan", "ava", "leo", "zoe", "ryan", "nina", "omar", "lena", "ivan", "chloe",
];

const LAST: &[&str] = &[
    "smith", "garcia", "miller", "davis", "lopez", "wilson", "moore", "taylor", "clark", "lewis",
    "walker", "young", "king", "wright", "scott", "green", "baker", "adams", "hill", "ward",
];

const WORDS: &[&str] = &[
    "network", "proof", "node", "light", "verify", "block", "chain", "secure", "bitcoin", "layer",
    "edge", "trust", "data", "state", "compute", "fast", "open", "future", "signal", "commit",
    "valid", "ledger", "stream", "honest", "simple", "global", "public", "shared", "modular", "scale",
];

/// 生成 4-15 位、仅含 `[A-Za-z0-9_]` 的用户名
pub fn twitter_username() -> String {
    let first = FIRST[fastrand::usize(..FIRST.len())];
    let last = LAST[fastrand::usize(..LAST.len())];
    let base = match fastrand::u8(..3) {
        0 => format!("{}{}", first, last),
        1 => format!("{}_{}", first, last),
        _ => format!("{}{}", first, fastrand::u16(..1000)),
    };
    let suffix = &Uuid::new_v4().simple().to_string()[..4];
    sanitize_username(&format!("{}{}", base, suffix))
}

/// 过滤非法字符并截断/补齐长度
pub fn sanitize_username(raw: &str) -> String {
    let mut name: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .take(15)
        .collect();
    while name.len() < 4 {
        name.push(char::from(b'0' + fastrand::u8(..10)));
    }
    name
}

/// 随机拼出一句指定单词数的英文句子
pub fn sentence(words: usize) -> String {
    let words = words.max(1);
    let mut text = (0..words)
        .map(|_| WORDS[fastrand::usize(..WORDS.len())])
        .collect::<Vec<_>>()
        .join(" ");
    if let Some(first) = text.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    text.push('.');
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_twitter_username_shape() {
        for _ in 0..100 {
            let name = twitter_username();
            assert!((4..=15).contains(&name.len()), "bad length: {}", name);
            assert!(name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
        }
    }

    #[test]
    fn test_sanitize_username() {
        assert_eq!(sanitize_username("a.b-c!d_e"), "abcd_e");
        assert_eq!(sanitize_username("abcdefghijklmnopqrstuvwxyz"), "abcdefghijklmno");
        let padded = sanitize_username("x!");
        assert_eq!(padded.len(), 4);
        assert!(padded.starts_with('x'));
    }

    #[test]
    fn test_sentence() {
        let s = sentence(8);
        assert_eq!(s.split_whitespace().count(), 8);
        assert!(s.ends_with('.'));
        assert!(s.chars().next().unwrap().is_ascii_uppercase());
    }
}
