//! 私钥与代理列表文件
//!
//! 每行一条记录，读取时去除首尾空白并忽略空行

use anyhow::Context;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::edge::signer::SigningIdentity;

/// 文件不存在时创建空文件
pub fn ensure_file<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("创建目录失败: {}", parent.display()))?;
    }
    fs::write(path, "").with_context(|| format!("创建文件失败: {}", path.display()))?;
    tracing::info!("已创建空文件: {}", path.display());
    Ok(())
}

/// 读取非空行
pub fn read_lines<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<String>> {
    let path = path.as_ref();
    let content =
        fs::read_to_string(path).with_context(|| format!("读取文件失败: {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// 追加一行
pub fn append_line<P: AsRef<Path>>(path: P, line: &str) -> anyhow::Result<()> {
    let path = path.as_ref();
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("打开文件失败: {}", path.display()))?;

    // 上一次写入若没有换行，先补上
    let needs_newline = fs::read_to_string(path)
        .map(|content| !content.is_empty() && !content.ends_with('\n'))
        .unwrap_or(false);
    if needs_newline {
        writeln!(file)?;
    }
    writeln!(file, "{}", line)?;
    Ok(())
}

/// 把私钥从一个文件移到另一个文件
///
/// 源文件先写入临时文件再重命名替换，之后追加到目标文件
pub fn move_key<P: AsRef<Path>, Q: AsRef<Path>>(key: &str, from: P, to: Q) -> anyhow::Result<()> {
    let from = from.as_ref();
    let key = key.trim();

    let remaining: Vec<String> = read_lines(from)?
        .into_iter()
        .filter(|line| line != key)
        .collect();

    let mut tmp = from.as_os_str().to_owned();
    tmp.push(".tmp");
    let mut content = remaining.join("\n");
    if !content.is_empty() {
        content.push('\n');
    }
    fs::write(&tmp, content).with_context(|| format!("写入临时文件失败: {:?}", tmp))?;
    fs::rename(&tmp, from).with_context(|| format!("替换文件失败: {}", from.display()))?;

    append_line(to, key)
}

/// 生成新私钥并追加到文件，返回生成的私钥
pub fn generate_keys<P: AsRef<Path>>(path: P, count: usize) -> anyhow::Result<Vec<String>> {
    let path = path.as_ref();
    ensure_file(path)?;

    let mut keys = Vec::with_capacity(count);
    for _ in 0..count {
        let identity = SigningIdentity::generate();
        let key = identity.private_key_hex();
        append_line(path, &key)?;
        tracing::info!("新钱包: {}", identity.address());
        keys.push(key);
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_file_creates_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("keys.txt");

        ensure_file(&path).unwrap();
        assert!(read_lines(&path).unwrap().is_empty());

        fs::write(&path, "0xabc\n").unwrap();
        ensure_file(&path).unwrap();
        assert_eq!(read_lines(&path).unwrap(), vec!["0xabc"]);
    }

    #[test]
    fn test_read_lines_skips_blanks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proxies.txt");
        fs::write(&path, "  http://a:1  \n\n\r\nsocks5://b:2\n").unwrap();

        assert_eq!(read_lines(&path).unwrap(), vec!["http://a:1", "socks5://b:2"]);
    }

    #[test]
    fn test_append_line_after_missing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.txt");
        fs::write(&path, "first").unwrap();

        append_line(&path, "second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn test_move_key() {
        let dir = tempfile::tempdir().unwrap();
        let pending = dir.path().join("pending.txt");
        let active = dir.path().join("active.txt");
        fs::write(&pending, "0xaa\n0xbb\n0xcc\n").unwrap();
        fs::write(&active, "0x11\n").unwrap();

        move_key("0xbb", &pending, &active).unwrap();

        assert_eq!(read_lines(&pending).unwrap(), vec!["0xaa", "0xcc"]);
        assert_eq!(read_lines(&active).unwrap(), vec!["0x11", "0xbb"]);
        assert!(!dir.path().join("pending.txt.tmp").exists());
    }

    #[test]
    fn test_move_last_key_leaves_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let pending = dir.path().join("pending.txt");
        let active = dir.path().join("active.txt");
        fs::write(&pending, "0xaa\n").unwrap();

        move_key("0xaa", &pending, &active).unwrap();
        assert_eq!(fs::read_to_string(&pending).unwrap(), "");
        assert_eq!(read_lines(&active).unwrap(), vec!["0xaa"]);
    }

    #[test]
    fn test_generate_keys_are_loadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pending.txt");

        let keys = generate_keys(&path, 3).unwrap();
        assert_eq!(keys.len(), 3);
        assert_eq!(read_lines(&path).unwrap(), keys);
        for key in &keys {
            assert!(SigningIdentity::from_hex(key).is_ok());
        }
    }
}
