//! 钱包签名身份
//!
//! 封装 secp256k1 私钥，派生 EIP-55 校验和地址，
//! 并按 EIP-191 personal message 规则对文本签名

use anyhow::{anyhow, Context};
use k256::ecdsa::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use sha3::{Digest, Keccak256};
use std::fmt;

/// 钱包签名身份
///
/// 地址由私钥确定性派生，构造后不可变
#[derive(Clone)]
pub struct SigningIdentity {
    key: SigningKey,
    address: String,
}

impl SigningIdentity {
    /// 从 `0x` 前缀的 64 位十六进制私钥解析
    pub fn from_hex(private_key: &str) -> anyhow::Result<Self> {
        let trimmed = private_key.trim();
        let hex_part = trimmed
            .strip_prefix("0x")
            .filter(|h| h.len() == 64)
            .ok_or_else(|| anyhow!("私钥格式无效：需要 0x 前缀加 64 位十六进制字符"))?;

        let bytes = hex::decode(hex_part).context("私钥不是合法的十六进制")?;
        let key = SigningKey::from_slice(&bytes)
            .map_err(|e| anyhow!("私钥不是合法的 secp256k1 标量: {}", e))?;

        Ok(Self::from_signing_key(key))
    }

    /// 生成新的随机私钥
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::random(&mut OsRng))
    }

    fn from_signing_key(key: SigningKey) -> Self {
        let address = address_of(key.verifying_key());
        Self { key, address }
    }

    /// EIP-55 校验和地址
    pub fn address(&self) -> &str {
        &self.address
    }

    /// 私钥（`0x` + 64 位十六进制）
    pub fn private_key_hex(&self) -> String {
        format!("0x{}", hex::encode(self.key.to_bytes()))
    }

    /// 对文本做 personal message 签名
    ///
    /// 返回 `0x` + hex(r ‖ s ‖ v)，v 取 27/28
    pub fn sign_message(&self, message: &str) -> anyhow::Result<String> {
        let digest = personal_message_hash(message);
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(&digest)
            .map_err(|e| anyhow!("签名失败: {}", e))?;

        let mut bytes = Vec::with_capacity(65);
        bytes.extend_from_slice(&signature.to_bytes());
        bytes.push(recovery_id.to_byte() + 27);
        Ok(format!("0x{}", hex::encode(bytes)))
    }
}

impl fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// `keccak256("\x19Ethereum Signed Message:\n" + len + message)`
pub fn personal_message_hash(message: &str) -> [u8; 32] {
    let bytes = message.as_bytes();
    let prefix = format!("\x19Ethereum Signed Message:\n{}", bytes.len());
    let mut hasher = Keccak256::new();
    hasher.update(prefix.as_bytes());
    hasher.update(bytes);
    hasher.finalize().into()
}

fn address_of(key: &VerifyingKey) -> String {
    let encoded = key.to_encoded_point(false);
    // 去掉 0x04 前缀，取 keccak 后 20 字节
    let hash = Keccak256::digest(&encoded.as_bytes()[1..]);
    to_checksum_address(&hash[12..])
}

/// EIP-55 大小写校验和编码
pub fn to_checksum_address(bytes: &[u8]) -> String {
    let lower = hex::encode(bytes);
    let hash = Keccak256::digest(lower.as_bytes());

    let mut out = String::with_capacity(2 + lower.len());
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = if i % 2 == 0 {
            hash[i / 2] >> 4
        } else {
            hash[i / 2] & 0x0f
        };
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}
