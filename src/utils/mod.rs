pub mod generator;

pub use generator::{ALPHABET, CodeGenerator, RandomCodeGenerator};

/// 计算原始链接的 SHA-256 指纹（十六进制），用于数据库中的唯一约束
pub fn original_fingerprint(original: &str) -> String {
    use sha2::{Digest, Sha256};

    hex::encode(Sha256::digest(original.as_bytes()))
}
