//! 短码生成器
//!
//! 生成器只负责产出固定长度的随机字符串，不保证唯一性；
//! 唯一性由存储层拒绝重复来保证。

/// 短码字母表：`[a-zA-Z]`，共 52 个符号
pub const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// 可替换的短码生成策略
pub trait CodeGenerator: Send + Sync + 'static {
    /// 生成一个长度恰好为 [`CodeGenerator::length`] 的短码
    fn generate(&self) -> String;

    /// 生成的短码长度
    fn length(&self) -> usize;
}

/// 默认生成器：从 [`ALPHABET`] 中均匀随机取字符
#[derive(Debug, Clone)]
pub struct RandomCodeGenerator {
    length: usize,
}

impl RandomCodeGenerator {
    pub fn new(length: usize) -> Self {
        Self { length }
    }
}

impl Default for RandomCodeGenerator {
    fn default() -> Self {
        Self::new(5)
    }
}

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self) -> String {
        std::iter::repeat_with(|| ALPHABET[rand::random_range(0..ALPHABET.len())] as char)
            .take(self.length)
            .collect()
    }

    fn length(&self) -> usize {
        self.length
    }
}
