use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShortenerError {
    /// 同一 owner 已经缩短过该链接，携带已存在的短码
    AlreadyExists { alias: String, original: String },
    /// 短码存在过，但已被软删除
    UrlDeleted { alias: String, original: String },
    NotFound(String),
    NoRecordsForOwner(String),
    /// 生成的短码与另一条记录冲突
    AliasConflict(String),
    DatabaseConfig(String),
    DatabaseConnection(String),
    DatabaseOperation(String),
    FileOperation(String),
    Serialization(String),
    Validation(String),
    Config(String),
}

impl ShortenerError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            ShortenerError::AlreadyExists { .. } => "E001",
            ShortenerError::UrlDeleted { .. } => "E002",
            ShortenerError::NotFound(_) => "E003",
            ShortenerError::NoRecordsForOwner(_) => "E004",
            ShortenerError::AliasConflict(_) => "E005",
            ShortenerError::DatabaseConfig(_) => "E006",
            ShortenerError::DatabaseConnection(_) => "E007",
            ShortenerError::DatabaseOperation(_) => "E008",
            ShortenerError::FileOperation(_) => "E009",
            ShortenerError::Serialization(_) => "E010",
            ShortenerError::Validation(_) => "E011",
            ShortenerError::Config(_) => "E012",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            ShortenerError::AlreadyExists { .. } => "Already Exists",
            ShortenerError::UrlDeleted { .. } => "URL Deleted",
            ShortenerError::NotFound(_) => "Resource Not Found",
            ShortenerError::NoRecordsForOwner(_) => "No Records For Owner",
            ShortenerError::AliasConflict(_) => "Alias Conflict",
            ShortenerError::DatabaseConfig(_) => "Database Configuration Error",
            ShortenerError::DatabaseConnection(_) => "Database Connection Error",
            ShortenerError::DatabaseOperation(_) => "Database Operation Error",
            ShortenerError::FileOperation(_) => "File Operation Error",
            ShortenerError::Serialization(_) => "Serialization Error",
            ShortenerError::Validation(_) => "Validation Error",
            ShortenerError::Config(_) => "Configuration Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> String {
        match self {
            ShortenerError::AlreadyExists { alias, original } => {
                format!("'{}' has already been shortened as '{}'", original, alias)
            }
            ShortenerError::UrlDeleted { alias, .. } => {
                format!("short url '{}' has been deleted", alias)
            }
            ShortenerError::NotFound(msg)
            | ShortenerError::NoRecordsForOwner(msg)
            | ShortenerError::AliasConflict(msg)
            | ShortenerError::DatabaseConfig(msg)
            | ShortenerError::DatabaseConnection(msg)
            | ShortenerError::DatabaseOperation(msg)
            | ShortenerError::FileOperation(msg)
            | ShortenerError::Serialization(msg)
            | ShortenerError::Validation(msg)
            | ShortenerError::Config(msg) => msg.clone(),
        }
    }

    /// 是否为"信息性"错误（调用方可从中取回数据，不应作为系统故障记录）
    pub fn is_informational(&self) -> bool {
        matches!(
            self,
            ShortenerError::AlreadyExists { .. }
                | ShortenerError::UrlDeleted { .. }
                | ShortenerError::NotFound(_)
                | ShortenerError::NoRecordsForOwner(_)
        )
    }

    /// AlreadyExists 时取回已存在的短码
    pub fn existing_alias(&self) -> Option<&str> {
        match self {
            ShortenerError::AlreadyExists { alias, .. } => Some(alias),
            _ => None,
        }
    }

    /// 格式化为彩色输出（用于启动失败时输出到终端）
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.message().white()
        )
    }

    /// 格式化为简洁输出
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for ShortenerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for ShortenerError {}

// 便捷的构造函数
impl ShortenerError {
    pub fn already_exists<A: Into<String>, O: Into<String>>(alias: A, original: O) -> Self {
        ShortenerError::AlreadyExists {
            alias: alias.into(),
            original: original.into(),
        }
    }

    pub fn url_deleted<A: Into<String>, O: Into<String>>(alias: A, original: O) -> Self {
        ShortenerError::UrlDeleted {
            alias: alias.into(),
            original: original.into(),
        }
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        ShortenerError::NotFound(msg.into())
    }

    pub fn no_records_for_owner<T: Into<String>>(msg: T) -> Self {
        ShortenerError::NoRecordsForOwner(msg.into())
    }

    pub fn alias_conflict<T: Into<String>>(msg: T) -> Self {
        ShortenerError::AliasConflict(msg.into())
    }

    pub fn database_config<T: Into<String>>(msg: T) -> Self {
        ShortenerError::DatabaseConfig(msg.into())
    }

    pub fn database_connection<T: Into<String>>(msg: T) -> Self {
        ShortenerError::DatabaseConnection(msg.into())
    }

    pub fn database_operation<T: Into<String>>(msg: T) -> Self {
        ShortenerError::DatabaseOperation(msg.into())
    }

    pub fn file_operation<T: Into<String>>(msg: T) -> Self {
        ShortenerError::FileOperation(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        ShortenerError::Serialization(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        ShortenerError::Validation(msg.into())
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        ShortenerError::Config(msg.into())
    }
}

// 为常见的错误类型实现 From trait
impl From<sea_orm::DbErr> for ShortenerError {
    fn from(err: sea_orm::DbErr) -> Self {
        ShortenerError::DatabaseOperation(err.to_string())
    }
}

impl From<std::io::Error> for ShortenerError {
    fn from(err: std::io::Error) -> Self {
        ShortenerError::FileOperation(err.to_string())
    }
}

impl From<serde_json::Error> for ShortenerError {
    fn from(err: serde_json::Error) -> Self {
        ShortenerError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ShortenerError>;
