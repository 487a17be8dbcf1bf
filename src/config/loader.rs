use crate::config::config::AppConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};

/// 配置加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 从默认路径加载配置
    ///
    /// 合并顺序：
    /// 1. 开发环境默认值
    /// 2. ./aerograph.toml
    /// 3. 环境变量（`AEROGRAPH_` 前缀，`__` 分隔嵌套字段）
    pub fn load() -> Result<AppConfig, figment::Error> {
        Self::load_from(default_config_path())
    }

    /// 从指定路径加载配置
    pub fn load_from(path: impl AsRef<Path>) -> Result<AppConfig, figment::Error> {
        let mut config: AppConfig = Self::figment(path.as_ref()).extract()?;
        Self::apply_conventional_secrets(&mut config);
        Ok(config)
    }

    fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(AppConfig::development()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("AEROGRAPH_").split("__"))
    }

    /// 兼容常见的凭证环境变量
    fn apply_conventional_secrets(config: &mut AppConfig) {
        if config.llm.google_api_key.is_none() {
            config.llm.google_api_key = std::env::var("GOOGLE_API_KEY").ok();
        }
        if config.llm.huggingface_token.is_none() {
            config.llm.huggingface_token = std::env::var("HUGGINGFACEHUB_API_TOKEN").ok();
        }
    }

    /// 验证配置
    pub fn validate(config: &AppConfig) -> Result<(), ConfigValidationError> {
        if config.server.port == 0 {
            return Err(ConfigValidationError::InvalidPort);
        }

        if config.graph.url.is_empty() {
            return Err(ConfigValidationError::MissingGraphUrl);
        }

        if config.embedding.dimension == 0 {
            return Err(ConfigValidationError::InvalidDimension);
        }

        if config.vector.top_k == 0 {
            return Err(ConfigValidationError::InvalidTopK);
        }

        if config.routing.problem_delay_minutes <= 0.0 || config.routing.low_food_score <= 0.0 {
            return Err(ConfigValidationError::InvalidThreshold);
        }

        if !matches!(config.embedding.backend.as_str(), "hashing" | "ollama") {
            return Err(ConfigValidationError::UnknownBackend(
                config.embedding.backend.clone(),
            ));
        }

        if !matches!(config.vector.rewriter.as_str(), "keyword" | "llm") {
            return Err(ConfigValidationError::UnknownRewriter(
                config.vector.rewriter.clone(),
            ));
        }

        for corpus in &config.vector.comparison {
            if corpus.label.trim().is_empty() {
                return Err(ConfigValidationError::InvalidComparison(
                    "label cannot be empty".to_string(),
                ));
            }
            if corpus.dimension == 0 {
                return Err(ConfigValidationError::InvalidComparison(format!(
                    "{}: dimension must be positive",
                    corpus.label
                )));
            }
            if !matches!(corpus.backend.as_str(), "hashing" | "ollama") {
                return Err(ConfigValidationError::UnknownBackend(corpus.backend.clone()));
            }
        }

        Ok(())
    }
}

/// 配置验证错误
#[derive(thiserror::Error, Debug)]
pub enum ConfigValidationError {
    #[error("服务端口无效，必须大于 0")]
    InvalidPort,

    #[error("图数据库连接 URL 未配置")]
    MissingGraphUrl,

    #[error("向量维度无效，必须大于 0")]
    InvalidDimension,

    #[error("top_k 无效，必须大于 0")]
    InvalidTopK,

    #[error("路由阈值必须为正数")]
    InvalidThreshold,

    #[error("未知的 embedding 后端: {0}")]
    UnknownBackend(String),

    #[error("未知的查询改写方式: {0}")]
    UnknownRewriter(String),

    #[error("对比语料配置无效: {0}")]
    InvalidComparison(String),
}

/// 获取默认配置文件路径
pub fn default_config_path() -> PathBuf {
    PathBuf::from("aerograph.toml")
}

/// 检查配置文件是否存在
pub fn config_exists() -> bool {
    default_config_path().exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::config::ComparisonCorpus;
    use std::io::Write;

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = ConfigLoader::load_from("/nonexistent/aerograph.toml").unwrap();
        assert_eq!(config.app_name, "aerograph");
        assert_eq!(config.vector.top_k, 3);
    }

    #[test]
    fn test_load_from_toml_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[routing]\nproblem_delay_minutes = 20.0\n\n[vector]\ntop_k = 5"
        )
        .unwrap();

        let config = ConfigLoader::load_from(file.path()).unwrap();
        assert_eq!(config.routing.problem_delay_minutes, 20.0);
        assert_eq!(config.routing.low_food_score, 3.0);
        assert_eq!(config.vector.top_k, 5);
        assert_eq!(config.vector.rewriter, "keyword");
    }

    #[test]
    fn test_load_comparison_corpora() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"[[vector.comparison]]
label = "MiniLM"
corpus_path = "./data/mini.json"
backend = "ollama"
model_name = "all-minilm"
dimension = 384

[[vector.comparison]]
label = "MPNet"
corpus_path = "./data/mpnet.json"
backend = "ollama"
model_name = "mpnet"
dimension = 768"#
        )
        .unwrap();

        let config = ConfigLoader::load_from(file.path()).unwrap();
        assert_eq!(config.vector.comparison.len(), 2);
        assert!(ConfigLoader::validate(&config).is_ok());

        let mpnet = config.vector.comparison[1].embedding(&config.embedding);
        assert_eq!(mpnet.model_name, "mpnet");
        assert_eq!(mpnet.dimension, 768);
        assert_eq!(mpnet.ollama_url, config.embedding.ollama_url);
    }

    #[test]
    fn test_validate() {
        let config = AppConfig::development();
        assert!(ConfigLoader::validate(&config).is_ok());

        let mut bad = AppConfig::development();
        bad.vector.top_k = 0;
        assert!(matches!(
            ConfigLoader::validate(&bad),
            Err(ConfigValidationError::InvalidTopK)
        ));

        let mut bad = AppConfig::development();
        bad.embedding.backend = "candle".into();
        assert!(matches!(
            ConfigLoader::validate(&bad),
            Err(ConfigValidationError::UnknownBackend(_))
        ));

        let mut bad = AppConfig::development();
        bad.vector.comparison.push(ComparisonCorpus {
            label: "MiniLM".into(),
            corpus_path: "./data/mini.json".into(),
            backend: "hashing".into(),
            model_name: "hashing".into(),
            dimension: 0,
        });
        assert!(matches!(
            ConfigLoader::validate(&bad),
            Err(ConfigValidationError::InvalidComparison(_))
        ));
    }
}
