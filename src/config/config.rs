use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// "问题航班" 平均延误阈值（分钟）
pub const PROBLEM_DELAY_THRESHOLD_MINUTES: f64 = 15.0;

/// 餐食满意度低分阈值（平均分低于该值视为差评航班）
pub const LOW_FOOD_SCORE_THRESHOLD: f64 = 3.0;

/// 向量检索默认返回条数
pub const DEFAULT_TOP_K: usize = 3;

/// 图数据库配置（Neo4j HTTP 接口）
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GraphConfig {
    /// Neo4j HTTP 地址
    pub url: String,
    /// 数据库名称
    pub database: String,
    /// 用户名
    pub username: String,
    /// 密码
    pub password: String,
    /// 请求超时（秒）
    pub request_timeout: u64,
}

/// 向量检索配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct VectorConfig {
    /// 片段语料文件路径（JSON）
    pub corpus_path: PathBuf,
    /// 检索返回条数
    pub top_k: usize,
    /// 查询改写方式: "keyword" 或 "llm"
    pub rewriter: String,
    /// 嵌入模型对比所用的额外语料，每条由各自的嵌入模型构建
    pub comparison: Vec<ComparisonCorpus>,
}

/// 对比语料
///
/// Ollama 地址与超时沿用 `[embedding]` 段的设置。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonCorpus {
    /// 结果中显示的名称
    pub label: String,
    pub corpus_path: PathBuf,
    pub backend: String,
    pub model_name: String,
    pub dimension: usize,
}

impl ComparisonCorpus {
    /// 该语料对应的嵌入模型配置
    pub fn embedding(&self, base: &EmbeddingConfig) -> EmbeddingConfig {
        EmbeddingConfig {
            backend: self.backend.clone(),
            model_name: self.model_name.clone(),
            dimension: self.dimension,
            ..base.clone()
        }
    }
}

/// 嵌入模型配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding 后端类型: "hashing" 或 "ollama"
    pub backend: String,
    /// 模型名称
    pub model_name: String,
    /// 向量维度
    pub dimension: usize,
    /// Ollama 服务器地址
    pub ollama_url: String,
    /// Ollama 请求超时（秒）
    pub ollama_timeout: u64,
}

/// 语言模型配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LlmConfig {
    /// 默认答案生成模型
    pub default_model: String,
    /// 意图分类 / 实体抽取 / 查询改写使用的模型
    pub nlu_model: String,
    /// Google API Key
    pub google_api_key: Option<String>,
    /// Gemini 模型名称
    pub gemini_model: String,
    /// Gemini API 地址
    pub gemini_base_url: String,
    /// Hugging Face 访问令牌
    pub huggingface_token: Option<String>,
    /// Hugging Face 推理地址
    pub huggingface_base_url: String,
    /// 最大生成 token 数
    pub max_new_tokens: u32,
    /// 请求超时（秒）
    pub request_timeout: u64,
}

/// 路由阈值配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// 问题航班平均延误阈值（分钟）
    pub problem_delay_minutes: f64,
    /// 低餐食评分阈值
    pub low_food_score: f64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            problem_delay_minutes: PROBLEM_DELAY_THRESHOLD_MINUTES,
            low_food_score: LOW_FOOD_SCORE_THRESHOLD,
        }
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// 服务地址
    pub host: String,
    /// 服务端口
    pub port: u16,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: String,
    /// 结构化日志格式
    pub structured: bool,
    /// 日志文件目录
    pub log_dir: Option<PathBuf>,
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// 图数据库配置
    pub graph: GraphConfig,
    /// 向量检索配置
    pub vector: VectorConfig,
    /// 嵌入模型配置
    pub embedding: EmbeddingConfig,
    /// 语言模型配置
    pub llm: LlmConfig,
    /// 路由阈值
    pub routing: RoutingConfig,
    /// 服务器配置
    pub server: ServerConfig,
    /// 日志配置
    pub logging: LoggingConfig,
    /// 应用名称
    pub app_name: String,
    /// 环境
    pub environment: String,
}

impl AppConfig {
    /// 创建开发环境配置
    pub fn development() -> Self {
        Self {
            graph: GraphConfig {
                url: "http://localhost:7474".into(),
                database: "neo4j".into(),
                username: "neo4j".into(),
                password: "neo4j".into(),
                request_timeout: 30,
            },
            vector: VectorConfig {
                corpus_path: PathBuf::from("./data/airline_snippets.json"),
                top_k: DEFAULT_TOP_K,
                rewriter: "keyword".into(),
                comparison: Vec::new(),
            },
            embedding: EmbeddingConfig {
                backend: "hashing".into(),
                model_name: "all-MiniLM-L6-v2".into(),
                dimension: 384,
                ollama_url: "http://localhost:11434".into(),
                ollama_timeout: 60,
            },
            llm: LlmConfig {
                default_model: "Gemini Flash".into(),
                nlu_model: "Gemini Flash".into(),
                google_api_key: None,
                gemini_model: "gemini-2.5-flash".into(),
                gemini_base_url: "https://generativelanguage.googleapis.com".into(),
                huggingface_token: None,
                huggingface_base_url: "https://router.huggingface.co".into(),
                max_new_tokens: 512,
                request_timeout: 60,
            },
            routing: RoutingConfig::default(),
            server: ServerConfig {
                host: "0.0.0.0".into(),
                port: 8080,
            },
            logging: LoggingConfig {
                level: "debug".into(),
                structured: false,
                log_dir: None,
            },
            app_name: "aerograph".into(),
            environment: "development".into(),
        }
    }

    /// 创建生产环境配置
    pub fn production() -> Self {
        let mut config = Self::development();
        config.environment = "production".into();
        config.logging.level = "info".into();
        config.logging.structured = true;
        config.logging.log_dir = Some(PathBuf::from("./logs"));
        config.vector.rewriter = "llm".into();
        config
    }
}
