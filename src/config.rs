//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `WEAVER__*` 覆盖（双下划线表示嵌套，如 `WEAVER__LLM__PROVIDER=gemini`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub audit: AuditSection,
}

/// [app] 段：应用名
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
}

/// [llm] 段：上游分类器后端与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：gemini / mock；缺少 API Key 时自动退化为 mock（纯启发式回退）
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_provider() -> String {
    "gemini".to_string()
}

fn default_model() -> String {
    "gemini-pro".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    /// 单次分类请求超时（秒），超时后走确定性回退分类器
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    15
}

/// [session] 段：会话过期与清扫周期
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// 会话空闲多久视为过期（秒）
    pub timeout_secs: u64,
    /// 过期清扫周期（秒）
    pub sweep_interval_secs: u64,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            timeout_secs: 30 * 60,
            sweep_interval_secs: 5 * 60,
        }
    }
}

/// [audit] 段：审计落盘
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuditSection {
    /// 追加写入的 JSONL 文件路径，未设置时仅走 tracing
    pub jsonl_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppSection::default(),
            llm: LlmSection::default(),
            session: SessionSection::default(),
            audit: AuditSection::default(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 WEAVER__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 WEAVER__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("WEAVER")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
