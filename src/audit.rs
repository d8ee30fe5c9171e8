//! 审计日志：记录每次动作分发与探询尝试
//!
//! 对核心而言是只写、追加式的外部协作者。log 为 fire-and-forget：
//! 绝不阻塞分发路径，落盘失败只在本地告警、不向调用方传播。

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use chrono::{DateTime, Utc};

/// 一条审计记录
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    /// 发起角色（分发器固定为 system）
    pub actor_role: String,
    /// 意图或动作名
    pub action: String,
    pub parameters: serde_json::Value,
    pub actor_id: String,
    /// 结果状态（success / error / clarification_needed），分发前的记录可为空
    pub status: Option<String>,
}

impl AuditEntry {
    pub fn new(
        actor_role: &str,
        action: &str,
        parameters: serde_json::Value,
        actor_id: &str,
        status: Option<&str>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            actor_role: actor_role.to_string(),
            action: action.to_string(),
            parameters,
            actor_id: actor_id.to_string(),
            status: status.map(String::from),
        }
    }

    /// JSONL 行表示
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "timestamp": self.timestamp.to_rfc3339(),
            "role": self.actor_role,
            "action": self.action,
            "parameters": self.parameters,
            "user": self.actor_id,
            "status": self.status,
        })
    }
}

/// 审计接收端
pub trait AuditSink: Send + Sync {
    /// 记录一条审计（不返回错误，失败由实现自行消化）
    fn log(&self, entry: AuditEntry);
}

/// tracing 审计端：结构化日志输出
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn log(&self, entry: AuditEntry) {
        tracing::info!(
            target: "audit",
            role = %entry.actor_role,
            action = %entry.action,
            user = %entry.actor_id,
            status = entry.status.as_deref().unwrap_or("-"),
            parameters = %entry.parameters,
            "audit entry"
        );
    }
}

/// JSONL 文件审计端：逐行追加
pub struct JsonlAuditSink {
    file: Mutex<File>,
}

impl JsonlAuditSink {
    /// 打开（或创建）追加写入的 JSONL 文件
    pub fn create(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open audit log {}", path.display()))?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl AuditSink for JsonlAuditSink {
    fn log(&self, entry: AuditEntry) {
        let line = entry.to_json().to_string();
        let Ok(mut file) = self.file.lock() else {
            tracing::warn!("audit log mutex poisoned, entry dropped");
            return;
        };
        if let Err(e) = writeln!(file, "{}", line) {
            tracing::warn!("failed to append audit entry: {}", e);
        }
    }
}
