//! 会话管理
//!
//! 每个会话记录探询次数与最近一次已解析的意图，空闲超时后由周期清扫回收。
//! 会话由 SessionManager 独占持有，外部只通过 id 访问快照；
//! 管理器经构造注入，绝不做进程级单例。
//!
//! 并发纪律：外层 RwLock<HashMap> 只保护成员关系，逐会话再各挂一把锁。
//! 同一 id 的读改写不可分割（无丢失自增），不同 id 的变更互不争用；
//! 清扫在持有 map 写锁时对每个会话 try_lock，锁不上的视为活跃、跳过，
//! 因此正在被触达的会话绝不会被清扫从手中夺走。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::intent::IntentKind;

/// 同一会话允许的最大连续探询次数
pub const MAX_PROBING_ATTEMPTS: u32 = 3;

/// 会话 ID（调用方提供，按对话唯一）
pub type SessionId = String;

/// 单个会话的状态
#[derive(Debug, Clone)]
pub struct Session {
    /// 连续探询计数
    pub probing_attempt_count: u32,
    /// 最近一次成功解析的意图
    pub last_intent: Option<IntentKind>,
    /// 最近一次成功解析的实体
    pub last_entities: Option<HashMap<String, String>>,
    /// 创建时间
    pub created_at: Instant,
    /// 最后活跃时间（每次读或写触达都会刷新）
    pub last_activity: Instant,
}

impl Session {
    fn new() -> Self {
        let now = Instant::now();
        Self {
            probing_attempt_count: 0,
            last_intent: None,
            last_entities: None,
            created_at: now,
            last_activity: now,
        }
    }

    /// 会话是否过期
    pub fn is_expired(&self, timeout: Duration) -> bool {
        self.last_activity.elapsed() > timeout
    }
}

/// 会话管理器
pub struct SessionManager {
    /// 所有会话（session_id -> 会话锁）
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<Session>>>>,
    /// 会话过期时间
    session_timeout: Duration,
}

impl SessionManager {
    pub fn new(session_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            session_timeout,
        }
    }

    /// 在会话上执行一次不可分割的读改写；不存在则先创建零值会话
    ///
    /// 会话锁在 map 读锁保护下获得，清扫（需要 map 写锁）无法与进行中的
    /// 操作交错。锁内先刷新 last_activity 再执行闭包。
    pub async fn with_session<F, R>(&self, session_id: &str, f: F) -> R
    where
        F: FnOnce(&mut Session) -> R,
    {
        loop {
            {
                let sessions = self.sessions.read().await;
                if let Some(slot) = sessions.get(session_id) {
                    let slot = Arc::clone(slot);
                    let mut session = slot.lock().await;
                    session.last_activity = Instant::now();
                    return f(&mut session);
                }
            }

            let mut sessions = self.sessions.write().await;
            sessions
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(Session::new())));
        }
    }

    /// 取会话快照；不存在则创建，触达 last_activity
    pub async fn get(&self, session_id: &str) -> Session {
        self.with_session(session_id, |s| s.clone()).await
    }

    /// 探询计数加一并返回新值
    pub async fn increment_probing_attempts(&self, session_id: &str) -> u32 {
        self.with_session(session_id, |s| {
            s.probing_attempt_count += 1;
            s.probing_attempt_count
        })
        .await
    }

    /// 清零探询计数（意图解析成功、即将分发时调用一次）
    pub async fn reset_probing_attempts(&self, session_id: &str) {
        self.with_session(session_id, |s| {
            s.probing_attempt_count = 0;
        })
        .await
    }

    /// 探询计数是否已达上限
    pub async fn has_reached_max(&self, session_id: &str) -> bool {
        self.with_session(session_id, |s| s.probing_attempt_count >= MAX_PROBING_ATTEMPTS)
            .await
    }

    /// 合并记录最近一次解析结果
    pub async fn update(
        &self,
        session_id: &str,
        last_intent: IntentKind,
        last_entities: HashMap<String, String>,
    ) {
        self.with_session(session_id, |s| {
            s.last_intent = Some(last_intent);
            s.last_entities = Some(last_entities);
        })
        .await
    }

    /// 清理过期会话，返回清理数
    pub async fn cleanup_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        let timeout = self.session_timeout;
        sessions.retain(|session_id, slot| match slot.try_lock() {
            Ok(session) => {
                let keep = !session.is_expired(timeout);
                if !keep {
                    tracing::info!("cleaned up expired session: {}", session_id);
                }
                keep
            }
            // 锁不上说明有操作在途，视为活跃
            Err(_) => true,
        });
        before - sessions.len()
    }

    /// 获取活跃会话数
    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// 启动周期清扫任务，返回可取消句柄
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> SweeperHandle {
        let manager = Arc::clone(self);
        let token = CancellationToken::new();
        let child = token.clone();

        let task = tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = timer.tick() => {
                        let removed = manager.cleanup_expired().await;
                        if removed > 0 {
                            tracing::info!("Cleaned up {} expired sessions", removed);
                        }
                    }
                }
            }
        });

        SweeperHandle { token, task }
    }
}

/// 清扫任务句柄：测试与停机时可确定性关停
pub struct SweeperHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// 取消并等待清扫任务退出
    pub async fn shutdown(self) {
        self.token.cancel();
        let _ = self.task.await;
    }
}
