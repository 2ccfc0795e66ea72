//! # 规则能力模块
//!
//! - [`condition`]：比较与区间条件评估
//! - [`dampening`]：抑制策略（直通、连续次数、最近 N 次、持续时间）
//! - [`engine`]：资源值变化 → 规则评估 → 触发/解除
//! - [`operation`]：规则动作（发送载荷、通知）
//! - [`resource`]：资源当前值查询
//!
//! 规则评估由解码路径以独立任务提交，不阻塞消息处理。

pub mod condition;
pub mod dampening;
pub mod engine;
pub mod error;
pub mod operation;
pub mod resource;

pub use condition::{ConditionEvaluator, Evaluation};
pub use engine::{RuleEngine, ValueChangedEvent, ValueChangedListener};
pub use error::RuleError;
pub use operation::{
    DefaultOperationExecutor, LogNotificationSender, NotificationSender, OperationExecutor,
    PayloadSender, QueuePayloadSender,
};
pub use resource::{ResourceValueLookup, StoreResourceValues};
