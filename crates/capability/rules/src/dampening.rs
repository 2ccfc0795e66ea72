//! 抑制（dampening）状态机
//!
//! 位于"本轮条件为真"与"规则视为触发"之间。累积状态随规则一起持久化，
//! 规则重新启用或被编辑时通过 [`reset`] 清空。

use domain::{DampeningPolicy, DampeningState};
use tracing::warn;

/// 最近 N 次评估窗口的长度上限。
pub const MAX_LAST_EVALUATIONS: u32 = 256;

/// 将原始判定送入抑制策略，返回最终判定。
pub fn apply(
    policy: &DampeningPolicy,
    state: &mut DampeningState,
    raw: bool,
    now_ms: i64,
) -> bool {
    match *policy {
        DampeningPolicy::None => raw,
        DampeningPolicy::Consecutive { occurrences } => {
            state.consecutive = if raw {
                state.consecutive.saturating_add(1)
            } else {
                0
            };
            state.consecutive >= occurrences.max(1)
        }
        DampeningPolicy::LastNEvaluations {
            occurrences,
            evaluations,
        } => {
            let evaluations = evaluations.clamp(1, MAX_LAST_EVALUATIONS) as usize;
            state.window.push_back(raw);
            while state.window.len() > evaluations {
                state.window.pop_front();
            }
            let hits = state.window.iter().filter(|hit| **hit).count();
            raw && hits >= occurrences.max(1) as usize
        }
        DampeningPolicy::ActiveTime { active_ms } => {
            if !raw {
                state.active_since_ms = None;
                return false;
            }
            let since = *state.active_since_ms.get_or_insert(now_ms);
            now_ms.saturating_sub(since) >= active_ms
        }
        DampeningPolicy::Unsupported => {
            warn!(target: "hc.rules", "unsupported_dampening_policy");
            false
        }
    }
}

/// 清空累积状态。
pub fn reset(state: &mut DampeningState) {
    *state = DampeningState::default();
}
