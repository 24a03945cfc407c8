//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 池化层没有 I/O，也没有可恢复的外部故障；唯一会“失败”的是调用方违反前置条件
//!   （越界索引、`clip` 超长等），这类错误意味着池化正确性已被破坏，必须就地暴露。
//! - 集中定义错误枚举，让 panic 信息与 `try_*` 接口返回的错误保持同一份文案与错误码。
//!
//! ## 设计要求（What）
//! - 所有错误类型派生 `thiserror::Error`，兼容 `std::error::Error`；
//! - 错误码遵循 `<域>.<语义>` 约定，统一使用 `pool.*` 前缀；
//! - 前置条件违例不得被吞掉或转换为默认值，见 [`fail_fast`]。

use thiserror::Error;

/// 池化层错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：描述构建器与对象池在前置条件被破坏时的具体形态，便于排障时直接定位调用点；
/// - **契约 (What)**：所有变体均为 `Send + Sync + 'static`，`operation` 字段记录触发失败的方法名；
/// - **设计权衡 (Trade-offs)**：`operation` 使用 `&'static str`，避免在失败路径上额外分配。
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum PoolError {
    /// 单点索引超出允许范围。
    #[error("{operation}: index {index} is out of range for length {len}")]
    IndexOutOfRange {
        operation: &'static str,
        index: usize,
        len: usize,
    },

    /// `[start, start + count)` 窗口越过了当前长度。
    #[error("{operation}: window [{start}, {start} + {count}) exceeds length {len}")]
    WindowOutOfRange {
        operation: &'static str,
        start: usize,
        count: usize,
        len: usize,
    },

    /// 在空构建器上执行需要至少一个元素的操作。
    #[error("{operation}: builder is empty")]
    EmptyBuilder { operation: &'static str },

    /// `clip(limit)` 只能截短，不能延长。
    #[error("clip: limit {limit} exceeds current length {len}")]
    ClipBeyondLength { limit: usize, len: usize },

    /// 池配置不自洽或无法解析。
    #[error("invalid pool configuration: {detail}")]
    InvalidConfig { detail: String },
}

impl PoolError {
    /// 返回稳定错误码，供日志与告警聚合使用。
    pub fn code(&self) -> &'static str {
        match self {
            PoolError::IndexOutOfRange { .. } => "pool.index_out_of_range",
            PoolError::WindowOutOfRange { .. } => "pool.window_out_of_range",
            PoolError::EmptyBuilder { .. } => "pool.empty_builder",
            PoolError::ClipBeyondLength { .. } => "pool.clip_beyond_length",
            PoolError::InvalidConfig { .. } => "pool.invalid_config",
        }
    }
}

/// 以 panic 形式立即终止违反前置条件的调用。
///
/// `#[track_caller]` 保证 panic 位置指向违例的调用方，而不是本模块。
#[track_caller]
#[cold]
pub(crate) fn fail_fast(err: PoolError) -> ! {
    panic!("[{}] {err}", err.code())
}

/// 校验 `[start, start + count)` 是否落在 `len` 之内。
pub(crate) fn check_window(
    operation: &'static str,
    start: usize,
    count: usize,
    len: usize,
) -> Result<(), PoolError> {
    match start.checked_add(count) {
        Some(end) if end <= len => Ok(()),
        _ => Err(PoolError::WindowOutOfRange {
            operation,
            start,
            count,
            len,
        }),
    }
}
