use serde::Deserialize;

use crate::error::PoolError;

/// 对象池默认保留的闲置实例上限。
///
/// 构建器的典型用量是“取一个、写几项、冻结、归还”，并发持有数量很少超过十个；
/// 128 足以覆盖突发，同时限制闲置集合本身的常驻内存。
pub const DEFAULT_MAX_IDLE: usize = 128;

/// 容量保留阈值：归还时容量达到该值的构建器将被丢弃而非回收。
///
/// # 设计背景（Why）
/// - 生产统计显示，绝大多数构建器只容纳 0~2 个元素，约 50 个元素之后是一条极长的尾巴，
///   偶有数万元素的超大实例；
/// - 若无差别回收，这些超大实例会长期驻留在闲置集合中，而再次需要同等容量的概率微乎其微；
/// - 整体性能对该值并不敏感，取 128 作为“不算太小”的上限。
pub const RETENTION_THRESHOLD: usize = 128;

/// 非池化与工厂新建构建器的初始容量。
pub const DEFAULT_INITIAL_CAPACITY: usize = 8;

/// `PoolConfig` 汇总单个对象池的容量策略。
///
/// # 契约说明（What）
/// - `max_idle`：闲置集合的保留上限，允许为 0（池不保留任何实例，仅作为工厂使用）；
/// - `retention_threshold`：见 [`RETENTION_THRESHOLD`]，必须大于 0，否则任何实例都无法回收；
/// - `initial_capacity`：工厂新建实例时预分配的元素数量。
///
/// # 实现策略（How）
/// - 通过 `#[serde(default)]` 支持局部覆盖，未出现的字段回落到默认常量；
/// - `with_*` 方法以值语义链式构造，便于在测试与基准中就地声明。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_idle: usize,
    pub retention_threshold: usize,
    pub initial_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle: DEFAULT_MAX_IDLE,
            retention_threshold: RETENTION_THRESHOLD,
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
        }
    }
}

impl PoolConfig {
    /// 设置闲置集合上限。
    pub fn with_max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = max_idle;
        self
    }

    /// 设置容量保留阈值。
    pub fn with_retention_threshold(mut self, threshold: usize) -> Self {
        self.retention_threshold = threshold;
        self
    }

    /// 设置新建实例的初始容量。
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// 校验配置是否自洽。
    ///
    /// - **前置条件**：无；
    /// - **后置条件**：返回 `Ok(())` 时，`retention_threshold > 0`，
    ///   且 `initial_capacity` 低于阈值（否则新建实例一经归还就会被丢弃，池形同虚设）。
    ///
    /// `from_toml_str` 在加载时调用；代码中直接构造的配置在建池时由调试断言校验。
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.retention_threshold == 0 {
            return Err(PoolError::InvalidConfig {
                detail: "retention_threshold must be greater than zero".to_owned(),
            });
        }
        if self.initial_capacity >= self.retention_threshold {
            return Err(PoolError::InvalidConfig {
                detail: format!(
                    "initial_capacity {} must stay below retention_threshold {}",
                    self.initial_capacity, self.retention_threshold
                ),
            });
        }
        Ok(())
    }

    /// 从 TOML 片段解析并校验配置。
    ///
    /// 片段中缺失的字段使用默认值，例如 `max_idle = 32` 仅覆盖闲置上限。
    #[cfg(feature = "toml")]
    pub fn from_toml_str(source: &str) -> Result<Self, PoolError> {
        let config: PoolConfig = toml::from_str(source).map_err(|err| PoolError::InvalidConfig {
            detail: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }
}
