// 收到通知后对本地缓存产生的效果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationOutcome {
    /// 至少新建了一个依赖条目
    Attached,
    /// 所有依赖都已有实例，先到先得
    AlreadyConnected,
    /// 匹配的条目已被移除
    Detached,
    /// 缓存指向同类型的另一个实例，保持不变
    Mismatch,
    /// 缓存中没有该服务类型
    NotConnected,
}

// 按地址移除缓存条目的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetachResult {
    Removed,
    Mismatch,
    Missing,
}
