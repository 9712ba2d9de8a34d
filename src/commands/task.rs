use crate::controller::{PendingAction, SubmitRequest};
use crate::entity::EntityType;

/// 交给后台 actor 执行的网络任务
#[derive(Debug, Clone, PartialEq)]
pub enum BackgroundTask {
    Login { email: String, password: String },
    Logout,
    /// 用本地 token 恢复登录状态
    Restore,
    /// 首次进入列表/表单：实体及其关联实体尚未加载时才拉取
    Load(EntityType),
    Refresh(EntityType),
    Submit(SubmitRequest),
    Execute {
        entity: EntityType,
        action: PendingAction,
    },
    Toggle {
        entity: EntityType,
        id: String,
    },
}
