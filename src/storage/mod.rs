// 根目录受限存储引擎
//
// 所有文件操作先经路径守卫约束到共享根目录内；破坏性操作再经
// 保护检查，删除走回收站软删除；目录下载走流式归档

mod archive;
mod guard;
mod naming;
mod protect;
mod service;
mod trash;
mod types;

pub use archive::ArchiveStream;
pub use guard::PathGuard;
pub use naming::next_available_name;
pub use protect::ProtectGuard;
pub use service::{StorageService, UploadTarget};
pub use trash::Trash;
pub use types::*;
