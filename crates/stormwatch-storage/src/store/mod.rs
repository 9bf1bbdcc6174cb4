use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};

use crate::error::Result;

pub mod delivery;
pub mod rule;
pub mod settings;

// ---- 公开 Row 类型（从各子模块重新导出）----
pub use delivery::{AlertDeliveryRow, DeliveryFilter, DeliverySummary, NewDelivery};
pub use rule::AlertRuleFilter;

/// 管理数据库（stormwatch.db）的统一访问层。
///
/// 所有方法均为 `async fn`，底层使用 SeaORM + SQLite。
pub struct AlertStore {
    pub(crate) db: DatabaseConnection,
}

impl AlertStore {
    /// 连接并初始化数据库。
    ///
    /// - `db_url`：完整的数据库连接 URL，由调用方（服务器配置）提供。
    ///   SQLite 示例：`sqlite:///data/stormwatch.db?mode=rwc`
    ///
    /// 自动运行 `sea-orm-migration` 迁移，确保 Schema 最新。
    pub async fn new(db_url: &str) -> Result<Self> {
        let mut opts = ConnectOptions::new(db_url.to_owned());
        opts.sqlx_logging(false);
        // SQLite 内存库必须共享单连接
        if db_url.contains(":memory:") {
            opts.max_connections(1).min_connections(1);
        }
        let db = Database::connect(opts).await?;

        // WAL 与外键约束仅对 SQLite 有效
        if db_url.starts_with("sqlite:") {
            db.execute_unprepared("PRAGMA journal_mode=WAL;").await?;
            db.execute_unprepared("PRAGMA foreign_keys=ON;").await?;
        }

        // 运行所有待执行迁移
        Migrator::up(&db, None).await?;

        tracing::info!(db_url = %db_url, "Initialized alert store (SeaORM)");

        Ok(Self { db })
    }

    /// 返回底层数据库连接引用（供子模块使用）。
    pub(crate) fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}
