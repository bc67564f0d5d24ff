// ==========================================
// 物流运营报表系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at) VALUES ('global', ?1, ?2, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self.get_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// 读取数值型配置；格式错误时记录警告并回退默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> Result<T, Box<dyn Error>>
    where
        T: std::str::FromStr + Copy + std::fmt::Display,
    {
        let raw = match self.get_config_value(key)? {
            Some(v) => v,
            None => return Ok(default),
        };
        match raw.trim().parse::<T>() {
            Ok(v) => Ok(v),
            Err(_) => {
                tracing::warn!(
                    config_key = key,
                    raw_value = %raw,
                    "配置值格式错误，使用默认值 {}",
                    default
                );
                Ok(default)
            }
        }
    }

    /// 获取所有配置的快照（JSON格式，按键排序）
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    // ===== 报表引擎配置 =====

    /// 待发余额跨月回溯的最大月数（默认 36）
    pub fn get_waiting_balance_max_depth(&self) -> Result<u32, Box<dyn Error>> {
        self.get_parsed_or_default(
            config_keys::WAITING_BALANCE_MAX_DEPTH,
            defaults::WAITING_BALANCE_MAX_DEPTH,
        )
    }

    /// 允许的最小年份（默认 2000）
    pub fn get_min_year(&self) -> Result<i32, Box<dyn Error>> {
        self.get_parsed_or_default(config_keys::PERIOD_MIN_YEAR, defaults::PERIOD_MIN_YEAR)
    }

    /// 允许的最大年份（默认 2100）
    pub fn get_max_year(&self) -> Result<i32, Box<dyn Error>> {
        self.get_parsed_or_default(config_keys::PERIOD_MAX_YEAR, defaults::PERIOD_MAX_YEAR)
    }

    /// 年度合计配对表覆写（JSON 数组，未配置时为 None）
    pub fn get_year_totals_pairings_json(&self) -> Result<Option<String>, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::YEAR_TOTALS_PAIRINGS, "")?;
        if value.trim().is_empty() {
            Ok(None)
        } else {
            Ok(Some(value))
        }
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 待发余额
    pub const WAITING_BALANCE_MAX_DEPTH: &str = "waiting_balance.max_depth";

    // 期间校验
    pub const PERIOD_MIN_YEAR: &str = "period.min_year";
    pub const PERIOD_MAX_YEAR: &str = "period.max_year";

    // 年度合计配对表 (JSON)
    pub const YEAR_TOTALS_PAIRINGS: &str = "year_totals.pairings";
}

/// 配置默认值
pub mod defaults {
    pub const WAITING_BALANCE_MAX_DEPTH: u32 = 36;
    pub const PERIOD_MIN_YEAR: i32 = 2000;
    pub const PERIOD_MAX_YEAR: i32 = 2100;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ensure_schema;

    fn manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_defaults_when_absent() {
        let cm = manager();
        assert_eq!(cm.get_waiting_balance_max_depth().unwrap(), 36);
        assert_eq!(cm.get_min_year().unwrap(), 2000);
        assert_eq!(cm.get_max_year().unwrap(), 2100);
        assert!(cm.get_year_totals_pairings_json().unwrap().is_none());
    }

    #[test]
    fn test_override_and_malformed_value() {
        let cm = manager();
        cm.set_global_config_value(config_keys::WAITING_BALANCE_MAX_DEPTH, "12").unwrap();
        assert_eq!(cm.get_waiting_balance_max_depth().unwrap(), 12);

        cm.set_global_config_value(config_keys::PERIOD_MIN_YEAR, "abc").unwrap();
        assert_eq!(cm.get_min_year().unwrap(), 2000);

        let snapshot = cm.get_config_snapshot().unwrap();
        assert!(snapshot.contains("waiting_balance.max_depth"));
    }
}
