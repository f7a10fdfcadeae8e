/// 时间源抽象
///
/// Token 过期判断依赖当前时间，测试中用固定时钟替换
use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// 当前 Unix 时间戳（秒）
    fn unix_now(&self) -> i64 {
        self.now().timestamp()
    }
}

/// 系统时钟
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
