/// 通用工具模块
pub mod clock;
pub mod http_client;

#[cfg(test)]
pub mod testing;
