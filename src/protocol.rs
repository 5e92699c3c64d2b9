// src/protocol.rs
//! 文本协议：一行一条命令，token 以空白分隔
//!
//! ```text
//! SET <key> <value...> [EX <seconds>]   -> OK
//! GET <key>                             -> <value> | (nil)
//! DEL <key>                             -> OK | (nil)
//! INCR <key>                            -> <integer> | 错误串
//! INFO                                  -> 多行统计
//! REPLICATE                             -> ACK_REPLICATION
//! ```
//!
//! AOF 文件和主从复制流复用同一套语法。

pub const OK: &str = "OK";
pub const NIL: &str = "(nil)";
pub const UNKNOWN_COMMAND: &str = "ERROR: Unknown Command";
pub const REPLICATE: &str = "REPLICATE";
pub const ACK_REPLICATION: &str = "ACK_REPLICATION";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Set { key: String, value: String, ttl: Option<u64> },
    Get { key: String },
    Del { key: String },
    Incr { key: String },
    Info,
    Replicate,
}

impl Command {
    /// 解析一行命令；未知命令或参数个数不对返回 None
    pub fn parse(line: &str) -> Option<Command> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let name = parts.first()?.to_uppercase();

        match (name.as_str(), parts.len()) {
            ("SET", n) if n >= 3 => {
                let (value, ttl) = split_ttl(&parts[2..]);
                Some(Command::Set {
                    key: parts[1].to_string(),
                    value: value.join(" "),
                    ttl,
                })
            }
            ("GET", 2) => Some(Command::Get { key: parts[1].to_string() }),
            ("DEL", 2) => Some(Command::Del { key: parts[1].to_string() }),
            ("INCR", 2) => Some(Command::Incr { key: parts[1].to_string() }),
            ("INFO", 1) => Some(Command::Info),
            ("REPLICATE", 1) => Some(Command::Replicate),
            _ => None,
        }
    }

    /// 会修改数据、需要转发给 follower 的命令
    pub fn is_write(&self) -> bool {
        matches!(self, Command::Set { .. } | Command::Del { .. } | Command::Incr { .. })
    }
}

/// 拆出末尾的 `EX <seconds>`；前面至少要留一个 value token。
/// 秒数解析失败时 `EX` 和它后面的 token 都算作 value 的一部分，`EX 0` 等同于不设 TTL。
/// 负数同样解析失败：`SET k v EX -5` 存的是 value `"v EX -5"`，不会让 key 立即过期。
fn split_ttl<'a>(tokens: &'a [&'a str]) -> (&'a [&'a str], Option<u64>) {
    let n = tokens.len();
    if n >= 3 && tokens[n - 2].eq_ignore_ascii_case("EX") {
        if let Ok(secs) = tokens[n - 1].parse::<u64>() {
            let ttl = if secs > 0 { Some(secs) } else { None };
            return (&tokens[..n - 2], ttl);
        }
    }
    (tokens, None)
}

/// 把 SET 还原成一条 AOF 记录的 token 序列
pub fn set_record(key: &str, value: &str, ttl: Option<u64>) -> String {
    match ttl {
        Some(secs) => format!("SET {} {} EX {}", key, value, secs),
        None => format!("SET {} {}", key, value),
    }
}

pub fn del_record(key: &str) -> String {
    format!("DEL {}", key)
}
