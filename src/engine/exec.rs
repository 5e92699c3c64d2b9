// src/engine/exec.rs
//! 命令分发：把解析好的 `Command` 交给引擎执行，得到回复文本，
//! 同时告诉网络层这条命令是否需要转发给 follower。

use super::Engine;
use crate::protocol::{Command, NIL, OK, UNKNOWN_COMMAND};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    /// 写成功后才为 true：SET 总是转发，DEL 只在 key 存在时，INCR 只在得到整数时
    pub replicate: bool,
}

impl Reply {
    fn read(text: impl Into<String>) -> Self {
        Reply { text: text.into(), replicate: false }
    }

    fn write(text: impl Into<String>) -> Self {
        Reply { text: text.into(), replicate: true }
    }
}

pub async fn execute(engine: &Engine, cmd: &Command) -> Reply {
    match cmd {
        Command::Set { key, value, ttl } => {
            engine.set(key, value, *ttl).await;
            Reply::write(OK)
        }
        Command::Get { key } => match engine.get(key).await {
            Some(v) => Reply::read(v),
            None => Reply::read(NIL),
        },
        Command::Del { key } => {
            if engine.delete(key).await {
                Reply::write(OK)
            } else {
                Reply::read(NIL)
            }
        }
        Command::Incr { key } => match engine.increment(key).await {
            Ok(n) => Reply::write(n.to_string()),
            Err(e) => Reply::read(e.to_string()),
        },
        Command::Info => Reply::read(engine.info().await.to_string()),
        // 握手由网络层处理，走到这里说明用法不对
        Command::Replicate => Reply::read(UNKNOWN_COMMAND),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[tokio::test]
    async fn test_execute_replies() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let engine = Engine::open(2, tmp.path().join("appendonly.aof"))?;

        let run = |line: &str| Command::parse(line).expect("valid command");

        assert_eq!(execute(&engine, &run("SET a hello there")).await, Reply::write("OK"));
        assert_eq!(execute(&engine, &run("GET a")).await, Reply::read("hello there"));
        assert_eq!(execute(&engine, &run("GET b")).await, Reply::read("(nil)"));
        assert_eq!(execute(&engine, &run("DEL b")).await, Reply::read("(nil)"));
        assert_eq!(execute(&engine, &run("DEL a")).await, Reply::write("OK"));
        assert_eq!(execute(&engine, &run("INCR c")).await, Reply::write("1"));

        execute(&engine, &run("SET s word")).await;
        assert_eq!(
            execute(&engine, &run("INCR s")).await,
            Reply::read("ERROR: Value is not an integer")
        );

        let info = execute(&engine, &run("INFO")).await;
        assert!(!info.replicate);
        assert!(info.text.contains("keys_in_db: 2"));
        Ok(())
    }
}
