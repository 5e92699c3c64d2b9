// src/error.rs
//! 引擎层的错误类型

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KvError {
    /// INCR 作用在非整数值上
    #[error("ERROR: Value is not an integer")]
    NotAnInteger,

    #[error("ERROR: Increment would overflow")]
    Overflow,

    /// AOF 读写失败
    #[error("AOF I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type KvResult<T> = std::result::Result<T, KvError>;
