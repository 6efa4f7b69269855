//! Image Context - Errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("无效的 base64 数据: {0}")]
    InvalidBase64(String),

    #[error("空图像数据")]
    Empty,

    #[error("无法解析图像: {0}")]
    InvalidImage(String),

    #[error("图像编码失败: {0}")]
    EncodeFailed(String),

    #[error("响应中的图像字段格式错误: {0}")]
    UnexpectedShape(String),

    #[error("编解码任务异常退出: {0}")]
    TaskAborted(String),
}
