//! Image Context - 图像句柄与传输编码
//!
//! 后端 API 以 base64 PNG 字符串传输图像，
//! 本模块负责内存图像句柄与传输字符串之间的转换

mod codec;
mod errors;

pub use codec::{ImageCodec, ImageHandle};
pub use errors::CodecError;
