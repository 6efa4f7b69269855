//! Image Codec - base64 PNG 传输编码

use std::io::Cursor;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use futures_util::future::try_join_all;
use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::CodecError;

/// 图像句柄
///
/// 持有解码后的像素，或尚未解码的 base64 传输字符串。
/// 跨进程中继与持久化只搬运传输字符串，像素编解码一律经由
/// `ImageCodec` 的异步接口在阻塞线程池中完成。
/// 克隆只增加引用计数。
#[derive(Debug, Clone, PartialEq)]
pub struct ImageHandle(Repr);

#[derive(Debug, Clone, PartialEq)]
enum Repr {
    Pixels(Arc<DynamicImage>),
    Encoded(Arc<str>),
}

impl ImageHandle {
    pub fn new(image: DynamicImage) -> Self {
        Self(Repr::Pixels(Arc::new(image)))
    }

    /// 包装 base64 字符串（可带 data URL 前缀），不做解码
    pub fn encoded(value: impl Into<String>) -> Self {
        Self(Repr::Encoded(Arc::from(value.into())))
    }

    /// 从任意受支持格式（PNG/JPEG）的文件字节创建
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.is_empty() {
            return Err(CodecError::Empty);
        }
        image::load_from_memory(bytes)
            .map(Self::new)
            .map_err(|e| CodecError::InvalidImage(e.to_string()))
    }

    /// 已解码的像素
    pub fn pixels(&self) -> Option<&DynamicImage> {
        match &self.0 {
            Repr::Pixels(image) => Some(image.as_ref()),
            Repr::Encoded(_) => None,
        }
    }

    /// 尚未解码的传输字符串
    pub fn as_encoded(&self) -> Option<&str> {
        match &self.0 {
            Repr::Pixels(_) => None,
            Repr::Encoded(value) => Some(value.as_ref()),
        }
    }

    pub fn is_encoded(&self) -> bool {
        matches!(self.0, Repr::Encoded(_))
    }

    pub fn width(&self) -> Option<u32> {
        self.pixels().map(DynamicImage::width)
    }

    pub fn height(&self) -> Option<u32> {
        self.pixels().map(DynamicImage::height)
    }

    /// 编码为 PNG 字节，传输字符串会先被解码校验
    pub fn to_png_bytes(&self) -> Result<Vec<u8>, CodecError> {
        match &self.0 {
            Repr::Pixels(image) => png_bytes(image),
            Repr::Encoded(value) => {
                let decoded = ImageCodec::decode_blocking(value)?;
                decoded.to_png_bytes()
            }
        }
    }
}

fn png_bytes(image: &DynamicImage) -> Result<Vec<u8>, CodecError> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| CodecError::EncodeFailed(e.to_string()))?;
    Ok(buffer.into_inner())
}

impl From<DynamicImage> for ImageHandle {
    fn from(image: DynamicImage) -> Self {
        Self::new(image)
    }
}

// serde 只搬运传输字符串，从不触碰像素
impl Serialize for ImageHandle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.0 {
            Repr::Encoded(value) => serializer.serialize_str(value),
            Repr::Pixels(_) => Err(serde::ser::Error::custom(
                "image must be converted with ImageCodec::to_transport before serialization",
            )),
        }
    }
}

impl<'de> Deserialize<'de> for ImageHandle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::encoded)
    }
}

/// 图像传输编解码器
///
/// 同步版本直接在当前线程完成；异步版本把像素编解码放到
/// 阻塞线程池，多张图像并发处理，结果顺序与输入顺序一致。
pub struct ImageCodec;

impl ImageCodec {
    /// 图像 -> base64 PNG
    ///
    /// 传输字符串会先解码再重新编码，非法输入在这里报错，
    /// 相同像素内容总是得到相同的输出。
    pub fn encode_blocking(image: &ImageHandle) -> Result<String, CodecError> {
        let bytes = image.to_png_bytes()?;
        Ok(BASE64.encode(bytes))
    }

    /// base64（可带 data URL 前缀）-> 图像
    pub fn decode_blocking(encoded: &str) -> Result<ImageHandle, CodecError> {
        let payload = strip_data_url(encoded.trim());
        if payload.is_empty() {
            return Err(CodecError::Empty);
        }
        let bytes = BASE64
            .decode(payload)
            .map_err(|e| CodecError::InvalidBase64(e.to_string()))?;
        ImageHandle::from_bytes(&bytes)
    }

    pub async fn encode(image: &ImageHandle) -> Result<String, CodecError> {
        let image = image.clone();
        tokio::task::spawn_blocking(move || Self::encode_blocking(&image))
            .await
            .map_err(|e| CodecError::TaskAborted(e.to_string()))?
    }

    /// 转为可序列化的传输形式，已是传输字符串的句柄原样返回
    pub async fn to_transport(image: &ImageHandle) -> Result<ImageHandle, CodecError> {
        if image.is_encoded() {
            return Ok(image.clone());
        }
        Self::encode(image).await.map(ImageHandle::encoded)
    }

    pub async fn decode(encoded: String) -> Result<ImageHandle, CodecError> {
        tokio::task::spawn_blocking(move || Self::decode_blocking(&encoded))
            .await
            .map_err(|e| CodecError::TaskAborted(e.to_string()))?
    }

    pub async fn encode_optional(image: Option<&ImageHandle>) -> Result<Option<String>, CodecError> {
        match image {
            Some(image) => Self::encode(image).await.map(Some),
            None => Ok(None),
        }
    }

    /// 并发编码多张图像，输出顺序与输入一致
    pub async fn encode_all(images: &[ImageHandle]) -> Result<Vec<String>, CodecError> {
        try_join_all(images.iter().map(Self::encode)).await
    }

    /// 并发解码多张图像，输出顺序与输入一致
    pub async fn decode_all(encoded: Vec<String>) -> Result<Vec<ImageHandle>, CodecError> {
        try_join_all(encoded.into_iter().map(Self::decode)).await
    }
}

fn strip_data_url(value: &str) -> &str {
    if value.starts_with("data:") {
        if let Some((_, data)) = value.split_once(";base64,") {
            return data;
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn gradient(width: u32, height: u32) -> ImageHandle {
        let image = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 40) as u8, (y * 40) as u8, ((x + y) * 10) as u8])
        });
        ImageHandle::new(DynamicImage::ImageRgb8(image))
    }

    #[test]
    fn test_round_trip_preserves_pixels() {
        let image = gradient(6, 4);
        let encoded = ImageCodec::encode_blocking(&image).unwrap();
        let decoded = ImageCodec::decode_blocking(&encoded).unwrap();
        assert_eq!(decoded, image);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let a = ImageCodec::encode_blocking(&gradient(5, 5)).unwrap();
        let b = ImageCodec::encode_blocking(&gradient(5, 5)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_decode_accepts_data_url() {
        let image = gradient(3, 3);
        let encoded = ImageCodec::encode_blocking(&image).unwrap();
        let data_url = format!("data:image/png;base64,{}", encoded);
        assert_eq!(ImageCodec::decode_blocking(&data_url).unwrap(), image);
    }

    #[test]
    fn test_decode_rejects_malformed_input() {
        assert!(matches!(
            ImageCodec::decode_blocking("not base64 !!"),
            Err(CodecError::InvalidBase64(_))
        ));
        assert!(matches!(ImageCodec::decode_blocking(""), Err(CodecError::Empty)));

        // 合法 base64，但不是图像
        let garbage = BASE64.encode(b"definitely not a png");
        assert!(matches!(
            ImageCodec::decode_blocking(&garbage),
            Err(CodecError::InvalidImage(_))
        ));
    }

    #[tokio::test]
    async fn test_encode_all_preserves_order() {
        let images: Vec<ImageHandle> = (1..=4).map(|n| gradient(n, n)).collect();
        let encoded = ImageCodec::encode_all(&images).await.unwrap();
        assert_eq!(encoded.len(), 4);

        let decoded = ImageCodec::decode_all(encoded).await.unwrap();
        for (n, image) in decoded.iter().enumerate() {
            assert_eq!(image.width(), Some(n as u32 + 1));
        }
        assert_eq!(decoded, images);
    }

    #[test]
    fn test_serde_moves_transport_strings_only() {
        let handle = ImageHandle::encoded("bm90IGFuIGltYWdl");
        let json = serde_json::to_value(&handle).unwrap();
        assert_eq!(json, serde_json::json!("bm90IGFuIGltYWdl"));

        // 反序列化不解码，即使内容不是图像
        let back: ImageHandle = serde_json::from_value(json).unwrap();
        assert!(back.is_encoded());
        assert_eq!(back.width(), None);

        assert!(serde_json::to_value(gradient(2, 2)).is_err());
    }

    #[tokio::test]
    async fn test_encoded_handle_is_validated_on_encode() {
        let image = gradient(3, 2);
        let transport = ImageCodec::to_transport(&image).await.unwrap();
        assert!(transport.is_encoded());
        assert_eq!(
            ImageCodec::encode(&transport).await.unwrap(),
            ImageCodec::encode(&image).await.unwrap()
        );

        let garbage = ImageHandle::encoded(BASE64.encode(b"definitely not a png"));
        assert!(matches!(
            ImageCodec::encode(&garbage).await,
            Err(CodecError::InvalidImage(_))
        ));
    }
}
