//! Generation Result - 后端回复的结构化封装

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::image::{CodecError, ImageCodec, ImageHandle};

/// 一次生成调用的结果
///
/// 解码规则:
/// - `image` 为字符串时作为第一张图像
/// - `images` 数组按回复顺序依次追加
/// - `info` 取 `info`，否则 `html_info`，否则空映射（取第一个，不合并）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub images: Vec<ImageHandle>,
    pub info: Value,
    pub parameters: Value,
    /// 原始回复，只在本进程内保留，不参与中继传输
    #[serde(skip)]
    pub raw: Value,
}

impl GenerationResult {
    /// 第一张图像
    pub fn image(&self) -> Option<&ImageHandle> {
        self.images.first()
    }

    /// 从后端原始回复构造，图像并发解码
    pub async fn from_reply(raw: Value) -> Result<Self, CodecError> {
        let reply = match &raw {
            Value::Object(map) => map,
            other => {
                return Err(CodecError::UnexpectedShape(format!(
                    "expected a JSON object reply, got {}",
                    json_kind(other)
                )))
            }
        };

        let encoded = collect_encoded_images(reply)?;
        let images = ImageCodec::decode_all(encoded).await?;

        Ok(Self {
            images,
            info: pick_info(reply),
            parameters: pick_parameters(reply),
            raw,
        })
    }
}

fn collect_encoded_images(reply: &Map<String, Value>) -> Result<Vec<String>, CodecError> {
    let mut encoded = Vec::new();

    if let Some(Value::String(single)) = reply.get("image") {
        encoded.push(single.clone());
    }

    match reply.get("images") {
        None | Some(Value::Null) => {}
        Some(Value::Array(items)) => {
            for (index, item) in items.iter().enumerate() {
                match item {
                    Value::String(s) => encoded.push(s.clone()),
                    other => {
                        return Err(CodecError::UnexpectedShape(format!(
                            "images[{}] is {}, expected a string",
                            index,
                            json_kind(other)
                        )))
                    }
                }
            }
        }
        Some(other) => {
            return Err(CodecError::UnexpectedShape(format!(
                "images is {}, expected an array",
                json_kind(other)
            )))
        }
    }

    Ok(encoded)
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

fn pick_info(reply: &Map<String, Value>) -> Value {
    ["info", "html_info"]
        .iter()
        .filter_map(|key| reply.get(*key))
        .find(|value| is_present(value))
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()))
}

fn pick_parameters(reply: &Map<String, Value>) -> Value {
    reply
        .get("parameters")
        .filter(|value| !value.is_null())
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
