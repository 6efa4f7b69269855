//! Generation Client - 生成请求的提交
//!
//! 规范化请求 -> POST 对应接口 -> 回复解码为 GenerationResult。
//! 不做任何重试，后端与解码错误原样向上传递。

use std::sync::Arc;

use crate::application::error::ApplicationError;
use crate::application::ports::BackendTransportPort;
use crate::domain::generation::{
    ControlNetDetectOptions, ExtraBatchOptions, ExtraSingleOptions, GenerationDefaults,
    GenerationRequest, GenerationResult, Img2ImgOptions, InterrogateOptions, NormalizedPayload,
    PngInfoOptions, RequestNormalizer, Txt2ImgOptions,
};

pub struct GenerationClient {
    transport: Arc<dyn BackendTransportPort>,
    normalizer: RequestNormalizer,
}

impl GenerationClient {
    pub fn new(transport: Arc<dyn BackendTransportPort>, defaults: GenerationDefaults) -> Self {
        Self {
            transport,
            normalizer: RequestNormalizer::new(defaults),
        }
    }

    pub fn normalizer(&self) -> &RequestNormalizer {
        &self.normalizer
    }

    /// 提交任意生成请求
    pub async fn submit(&self, request: &GenerationRequest) -> Result<GenerationResult, ApplicationError> {
        let payload = self.normalizer.normalize(request).await?;
        self.send(request.kind(), payload).await
    }

    /// ControlNet 预处理检测
    pub async fn detect(
        &self,
        options: &ControlNetDetectOptions,
    ) -> Result<GenerationResult, ApplicationError> {
        let payload = self.normalizer.controlnet_detect(options).await?;
        self.send("controlnet_detect", payload).await
    }

    pub async fn txt2img(&self, options: Txt2ImgOptions) -> Result<GenerationResult, ApplicationError> {
        self.submit(&GenerationRequest::TextToImage(options)).await
    }

    pub async fn img2img(&self, options: Img2ImgOptions) -> Result<GenerationResult, ApplicationError> {
        self.submit(&GenerationRequest::ImageToImage(options)).await
    }

    pub async fn extra_single_image(
        &self,
        options: ExtraSingleOptions,
    ) -> Result<GenerationResult, ApplicationError> {
        self.submit(&GenerationRequest::RestoreSingle(options)).await
    }

    pub async fn extra_batch_images(
        &self,
        options: ExtraBatchOptions,
    ) -> Result<GenerationResult, ApplicationError> {
        self.submit(&GenerationRequest::RestoreBatch(options)).await
    }

    pub async fn png_info(&self, options: PngInfoOptions) -> Result<GenerationResult, ApplicationError> {
        self.submit(&GenerationRequest::MetadataQuery(options)).await
    }

    pub async fn interrogate(
        &self,
        options: InterrogateOptions,
    ) -> Result<GenerationResult, ApplicationError> {
        self.submit(&GenerationRequest::Interrogate(options)).await
    }

    async fn send(
        &self,
        kind: &'static str,
        payload: NormalizedPayload,
    ) -> Result<GenerationResult, ApplicationError> {
        let path = payload.endpoint.path();
        tracing::debug!(kind, path, "Submitting generation request");

        let reply = self.transport.post(path, &payload.body).await?;
        let result = GenerationResult::from_reply(reply).await?;

        tracing::info!(kind, path, images = result.images.len(), "Generation completed");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::BackendError;
    use crate::domain::generation::{ConditioningUnit, ExtrasOptions};
    use crate::domain::image::{ImageCodec, ImageHandle};
    use crate::infrastructure::adapters::FakeBackend;
    use image::{DynamicImage, Rgb, RgbImage};
    use serde_json::json;

    fn solid(width: u32) -> ImageHandle {
        ImageHandle::new(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            width,
            1,
            Rgb([5, 6, 7]),
        )))
    }

    fn client(backend: Arc<FakeBackend>) -> GenerationClient {
        GenerationClient::new(backend, GenerationDefaults::default())
    }

    #[tokio::test]
    async fn test_txt2img_posts_normalized_payload() {
        let backend = Arc::new(FakeBackend::new());
        backend.on_post(
            "/sdapi/v1/txt2img",
            Ok(json!({
                "images": [ImageCodec::encode_blocking(&solid(4)).unwrap()],
                "parameters": { "prompt": "a fox" },
                "info": "{}"
            })),
        );

        let result = client(backend.clone())
            .txt2img(Txt2ImgOptions {
                controlnet_units: vec![ConditioningUnit::new(solid(1)).with_model("control_canny")],
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(result.image().unwrap().width(), Some(4));
        assert_eq!(result.parameters, json!({ "prompt": "a fox" }));

        let calls = backend.calls();
        assert_eq!(calls.len(), 1);
        let body = calls[0].body.as_ref().unwrap();
        assert_eq!(body["sampler_name"], "Euler a");
        assert_eq!(
            body["alwayson_scripts"]["ControlNet"]["args"][0]["model"],
            "control_canny"
        );
    }

    #[tokio::test]
    async fn test_validation_error_never_reaches_backend() {
        let backend = Arc::new(FakeBackend::new());
        let result = client(backend.clone())
            .extra_batch_images(ExtraBatchOptions {
                images: vec![solid(1)],
                name_list: vec![],
                extras: ExtrasOptions::default(),
            })
            .await;

        assert!(matches!(result, Err(ApplicationError::Validation(_))));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_backend_error_propagates_without_retry() {
        let backend = Arc::new(FakeBackend::new());
        backend.on_post("/sdapi/v1/interrogate", Err(BackendError::Timeout));

        let result = client(backend.clone())
            .interrogate(InterrogateOptions {
                image: solid(1),
                model: None,
            })
            .await;

        assert!(matches!(
            result,
            Err(ApplicationError::Backend(BackendError::Timeout))
        ));
        assert_eq!(backend.call_count("POST", "/sdapi/v1/interrogate"), 1);
    }

    #[tokio::test]
    async fn test_undecodable_reply_is_decode_error() {
        let backend = Arc::new(FakeBackend::new());
        backend.on_post("/sdapi/v1/png-info", Ok(json!({ "images": ["%%%"] })));

        let result = client(backend)
            .png_info(PngInfoOptions { image: solid(1) })
            .await;
        assert!(matches!(result, Err(ApplicationError::Decode(_))));
    }

    #[tokio::test]
    async fn test_detect_uses_controlnet_endpoint() {
        let backend = Arc::new(FakeBackend::new());
        backend.on_post(
            "/controlnet/detect",
            Ok(json!({ "images": [ImageCodec::encode_blocking(&solid(2)).unwrap()], "info": "Success" })),
        );

        let result = client(backend.clone())
            .detect(&ControlNetDetectOptions {
                controlnet_input_images: vec![solid(2)],
                controlnet_module: Some("depth".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(result.images.len(), 1);
        assert_eq!(result.info, json!("Success"));
        let body = backend.calls()[0].body.clone().unwrap();
        assert_eq!(body["controlnet_module"], "depth");
        assert_eq!(body["controlnet_processor_res"], 512);
    }
}
