//! Storage Adapter - 结果图像存储实现

mod file_image_store;

pub use file_image_store::FileImageStore;
