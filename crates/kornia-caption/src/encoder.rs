use candle_core::{DType, Device, Module, Tensor};
use image::imageops::FilterType;

use crate::error::CaptionError;

// ImageNet mean and std for normalization
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Input resolution of the Inception image encoder.
pub const INCEPTION_INPUT_SIZE: u32 = 299;

/// A pretrained image-to-embedding model.
///
/// Given a preprocessed image tensor it returns a fixed-shape embedding that seeds
/// the language model state.
pub trait ImageEncoder {
    /// Encode a preprocessed image tensor into an embedding.
    fn encode(&self, image: &Tensor) -> candle_core::Result<Tensor>;
}

/// Adapts any candle [`Module`] into an [`ImageEncoder`].
pub struct ModuleEncoder<M: Module>(pub M);

impl<M: Module> ImageEncoder for ModuleEncoder<M> {
    fn encode(&self, image: &Tensor) -> candle_core::Result<Tensor> {
        self.0.forward(image)
    }
}

/// Converts encoded images into the normalized tensors expected by the encoder.
#[derive(Clone, Debug)]
pub struct ImagePreprocessor {
    /// The side of the square the image is resized to.
    pub size: u32,
    /// Per-channel mean subtracted after scaling to `[0, 1]`.
    pub mean: [f32; 3],
    /// Per-channel standard deviation dividing the centered values.
    pub std: [f32; 3],
    device: Device,
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new(INCEPTION_INPUT_SIZE, Device::Cpu)
    }
}

impl ImagePreprocessor {
    /// Create a preprocessor with the ImageNet normalization statistics.
    pub fn new(size: u32, device: Device) -> Self {
        Self {
            size,
            mean: MEAN,
            std: STD,
            device,
        }
    }

    #[inline]
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Decode an encoded image (jpeg, png, ..) and preprocess it.
    ///
    /// # Returns
    ///
    /// * `tensor` - The normalized f32 tensor with shape `[1, 3, size, size]`.
    /// * `size` - The `(width, height)` of the decoded image before resizing.
    pub fn process_bytes(&self, bytes: &[u8]) -> Result<(Tensor, (u32, u32)), CaptionError> {
        let img = image::load_from_memory(bytes)?.to_rgb8();
        let size = img.dimensions();
        Ok((self.process(&img)?, size))
    }

    /// Preprocess an rgb8 image into a tensor with shape `[1, 3, size, size]`.
    pub fn process(&self, img: &image::RgbImage) -> Result<Tensor, CaptionError> {
        if self.size == 0 {
            return Err(CaptionError::InvalidParameter(
                "preprocessor size must be positive".to_string(),
            ));
        }

        let resized = image::imageops::resize(img, self.size, self.size, FilterType::Triangle);

        let side = self.size as usize;
        let image_t = Tensor::from_vec(resized.into_raw(), (side, side, 3), &self.device)?
            .permute((2, 0, 1))?
            .to_dtype(DType::F32)?;

        // rescaling and normalizing
        let m = Tensor::from_slice(&self.mean, (3, 1, 1), &self.device)?;
        let s = Tensor::from_slice(&self.std, (3, 1, 1), &self.device)?;
        let image_t = (image_t / 255.0)?
            .broadcast_sub(&m)?
            .broadcast_div(&s)?
            .unsqueeze(0)?;

        Ok(image_t)
    }
}
