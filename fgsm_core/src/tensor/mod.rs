pub mod image_tensor;

pub use image_tensor::{ImageTensor, TensorStatistics, CHANNELS};
