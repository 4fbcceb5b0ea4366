use crate::common::{Config, Result, WatcherError};
use crate::core::detector::FaceBox;
use crate::core::extractor::build_session;
use ort::{Environment, Session, Value};
use std::path::Path;
use std::sync::Arc;
use image::{DynamicImage, imageops::FilterType};
use ndarray::{Array4, CowArray};

/// Fixed-length face descriptor compared by distance.
pub type Encoding = Vec<f32>;

pub struct FaceRecognizer {
    session: Session,
    input_size: u32,
    normalization_value: f32,
}

impl FaceRecognizer {
    pub fn new(config: &Config, environment: &Arc<Environment>, models_base: &Path) -> Result<Self> {
        let mut model_path = config.models.recognizer_path.clone();
        if model_path.is_relative() {
            model_path = models_base.join(&model_path);
        }

        if !model_path.exists() {
            return Err(WatcherError::Model(
                format!("Recognition model not found at: {:?}", model_path)
            ));
        }

        let session = build_session(environment, &model_path, config.performance.optimization_level)?;

        Ok(Self {
            session,
            input_size: config.recognizer.input_size,
            normalization_value: config.recognizer.normalization_value,
        })
    }

    /// Unit-length encoding of the face inside `face`.
    pub fn get_encoding(&self, image: &DynamicImage, face: &FaceBox) -> Result<Encoding> {
        let face_img = crop_face(image, face);
        let resized = face_img.resize_exact(self.input_size, self.input_size, FilterType::Triangle);

        let input_array = self.preprocess_face(&resized);
        let cow_array = CowArray::from(input_array.into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;

        let outputs = self.session.run(vec![input_tensor])?;
        let Some(first) = outputs.first() else {
            return Err(WatcherError::Model("Recognizer produced no output".into()));
        };

        let mut encoding = first.try_extract::<f32>()?.view().to_owned().into_raw_vec();
        l2_normalize(&mut encoding);
        Ok(encoding)
    }

    fn preprocess_face(&self, img: &DynamicImage) -> Array4<f32> {
        // Single channel model
        let gray = img.to_luma8();
        let size = self.input_size as usize;
        let norm_val = self.normalization_value;
        let mut array = Array4::<f32>::zeros((1, 1, size, size));

        for (x, y, pixel) in gray.enumerate_pixels() {
            array[[0, 0, y as usize, x as usize]] = (pixel[0] as f32 - norm_val) / norm_val;
        }

        array
    }
}

fn crop_face(image: &DynamicImage, face: &FaceBox) -> DynamicImage {
    let x = face.x1.max(0.0) as u32;
    let y = face.y1.max(0.0) as u32;
    let width = (face.x2 - face.x1).max(1.0) as u32;
    let height = (face.y2 - face.y1).max(1.0) as u32;

    image.crop_imm(x, y, width, height)
}

/// Scale to unit length so Euclidean distance tracks cosine similarity.
pub fn l2_normalize(values: &mut [f32]) {
    let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in values.iter_mut() {
            *value /= norm;
        }
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
