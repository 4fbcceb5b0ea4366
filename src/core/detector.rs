use crate::common::{Config, Result, WatcherError};
use crate::core::extractor::build_session;
use ort::{Environment, Session, Value};
use std::path::Path;
use std::sync::Arc;
use image::{DynamicImage, imageops::FilterType};
use ndarray::{Array4, CowArray};

/// IoU above which overlapping detections are merged.
const NMS_IOU_THRESHOLD: f32 = 0.45;
/// Detections are returned best-first and capped at this count.
const MAX_FACES: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct FaceBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
}

impl FaceBox {
    pub fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }
}

/// YOLOv8-style single class face detector.
pub struct FaceDetector {
    session: Session,
    input_width: u32,
    input_height: u32,
    confidence: f32,
}

impl FaceDetector {
    pub fn new(config: &Config, environment: &Arc<Environment>, models_base: &Path) -> Result<Self> {
        let mut model_path = config.models.detector_path.clone();
        if model_path.is_relative() {
            model_path = models_base.join(&model_path);
        }

        if !model_path.exists() {
            return Err(WatcherError::Model(
                format!("Detector model not found at: {:?}", model_path)
            ));
        }

        let session = build_session(environment, &model_path, config.performance.optimization_level)?;

        Ok(Self {
            session,
            input_width: config.detector.input_width,
            input_height: config.detector.input_height,
            confidence: config.detector.confidence,
        })
    }

    pub fn detect(&self, image: &DynamicImage) -> Result<Vec<FaceBox>> {
        let orig_width = image.width() as f32;
        let orig_height = image.height() as f32;

        let img_array = if image.width() == self.input_width && image.height() == self.input_height {
            self.image_to_array(image)
        } else {
            let resized = image.resize_exact(self.input_width, self.input_height, FilterType::Nearest);
            self.image_to_array(&resized)
        };

        let cow_array = CowArray::from(img_array.into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;
        let outputs = self.session.run(vec![input_tensor])?;

        let Some(first) = outputs.first() else {
            return Ok(Vec::new());
        };
        let output = first.try_extract::<f32>()?.view().to_owned();
        let shape = output.shape().to_vec();
        let data = output
            .as_slice()
            .ok_or_else(|| WatcherError::Model("Detector output is not contiguous".into()))?;

        let mut faces = decode_predictions(
            data,
            &shape,
            self.input_width as f32,
            self.input_height as f32,
        );

        // Merge duplicates on the low-confidence set, then apply the real threshold
        faces = non_max_suppression(faces, NMS_IOU_THRESHOLD);
        faces.retain(|face| face.confidence >= self.confidence);
        faces.truncate(MAX_FACES);

        let scale_x = orig_width / self.input_width as f32;
        let scale_y = orig_height / self.input_height as f32;
        for face in &mut faces {
            face.x1 *= scale_x;
            face.x2 *= scale_x;
            face.y1 *= scale_y;
            face.y2 *= scale_y;
        }

        Ok(faces)
    }

    fn image_to_array(&self, img: &DynamicImage) -> Array4<f32> {
        // Camera frames arrive in colour; the model was trained on grayscale replicated to 3 channels
        let gray = img.to_luma8();
        let width = img.width() as usize;
        let height = img.height() as usize;
        let mut array = Array4::<f32>::zeros((1, 3, height, width));

        let norm_factor = 1.0 / 255.0;
        for (x, y, pixel) in gray.enumerate_pixels() {
            let value = pixel[0] as f32 * norm_factor;
            let (x, y) = (x as usize, y as usize);
            array[[0, 0, y, x]] = value;
            array[[0, 1, y, x]] = value;
            array[[0, 2, y, x]] = value;
        }

        array
    }
}

/// Turn a raw `[1, N, 5]` or transposed `[1, 5, N]` prediction tensor into boxes
/// in model input coordinates.
pub fn decode_predictions(data: &[f32], shape: &[usize], input_width: f32, input_height: f32) -> Vec<FaceBox> {
    let is_field_count = |n: usize| (4..=10).contains(&n);
    let (num_predictions, prediction_length, is_transposed) = match shape.len() {
        3 if is_field_count(shape[2]) => (shape[1], shape[2], false),
        3 if is_field_count(shape[1]) => (shape[2], shape[1], true),
        3 => (shape[1], shape[2], false),
        2 => (shape[0], shape[1], false),
        _ => {
            tracing::warn!("Unexpected detector output shape: {:?}", shape);
            return Vec::new();
        }
    };

    if prediction_length < 4 || data.len() < num_predictions * prediction_length {
        tracing::warn!("Detector output too short for shape {:?}", shape);
        return Vec::new();
    }

    let at = |i: usize, field: usize| -> f32 {
        if field >= prediction_length {
            return 0.0;
        }
        if is_transposed {
            data[field * num_predictions + i]
        } else {
            data[i * prediction_length + field]
        }
    };

    let mut faces = Vec::new();
    for i in 0..num_predictions {
        let (cx, cy, w, h, confidence) = (at(i, 0), at(i, 1), at(i, 2), at(i, 3), at(i, 4));

        // Some exports emit normalised coordinates
        let scale = if cx > 1.0 || cy > 1.0 || w > 1.0 || h > 1.0 { 1.0 } else { input_width };
        let (cx, cy, w, h) = (cx * scale, cy * scale, w * scale, h * scale);

        if confidence <= 0.001 {
            continue;
        }

        let x1 = (cx - w / 2.0).max(0.0);
        let y1 = (cy - h / 2.0).max(0.0);
        let x2 = (cx + w / 2.0).min(input_width);
        let y2 = (cy + h / 2.0).min(input_height);

        if x2 > x1 && y2 > y1 && (x2 - x1) > 10.0 && (y2 - y1) > 10.0 {
            faces.push(FaceBox { x1, y1, x2, y2, confidence });
        }
    }

    faces
}

/// Greedy NMS. The result is ordered by descending confidence.
pub fn non_max_suppression(mut boxes: Vec<FaceBox>, iou_threshold: f32) -> Vec<FaceBox> {
    boxes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<FaceBox> = Vec::new();
    for candidate in boxes {
        if keep.iter().all(|kept| iou(kept, &candidate) < iou_threshold) {
            keep.push(candidate);
        }
    }
    keep
}

fn iou(a: &FaceBox, b: &FaceBox) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.area() + b.area() - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}
