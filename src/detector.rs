//! Face detection over sampled webcam frames.
//!
//! Runs the UltraFace ONNX model (lightweight and fast) through ort. The
//! model is downloaded on first use and cached in the local data directory.
//! Only detection is performed; the presence monitor cares about the number
//! of faces in a frame, not who they belong to.

use anyhow::{anyhow, Result};
use image::{DynamicImage, GenericImageView};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A face bounding box in frame pixel coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// A detected face with bounding box and confidence
#[derive(Debug, Clone)]
pub struct DetectedFace {
    pub bbox: BoundingBox,
    pub confidence: f32,
}

/// Per-frame face detection. Implementations must be callable from a
/// blocking worker thread.
pub trait FaceDetector: Send + Sync {
    fn detect(&self, frame: &DynamicImage) -> Result<Vec<DetectedFace>>;
}

/// UltraFace (version-RFB-320) detector.
pub struct UltraFaceDetector {
    session: Mutex<Session>,
}

const ULTRAFACE_FILENAME: &str = "ultraface-320.onnx";
const ULTRAFACE_URL: &str = "https://github.com/onnx/models/raw/main/validated/vision/body_analysis/ultraface/models/version-RFB-320.onnx";

impl UltraFaceDetector {
    /// Load the detector, downloading the model into `models_dir` if it is
    /// not cached yet.
    pub fn load(models_dir: &Path) -> Result<Self> {
        let model_path = ensure_model(models_dir, ULTRAFACE_FILENAME, ULTRAFACE_URL)?;

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(&model_path)?;

        Ok(Self {
            session: Mutex::new(session),
        })
    }
}

impl FaceDetector for UltraFaceDetector {
    fn detect(&self, frame: &DynamicImage) -> Result<Vec<DetectedFace>> {
        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow!("Failed to lock detection session: {}", e))?;
        run_ultraface_detection(&mut session, frame)
    }
}

/// Download a model file if it doesn't exist
fn ensure_model(models_dir: &Path, filename: &str, url: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(models_dir)?;
    let model_path = models_dir.join(filename);

    if !model_path.exists() {
        tracing::info!(model = %filename, "Downloading model...");
        let response = ureq::get(url)
            .call()
            .map_err(|e| anyhow!("Failed to download model: {}", e))?;

        // Stream into a scratch file and rename on success, so an
        // interrupted download never passes the cache check above.
        let partial_path = models_dir.join(format!("{}.partial", filename));
        if let Err(err) = write_stream(&partial_path, &mut response.into_reader()) {
            let _ = std::fs::remove_file(&partial_path);
            return Err(err);
        }
        std::fs::rename(&partial_path, &model_path)?;
        tracing::info!(model = %filename, path = ?model_path, "Model downloaded");
    }

    Ok(model_path)
}

fn write_stream(path: &Path, reader: &mut dyn std::io::Read) -> Result<()> {
    let mut file = std::fs::File::create(path)?;
    std::io::copy(reader, &mut file)?;
    Ok(())
}

/// Run UltraFace detection over one frame.
fn run_ultraface_detection(session: &mut Session, img: &DynamicImage) -> Result<Vec<DetectedFace>> {
    const INPUT_WIDTH: u32 = 320;
    const INPUT_HEIGHT: u32 = 240;
    const CONFIDENCE_THRESHOLD: f32 = 0.7;
    const NMS_THRESHOLD: f32 = 0.3;

    let (orig_width, orig_height) = img.dimensions();

    // Resize image to model input size (use Triangle/bilinear for speed)
    let resized = img.resize_exact(
        INPUT_WIDTH,
        INPUT_HEIGHT,
        image::imageops::FilterType::Triangle,
    );
    let rgb = resized.to_rgb8();

    // Convert to tensor (NCHW format, normalized)
    let mut input_data = vec![0.0f32; (3 * INPUT_HEIGHT * INPUT_WIDTH) as usize];

    for y in 0..INPUT_HEIGHT as usize {
        for x in 0..INPUT_WIDTH as usize {
            let pixel = rgb.get_pixel(x as u32, y as u32);
            let idx = y * INPUT_WIDTH as usize + x;
            input_data[idx] = (pixel[0] as f32 - 127.0) / 128.0; // R
            input_data[INPUT_HEIGHT as usize * INPUT_WIDTH as usize + idx] =
                (pixel[1] as f32 - 127.0) / 128.0; // G
            input_data[2 * INPUT_HEIGHT as usize * INPUT_WIDTH as usize + idx] =
                (pixel[2] as f32 - 127.0) / 128.0; // B
        }
    }

    let input_tensor = Tensor::from_array((
        [1usize, 3, INPUT_HEIGHT as usize, INPUT_WIDTH as usize],
        input_data.into_boxed_slice(),
    ))?;

    let outputs = session.run(ort::inputs!["input" => input_tensor])?;

    // UltraFace outputs: scores [1, num_anchors, 2] and boxes
    // [1, num_anchors, 4] with normalized (x1, y1, x2, y2)
    let scores_value = outputs
        .get("scores")
        .ok_or_else(|| anyhow!("No scores output"))?;
    let boxes_value = outputs
        .get("boxes")
        .ok_or_else(|| anyhow!("No boxes output"))?;

    let (scores_shape, scores_data) = scores_value.try_extract_tensor::<f32>()?;
    let (_boxes_shape, boxes_data) = boxes_value.try_extract_tensor::<f32>()?;

    let mut faces = Vec::new();
    let num_anchors = scores_shape[1] as usize;

    for i in 0..num_anchors {
        let confidence = scores_data[i * 2 + 1]; // Face confidence (class 1)

        if confidence > CONFIDENCE_THRESHOLD {
            let x1 = (boxes_data[i * 4] * orig_width as f32) as i32;
            let y1 = (boxes_data[i * 4 + 1] * orig_height as f32) as i32;
            let x2 = (boxes_data[i * 4 + 2] * orig_width as f32) as i32;
            let y2 = (boxes_data[i * 4 + 3] * orig_height as f32) as i32;

            faces.push(DetectedFace {
                bbox: BoundingBox {
                    x: x1.max(0),
                    y: y1.max(0),
                    width: (x2 - x1).max(1),
                    height: (y2 - y1).max(1),
                },
                confidence,
            });
        }
    }

    Ok(nms(faces, NMS_THRESHOLD))
}

/// Non-maximum suppression to remove overlapping detections
fn nms(mut faces: Vec<DetectedFace>, threshold: f32) -> Vec<DetectedFace> {
    // Sort by confidence descending
    faces.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; faces.len()];

    for i in 0..faces.len() {
        if suppressed[i] {
            continue;
        }

        keep.push(faces[i].clone());

        for j in (i + 1)..faces.len() {
            if suppressed[j] {
                continue;
            }

            if compute_iou(&faces[i].bbox, &faces[j].bbox) > threshold {
                suppressed[j] = true;
            }
        }
    }

    keep
}

/// Compute Intersection over Union between two bounding boxes
fn compute_iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    let intersection = ((x2 - x1).max(0) * (y2 - y1).max(0)) as f32;
    let area_a = (a.width * a.height) as f32;
    let area_b = (b.width * b.height) as f32;
    let union = area_a + area_b - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

#[cfg(test)]
pub mod scripted {
    //! Detector double that replays a fixed sequence of face counts.

    use super::{BoundingBox, DetectedFace, FaceDetector};
    use anyhow::{anyhow, Result};
    use image::DynamicImage;
    use std::sync::Mutex;

    /// Each entry is the number of faces to report for one frame; `None`
    /// makes that sample fail, for the skip-on-error path.
    pub struct ScriptedDetector {
        counts: Mutex<Vec<Option<usize>>>,
        cursor: Mutex<usize>,
    }

    impl ScriptedDetector {
        pub fn new(counts: Vec<Option<usize>>) -> Self {
            Self {
                counts: Mutex::new(counts),
                cursor: Mutex::new(0),
            }
        }
    }

    impl FaceDetector for ScriptedDetector {
        fn detect(&self, _frame: &DynamicImage) -> Result<Vec<DetectedFace>> {
            let counts = self.counts.lock().unwrap();
            let mut cursor = self.cursor.lock().unwrap();
            let entry = counts.get(*cursor).copied().unwrap_or(Some(0));
            *cursor += 1;

            match entry {
                Some(n) => Ok((0..n)
                    .map(|i| DetectedFace {
                        bbox: BoundingBox {
                            x: 10 + 40 * i as i32,
                            y: 10,
                            width: 32,
                            height: 32,
                        },
                        confidence: 0.9,
                    })
                    .collect()),
                None => Err(anyhow!("inference failed")),
            }
        }
    }
}
