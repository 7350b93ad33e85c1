//! TorchScript single-pose detector.
//!
//! Expects a MoveNet-style module taking an `[1, H, W, 3]` float tensor in
//! `0..=255` and returning `[1, 1, 17, 3]` keypoints as `(y, x, score)` in
//! normalized coordinates, COCO ordering.

use std::{convert::TryFrom, path::Path};

use anyhow::{Result, bail};
use image::{RgbImage, imageops::FilterType};
use tch::{self, Device, Kind, Tensor};

use crate::{
    detector::LandmarkDetector,
    geometry::Point2D,
    landmarks::{BodyLandmark, LandmarkSet},
};

const COCO_KEYPOINTS: [BodyLandmark; 17] = [
    BodyLandmark::Nose,
    BodyLandmark::LeftEye,
    BodyLandmark::RightEye,
    BodyLandmark::LeftEar,
    BodyLandmark::RightEar,
    BodyLandmark::LeftShoulder,
    BodyLandmark::RightShoulder,
    BodyLandmark::LeftElbow,
    BodyLandmark::RightElbow,
    BodyLandmark::LeftWrist,
    BodyLandmark::RightWrist,
    BodyLandmark::LeftHip,
    BodyLandmark::RightHip,
    BodyLandmark::LeftKnee,
    BodyLandmark::RightKnee,
    BodyLandmark::LeftAnkle,
    BodyLandmark::RightAnkle,
];

pub struct TorchPoseDetector {
    module: tch::CModule,
    device: Device,
    input_size: (u32, u32),
    min_confidence: f32,
}

impl TorchPoseDetector {
    /// Load a TorchScript module onto `device`. `input_size` is (width, height).
    pub fn new<P: AsRef<Path>>(model_path: P, device: Device, input_size: (u32, u32)) -> Result<Self> {
        let module = tch::CModule::load_on_device(model_path, device)?;
        Ok(Self {
            module,
            device,
            input_size,
            min_confidence: 0.5,
        })
    }

    pub fn with_min_confidence(mut self, confidence: f32) -> Self {
        self.min_confidence = confidence;
        self
    }

    pub fn device(&self) -> Device {
        self.device
    }

    fn to_tensor(&self, image: &RgbImage) -> Tensor {
        let (in_w, in_h) = self.input_size;
        let resized = if image.dimensions() == (in_w, in_h) {
            image.clone()
        } else {
            image::imageops::resize(image, in_w, in_h, FilterType::Triangle)
        };
        Tensor::from_slice(resized.as_raw())
            .to_device(self.device)
            .to_kind(Kind::Float)
            .view([1, in_h as i64, in_w as i64, 3])
    }
}

impl LandmarkDetector for TorchPoseDetector {
    fn detect(&mut self, image: &RgbImage) -> Result<Option<LandmarkSet>> {
        let input = self.to_tensor(image);
        let output = self.module.forward_ts(&[input])?;
        let shape = output.size();
        if shape.iter().product::<i64>() != 17 * 3 {
            bail!("unexpected pose output shape: {shape:?}");
        }

        let flat = output.to_device(Device::Cpu).to_kind(Kind::Float).flatten(0, -1);
        let values: Vec<f32> = Vec::<f32>::try_from(&flat)?;

        let mut set = LandmarkSet::new();
        let mut score_sum = 0.0;
        for (landmark, keypoint) in COCO_KEYPOINTS.iter().zip(values.chunks_exact(3)) {
            let (y, x, score) = (keypoint[0], keypoint[1], keypoint[2]);
            score_sum += score;
            if score >= self.min_confidence {
                set.insert(*landmark, Point2D::new(x, y));
            }
        }

        let mean_score = score_sum / COCO_KEYPOINTS.len() as f32;
        if mean_score < self.min_confidence || set.is_empty() {
            return Ok(None);
        }
        Ok(Some(set))
    }

    fn name(&self) -> &str {
        "torchscript"
    }
}
