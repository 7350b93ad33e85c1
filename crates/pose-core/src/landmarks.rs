//! Named body landmarks and the per-frame landmark set produced by detectors.

use crate::geometry::Point2D;

use BodyLandmark as L;

/// Body landmark indices following the 33-point BlazePose topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BodyLandmark {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl BodyLandmark {
    pub const COUNT: usize = 33;

    pub const ALL: [BodyLandmark; Self::COUNT] = [
        Self::Nose,
        Self::LeftEyeInner,
        Self::LeftEye,
        Self::LeftEyeOuter,
        Self::RightEyeInner,
        Self::RightEye,
        Self::RightEyeOuter,
        Self::LeftEar,
        Self::RightEar,
        Self::MouthLeft,
        Self::MouthRight,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftWrist,
        Self::RightWrist,
        Self::LeftPinky,
        Self::RightPinky,
        Self::LeftIndex,
        Self::RightIndex,
        Self::LeftThumb,
        Self::RightThumb,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
        Self::LeftAnkle,
        Self::RightAnkle,
        Self::LeftHeel,
        Self::RightHeel,
        Self::LeftFootIndex,
        Self::RightFootIndex,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// Edges drawn when rendering the skeleton overlay.
pub const SKELETON: &[(BodyLandmark, BodyLandmark)] = &[
    (L::Nose, L::LeftEyeInner),
    (L::LeftEyeInner, L::LeftEye),
    (L::LeftEye, L::LeftEyeOuter),
    (L::LeftEyeOuter, L::LeftEar),
    (L::Nose, L::RightEyeInner),
    (L::RightEyeInner, L::RightEye),
    (L::RightEye, L::RightEyeOuter),
    (L::RightEyeOuter, L::RightEar),
    (L::MouthLeft, L::MouthRight),
    (L::LeftShoulder, L::RightShoulder),
    (L::LeftShoulder, L::LeftElbow),
    (L::LeftElbow, L::LeftWrist),
    (L::LeftWrist, L::LeftPinky),
    (L::LeftWrist, L::LeftIndex),
    (L::LeftWrist, L::LeftThumb),
    (L::LeftPinky, L::LeftIndex),
    (L::RightShoulder, L::RightElbow),
    (L::RightElbow, L::RightWrist),
    (L::RightWrist, L::RightPinky),
    (L::RightWrist, L::RightIndex),
    (L::RightWrist, L::RightThumb),
    (L::RightPinky, L::RightIndex),
    (L::LeftShoulder, L::LeftHip),
    (L::RightShoulder, L::RightHip),
    (L::LeftHip, L::RightHip),
    (L::LeftHip, L::LeftKnee),
    (L::LeftKnee, L::LeftAnkle),
    (L::LeftAnkle, L::LeftHeel),
    (L::LeftHeel, L::LeftFootIndex),
    (L::LeftAnkle, L::LeftFootIndex),
    (L::RightHip, L::RightKnee),
    (L::RightKnee, L::RightAnkle),
    (L::RightAnkle, L::RightHeel),
    (L::RightHeel, L::RightFootIndex),
    (L::RightAnkle, L::RightFootIndex),
];

/// Landmarks located in a single frame.
///
/// Landmarks the detector did not report are absent rather than defaulted, so
/// callers never mix coordinates from different frames.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: [Option<Point2D>; BodyLandmark::COUNT],
}

impl Default for LandmarkSet {
    fn default() -> Self {
        Self {
            points: [None; BodyLandmark::COUNT],
        }
    }
}

impl LandmarkSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, landmark: BodyLandmark, point: Point2D) {
        self.points[landmark.index()] = Some(point);
    }

    pub fn with(mut self, landmark: BodyLandmark, point: Point2D) -> Self {
        self.insert(landmark, point);
        self
    }

    pub fn get(&self, landmark: BodyLandmark) -> Option<Point2D> {
        self.points[landmark.index()]
    }

    pub fn len(&self) -> usize {
        self.points.iter().filter(|p| p.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.points.iter().all(Option::is_none)
    }

    pub fn iter(&self) -> impl Iterator<Item = (BodyLandmark, Point2D)> + '_ {
        BodyLandmark::ALL
            .iter()
            .zip(self.points.iter())
            .filter_map(|(landmark, point)| point.map(|p| (*landmark, p)))
    }

    /// Shoulder, elbow, and wrist of the left arm, when all three were found.
    pub fn left_arm(&self) -> Option<(Point2D, Point2D, Point2D)> {
        Some((
            self.get(BodyLandmark::LeftShoulder)?,
            self.get(BodyLandmark::LeftElbow)?,
            self.get(BodyLandmark::LeftWrist)?,
        ))
    }
}

impl FromIterator<(BodyLandmark, Point2D)> for LandmarkSet {
    fn from_iter<I: IntoIterator<Item = (BodyLandmark, Point2D)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (landmark, point) in iter {
            set.insert(landmark, point);
        }
        set
    }
}
