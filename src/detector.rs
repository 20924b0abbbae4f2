use crate::backend::Detector;
use crate::config::DetectionParams;
use crate::error::CaptureError;
use crate::models::ModelRef;
use opencv::core::{Rect, Scalar, Size, Vector};
use opencv::prelude::*;
use opencv::{imgproc, objdetect};

pub const REGION_THICKNESS: i32 = 2;

/// Outline color in BGR order.
pub fn region_color() -> Scalar {
    Scalar::new(0.0, 255.0, 0.0, 0.0)
}

/// A rectangle reported by the classifier, in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Region {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Intersects the region with a `frame_width` x `frame_height` frame.
    /// Returns `None` when nothing of it lies inside.
    pub fn clip_to(&self, frame_width: i32, frame_height: i32) -> Option<Region> {
        let left = self.x.max(0);
        let top = self.y.max(0);
        let right = self.x.saturating_add(self.width).min(frame_width);
        let bottom = self.y.saturating_add(self.height).min(frame_height);
        if right <= left || bottom <= top {
            return None;
        }
        Some(Region::new(left, top, right - left, bottom - top))
    }
}

impl From<Rect> for Region {
    fn from(rect: Rect) -> Self {
        Region::new(rect.x, rect.y, rect.width, rect.height)
    }
}

impl From<Region> for Rect {
    fn from(region: Region) -> Self {
        Rect::new(region.x, region.y, region.width, region.height)
    }
}

pub struct CascadeDetector {
    classifier: objdetect::CascadeClassifier,
    params: DetectionParams,
}

impl CascadeDetector {
    pub fn new(model: &ModelRef, params: DetectionParams) -> anyhow::Result<Self> {
        let load_error = |reason: String| CaptureError::ModelLoad {
            path: model.path.clone(),
            reason,
        };
        let path = model
            .path
            .to_str()
            .ok_or_else(|| load_error("path is not valid utf-8".to_owned()))?;
        let classifier =
            objdetect::CascadeClassifier::new(path).map_err(|e| load_error(e.to_string()))?;
        if classifier.empty()? {
            return Err(load_error("cascade is empty".to_owned()).into());
        }
        Ok(Self { classifier, params })
    }
}

impl Detector for CascadeDetector {
    fn detect(&mut self, image: &Mat) -> anyhow::Result<Vec<Region>> {
        let mut found = Vector::<Rect>::new();

        self.classifier.detect_multi_scale(
            image,
            &mut found,
            self.params.scale_factor,
            self.params.min_neighbors,
            0,
            Size::new(self.params.min_size, self.params.min_size),
            Size::new(0, 0),
        )?;
        Ok(found.iter().map(Region::from).collect())
    }
}

pub fn convert_to_grayscale(image: &Mat) -> anyhow::Result<Mat> {
    let mut gray: Mat = Mat::default();
    imgproc::cvt_color_def(image, &mut gray, imgproc::COLOR_BGR2GRAY)?;
    Ok(gray)
}

/// Outlines every region on `frame`, clipped to its bounds.
/// Returns how many outlines were drawn.
pub fn draw_regions(frame: &mut Mat, regions: &[Region]) -> anyhow::Result<usize> {
    let (width, height) = (frame.cols(), frame.rows());
    let mut drawn = 0;
    for region in regions.iter().filter_map(|r| r.clip_to(width, height)) {
        imgproc::rectangle(
            frame,
            region.into(),
            region_color(),
            REGION_THICKNESS,
            imgproc::LINE_8,
            0,
        )?;
        drawn += 1;
    }
    Ok(drawn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{self, Vec3b};

    #[test]
    fn region_inside_frame_is_untouched() {
        let region = Region::new(10, 20, 30, 40);
        assert_eq!(region.clip_to(640, 480), Some(region));
    }

    #[test]
    fn region_crossing_edges_is_clipped() {
        assert_eq!(
            Region::new(-10, -5, 50, 50).clip_to(640, 480),
            Some(Region::new(0, 0, 40, 45))
        );
        assert_eq!(
            Region::new(600, 450, 100, 100).clip_to(640, 480),
            Some(Region::new(600, 450, 40, 30))
        );
    }

    #[test]
    fn region_outside_frame_is_dropped() {
        assert_eq!(Region::new(700, 10, 20, 20).clip_to(640, 480), None);
        assert_eq!(Region::new(-30, 10, 30, 20).clip_to(640, 480), None);
        assert_eq!(Region::new(10, 10, 0, 20).clip_to(640, 480), None);
    }

    #[test]
    fn draw_regions_paints_green_outline() {
        let mut frame =
            Mat::new_rows_cols_with_default(100, 100, core::CV_8UC3, Scalar::all(0.0)).unwrap();
        let drawn = draw_regions(
            &mut frame,
            &[Region::new(10, 10, 20, 20), Region::new(500, 500, 5, 5)],
        )
        .unwrap();
        assert_eq!(drawn, 1);

        let corner = *frame.at_2d::<Vec3b>(10, 10).unwrap();
        assert_eq!(corner.0, [0, 255, 0]);
        let center = *frame.at_2d::<Vec3b>(20, 20).unwrap();
        assert_eq!(center.0, [0, 0, 0]);
    }

    #[test]
    fn draw_regions_clips_at_frame_edge() {
        let mut frame =
            Mat::new_rows_cols_with_default(50, 50, core::CV_8UC3, Scalar::all(0.0)).unwrap();
        let drawn = draw_regions(&mut frame, &[Region::new(40, 40, 30, 30)]).unwrap();
        assert_eq!(drawn, 1);
        let edge = *frame.at_2d::<Vec3b>(49, 45).unwrap();
        assert_eq!(edge.0, [0, 255, 0]);
    }

    #[test]
    fn grayscale_has_single_channel() {
        let frame =
            Mat::new_rows_cols_with_default(8, 8, core::CV_8UC3, Scalar::all(128.0)).unwrap();
        let gray = convert_to_grayscale(&frame).unwrap();
        assert_eq!(gray.channels(), 1);
        assert_eq!((gray.cols(), gray.rows()), (8, 8));
    }
}
