//! Debug overlays drawn into the caller's frame

use face_detect::FaceRegion;
use image::Rgb;
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use video_frame::VideoFrame;

use crate::analysis::FaceObservation;

pub const FACE_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
pub const EYE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

const THICKNESS: u32 = 2;

/// Draw face boxes (blue) and eye boxes (green) in place.
/// Gray frames are promoted to RGB so the colours survive.
pub fn draw_observations(frame: &mut VideoFrame, observations: &[FaceObservation]) {
    if observations.is_empty() {
        return;
    }
    let Some(mut canvas) = frame.rgb_view_mut() else {
        return;
    };
    for observation in observations {
        for eye in &observation.eyes {
            draw_box(&mut canvas, eye, EYE_COLOR);
        }
        draw_box(&mut canvas, &observation.face, FACE_COLOR);
    }
}

fn draw_box<I>(canvas: &mut I, region: &FaceRegion, color: Rgb<u8>)
where
    I: image::GenericImage<Pixel = Rgb<u8>>,
{
    for inset in 0..THICKNESS {
        let width = region.width.saturating_sub(2 * inset);
        let height = region.height.saturating_sub(2 * inset);
        if width == 0 || height == 0 {
            break;
        }
        let rect = Rect::at((region.x + inset) as i32, (region.y + inset) as i32).of_size(width, height);
        draw_hollow_rect_mut(canvas, rect, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eyes::EyeAssessment;
    use image::GrayImage;

    #[test]
    fn test_boxes_drawn_in_place() {
        let mut frame = VideoFrame::from_gray(GrayImage::new(40, 40));
        let observation = FaceObservation {
            face: FaceRegion::new(5, 5, 30, 30),
            eyes: vec![FaceRegion::new(10, 10, 6, 6)],
            assessment: EyeAssessment::SingleEye,
        };
        draw_observations(&mut frame, &[observation]);

        assert_eq!(frame.get_pixel(5, 5), Some([0, 0, 255]));
        assert_eq!(frame.get_pixel(6, 20), Some([0, 0, 255]));
        assert_eq!(frame.get_pixel(10, 12), Some([0, 255, 0]));
        assert_eq!(frame.get_pixel(20, 20), Some([0, 0, 0]));
    }

    #[test]
    fn test_nothing_drawn_without_faces() {
        let mut frame = VideoFrame::from_gray(GrayImage::new(8, 8));
        let before = frame.clone();
        draw_observations(&mut frame, &[]);
        assert_eq!(frame.data, before.data);
    }
}
