//! End-to-end enrollment and matching over encoded frames.

use std::io::Cursor;

use driver_auth::{
    AuthModule, AuthResult, CaptureOutcome, StoredRecord, VerificationAttempt,
    VerificationStatus, MIN_ENROLL_SAMPLES,
};
use face_detect::testing::FixedDetector;
use face_detect::{FaceLocalizer, FaceRegion};
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use video_frame::VideoFrame;

const FACE: FaceRegion = FaceRegion {
    x: 32,
    y: 24,
    width: 96,
    height: 96,
};

fn texture(seed: u64) -> impl Fn(u32, u32) -> u8 {
    move |x, y| {
        let mut h = (x as u64) << 32 | y as u64;
        h ^= seed.wrapping_mul(0x9E37_79B9_7F4A_7C15);
        h = h.wrapping_mul(0xBF58_476D_1CE4_E5B9);
        h ^= h >> 31;
        (h >> 24) as u8
    }
}

/// PNG-encoded camera frame with a textured face box, decoded like a real capture
fn capture(face: impl Fn(u32, u32) -> u8) -> VideoFrame {
    let image = GrayImage::from_fn(160, 144, |x, y| {
        let inside = x >= FACE.x && x < FACE.right() && y >= FACE.y && y < FACE.bottom();
        Luma([if inside { face(x - FACE.x, y - FACE.y) } else { 110 }])
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageLuma8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    VideoFrame::decode(&bytes).unwrap()
}

fn auth() -> AuthModule {
    AuthModule::new(FaceLocalizer::new(FixedDetector::new(vec![FACE])))
}

fn enroll(auth: &AuthModule, name: &str, seed: u64) -> StoredRecord {
    let mut session = auth.enrollment();
    for i in 0..MIN_ENROLL_SAMPLES {
        assert_eq!(
            session.capture(&capture(texture(seed))),
            CaptureOutcome::Accepted { total: i + 1 }
        );
    }
    session.commit(name).unwrap().to_stored().unwrap()
}

#[test]
fn test_enroll_rebuild_match() {
    let mut auth = auth();
    let records = vec![enroll(&auth, "ana", 11), enroll(&auth, "ben", 22)];
    auth.rebuild_gallery(&records).unwrap();

    assert_eq!(auth.gallery().identities(), ["ana", "ben"]);
    assert_eq!(auth.match_frame(&capture(texture(11))).as_deref(), Some("ana"));
    assert_eq!(auth.match_frame(&capture(texture(22))).as_deref(), Some("ben"));
    assert_eq!(auth.identify(&capture(|_, _| 200)), AuthResult::Unknown);
}

#[test]
fn test_match_is_idempotent() {
    let mut auth = auth();
    let records = vec![enroll(&auth, "ana", 11)];
    auth.rebuild_gallery(&records).unwrap();

    let frame = capture(texture(11));
    let first = auth.identify(&frame);
    let second = auth.identify(&frame);
    assert_eq!(first, second);
    assert_eq!(first.identity(), Some("ana"));
}

#[test]
fn test_empty_gallery_never_matches() {
    let mut auth = auth();
    auth.rebuild_gallery(&[]).unwrap();
    assert!(auth.gallery().is_empty());
    assert_eq!(auth.match_frame(&capture(texture(11))), None);
}

#[test]
fn test_corrupt_record_does_not_block_others() {
    let mut auth = auth();
    let records = vec![
        enroll(&auth, "ana", 11),
        StoredRecord::new("mangled", vec![1, 200, 3, 4]),
        enroll(&auth, "cy", 33),
    ];
    auth.rebuild_gallery(&records).unwrap();

    assert_eq!(auth.gallery().identities(), ["ana", "cy"]);
    assert_eq!(auth.gallery().skipped(), ["mangled"]);
    assert_eq!(auth.match_frame(&capture(texture(33))).as_deref(), Some("cy"));
}

#[test]
fn test_verification_loop() {
    let mut auth = auth();
    let records = vec![enroll(&auth, "ana", 11)];
    auth.rebuild_gallery(&records).unwrap();

    let frames = [capture(|_, _| 200), VideoFrame::empty(), capture(texture(11))];
    let mut attempt = VerificationAttempt::new(10);
    let status = frames
        .iter()
        .map(|f| attempt.observe(&mut auth, f))
        .find(|s| *s != VerificationStatus::Pending);
    assert_eq!(status, Some(VerificationStatus::Verified("ana".into())));
    assert_eq!(auth.current_driver(), Some("ana"));
}
