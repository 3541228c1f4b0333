//! Pixel-level verification of stitched output.
//!
//! The synthetic backend encodes each pixel's page coordinates and the
//! rasterize call that produced it, so these tests can check both that every
//! composite pixel shows the right part of the page and which frame won in
//! the overlap regions.

use scrollshot::synthetic::{decode_call, decode_page_y};
use scrollshot::{
    CaptureConfig, Direction, FileSink, Pipeline, Region, SettlePolicy, SyntheticPage,
};

fn fast_config() -> CaptureConfig {
    CaptureConfig {
        overlap: 0.2,
        pre_scroll_delay_ms: 1,
        settle: SettlePolicy {
            poll_interval_ms: 1,
            grace_ms: 1,
            timeout_ms: 50,
        },
        session_timeout_ms: 5_000,
    }
}

fn saved_composite(dir: &std::path::Path) -> image::RgbaImage {
    let entry = std::fs::read_dir(dir).unwrap().next().unwrap().unwrap();
    image::open(entry.path()).unwrap().to_rgba8()
}

#[tokio::test]
async fn every_composite_row_shows_the_right_page_content() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(fast_config(), FileSink::new(dir.path()));
    let mut page = SyntheticPage::builder()
        .document(1280.0, 2500.0)
        .viewport(1280, 1000)
        .build();

    let region = Region::new(100.0, 50.0, 300.0, 500.0, 1.0);
    let outcome = pipeline
        .capture_scrolling(&mut page, region, Direction::Vertical, None)
        .await
        .unwrap();
    assert_eq!((outcome.width, outcome.height), (300, 2000));

    let composite = saved_composite(dir.path());
    // Canvas row r holds page row 50 + r, regardless of which frame drew it
    for cy in (0..2000).step_by(97) {
        let pixel = composite.get_pixel(0, cy);
        assert_eq!(decode_page_y(pixel), 50 + cy, "wrong content at row {}", cy);
    }
    // Canvas column c holds page column 100 + c (alpha channel, mod 256)
    assert_eq!(composite.get_pixel(299, 0)[3], ((100 + 299) % 256) as u8);
}

#[tokio::test]
async fn later_frames_win_in_overlap_regions() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(fast_config(), FileSink::new(dir.path()));
    let mut page = SyntheticPage::builder()
        .document(1280.0, 2500.0)
        .viewport(1280, 1000)
        .build();

    // Step 400, frames (rasterize calls 1..=5) at scrollY 0, 400, 800, 1200, 1500
    let region = Region::new(100.0, 50.0, 300.0, 500.0, 1.0);
    pipeline
        .capture_scrolling(&mut page, region, Direction::Vertical, None)
        .await
        .unwrap();

    let composite = saved_composite(dir.path());
    // Exclusive to frame 1
    assert_eq!(decode_call(composite.get_pixel(10, 100)), 1);
    // Rows 400..500 are covered by frames 1 and 2: the later frame wins
    assert_eq!(decode_call(composite.get_pixel(10, 450)), 2);
    // Rows 1500..1700 are covered by frames 4 and 5
    assert_eq!(decode_call(composite.get_pixel(10, 1600)), 5);
    // Tail covered only by the final frame
    assert_eq!(decode_call(composite.get_pixel(10, 1950)), 5);
}

#[tokio::test]
async fn stitching_respects_device_pixel_ratio() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(fast_config(), FileSink::new(dir.path()));
    let mut page = SyntheticPage::builder()
        .document(1000.0, 1500.0)
        .viewport(1000, 500)
        .device_pixel_ratio(2.0)
        .build();

    // Step 320, max scroll 1000: frames at 0, 320, 640, 960, 1000
    let region = Region::new(0.0, 0.0, 200.0, 400.0, 2.0);
    let outcome = pipeline
        .capture_scrolling(&mut page, region, Direction::Vertical, None)
        .await
        .unwrap();

    assert_eq!(outcome.frames, 5);
    assert_eq!((outcome.width, outcome.height), (400, 2800));

    let composite = saved_composite(dir.path());
    // Two device pixels per logical page pixel
    assert_eq!(decode_page_y(composite.get_pixel(0, 100)), 50);
    assert_eq!(decode_page_y(composite.get_pixel(0, 2799)), 1399);
}

#[tokio::test]
async fn horizontal_sessions_accumulate_along_x() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(fast_config(), FileSink::new(dir.path()));
    let mut page = SyntheticPage::builder()
        .document(2000.0, 800.0)
        .viewport(1000, 800)
        .build();

    // Step 400, max scroll 1000: frames at scrollX 0, 400, 800, 1000
    let region = Region::new(100.0, 50.0, 500.0, 300.0, 1.0);
    let outcome = pipeline
        .capture_scrolling(&mut page, region, Direction::Horizontal, None)
        .await
        .unwrap();

    assert_eq!(outcome.frames, 4);
    assert_eq!((outcome.width, outcome.height), (1500, 300));

    let composite = saved_composite(dir.path());
    // Canvas column c holds page column 100 + c
    assert_eq!(composite.get_pixel(0, 0)[3], 100);
    assert_eq!(composite.get_pixel(1499, 299)[3], ((100 + 1499) % 256) as u8);
    // Rows keep the stationary-axis offset
    assert_eq!(decode_page_y(composite.get_pixel(700, 0)), 50);
    assert_eq!(decode_page_y(composite.get_pixel(700, 299)), 349);
}
