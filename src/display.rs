use opencv::core::Size;
use opencv::imgproc;
use opencv::prelude::*;

/// Tightly packed RGB8 image ready to hand to the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayFrame {
    pub width: usize,
    pub height: usize,
    pub rgb: Vec<u8>,
}

/// Largest size with the aspect ratio of `source` that fits inside `bounds`.
pub fn fit_within(source: (i32, i32), bounds: (i32, i32)) -> (i32, i32) {
    let (src_w, src_h) = source;
    let (max_w, max_h) = bounds;
    if src_w <= 0 || src_h <= 0 || max_w <= 0 || max_h <= 0 {
        return (0, 0);
    }
    // compare the ratios without floating point: src_w / src_h vs max_w / max_h
    let (src_w, src_h, max_w, max_h) = (src_w as i64, src_h as i64, max_w as i64, max_h as i64);
    if src_w * max_h > max_w * src_h {
        // width bound
        let height = (src_h * max_w / src_w).max(1);
        (max_w as i32, height as i32)
    } else {
        let width = (src_w * max_h / src_h).max(1);
        (width as i32, max_h as i32)
    }
}

/// Converts a BGR frame to RGB and scales it to fit `bounds`, keeping its aspect ratio.
pub fn to_display_frame(frame: &Mat, bounds: (i32, i32)) -> anyhow::Result<DisplayFrame> {
    let mut rgb = Mat::default();
    imgproc::cvt_color_def(frame, &mut rgb, imgproc::COLOR_BGR2RGB)?;

    let (width, height) = fit_within((rgb.cols(), rgb.rows()), bounds);
    let rgb = if (width, height) == (rgb.cols(), rgb.rows()) {
        rgb
    } else {
        let mut scaled = Mat::default();
        imgproc::resize(
            &rgb,
            &mut scaled,
            Size::new(width, height),
            0.0,
            0.0,
            imgproc::INTER_AREA,
        )?;
        scaled
    };

    let rgb = if rgb.is_continuous() {
        rgb
    } else {
        rgb.try_clone()?
    };

    Ok(DisplayFrame {
        width: width as usize,
        height: height as usize,
        rgb: rgb.data_bytes()?.to_vec(),
    })
}
