//! Aspect-ratio layout of the video child inside its container.

use common::ResizeMode;

/// Minimum change of aspect ratio that triggers a relayout
pub const ASPECT_RATIO_EPSILON: f32 = 0.001;

/// Child geometry relative to the container's origin.
///
/// Offsets go negative when the child overflows the container (cover).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChildRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Map a raw ratio to a usable one: anything non-finite or non-positive is 0
pub fn sanitize_ratio(ratio: f32) -> f32 {
    if ratio.is_finite() && ratio > 0.0 {
        ratio
    } else {
        0.0
    }
}

/// Whether two ratios differ enough to warrant a relayout
pub fn ratio_changed(current: f32, next: f32) -> bool {
    (current - next).abs() > ASPECT_RATIO_EPSILON
}

/// Compute the centered child rectangle.
///
/// With no usable ratio the child fills the container. Otherwise `Contain`
/// shrinks one dimension so the child fits, `Cover` grows one so it
/// overflows. Derived dimensions are rounded to the nearest pixel.
pub fn layout(container_width: u32, container_height: u32, ratio: f32, mode: ResizeMode) -> ChildRect {
    let fill = ChildRect {
        x: 0,
        y: 0,
        width: container_width,
        height: container_height,
    };

    let ratio = sanitize_ratio(ratio);
    if ratio == 0.0 || container_width == 0 || container_height == 0 {
        return fill;
    }

    let ratio = f64::from(ratio);
    let cw = f64::from(container_width);
    let ch = f64::from(container_height);
    let wider_than_container = ratio / (cw / ch) - 1.0 > 0.0;

    let (width, height) = match (mode, wider_than_container) {
        (ResizeMode::Contain, true) | (ResizeMode::Cover, false) => (cw, (cw / ratio).round()),
        (ResizeMode::Contain, false) | (ResizeMode::Cover, true) => ((ch * ratio).round(), ch),
    };

    ChildRect {
        x: ((cw - width) / 2.0) as i32,
        y: ((ch - height) / 2.0) as i32,
        width: width as u32,
        height: height as u32,
    }
}
