//! Geometry and subtitle visibility of one view.

use crate::layout::{self, ChildRect};
use common::{RenderMode, ResizeMode, ViewLayout};

#[derive(Debug, Default)]
pub struct ViewSurface {
    container: (u32, u32),
    video: (u32, u32),
    aspect_ratio: f32,
    resize_mode: ResizeMode,
    render_mode: RenderMode,
    subtitle_visible: bool,
    child: ChildRect,
}

impl ViewSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_container_size(&mut self, width: u32, height: u32) {
        if self.container != (width, height) {
            self.container = (width, height);
            self.relayout();
        }
    }

    /// New video dimensions from the resolver
    pub fn update_video_size(&mut self, width: u32, height: u32) {
        self.video = (width, height);
        let ratio = if height > 0 { width as f32 / height as f32 } else { 0.0 };
        self.set_aspect_ratio(ratio);
    }

    pub fn reset_video_size(&mut self) {
        self.video = (0, 0);
        self.set_aspect_ratio(0.0);
    }

    pub fn set_aspect_ratio(&mut self, ratio: f32) {
        let ratio = layout::sanitize_ratio(ratio);
        if layout::ratio_changed(self.aspect_ratio, ratio) {
            self.aspect_ratio = ratio;
            self.relayout();
        }
    }

    pub fn set_resize_mode(&mut self, mode: ResizeMode) {
        if self.resize_mode != mode {
            self.resize_mode = mode;
            self.relayout();
        }
    }

    pub fn set_render_mode(&mut self, mode: RenderMode) {
        if self.render_mode != mode {
            self.render_mode = mode;
            self.relayout();
        }
    }

    pub fn show_subtitles(&mut self) {
        self.subtitle_visible = true;
    }

    pub fn hide_subtitles(&mut self) {
        self.subtitle_visible = false;
    }

    pub fn subtitle_visible(&self) -> bool {
        self.subtitle_visible
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.aspect_ratio
    }

    pub fn child(&self) -> ChildRect {
        self.child
    }

    fn relayout(&mut self) {
        // Fill stretches to the container whatever the video ratio
        let ratio = match self.render_mode {
            RenderMode::Fit => self.aspect_ratio,
            RenderMode::Fill => 0.0,
        };
        let (width, height) = self.container;
        self.child = layout::layout(width, height, ratio, self.resize_mode);
        log::trace!(
            "Relayout {}x{} ratio {:.3} -> {:?}",
            width,
            height,
            ratio,
            self.child
        );
    }

    pub fn snapshot(&self) -> ViewLayout {
        ViewLayout {
            container_width: self.container.0,
            container_height: self.container.1,
            video_width: self.video.0,
            video_height: self.video.1,
            aspect_ratio: self.aspect_ratio,
            resize_mode: self.resize_mode,
            render_mode: self.render_mode,
            x: self.child.x,
            y: self.child.y,
            width: self.child.width,
            height: self.child.height,
            subtitle_visible: self.subtitle_visible,
        }
    }
}
