//! Pan/zoom window over the unbounded layout plane.
//!
//! `w` and `h` are clamped independently. The screen shows the whole view
//! box at a uniform scale, centered (`xMidYMid meet`), so the view box
//! center always sits at the screen center.

/// Smallest view box side, in layout units (most zoomed in).
pub const MIN_SIZE: f64 = 100.0;
/// Largest view box side, in layout units (most zoomed out).
pub const MAX_SIZE: f64 = 2400.0;
/// View box growth per zoom-out step.
pub const ZOOM_FACTOR: f64 = 1.1;

/// Top-left and size of the visible window, in layout coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewBox {
	/// Left edge.
	pub x: f64,
	/// Top edge.
	pub y: f64,
	/// Width.
	pub w: f64,
	/// Height.
	pub h: f64,
}

impl ViewBox {
	/// Midpoint of the box.
	pub fn center(&self) -> (f64, f64) {
		(self.x + self.w / 2.0, self.y + self.h / 2.0)
	}
}

/// One zoom step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZoomDirection {
	/// Shrink the view box.
	In,
	/// Grow the view box.
	Out,
}

impl ZoomDirection {
	/// Wheel convention: scrolling down zooms out.
	pub fn from_wheel(delta_y: f64) -> Self {
		if delta_y > 0.0 { Self::Out } else { Self::In }
	}

	fn factor(self) -> f64 {
		match self {
			Self::In => 1.0 / ZOOM_FACTOR,
			Self::Out => ZOOM_FACTOR,
		}
	}
}

/// Position and size of the canvas on the page, in CSS pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScreenRect {
	/// Left offset in the page.
	pub left: f64,
	/// Top offset in the page.
	pub top: f64,
	/// Drawn width.
	pub width: f64,
	/// Drawn height.
	pub height: f64,
}

impl ScreenRect {
	/// Rect anchored at the page origin.
	pub fn sized(width: f64, height: f64) -> Self {
		Self {
			left: 0.0,
			top: 0.0,
			width,
			height,
		}
	}
}

/// Owns the view box and maps between screen and layout coordinates.
#[derive(Clone, Debug)]
pub struct ViewportController {
	view_box: ViewBox,
	screen_width: f64,
	screen_height: f64,
}

impl ViewportController {
	/// A 1:1 window centered on the layout origin.
	pub fn new(screen_width: f64, screen_height: f64) -> Self {
		let mut viewport = Self {
			view_box: ViewBox {
				x: 0.0,
				y: 0.0,
				w: 0.0,
				h: 0.0,
			},
			screen_width: screen_width.max(1.0),
			screen_height: screen_height.max(1.0),
		};
		viewport.reset();
		viewport
	}

	/// Current window in layout coordinates.
	pub fn view_box(&self) -> ViewBox {
		self.view_box
	}

	/// Layout units per screen pixel; large enough to fit both sides.
	pub fn scale(&self) -> f64 {
		(self.view_box.w / self.screen_width).max(self.view_box.h / self.screen_height)
	}

	/// Layout point drawn at the top-left screen corner.
	pub fn origin(&self) -> (f64, f64) {
		let scale = self.scale();
		let (cx, cy) = self.view_box.center();
		(
			cx - self.screen_width * scale / 2.0,
			cy - self.screen_height * scale / 2.0,
		)
	}

	/// Scale the view box about its center, clamping each side to
	/// [`MIN_SIZE`, `MAX_SIZE`].
	pub fn zoom(&mut self, direction: ZoomDirection) {
		let factor = direction.factor();
		let vb = &mut self.view_box;
		let w = (vb.w * factor).clamp(MIN_SIZE, MAX_SIZE);
		let h = (vb.h * factor).clamp(MIN_SIZE, MAX_SIZE);
		vb.x -= (w - vb.w) / 2.0;
		vb.y -= (h - vb.h) / 2.0;
		vb.w = w;
		vb.h = h;
	}

	/// Move the window by a screen-space drag delta.
	pub fn pan(&mut self, dx_screen: f64, dy_screen: f64) {
		let scale = self.scale();
		self.view_box.x -= dx_screen * scale;
		self.view_box.y -= dy_screen * scale;
	}

	/// Layout point under the page coordinate `(px, py)`.
	pub fn screen_to_layout(&self, px: f64, py: f64, rect: &ScreenRect) -> (f64, f64) {
		let scale = self.scale();
		let (ox, oy) = self.origin();
		(ox + (px - rect.left) * scale, oy + (py - rect.top) * scale)
	}

	/// Page coordinate where layout point `(x, y)` is drawn.
	pub fn layout_to_screen(&self, x: f64, y: f64, rect: &ScreenRect) -> (f64, f64) {
		let scale = self.scale();
		let (ox, oy) = self.origin();
		(rect.left + (x - ox) / scale, rect.top + (y - oy) / scale)
	}

	/// Whether a circle at `(x, y)` overlaps the drawn screen area.
	pub fn is_visible(&self, x: f64, y: f64, radius: f64) -> bool {
		let scale = self.scale();
		let (ox, oy) = self.origin();
		let (right, bottom) = (ox + self.screen_width * scale, oy + self.screen_height * scale);
		x + radius >= ox && x - radius <= right && y + radius >= oy && y - radius <= bottom
	}

	/// Follow a canvas resize, keeping the center and the zoom level.
	pub fn resize(&mut self, screen_width: f64, screen_height: f64) {
		let scale = self.scale();
		let (cx, cy) = self.view_box.center();
		self.screen_width = screen_width.max(1.0);
		self.screen_height = screen_height.max(1.0);
		let w = (self.screen_width * scale).clamp(MIN_SIZE, MAX_SIZE);
		let h = (self.screen_height * scale).clamp(MIN_SIZE, MAX_SIZE);
		self.view_box = ViewBox {
			x: cx - w / 2.0,
			y: cy - h / 2.0,
			w,
			h,
		};
	}

	/// Back to the initial window centered on the layout origin.
	pub fn reset(&mut self) {
		let w = self.screen_width.clamp(MIN_SIZE, MAX_SIZE);
		let h = (w * self.screen_height / self.screen_width).clamp(MIN_SIZE, MAX_SIZE);
		self.view_box = ViewBox {
			x: -w / 2.0,
			y: -h / 2.0,
			w,
			h,
		};
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn assert_close(a: f64, b: f64) {
		assert!((a - b).abs() < 1e-9, "{a} != {b}");
	}

	#[test]
	fn test_zoom_out_clamps_to_max() {
		let mut viewport = ViewportController::new(600.0, 400.0);
		assert_eq!(viewport.view_box().w, 600.0);
		assert_eq!(viewport.view_box().h, 400.0);

		for _ in 0..20 {
			viewport.zoom(ZoomDirection::Out);
			let vb = viewport.view_box();
			assert!(vb.w <= MAX_SIZE && vb.h <= MAX_SIZE);
		}
		assert_eq!(viewport.view_box().w, MAX_SIZE);
		assert_eq!(viewport.view_box().h, MAX_SIZE);
	}

	#[test]
	fn test_zoom_in_clamps_to_min() {
		let mut viewport = ViewportController::new(600.0, 400.0);
		for _ in 0..100 {
			viewport.zoom(ZoomDirection::In);
		}
		assert_eq!(viewport.view_box().w, MIN_SIZE);
		assert_eq!(viewport.view_box().h, MIN_SIZE);

		for i in 0..200 {
			viewport.zoom(if i % 3 == 0 { ZoomDirection::In } else { ZoomDirection::Out });
			let vb = viewport.view_box();
			assert!((MIN_SIZE..=MAX_SIZE).contains(&vb.w));
			assert!((MIN_SIZE..=MAX_SIZE).contains(&vb.h));
		}
	}

	#[test]
	fn test_zoom_keeps_center() {
		let mut viewport = ViewportController::new(800.0, 600.0);
		viewport.pan(-120.0, 35.0);
		let before = viewport.view_box().center();

		viewport.zoom(ZoomDirection::Out);
		let after = viewport.view_box().center();
		assert_close(before.0, after.0);
		assert_close(before.1, after.1);

		// anchoring still holds when the clamp kicks in
		for _ in 0..30 {
			viewport.zoom(ZoomDirection::Out);
		}
		let clamped = viewport.view_box().center();
		assert_close(before.0, clamped.0);
		assert_close(before.1, clamped.1);
	}

	#[test]
	fn test_screen_center_stays_put_through_clamping() {
		let mut viewport = ViewportController::new(800.0, 600.0);
		let rect = ScreenRect::sized(800.0, 600.0);
		viewport.pan(-120.0, 35.0);
		let (cx, cy) = viewport.screen_to_layout(400.0, 300.0, &rect);

		for direction in [ZoomDirection::Out, ZoomDirection::In] {
			for _ in 0..30 {
				viewport.zoom(direction);
				let (x, y) = viewport.screen_to_layout(400.0, 300.0, &rect);
				assert!((x - cx).abs() < 1e-6 && (y - cy).abs() < 1e-6, "center moved to ({x}, {y})");
			}
		}
	}

	#[test]
	fn test_clamped_box_fits_on_screen() {
		let mut viewport = ViewportController::new(800.0, 600.0);
		for _ in 0..16 {
			viewport.zoom(ZoomDirection::Out);
		}
		let vb = viewport.view_box();
		assert_eq!((vb.w, vb.h), (MAX_SIZE, MAX_SIZE));
		// the taller side decides the scale
		assert_close(viewport.scale(), MAX_SIZE / 600.0);

		let rect = ScreenRect::sized(800.0, 600.0);
		let (_, top) = viewport.layout_to_screen(vb.x, vb.y, &rect);
		let (_, bottom) = viewport.layout_to_screen(vb.x, vb.y + vb.h, &rect);
		assert_close(top, 0.0);
		assert_close(bottom, 600.0);
		assert!(viewport.is_visible(vb.x + vb.w / 2.0, vb.y + 1.0, 0.0));
	}

	#[test]
	fn test_pan_moves_against_drag() {
		let mut viewport = ViewportController::new(800.0, 600.0);
		viewport.zoom(ZoomDirection::Out);
		let scale = viewport.scale();
		let start = viewport.view_box();

		viewport.pan(10.0, -20.0);
		let vb = viewport.view_box();
		assert_close(vb.x, start.x - 10.0 * scale);
		assert_close(vb.y, start.y + 20.0 * scale);
	}

	#[test]
	fn test_screen_layout_round_trip() {
		let mut viewport = ViewportController::new(800.0, 600.0);
		viewport.zoom(ZoomDirection::In);
		viewport.pan(37.0, -12.0);
		let rect = ScreenRect {
			left: 40.0,
			top: 25.0,
			width: 800.0,
			height: 600.0,
		};

		let (x, y) = viewport.screen_to_layout(140.0, 325.0, &rect);
		let (ox, oy) = viewport.origin();
		assert_close(x, ox + 100.0 * viewport.scale());
		assert_close(y, oy + 300.0 * viewport.scale());

		let (px, py) = viewport.layout_to_screen(x, y, &rect);
		assert_close(px, 140.0);
		assert_close(py, 325.0);
	}

	#[test]
	fn test_wheel_down_zooms_out() {
		assert_eq!(ZoomDirection::from_wheel(120.0), ZoomDirection::Out);
		assert_eq!(ZoomDirection::from_wheel(-3.0), ZoomDirection::In);
		assert_eq!(ZoomDirection::from_wheel(0.0), ZoomDirection::In);
	}

	#[test]
	fn test_origin_is_screen_center() {
		let viewport = ViewportController::new(800.0, 600.0);
		let (px, py) = viewport.layout_to_screen(0.0, 0.0, &ScreenRect::sized(800.0, 600.0));
		assert_close(px, 400.0);
		assert_close(py, 300.0);
		assert!(viewport.is_visible(0.0, 0.0, 5.0));
		assert!(!viewport.is_visible(1000.0, 0.0, 5.0));
	}

	#[test]
	fn test_resize_keeps_center_and_scale() {
		let mut viewport = ViewportController::new(800.0, 600.0);
		viewport.pan(100.0, 0.0);
		let center = viewport.view_box().center();
		let scale = viewport.scale();

		viewport.resize(1000.0, 500.0);
		assert_close(viewport.scale(), scale);
		assert_close(viewport.view_box().center().0, center.0);
		assert_close(viewport.view_box().center().1, center.1);
	}
}
