//! Gesture state machine: panning, node dragging, click and double-click.
//!
//! The pointer side tracks what the current press is doing (panning the
//! background, a press on a node that may still become a drag, or a drag).
//! The click side owns the single pending-click timer: a click arms it, a
//! second click on the same node inside the window cancels it and turns
//! into select + expand, and the timer firing turns into a selection toggle.

use std::time::Duration;

use log::debug;
use serde::Deserialize;

use super::types::NodeId;

/// Pointer travel, in pixels, after which a press on a node becomes a drag.
pub const DRAG_THRESHOLD_PX: f64 = 3.0;
/// How long a single click waits for a second one.
pub const CLICK_DELAY: Duration = Duration::from_millis(200);

/// Handle of a scheduled click callback.
pub trait ClickTimer {
	/// Stop the callback from firing.
	fn cancel(self);
}

/// Gesture thresholds, deserializable from a partial config.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
	/// See [`DRAG_THRESHOLD_PX`].
	pub drag_threshold_px: f64,
	/// See [`CLICK_DELAY`].
	pub click_delay_ms: u64,
}

impl Default for GestureConfig {
	fn default() -> Self {
		Self {
			drag_threshold_px: DRAG_THRESHOLD_PX,
			click_delay_ms: CLICK_DELAY.as_millis() as u64,
		}
	}
}

#[derive(Clone, Debug, PartialEq)]
enum PointerState {
	Idle,
	Panning { last_x: f64, last_y: f64 },
	/// `travelled` is the path length walked since the press, not the
	/// straight-line distance from it.
	PotentialDrag {
		node: NodeId,
		last_x: f64,
		last_y: f64,
		travelled: f64,
	},
}

/// Click/drag phase, holding the one cancelable timer.
#[derive(Debug)]
pub enum ClickPhase<H> {
	/// No click pending.
	Idle,
	/// A single click on `node` waits for `timer` or a second click.
	PendingClick {
		/// Clicked node.
		node: NodeId,
		/// Armed callback.
		timer: H,
	},
	/// `node` follows the pointer.
	Dragging {
		/// Dragged node.
		node: NodeId,
	},
}

/// What the host should do in response to a pointer event.
#[derive(Clone, Debug, PartialEq)]
pub enum GestureAction {
	/// Move the viewport by a screen-space delta.
	Pan {
		/// Horizontal pointer movement.
		dx: f64,
		/// Vertical pointer movement.
		dy: f64,
	},
	/// A press on `node` crossed the drag threshold.
	DragStart {
		/// Dragged node.
		node: NodeId,
	},
	/// Pin `node` under the pointer (screen coordinates).
	DragMove {
		/// Dragged node.
		node: NodeId,
		/// Pointer x.
		x: f64,
		/// Pointer y.
		y: f64,
	},
	/// Release `node` and let the layout settle.
	DragEnd {
		/// Released node.
		node: NodeId,
	},
	/// Select `node`, or deselect it if it is already selected.
	ToggleSelection {
		/// Clicked node.
		node: NodeId,
	},
	/// Select `node` and fetch its neighbors.
	SelectAndExpand {
		/// Double-clicked node.
		node: NodeId,
	},
}

/// Turns raw pointer events into [`GestureAction`]s.
pub struct InteractionController<H: ClickTimer> {
	pointer: PointerState,
	click: ClickPhase<H>,
	/// Whether the last finished pointer sequence crossed the drag threshold.
	last_sequence_dragged: bool,
	config: GestureConfig,
}

impl<H: ClickTimer> Default for InteractionController<H> {
	fn default() -> Self {
		Self::new(GestureConfig::default())
	}
}

impl<H: ClickTimer> InteractionController<H> {
	/// Idle controller.
	pub fn new(config: GestureConfig) -> Self {
		Self {
			pointer: PointerState::Idle,
			click: ClickPhase::Idle,
			last_sequence_dragged: false,
			config,
		}
	}

	/// Configured double-click window.
	pub fn click_delay(&self) -> Duration {
		Duration::from_millis(self.config.click_delay_ms)
	}

	/// Current click phase.
	pub fn phase(&self) -> &ClickPhase<H> {
		&self.click
	}

	/// Whether a node is being dragged.
	pub fn is_dragging(&self) -> bool {
		matches!(self.click, ClickPhase::Dragging { .. })
	}

	/// Whether a background press is panning.
	pub fn is_panning(&self) -> bool {
		matches!(self.pointer, PointerState::Panning { .. })
	}

	/// Node whose selection toggle is waiting on the timer.
	pub fn pending_click(&self) -> Option<&str> {
		match &self.click {
			ClickPhase::PendingClick { node, .. } => Some(node),
			_ => None,
		}
	}

	/// `hit` is the node under the pointer, if any.
	pub fn pointer_down(&mut self, x: f64, y: f64, hit: Option<NodeId>) {
		self.pointer = match hit {
			Some(node) => PointerState::PotentialDrag {
				node,
				last_x: x,
				last_y: y,
				travelled: 0.0,
			},
			None => PointerState::Panning {
				last_x: x,
				last_y: y,
			},
		};
	}

	/// Pointer moved to screen `(x, y)`.
	pub fn pointer_move(&mut self, x: f64, y: f64) -> Vec<GestureAction> {
		if let ClickPhase::Dragging { node } = &self.click {
			return vec![GestureAction::DragMove {
				node: node.clone(),
				x,
				y,
			}];
		}

		match &mut self.pointer {
			PointerState::Idle => Vec::new(),
			PointerState::Panning { last_x, last_y } => {
				let (dx, dy) = (x - *last_x, y - *last_y);
				(*last_x, *last_y) = (x, y);
				vec![GestureAction::Pan { dx, dy }]
			}
			PointerState::PotentialDrag {
				node,
				last_x,
				last_y,
				travelled,
			} => {
				*travelled += (x - *last_x).hypot(y - *last_y);
				(*last_x, *last_y) = (x, y);
				if *travelled < self.config.drag_threshold_px {
					return Vec::new();
				}
				let node = node.clone();
				self.pointer = PointerState::Idle;
				debug!("Drag started on {}", node);

				let mut actions = self.flush_pending();
				self.click = ClickPhase::Dragging { node: node.clone() };
				actions.push(GestureAction::DragStart { node: node.clone() });
				actions.push(GestureAction::DragMove { node, x, y });
				actions
			}
		}
	}

	/// Finish the pointer sequence. A press on a node that never crossed the
	/// drag threshold becomes a click; `schedule` arms the click timer.
	pub fn pointer_up<F>(&mut self, schedule: F) -> Vec<GestureAction>
	where
		F: FnOnce(NodeId, Duration) -> H,
	{
		if let ClickPhase::Dragging { node } = &self.click {
			let node = node.clone();
			self.click = ClickPhase::Idle;
			self.pointer = PointerState::Idle;
			self.last_sequence_dragged = true;
			return vec![GestureAction::DragEnd { node }];
		}

		match std::mem::replace(&mut self.pointer, PointerState::Idle) {
			PointerState::PotentialDrag { node, .. } => {
				self.last_sequence_dragged = false;
				self.click(node, schedule)
			}
			PointerState::Panning { .. } | PointerState::Idle => {
				self.last_sequence_dragged = false;
				Vec::new()
			}
		}
	}

	/// The pointer left the surface mid-gesture.
	pub fn pointer_cancel(&mut self) -> Vec<GestureAction> {
		self.pointer = PointerState::Idle;
		if let ClickPhase::Dragging { node } = &self.click {
			let node = node.clone();
			self.click = ClickPhase::Idle;
			self.last_sequence_dragged = true;
			return vec![GestureAction::DragEnd { node }];
		}
		Vec::new()
	}

	/// A click on `node`. Ignored right after a drag release.
	pub fn click<F>(&mut self, node: NodeId, schedule: F) -> Vec<GestureAction>
	where
		F: FnOnce(NodeId, Duration) -> H,
	{
		if self.last_sequence_dragged {
			debug!("Click on {} suppressed after drag", node);
			return Vec::new();
		}

		match std::mem::replace(&mut self.click, ClickPhase::Idle) {
			ClickPhase::PendingClick {
				node: pending,
				timer,
			} if pending == node => {
				timer.cancel();
				debug!("Double click on {}", node);
				vec![GestureAction::SelectAndExpand { node }]
			}
			ClickPhase::PendingClick {
				node: pending,
				timer,
			} => {
				timer.cancel();
				let delay = self.click_delay();
				self.click = ClickPhase::PendingClick {
					node: node.clone(),
					timer: schedule(node, delay),
				};
				vec![GestureAction::ToggleSelection { node: pending }]
			}
			ClickPhase::Idle | ClickPhase::Dragging { .. } => {
				let delay = self.click_delay();
				self.click = ClickPhase::PendingClick {
					node: node.clone(),
					timer: schedule(node, delay),
				};
				Vec::new()
			}
		}
	}

	/// The click timer for `node` elapsed.
	pub fn click_timer_fired(&mut self, node: &str) -> Option<GestureAction> {
		match &self.click {
			ClickPhase::PendingClick { node: pending, .. } if pending == node => {
				self.click = ClickPhase::Idle;
				Some(GestureAction::ToggleSelection {
					node: node.to_owned(),
				})
			}
			_ => None,
		}
	}

	/// Cancel any armed timer, e.g. on teardown.
	pub fn cancel_pending(&mut self) {
		if let ClickPhase::PendingClick { timer, .. } =
			std::mem::replace(&mut self.click, ClickPhase::Idle)
		{
			timer.cancel();
		}
	}

	/// Commit a pending click right away (its timer is cancelled).
	fn flush_pending(&mut self) -> Vec<GestureAction> {
		match std::mem::replace(&mut self.click, ClickPhase::Idle) {
			ClickPhase::PendingClick { node, timer } => {
				timer.cancel();
				vec![GestureAction::ToggleSelection { node }]
			}
			other => {
				self.click = other;
				Vec::new()
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use std::cell::RefCell;
	use std::rc::Rc;

	use super::*;

	#[derive(Default)]
	struct Log {
		scheduled: Vec<(NodeId, Duration)>,
		cancelled: Vec<NodeId>,
	}

	struct FakeTimer {
		node: NodeId,
		log: Rc<RefCell<Log>>,
	}

	impl ClickTimer for FakeTimer {
		fn cancel(self) {
			self.log.borrow_mut().cancelled.push(self.node);
		}
	}

	fn scheduler(log: &Rc<RefCell<Log>>) -> impl FnOnce(NodeId, Duration) -> FakeTimer {
		let log = log.clone();
		move |node, delay| {
			log.borrow_mut().scheduled.push((node.clone(), delay));
			FakeTimer { node, log }
		}
	}

	fn click_at(
		ctl: &mut InteractionController<FakeTimer>,
		log: &Rc<RefCell<Log>>,
		node: &str,
	) -> Vec<GestureAction> {
		ctl.pointer_down(10.0, 10.0, Some(node.into()));
		ctl.pointer_up(scheduler(log))
	}

	#[test]
	fn test_background_press_pans() {
		let mut ctl = InteractionController::<FakeTimer>::default();
		let log = Rc::new(RefCell::new(Log::default()));
		ctl.pointer_down(100.0, 100.0, None);
		assert!(ctl.is_panning());

		assert_eq!(
			ctl.pointer_move(110.0, 95.0),
			vec![GestureAction::Pan { dx: 10.0, dy: -5.0 }]
		);
		assert_eq!(
			ctl.pointer_move(111.0, 95.0),
			vec![GestureAction::Pan { dx: 1.0, dy: 0.0 }]
		);
		assert!(ctl.pointer_up(scheduler(&log)).is_empty());
		assert!(!ctl.is_panning());
		assert!(log.borrow().scheduled.is_empty());
	}

	#[test]
	fn test_small_wiggle_is_a_click() {
		let mut ctl = InteractionController::<FakeTimer>::default();
		let log = Rc::new(RefCell::new(Log::default()));
		ctl.pointer_down(50.0, 50.0, Some("a".into()));
		assert!(ctl.pointer_move(51.0, 51.0).is_empty());
		assert!(ctl.pointer_move(52.0, 52.0).is_empty());

		assert!(ctl.pointer_up(scheduler(&log)).is_empty());
		assert_eq!(log.borrow().scheduled, vec![("a".into(), CLICK_DELAY)]);
		assert_eq!(ctl.pending_click(), Some("a"));

		assert_eq!(
			ctl.click_timer_fired("a"),
			Some(GestureAction::ToggleSelection { node: "a".into() })
		);
		assert_eq!(ctl.pending_click(), None);
		assert_eq!(ctl.click_timer_fired("a"), None);
	}

	#[test]
	fn test_crossing_threshold_drags() {
		let mut ctl = InteractionController::<FakeTimer>::default();
		let log = Rc::new(RefCell::new(Log::default()));
		ctl.pointer_down(50.0, 50.0, Some("a".into()));

		let actions = ctl.pointer_move(60.0, 50.0);
		assert_eq!(
			actions,
			vec![
				GestureAction::DragStart { node: "a".into() },
				GestureAction::DragMove {
					node: "a".into(),
					x: 60.0,
					y: 50.0
				},
			]
		);
		assert!(ctl.is_dragging());

		assert_eq!(
			ctl.pointer_up(scheduler(&log)),
			vec![GestureAction::DragEnd { node: "a".into() }]
		);
		assert!(log.borrow().scheduled.is_empty());

		// a synthetic click right after the release is ignored
		assert!(ctl.click("a".into(), scheduler(&log)).is_empty());
		assert!(log.borrow().scheduled.is_empty());
	}

	#[test]
	fn test_wander_and_return_still_drags() {
		let mut ctl = InteractionController::<FakeTimer>::default();
		let log = Rc::new(RefCell::new(Log::default()));
		ctl.pointer_down(50.0, 50.0, Some("a".into()));

		assert!(ctl.pointer_move(52.0, 50.0).is_empty());
		let actions = ctl.pointer_move(50.0, 50.0);
		assert_eq!(
			actions,
			vec![
				GestureAction::DragStart { node: "a".into() },
				GestureAction::DragMove {
					node: "a".into(),
					x: 50.0,
					y: 50.0
				},
			]
		);

		ctl.pointer_up(scheduler(&log));
		assert!(log.borrow().scheduled.is_empty());
		assert_eq!(ctl.pending_click(), None);
	}

	#[test]
	fn test_double_click_selects_and_expands() {
		let mut ctl = InteractionController::<FakeTimer>::default();
		let log = Rc::new(RefCell::new(Log::default()));

		assert!(click_at(&mut ctl, &log, "a").is_empty());
		assert_eq!(
			click_at(&mut ctl, &log, "a"),
			vec![GestureAction::SelectAndExpand { node: "a".into() }]
		);
		assert_eq!(log.borrow().cancelled, vec!["a".to_string()]);
		assert_eq!(ctl.pending_click(), None);
		assert_eq!(ctl.click_timer_fired("a"), None);
	}

	#[test]
	fn test_click_on_other_node_commits_pending() {
		let mut ctl = InteractionController::<FakeTimer>::default();
		let log = Rc::new(RefCell::new(Log::default()));

		click_at(&mut ctl, &log, "a");
		assert_eq!(
			click_at(&mut ctl, &log, "b"),
			vec![GestureAction::ToggleSelection { node: "a".into() }]
		);
		assert_eq!(ctl.pending_click(), Some("b"));
		assert_eq!(log.borrow().cancelled, vec!["a".to_string()]);
	}

	#[test]
	fn test_drag_commits_pending_click_first() {
		let mut ctl = InteractionController::<FakeTimer>::default();
		let log = Rc::new(RefCell::new(Log::default()));

		click_at(&mut ctl, &log, "a");
		ctl.pointer_down(0.0, 0.0, Some("b".into()));
		let actions = ctl.pointer_move(0.0, 5.0);
		assert_eq!(actions[0], GestureAction::ToggleSelection { node: "a".into() });
		assert_eq!(actions[1], GestureAction::DragStart { node: "b".into() });
	}

	#[test]
	fn test_cancel_drops_drag_and_timer() {
		let mut ctl = InteractionController::<FakeTimer>::default();
		let log = Rc::new(RefCell::new(Log::default()));

		ctl.pointer_down(0.0, 0.0, Some("a".into()));
		ctl.pointer_move(10.0, 0.0);
		assert_eq!(
			ctl.pointer_cancel(),
			vec![GestureAction::DragEnd { node: "a".into() }]
		);

		ctl.pointer_down(0.0, 0.0, Some("b".into()));
		ctl.pointer_up(scheduler(&log));
		ctl.cancel_pending();
		assert_eq!(log.borrow().cancelled, vec!["b".to_string()]);
		assert_eq!(ctl.pending_click(), None);
	}
}
