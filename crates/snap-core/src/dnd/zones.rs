//! Drop zone strategies.
//!
//! Coordinates handed to [`ZoneStrategy::hit_target`] are viewport-relative
//! pointer positions; zones are stored in document coordinates so they stay
//! valid while the window scrolls.

use std::time::Duration;

use tokio::task::JoinHandle;

use crate::actions::TransferPosition;
use crate::decoration::PreviewNode;
use crate::dom::{Document, NodeId, Rect};

pub const DROP_TARGET_CLASS: &str = "tpp-drop-target";
const HIDDEN_BORDER_STYLE: &str = "display:none";

/// Result of hitting a drop target.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub node: NodeId,
    pub preview_id: String,
    pub position: TransferPosition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Drop border drawn as a line below or above the target.
    Horizontal,
    /// Drop border drawn as a line left or right of the target.
    Vertical,
}

#[derive(Debug, Clone)]
struct Zone {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    before: bool,
    /// Where the drop border goes: top, left and its extent.
    border: (f64, f64, f64),
    node: NodeId,
    preview_id: String,
}

impl Zone {
    fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x1 && x <= self.x2 && y >= self.y1 && y <= self.y2
    }
}

/// Scrolls the window while the pointer is close to its edge.
#[derive(Debug)]
pub struct AutoScroll {
    pub distance: f64,
    pub increment: f64,
    pub interval: Duration,
    scroll_y: f64,
    task: Option<JoinHandle<()>>,
}

impl Default for AutoScroll {
    fn default() -> Self {
        Self {
            distance: 30.0,
            increment: 2.0,
            interval: Duration::from_millis(100),
            scroll_y: 0.0,
            task: None,
        }
    }
}

impl AutoScroll {
    fn hit(&mut self, document: &Document, y: f64) {
        let viewport = document.viewport();
        let direction = if y <= self.distance {
            -1.0
        } else if viewport.height - y < self.distance {
            1.0
        } else {
            0.0
        };
        let scroll_y = direction * self.increment;
        if scroll_y == self.scroll_y && self.task.is_some() {
            return;
        }
        self.scroll_y = scroll_y;
        self.stop();
        if scroll_y == 0.0 {
            return;
        }
        let document = document.clone();
        let interval = self.interval;
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            self.task = Some(handle.spawn(async move {
                loop {
                    document.scroll_by(scroll_y);
                    tokio::time::sleep(interval).await;
                }
            }));
        }
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_scrolling(&self) -> bool {
        self.task.is_some()
    }
}

/// Half-target zones with a visible drop border.
#[derive(Debug)]
pub struct DropBorder {
    orientation: Orientation,
    border: NodeId,
    zones: Vec<Zone>,
}

impl DropBorder {
    pub fn new(document: &Document, orientation: Orientation) -> Self {
        let border = document.build("div", &[DROP_TARGET_CLASS], &[]);
        document.set_style(border, HIDDEN_BORDER_STYLE);
        document.append_child(document.body(), border);
        Self {
            orientation,
            border,
            zones: Vec::new(),
        }
    }

    pub fn border(&self) -> NodeId {
        self.border
    }

    fn document_rect(document: &Document, node: NodeId) -> Rect {
        let viewport = document.viewport();
        let rect = document.bounding_rect(node);
        Rect::new(rect.top + viewport.top, rect.left + viewport.left, rect.width, rect.height)
    }

    fn add_zone(&mut self, area: Rect, before: bool, border: (f64, f64, f64), target: &PreviewNode, node: NodeId) {
        self.zones.push(Zone {
            x1: area.left,
            y1: area.top,
            x2: area.right(),
            y2: area.bottom(),
            before,
            border,
            node,
            preview_id: target.preview_id.clone(),
        });
    }

    fn add(&mut self, document: &Document, target: &PreviewNode) {
        let Some(node) = target.node else {
            return;
        };
        let Rect { top, left, width, height } = Self::document_rect(document, node);
        let splittable = target.element_type() == Some("Section") || target.component_path().is_some();
        let whole = matches!(target.element_type(), Some("Body") | Some("Page"));

        match self.orientation {
            Orientation::Horizontal if splittable => {
                let half = height / 2.0;
                self.add_zone(Rect::new(top, left, width, half), true, (top, left, width), target, node);
                self.add_zone(
                    Rect::new(top + half, left, width, half),
                    false,
                    (top + height, left, width),
                    target,
                    node,
                );
            }
            Orientation::Vertical if splittable => {
                let half = width / 2.0;
                self.add_zone(Rect::new(top, left, half, height), true, (top, left, height), target, node);
                self.add_zone(
                    Rect::new(top, left + half, half, height),
                    false,
                    (top, left + width, height),
                    target,
                    node,
                );
            }
            Orientation::Horizontal if whole => {
                self.add_zone(Rect::new(top, left, width, height), false, (top + height, left, width), target, node);
            }
            Orientation::Vertical if whole => {
                self.add_zone(Rect::new(top, left, width, height), false, (top, left, height), target, node);
            }
            _ => {}
        }
    }

    /// The zone under the pointer whose corner is closest to it.
    fn hit_zone(&self, document: &Document, x: f64, y: f64) -> Option<&Zone> {
        let viewport = document.viewport();
        let top = y + viewport.top;
        let left = x + viewport.left;
        let distance = |zone: &Zone| (left - zone.x1) * (top - zone.y1);
        self.zones
            .iter()
            .filter(|zone| zone.contains(left, top))
            .min_by(|a, b| distance(a).total_cmp(&distance(b)))
    }

    fn hit(&self, document: &Document, x: f64, y: f64) -> Option<Hit> {
        let Some(zone) = self.hit_zone(document, x, y) else {
            document.set_style(self.border, HIDDEN_BORDER_STYLE);
            return None;
        };
        let (top, left, extent) = zone.border;
        let style = match self.orientation {
            Orientation::Horizontal => format!("top: {}px; left: {}px; width: {}px;", top, left, extent),
            Orientation::Vertical => format!("top: {}px; left: {}px; height: {}px; width: 5px;", top, left, extent),
        };
        document.set_style(self.border, &style);
        Some(Hit {
            node: zone.node,
            preview_id: zone.preview_id.clone(),
            position: if zone.before {
                TransferPosition::Before
            } else {
                TransferPosition::After
            },
        })
    }
}

/// One way of reacting to a drag.
#[derive(Debug)]
pub enum ZoneStrategy {
    AutoScroll(AutoScroll),
    Horizontal(DropBorder),
    Vertical(DropBorder),
}

impl ZoneStrategy {
    pub fn auto_scroll() -> Self {
        ZoneStrategy::AutoScroll(AutoScroll::default())
    }

    pub fn horizontal(document: &Document) -> Self {
        ZoneStrategy::Horizontal(DropBorder::new(document, Orientation::Horizontal))
    }

    pub fn vertical(document: &Document) -> Self {
        ZoneStrategy::Vertical(DropBorder::new(document, Orientation::Vertical))
    }

    pub fn add_target(&mut self, document: &Document, target: &PreviewNode) {
        match self {
            ZoneStrategy::AutoScroll(_) => {}
            ZoneStrategy::Horizontal(border) | ZoneStrategy::Vertical(border) => border.add(document, target),
        }
    }

    /// React to the pointer at viewport position `(x, y)`. Only drop borders
    /// produce hits.
    pub fn hit_target(&mut self, document: &Document, x: f64, y: f64) -> Option<Hit> {
        match self {
            ZoneStrategy::AutoScroll(scroll) => {
                scroll.hit(document, y);
                None
            }
            ZoneStrategy::Horizontal(border) | ZoneStrategy::Vertical(border) => border.hit(document, x, y),
        }
    }

    pub fn destroy(&mut self, document: &Document) {
        match self {
            ZoneStrategy::AutoScroll(scroll) => scroll.stop(),
            ZoneStrategy::Horizontal(border) | ZoneStrategy::Vertical(border) => {
                border.zones.clear();
                document.remove(border.border);
            }
        }
    }
}

#[cfg(test)]
#[path = "zones_tests.rs"]
mod tests;
