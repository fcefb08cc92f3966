use super::Viewport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaneId {
    MessageList,
    MessageBody,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sibling {
    Previous,
    Next,
}

/// A drag handle sitting between two panes; dragging resizes `sibling`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeHandle {
    pub previous: PaneId,
    pub next: PaneId,
    pub sibling: Sibling,
}

impl ResizeHandle {
    pub fn target(&self) -> PaneId {
        match self.sibling {
            Sibling::Previous => self.previous,
            Sibling::Next => self.next,
        }
    }
}

#[derive(Debug, Default)]
pub struct PaneResizer {
    dragging: Option<PaneId>,
}

impl PaneResizer {
    /// Starts a drag. Only the primary button grabs the handle.
    pub fn pointer_down(&mut self, handle: &ResizeHandle, button: PointerButton) -> bool {
        if button != PointerButton::Primary {
            return false;
        }
        self.dragging = Some(handle.target());
        true
    }

    /// Height becomes the distance from the pane's top to the pointer.
    pub fn pointer_move(&mut self, y: u16, viewport: &mut dyn Viewport) -> bool {
        let Some(pane) = self.dragging else {
            return false;
        };
        let top = viewport.pane_top(pane);
        viewport.set_pane_height(pane, y.saturating_sub(top));
        true
    }

    pub fn pointer_up(&mut self) -> bool {
        self.dragging.take().is_some()
    }

    pub fn dragging(&self) -> Option<PaneId> {
        self.dragging
    }
}
