//! Foundations: blocks that own, route to, and composite child blocks
//!
//! A [`Foundation`] keeps a table of children and their bounds in its own
//! coordinate space. Pointer events are hit-tested against that table and
//! forwarded with coordinates shifted into each child's space; child damage
//! is shifted back into the foundation's space and re-published upward.
//!
//! All mutation of the child table happens on the foundation's own task.
//! Other tasks reach it through a [`FoundationHandle`], which sends
//! [`Control`] messages.

use std::sync::Arc;

use image::RgbaImage;
use indexmap::IndexMap;
use mortar_platform::MouseButton;
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use crate::block::{Block, BlockHandle, BlockId, DrawOp, DrawTarget, Drawer, ParentLink, Placement};
use crate::config::RuntimeConfig;
use crate::event::{
    CloseEvent, Event, Invalidation, KeyFocusEvent, KeyFocusRequest, Localize, MouseButtonEvent,
    MouseCrossingEvent, MouseDragEvent, MouseMotionEvent, ResizeEvent, SizeHint,
};
use crate::geom::{Point, Rect, RectSet};
use crate::mailbox::Mailbox;

/// An invalidation tagged with the child it came from
#[derive(Clone, Debug)]
pub struct BlockInvalidation {
    pub block: BlockId,
    pub invalidation: Invalidation,
}

/// A size hint tagged with the child it came from
#[derive(Clone, Copy, Debug)]
pub struct BlockSizeHint {
    pub block: BlockId,
    pub hint: SizeHint,
}

/// Child-table changes requested from outside the foundation's task
#[derive(Debug)]
pub enum Control {
    AddBlock(BlockHandle),
    PlaceBlock(BlockHandle, Rect),
    RemoveBlock(BlockHandle),
    /// The child was adopted by another parent
    Forget(BlockId),
}

/// What a foundation's loop waits on
#[derive(Debug)]
pub enum FoundationMessage {
    Event(Event),
    Resize(ResizeEvent),
    BlockInvalidation(BlockInvalidation),
    BlockSizeHint(BlockSizeHint),
    Control(Control),
}

impl FoundationMessage {
    /// Whether this is the close event that ends a foundation's loop
    pub fn is_close(&self) -> bool {
        matches!(self, FoundationMessage::Event(Event::Close(_)))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Child table
// ─────────────────────────────────────────────────────────────────────────────

/// Children and their bounds, in insertion order
#[derive(Default)]
pub(crate) struct ChildTable {
    children: IndexMap<BlockId, BlockHandle>,
    bounds: IndexMap<BlockId, Rect>,
}

impl ChildTable {
    /// Placed children with their bounds
    fn placed(&self) -> Vec<(BlockHandle, Rect)> {
        self.bounds
            .iter()
            .filter_map(|(id, bounds)| self.children.get(id).map(|c| (c.clone(), *bounds)))
            .collect()
    }

    fn under(&self, p: Point) -> Vec<(BlockHandle, Rect)> {
        self.bounds
            .iter()
            .filter(|(_, bounds)| bounds.contains(p))
            .filter_map(|(id, bounds)| self.children.get(id).map(|c| (c.clone(), *bounds)))
            .collect()
    }

    fn placed_child(&self, id: BlockId) -> Option<(BlockHandle, Rect)> {
        let child = self.children.get(&id)?;
        let bounds = self.bounds.get(&id)?;
        Some((child.clone(), *bounds))
    }

    fn remove(&mut self, id: BlockId) -> Option<BlockHandle> {
        self.bounds.shift_remove(&id);
        self.children.shift_remove(&id)
    }
}

/// Composites placed children over the foundation's own paint
struct FoundationDrawer {
    children: Arc<RwLock<ChildTable>>,
    op: DrawOp,
}

impl Drawer for FoundationDrawer {
    fn draw(&mut self, mut target: DrawTarget<'_>) {
        target.do_paint();
        let placed = self.children.read().placed();
        for (child, bounds) in placed {
            child.composite(target.buffer, bounds, target.invalid, self.op);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// FoundationHandle
// ─────────────────────────────────────────────────────────────────────────────

/// Cloneable address of a foundation
#[derive(Clone)]
pub struct FoundationHandle {
    block: BlockHandle,
    control: mpsc::UnboundedSender<Control>,
    children: Arc<RwLock<ChildTable>>,
}

impl std::fmt::Debug for FoundationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FoundationHandle")
            .field("id", &self.block.id())
            .finish()
    }
}

impl FoundationHandle {
    pub fn block(&self) -> &BlockHandle {
        &self.block
    }

    pub fn id(&self) -> BlockId {
        self.block.id()
    }

    pub fn add_block(&self, child: &BlockHandle) {
        self.send(Control::AddBlock(child.clone()));
    }

    pub fn place_block(&self, child: &BlockHandle, bounds: Rect) {
        self.send(Control::PlaceBlock(child.clone(), bounds));
    }

    pub fn remove_block(&self, child: &BlockHandle) {
        self.send(Control::RemoveBlock(child.clone()));
    }

    /// Bounds of a placed child, in this foundation's space
    pub fn child_bounds(&self, id: BlockId) -> Option<Rect> {
        self.children.read().bounds.get(&id).copied()
    }

    pub fn child_ids(&self) -> Vec<BlockId> {
        self.children.read().children.keys().copied().collect()
    }

    fn send(&self, control: Control) {
        if self.control.send(control).is_err() {
            tracing::trace!(foundation = %self.id(), "foundation task has stopped");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Foundation
// ─────────────────────────────────────────────────────────────────────────────

/// A block that contains and routes to child blocks
pub struct Foundation {
    block: Block,
    children: Arc<RwLock<ChildTable>>,
    hints: FxHashMap<BlockId, SizeHint>,
    drag_origins: FxHashMap<MouseButton, Vec<BlockId>>,
    key_focus: Option<BlockId>,
    draw_op: DrawOp,
    invalidations_tx: mpsc::Sender<BlockInvalidation>,
    invalidations_rx: mpsc::Receiver<BlockInvalidation>,
    size_hints_tx: mpsc::Sender<BlockSizeHint>,
    size_hints_rx: mpsc::Receiver<BlockSizeHint>,
    control_tx: mpsc::UnboundedSender<Control>,
    control_rx: mpsc::UnboundedReceiver<Control>,
}

impl std::fmt::Debug for Foundation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Foundation")
            .field("block", &self.block)
            .field("children", &self.children.read().children.len())
            .field("key_focus", &self.key_focus)
            .finish()
    }
}

impl Default for Foundation {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Foundation {
    /// Cut the children loose: their relays into this foundation stop and
    /// they report no parent.
    fn drop(&mut self) {
        let me = self.id();
        for child in self.children() {
            let mut link = child.shared.parent.lock();
            if link.as_ref().is_some_and(|l| l.id == me) {
                if let Some(old) = link.take() {
                    old.abort_relays();
                }
            }
        }
    }
}

impl Foundation {
    /// Must be called inside a tokio runtime.
    pub fn new() -> Self {
        Self::with_config(&RuntimeConfig::default())
    }

    pub fn with_config(config: &RuntimeConfig) -> Self {
        let block = Block::with_config(config);
        let children = Arc::new(RwLock::new(ChildTable::default()));
        let (invalidations_tx, invalidations_rx) = mpsc::channel(1);
        let (size_hints_tx, size_hints_rx) = mpsc::channel(1);
        let (control_tx, control_rx) = mpsc::unbounded_channel();

        let foundation = Self {
            block,
            children,
            hints: FxHashMap::default(),
            drag_origins: FxHashMap::default(),
            key_focus: None,
            draw_op: DrawOp::Over,
            invalidations_tx,
            invalidations_rx,
            size_hints_tx,
            size_hints_rx,
            control_tx,
            control_rx,
        };
        foundation.install_drawer();
        foundation
    }

    fn install_drawer(&self) {
        self.block.handle().set_drawer(Box::new(FoundationDrawer {
            children: Arc::clone(&self.children),
            op: self.draw_op,
        }));
    }

    pub fn block(&self) -> &Block {
        &self.block
    }

    pub fn block_mut(&mut self) -> &mut Block {
        &mut self.block
    }

    pub fn id(&self) -> BlockId {
        self.block.id()
    }

    pub fn handle(&self) -> FoundationHandle {
        FoundationHandle {
            block: self.block.handle().clone(),
            control: self.control_tx.clone(),
            children: Arc::clone(&self.children),
        }
    }

    pub fn draw_op(&self) -> DrawOp {
        self.draw_op
    }

    /// How placed children are composited onto this foundation
    pub fn set_draw_op(&mut self, op: DrawOp) {
        self.draw_op = op;
        self.install_drawer();
    }

    pub fn key_focus(&self) -> Option<BlockId> {
        self.key_focus
    }

    pub fn child_bounds(&self, id: BlockId) -> Option<Rect> {
        self.children.read().bounds.get(&id).copied()
    }

    /// Last size hint reported by a child
    pub fn child_hint(&self, id: BlockId) -> Option<SizeHint> {
        self.hints.get(&id).copied()
    }

    pub fn children(&self) -> Vec<BlockHandle> {
        self.children.read().children.values().cloned().collect()
    }

    pub fn is_child(&self, id: BlockId) -> bool {
        self.children.read().children.contains_key(&id)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Child lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Adopt `child`, detaching it from any previous parent.
    ///
    /// Adding a block that is already a child is a no-op.
    pub fn add_block(&mut self, child: &BlockHandle) {
        let me = self.id();
        let id = child.id();
        if id == me {
            tracing::warn!(block = %id, "refusing to add a foundation to itself");
            return;
        }

        let size_hints = Mailbox::new();
        {
            let mut link = child.shared.parent.lock();
            if link.as_ref().is_some_and(|l| l.id == me) {
                return;
            }
            if let Some(old) = link.take() {
                old.abort_relays();
                tracing::debug!(block = %id, from = %old.id, to = %me, "re-parenting block");
                if old.control.send(Control::Forget(id)).is_err() {
                    tracing::trace!(block = %id, "previous parent has stopped");
                }
            }

            self.children.write().children.insert(id, child.clone());

            let relays = vec![
                spawn_invalidation_relay(
                    id,
                    child.attach_invalidation_mailbox(),
                    self.invalidations_tx.clone(),
                ),
                spawn_size_hint_relay(id, size_hints.clone(), self.size_hints_tx.clone()),
            ];
            *link = Some(ParentLink {
                id: me,
                events: self.block.handle().sender(),
                control: self.control_tx.clone(),
                relays,
            });
        }

        child.notify_placement(Placement {
            parent: me,
            size_hints,
        });
        tracing::debug!(foundation = %me, block = %id, "added block");
    }

    /// Adopt `child` and give it `bounds` in this foundation's space
    pub fn place_block(&mut self, child: &BlockHandle, bounds: Rect) {
        self.add_block(child);
        if !self.is_child(child.id()) {
            return;
        }
        self.children.write().bounds.insert(child.id(), bounds);
        child.resize(bounds.size());
        tracing::trace!(foundation = %self.id(), block = %child.id(), ?bounds, "placed block");
    }

    /// Detach `child`. Blocks that are not children here are ignored.
    pub fn remove_block(&mut self, child: &BlockHandle) {
        let id = child.id();
        {
            let mut link = child.shared.parent.lock();
            if !link.as_ref().is_some_and(|l| l.id == self.id()) {
                tracing::trace!(foundation = %self.id(), block = %id, "remove of a non-child");
                return;
            }
            if let Some(old) = link.take() {
                old.abort_relays();
            }
        }
        child.detach_invalidation_mailbox();
        self.forget(id);
        tracing::debug!(foundation = %self.id(), block = %id, "removed block");
    }

    /// Drop every record of `id` without touching the block itself
    fn forget(&mut self, id: BlockId) {
        self.children.write().remove(id);
        self.hints.remove(&id);
        for origins in self.drag_origins.values_mut() {
            origins.retain(|origin| *origin != id);
        }
        if self.key_focus == Some(id) {
            self.key_focus = None;
        }
    }

    fn do_control(&mut self, control: Control) {
        match control {
            Control::AddBlock(child) => self.add_block(&child),
            Control::PlaceBlock(child, bounds) => self.place_block(&child, bounds),
            Control::RemoveBlock(child) => self.remove_block(&child),
            Control::Forget(id) => {
                tracing::debug!(foundation = %self.id(), block = %id, "child adopted elsewhere");
                self.forget(id);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Hit testing
    // ─────────────────────────────────────────────────────────────────────

    /// Every placed child whose bounds contain `p`, in insertion order
    pub fn blocks_for_coord(&self, p: Point) -> Vec<BlockHandle> {
        self.children.read().under(p).into_iter().map(|(c, _)| c).collect()
    }

    /// Call `f` on the first placed child under `p`, with its bounds
    pub fn invoke_on_blocks_under<F>(&self, p: Point, f: F)
    where
        F: FnOnce(&BlockHandle, Rect),
    {
        let hit = self.children.read().under(p).into_iter().next();
        if let Some((child, bounds)) = hit {
            f(&child, bounds);
        }
    }

    fn under(&self, p: Point) -> Vec<(BlockHandle, Rect)> {
        self.children.read().under(p)
    }

    fn placed_child(&self, id: BlockId) -> Option<(BlockHandle, Rect)> {
        self.children.read().placed_child(id)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Event routing
    // ─────────────────────────────────────────────────────────────────────

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Close(e) => self.do_close_event(e),
            Event::MouseDown(e) => self.do_mouse_down_event(e),
            Event::MouseUp(e) => self.do_mouse_up_event(e),
            Event::MouseMoved(e) => self.do_mouse_moved_event(e),
            Event::MouseDragged(e) => self.do_mouse_dragged_event(e),
            Event::KeyFocus(e) => self.do_key_focus_event(e),
            Event::KeyFocusRequest(e) => self.key_focus_request(e),
            e @ (Event::KeyDown(_) | Event::KeyUp(_) | Event::KeyTyped(_)) => self.do_key_event(e),
            other => self.block.handle_event(&other),
        }
    }

    fn do_close_event(&self, e: CloseEvent) {
        for child in self.children() {
            child.send_event(Event::Close(e.clone()));
        }
    }

    fn do_mouse_down_event(&mut self, e: MouseButtonEvent) {
        for (child, bounds) in self.under(e.loc) {
            self.drag_origins
                .entry(e.button)
                .or_default()
                .push(child.id());
            child.send_event(Event::MouseDown(e.localized(bounds.min())));
        }
    }

    fn do_mouse_up_event(&mut self, e: MouseButtonEvent) {
        let mut touched = FxHashSet::default();
        for (child, bounds) in self.under(e.loc) {
            touched.insert(child.id());
            child.send_event(Event::MouseUp(e.localized(bounds.min())));
        }
        let origins = self.drag_origins.remove(&e.button).unwrap_or_default();
        for origin in origins {
            if !touched.insert(origin) {
                continue;
            }
            if let Some((child, bounds)) = self.placed_child(origin) {
                child.send_event(Event::MouseUp(e.localized(bounds.min())));
            }
        }
    }

    fn do_mouse_moved_event(&mut self, e: MouseMotionEvent) {
        self.route_motion(e.loc, e.from, e.when, |origin| {
            Event::MouseMoved(e.localized(origin))
        });
    }

    fn do_mouse_dragged_event(&mut self, e: MouseDragEvent) {
        let mut touched = self.route_motion(e.loc, e.from, e.when, |origin| {
            Event::MouseDragged(e.localized(origin))
        });
        let origins = self.drag_origins.get(&e.button).cloned().unwrap_or_default();
        for origin in origins {
            if !touched.insert(origin) {
                continue;
            }
            if let Some((child, bounds)) = self.placed_child(origin) {
                child.send_event(Event::MouseDragged(e.localized(bounds.min())));
            }
        }
    }

    /// Deliver a motion event to the children under `loc`, synthesizing
    /// enter and exit events from the children under `from`.
    ///
    /// Returns the children under `loc`.
    fn route_motion<F>(
        &self,
        loc: Point,
        from: Point,
        when: std::time::Duration,
        forward: F,
    ) -> FxHashSet<BlockId>
    where
        F: Fn(Point) -> Event,
    {
        let crossing = MouseCrossingEvent { when, loc, from };
        let before = self.under(from);
        let was_under: FxHashSet<BlockId> = before.iter().map(|(c, _)| c.id()).collect();

        let mut touched = FxHashSet::default();
        for (child, bounds) in self.under(loc) {
            touched.insert(child.id());
            if !was_under.contains(&child.id()) {
                child.send_event(Event::MouseEntered(crossing.localized(bounds.min())));
            }
            child.send_event(forward(bounds.min()));
        }
        for (child, bounds) in before {
            if !touched.contains(&child.id()) {
                child.send_event(Event::MouseExited(crossing.localized(bounds.min())));
            }
        }
        touched
    }

    fn do_key_event(&self, e: Event) {
        let Some(focus) = self.key_focus else {
            return;
        };
        match self.children.read().children.get(&focus) {
            Some(child) => {
                child.send_event(e);
            }
            None => tracing::trace!(foundation = %self.id(), "key focus holder is gone"),
        }
    }

    fn do_key_focus_event(&mut self, e: KeyFocusEvent) {
        if e.focus == self.block.has_key_focus() {
            return;
        }
        self.block.set_has_key_focus(e.focus);
        if let Some(focus) = self.key_focus {
            if let Some(child) = self.children.read().children.get(&focus) {
                child.send_event(Event::KeyFocus(e));
            }
        }
    }

    /// A child wants keyboard focus.
    ///
    /// The previous holder is told it lost focus. The new holder is told it
    /// gained focus only if this foundation holds focus itself; otherwise
    /// the request bubbles to this foundation's parent.
    fn key_focus_request(&mut self, request: KeyFocusRequest) {
        let id = request.block.id();
        if !self.is_child(id) {
            tracing::trace!(foundation = %self.id(), block = %id, "focus request from a non-child");
            return;
        }
        if let Some(previous) = self.key_focus.filter(|previous| *previous != id) {
            if let Some(child) = self.children.read().children.get(&previous) {
                child.send_event(Event::KeyFocus(KeyFocusEvent { focus: false }));
            }
        }
        self.key_focus = Some(id);
        if self.block.has_key_focus() {
            request
                .block
                .send_event(Event::KeyFocus(KeyFocusEvent { focus: true }));
        } else {
            self.block.request_key_focus();
        }
    }

    /// Re-publish a child's damage in this foundation's space
    pub fn do_block_invalidation(&self, e: BlockInvalidation) {
        let Some(bounds) = self.child_bounds(e.block) else {
            tracing::trace!(foundation = %self.id(), block = %e.block, "invalidation from an unplaced child");
            return;
        };
        let rects: Vec<Rect> = e
            .invalidation
            .bounds
            .iter()
            .map(|r| r.translate(bounds.min()))
            .collect();
        if rects.is_empty() {
            return;
        }
        self.block.invalidate(&rects);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Loop
    // ─────────────────────────────────────────────────────────────────────

    /// Wait for the next message addressed to this foundation.
    ///
    /// Returns `None` once the event pump has stopped.
    pub async fn next_message(&mut self) -> Option<FoundationMessage> {
        let resizes = &self.block.handle.shared.resize;
        tokio::select! {
            event = self.block.events.recv() => event.map(FoundationMessage::Event),
            Some(resize) = resizes.recv() => Some(FoundationMessage::Resize(resize)),
            Some(inv) = self.invalidations_rx.recv() => Some(FoundationMessage::BlockInvalidation(inv)),
            Some(hint) = self.size_hints_rx.recv() => Some(FoundationMessage::BlockSizeHint(hint)),
            Some(control) = self.control_rx.recv() => Some(FoundationMessage::Control(control)),
        }
    }

    pub fn dispatch(&mut self, message: FoundationMessage) {
        match message {
            FoundationMessage::Event(event) => self.handle_event(event),
            FoundationMessage::Resize(resize) => self.block.do_resize_event(resize),
            FoundationMessage::BlockInvalidation(inv) => self.do_block_invalidation(inv),
            FoundationMessage::BlockSizeHint(hint) => {
                self.hints.insert(hint.block, hint.hint);
            }
            FoundationMessage::Control(control) => self.do_control(control),
        }
    }

    /// The default foundation loop. Ends on [`Event::Close`], after passing
    /// it to every child.
    pub async fn handle_events(mut self) {
        while let Some(message) = self.next_message().await {
            let close = message.is_close();
            self.dispatch(message);
            if close {
                break;
            }
        }
        tracing::trace!(foundation = %self.id(), "foundation loop ended");
    }

    /// Run the default loop on its own task
    pub fn spawn(self) -> FoundationHandle {
        let handle = self.handle();
        tokio::spawn(self.handle_events());
        handle
    }

    /// Render this foundation and its children into `buffer`
    pub fn draw(&self, buffer: &mut RgbaImage, invalid: &RectSet) {
        self.block.handle().draw(buffer, invalid);
    }
}

fn spawn_invalidation_relay(
    block: BlockId,
    source: Mailbox<Invalidation>,
    sink: mpsc::Sender<BlockInvalidation>,
) -> AbortHandle {
    tokio::spawn(async move {
        while let Some(invalidation) = source.recv().await {
            let tagged = BlockInvalidation {
                block,
                invalidation,
            };
            if sink.send(tagged).await.is_err() {
                break;
            }
        }
    })
    .abort_handle()
}

fn spawn_size_hint_relay(
    block: BlockId,
    source: Mailbox<SizeHint>,
    sink: mpsc::Sender<BlockSizeHint>,
) -> AbortHandle {
    tokio::spawn(async move {
        while let Some(hint) = source.recv().await {
            if sink.send(BlockSizeHint { block, hint }).await.is_err() {
                break;
            }
        }
    })
    .abort_handle()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockMessage;
    use crate::event::KeyEvent;
    use crate::geom::Size;
    use mortar_platform::Key;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::timeout;

    const QUIET: Duration = Duration::from_millis(50);

    fn rect(x0: f32, y0: f32, x1: f32, y1: f32) -> Rect {
        Rect::from_min_max(Point::new(x0, y0), Point::new(x1, y1))
    }

    fn down(x: f32, y: f32) -> Event {
        Event::MouseDown(MouseButtonEvent {
            when: Duration::ZERO,
            loc: Point::new(x, y),
            button: MouseButton::Left,
        })
    }

    fn up(x: f32, y: f32) -> Event {
        Event::MouseUp(MouseButtonEvent {
            when: Duration::ZERO,
            loc: Point::new(x, y),
            button: MouseButton::Left,
        })
    }

    /// Next event delivered to `block`, skipping resizes
    async fn next_event(block: &mut Block) -> Option<Event> {
        loop {
            match timeout(QUIET, block.next_message()).await {
                Ok(Some(BlockMessage::Event(event))) => return Some(event),
                Ok(Some(BlockMessage::Resize(_))) => continue,
                _ => return None,
            }
        }
    }

    async fn next_foundation_event(f: &mut Foundation) -> Option<Event> {
        loop {
            match timeout(QUIET, f.next_message()).await {
                Ok(Some(FoundationMessage::Event(event))) => return Some(event),
                Ok(Some(_)) => continue,
                _ => return None,
            }
        }
    }

    #[tokio::test]
    async fn test_mouse_down_is_translated_into_child_space() {
        let mut f = Foundation::new();
        let mut child = Block::new();
        f.place_block(child.handle(), rect(10.0, 10.0, 60.0, 40.0));

        f.handle_event(down(15.0, 12.0));

        match next_event(&mut child).await {
            Some(Event::MouseDown(e)) => assert_eq!(e.loc, Point::new(5.0, 2.0)),
            other => panic!("expected mouse down, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_mouse_outside_children_goes_nowhere() {
        let mut f = Foundation::new();
        let mut child = Block::new();
        f.place_block(child.handle(), rect(10.0, 10.0, 60.0, 40.0));

        f.handle_event(down(100.0, 100.0));
        assert!(next_event(&mut child).await.is_none());
    }

    #[tokio::test]
    async fn test_drag_origin_receives_mouse_up() {
        let mut f = Foundation::new();
        let mut a = Block::new();
        let mut b = Block::new();
        f.place_block(a.handle(), rect(0.0, 0.0, 10.0, 10.0));
        f.place_block(b.handle(), rect(20.0, 0.0, 30.0, 10.0));

        f.handle_event(down(5.0, 5.0));
        f.handle_event(up(25.0, 5.0));

        assert!(matches!(next_event(&mut a).await, Some(Event::MouseDown(_))));
        match next_event(&mut a).await {
            Some(Event::MouseUp(e)) => assert_eq!(e.loc, Point::new(25.0, 5.0)),
            other => panic!("expected mouse up for origin, got {other:?}"),
        }
        assert!(next_event(&mut a).await.is_none());

        match next_event(&mut b).await {
            Some(Event::MouseUp(e)) => assert_eq!(e.loc, Point::new(5.0, 5.0)),
            other => panic!("expected mouse up under pointer, got {other:?}"),
        }
        assert!(next_event(&mut b).await.is_none());
    }

    #[tokio::test]
    async fn test_mouse_up_clears_drag_origins() {
        let mut f = Foundation::new();
        let mut a = Block::new();
        f.place_block(a.handle(), rect(0.0, 0.0, 10.0, 10.0));

        f.handle_event(down(5.0, 5.0));
        f.handle_event(up(50.0, 50.0));
        f.handle_event(up(50.0, 50.0));

        assert!(matches!(next_event(&mut a).await, Some(Event::MouseDown(_))));
        assert!(matches!(next_event(&mut a).await, Some(Event::MouseUp(_))));
        assert!(next_event(&mut a).await.is_none());
    }

    #[tokio::test]
    async fn test_motion_synthesizes_enter_and_exit() {
        let mut f = Foundation::new();
        let mut a = Block::new();
        let mut b = Block::new();
        f.place_block(a.handle(), rect(0.0, 0.0, 10.0, 10.0));
        f.place_block(b.handle(), rect(20.0, 0.0, 30.0, 10.0));

        f.handle_event(Event::MouseMoved(MouseMotionEvent {
            when: Duration::ZERO,
            loc: Point::new(25.0, 5.0),
            from: Point::new(5.0, 5.0),
        }));

        match next_event(&mut a).await {
            Some(Event::MouseExited(e)) => assert_eq!(e.loc, Point::new(25.0, 5.0)),
            other => panic!("expected exit, got {other:?}"),
        }
        assert!(next_event(&mut a).await.is_none());

        match next_event(&mut b).await {
            Some(Event::MouseEntered(e)) => {
                assert_eq!(e.loc, Point::new(5.0, 5.0));
                assert_eq!(e.from, Point::new(-15.0, 5.0));
            }
            other => panic!("expected enter, got {other:?}"),
        }
        assert!(matches!(next_event(&mut b).await, Some(Event::MouseMoved(_))));
    }

    #[tokio::test]
    async fn test_motion_within_a_child_is_a_plain_move() {
        let mut f = Foundation::new();
        let mut a = Block::new();
        let mut b = Block::new();
        f.place_block(a.handle(), rect(10.0, 10.0, 30.0, 30.0));
        f.place_block(b.handle(), rect(40.0, 10.0, 60.0, 30.0));

        f.handle_event(Event::MouseMoved(MouseMotionEvent {
            when: Duration::ZERO,
            loc: Point::new(16.0, 17.0),
            from: Point::new(12.0, 12.0),
        }));

        match next_event(&mut a).await {
            Some(Event::MouseMoved(e)) => {
                assert_eq!(e.loc, Point::new(6.0, 7.0));
                assert_eq!(e.from, Point::new(2.0, 2.0));
            }
            other => panic!("expected a plain move, got {other:?}"),
        }
        assert!(next_event(&mut a).await.is_none());
        assert!(next_event(&mut b).await.is_none());
    }

    #[tokio::test]
    async fn test_drag_replays_to_origin() {
        let mut f = Foundation::new();
        let mut a = Block::new();
        f.place_block(a.handle(), rect(0.0, 0.0, 10.0, 10.0));

        f.handle_event(down(5.0, 5.0));
        f.handle_event(Event::MouseDragged(MouseDragEvent {
            when: Duration::ZERO,
            loc: Point::new(40.0, 40.0),
            from: Point::new(30.0, 30.0),
            button: MouseButton::Left,
        }));

        assert!(matches!(next_event(&mut a).await, Some(Event::MouseDown(_))));
        match next_event(&mut a).await {
            Some(Event::MouseDragged(e)) => assert_eq!(e.loc, Point::new(40.0, 40.0)),
            other => panic!("expected replayed drag, got {other:?}"),
        }
        assert!(next_event(&mut a).await.is_none());
    }

    #[tokio::test]
    async fn test_invalidations_bubble_as_one_union() {
        let mut f = Foundation::new();
        let parent_damage = f.block().handle().attach_invalidation_mailbox();
        let child = Block::new();
        f.place_block(child.handle(), rect(10.0, 10.0, 60.0, 40.0));

        child.invalidate(&[Rect::new(0.0, 0.0, 5.0, 5.0)]);
        child.invalidate(&[Rect::new(20.0, 20.0, 5.0, 5.0)]);

        let message = timeout(QUIET, f.next_message()).await.unwrap().unwrap();
        assert!(matches!(message, FoundationMessage::BlockInvalidation(_)));
        f.dispatch(message);

        let inv = parent_damage.try_recv().unwrap();
        assert_eq!(
            inv.bounds.as_slice(),
            &[Rect::new(10.0, 10.0, 5.0, 5.0), Rect::new(30.0, 30.0, 5.0, 5.0)]
        );
        assert!(parent_damage.try_recv().is_none());
        assert!(timeout(QUIET, f.next_message()).await.is_err());
    }

    #[tokio::test]
    async fn test_invalidation_from_removed_child_is_ignored() {
        let mut f = Foundation::new();
        let parent_damage = f.block().handle().attach_invalidation_mailbox();
        let child = Block::new();
        f.place_block(child.handle(), rect(0.0, 0.0, 10.0, 10.0));
        f.remove_block(child.handle());

        assert_eq!(child.handle().parent_id(), None);
        child.invalidate(&[]);
        assert!(timeout(QUIET, f.next_message()).await.is_err());
        assert!(parent_damage.try_recv().is_none());
    }

    struct Counting(Arc<AtomicUsize>);

    impl Drawer for Counting {
        fn draw(&mut self, mut target: DrawTarget<'_>) {
            self.0.fetch_add(1, Ordering::SeqCst);
            target.do_paint();
        }
    }

    #[tokio::test]
    async fn test_draw_skips_undamaged_children() {
        let mut f = Foundation::new();
        let a = Block::new();
        let b = Block::new();
        let a_draws = Arc::new(AtomicUsize::new(0));
        let b_draws = Arc::new(AtomicUsize::new(0));
        a.handle().set_drawer(Box::new(Counting(Arc::clone(&a_draws))));
        b.handle().set_drawer(Box::new(Counting(Arc::clone(&b_draws))));
        f.place_block(a.handle(), rect(0.0, 0.0, 20.0, 20.0));
        f.place_block(b.handle(), rect(40.0, 0.0, 60.0, 20.0));

        let mut buffer = RgbaImage::new(60, 20);
        let everything = RectSet::from_rect(Rect::new(0.0, 0.0, 60.0, 20.0));
        f.draw(&mut buffer, &everything);
        assert_eq!(a_draws.load(Ordering::SeqCst), 1);
        assert_eq!(b_draws.load(Ordering::SeqCst), 1);

        let only_a = RectSet::from_rect(Rect::new(5.0, 5.0, 5.0, 5.0));
        f.draw(&mut buffer, &only_a);
        assert_eq!(a_draws.load(Ordering::SeqCst), 2);
        assert_eq!(b_draws.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_focus_request_bubbles_when_unfocused() {
        let mut outer = Foundation::new();
        let mut inner = Foundation::new();
        let mut child = Block::new();
        outer.add_block(inner.block().handle());
        inner.add_block(child.handle());

        child.request_key_focus();
        let request = next_foundation_event(&mut inner).await;
        match request {
            Some(e @ Event::KeyFocusRequest(_)) => inner.handle_event(e),
            other => panic!("expected focus request, got {other:?}"),
        }
        assert_eq!(inner.key_focus(), Some(child.id()));

        match next_foundation_event(&mut outer).await {
            Some(Event::KeyFocusRequest(r)) => assert_eq!(r.block.id(), inner.id()),
            other => panic!("expected bubbled request, got {other:?}"),
        }
        assert!(next_foundation_event(&mut outer).await.is_none());
        assert!(next_event(&mut child).await.is_none());

        // Once the ambient focus arrives it is handed to the child.
        inner.handle_event(Event::KeyFocus(KeyFocusEvent { focus: true }));
        assert!(matches!(
            next_event(&mut child).await,
            Some(Event::KeyFocus(KeyFocusEvent { focus: true }))
        ));
    }

    #[tokio::test]
    async fn test_focused_foundation_switches_focus_and_routes_keys() {
        let mut f = Foundation::new();
        f.handle_event(Event::KeyFocus(KeyFocusEvent { focus: true }));
        let mut a = Block::new();
        let mut b = Block::new();
        f.add_block(a.handle());
        f.add_block(b.handle());

        f.handle_event(Event::KeyFocusRequest(KeyFocusRequest {
            block: a.handle().clone(),
        }));
        f.handle_event(Event::KeyFocusRequest(KeyFocusRequest {
            block: b.handle().clone(),
        }));
        f.handle_event(Event::KeyDown(KeyEvent {
            when: Duration::ZERO,
            key: Key::Char('k'),
            modifiers: Default::default(),
        }));

        assert!(matches!(
            next_event(&mut a).await,
            Some(Event::KeyFocus(KeyFocusEvent { focus: true }))
        ));
        assert!(matches!(
            next_event(&mut a).await,
            Some(Event::KeyFocus(KeyFocusEvent { focus: false }))
        ));
        assert!(next_event(&mut a).await.is_none());

        assert!(matches!(
            next_event(&mut b).await,
            Some(Event::KeyFocus(KeyFocusEvent { focus: true }))
        ));
        assert!(matches!(next_event(&mut b).await, Some(Event::KeyDown(_))));
    }

    #[tokio::test]
    async fn test_size_hint_follows_reparenting() {
        let mut first = Foundation::new();
        let mut second = Foundation::new();
        let child = Block::new();
        let hint = SizeHint::fixed(Size::new(12.0, 8.0));

        first.add_block(child.handle());
        child.set_size_hint(hint);
        match timeout(QUIET, first.next_message()).await.unwrap() {
            Some(FoundationMessage::BlockSizeHint(h)) => {
                assert_eq!(h.block, child.id());
                assert_eq!(h.hint, hint);
            }
            other => panic!("expected size hint, got {other:?}"),
        }

        second.add_block(child.handle());
        assert_eq!(child.handle().parent_id(), Some(second.id()));
        match timeout(QUIET, second.next_message()).await.unwrap() {
            Some(FoundationMessage::BlockSizeHint(h)) => assert_eq!(h.hint, hint),
            other => panic!("expected size hint after re-parenting, got {other:?}"),
        }

        let message = timeout(QUIET, first.next_message()).await.unwrap().unwrap();
        assert!(matches!(message, FoundationMessage::Control(Control::Forget(_))));
        first.dispatch(message);
        assert!(!first.is_child(child.id()));
    }

    async fn until<F: Fn() -> bool>(done: F) {
        timeout(QUIET, async {
            while !done() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_close_ends_the_whole_tree() {
        let f = Foundation::new();
        let handle = f.handle();
        let root = tokio::spawn(f.handle_events());
        let child = Block::new();
        let child_handle = child.handle().clone();
        let leaf = tokio::spawn(child.handle_events());

        handle.place_block(&child_handle, rect(0.0, 0.0, 10.0, 10.0));
        until(|| handle.child_bounds(child_handle.id()).is_some()).await;

        handle.block().send_event(Event::Close(CloseEvent {
            when: Duration::ZERO,
        }));
        timeout(QUIET, root).await.unwrap().unwrap();
        timeout(QUIET, leaf).await.unwrap().unwrap();

        // Both event pumps are gone and the child no longer has a parent.
        until(|| handle.block().sender().is_closed()).await;
        until(|| child_handle.sender().is_closed()).await;
        assert_eq!(child_handle.parent_id(), None);
        assert!(!child_handle.send_event(Event::Close(CloseEvent {
            when: Duration::ZERO,
        })));
    }

    #[tokio::test]
    async fn test_close_is_broadcast() {
        let mut f = Foundation::new();
        let mut a = Block::new();
        let mut b = Block::new();
        f.add_block(a.handle());
        f.place_block(b.handle(), rect(0.0, 0.0, 1.0, 1.0));

        f.handle_event(Event::Close(CloseEvent {
            when: Duration::ZERO,
        }));
        assert!(matches!(next_event(&mut a).await, Some(Event::Close(_))));
        assert!(matches!(next_event(&mut b).await, Some(Event::Close(_))));
    }

    #[tokio::test]
    async fn test_handle_controls_run_on_the_task() {
        let f = Foundation::new();
        let handle = f.spawn();
        let child = Block::new();
        handle.place_block(child.handle(), rect(1.0, 2.0, 3.0, 4.0));

        let mut bounds = None;
        for _ in 0..10 {
            tokio::task::yield_now().await;
            bounds = handle.child_bounds(child.id());
            if bounds.is_some() {
                break;
            }
        }
        assert_eq!(bounds, Some(rect(1.0, 2.0, 3.0, 4.0)));
        assert_eq!(handle.child_ids(), vec![child.id()]);
    }
}
