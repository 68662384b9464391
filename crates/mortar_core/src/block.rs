//! Blocks: the addressable, paintable unit of the runtime
//!
//! A block is split in two. [`Block`] is the state owned by the block's own
//! task: its size, focus flag and inbound event receiver. [`BlockHandle`] is
//! the cheap, cloneable address other tasks use to reach it: event delivery,
//! coalescing mailboxes, and the surface a parent draws through.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use image::{imageops, RgbaImage};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use crate::canvas::{zero_region, Canvas};
use crate::config::RuntimeConfig;
use crate::event::{Event, Invalidation, KeyFocusRequest, ResizeEvent, SizeHint};
use crate::foundation::Control;
use crate::geom::{Point, Rect, RectSet, Size};
use crate::mailbox::{Coalesce, Mailbox};
use crate::subscription::{subscription_queue, EventSender, Subscription, Verdict};

/// Capacity of the channel handed out by [`BlockHandle::subscribe`]
const SUBSCRIPTION_CAPACITY: usize = 16;

/// Process-unique block identity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(u64);

impl BlockId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        BlockId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Drawing
// ─────────────────────────────────────────────────────────────────────────────

pub type PaintFn = Box<dyn FnMut(&mut Canvas<'_>) + Send>;

/// How two buffers are combined when compositing
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DrawOp {
    /// Source-over alpha blending
    #[default]
    Over,
    /// Source replaces destination
    Src,
}

/// Copy `src` into `dst` with its top-left corner at `at`
pub fn blit(dst: &mut RgbaImage, src: &RgbaImage, at: Point, op: DrawOp) {
    let (x, y) = (at.x.round() as i64, at.y.round() as i64);
    match op {
        DrawOp::Over => imageops::overlay(dst, src, x, y),
        DrawOp::Src => imageops::replace(dst, src, x, y),
    }
}

/// What a [`Drawer`] renders into
pub struct DrawTarget<'a> {
    pub buffer: &'a mut RgbaImage,
    /// Damaged regions in the buffer's space
    pub invalid: &'a RectSet,
    paint: &'a mut Option<PaintFn>,
}

impl DrawTarget<'_> {
    /// Run the block's paint callback over the whole buffer
    pub fn do_paint(&mut self) {
        if let Some(paint) = self.paint.as_mut() {
            let mut canvas = Canvas::new(&mut *self.buffer);
            paint(&mut canvas);
        }
    }
}

/// Renders a block's content into a buffer
pub trait Drawer: Send {
    fn draw(&mut self, target: DrawTarget<'_>);
}

/// Paints unconditionally, ignoring the damaged regions
#[derive(Debug, Default)]
pub struct PaintDrawer;

impl Drawer for PaintDrawer {
    fn draw(&mut self, mut target: DrawTarget<'_>) {
        target.do_paint();
    }
}

/// Paint callback that fills the block with `background`
pub fn clear_paint(background: crate::canvas::Color) -> PaintFn {
    Box::new(move |canvas: &mut Canvas<'_>| canvas.clear(background))
}

struct Surface {
    paint: Option<PaintFn>,
    drawer: Box<dyn Drawer>,
    /// Cached rendering, owned by this block and read by its parent
    buffer: Option<RgbaImage>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Placement
// ─────────────────────────────────────────────────────────────────────────────

/// Notice that a block was attached to a new parent
#[derive(Clone, Debug)]
pub(crate) struct Placement {
    pub(crate) parent: BlockId,
    /// Where the block's size hints now go
    pub(crate) size_hints: Mailbox<SizeHint>,
}

impl Coalesce for Placement {
    fn coalesce(self, newer: Self) -> Self {
        newer
    }
}

/// A block's view of its current parent
pub(crate) struct ParentLink {
    pub(crate) id: BlockId,
    pub(crate) events: EventSender,
    pub(crate) control: mpsc::UnboundedSender<Control>,
    /// Relay tasks the parent spawned for this child
    pub(crate) relays: Vec<AbortHandle>,
}

impl ParentLink {
    pub(crate) fn abort_relays(&self) {
        for relay in &self.relays {
            relay.abort();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BlockHandle
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) struct BlockShared {
    pub(crate) id: BlockId,
    pub(crate) events: EventSender,
    subscribe: mpsc::UnboundedSender<Subscription>,
    pub(crate) resize: Mailbox<ResizeEvent>,
    placement: Mailbox<Placement>,
    size_hint: Mailbox<SizeHint>,
    invalidations: Mutex<Option<Mailbox<Invalidation>>>,
    pub(crate) parent: Mutex<Option<ParentLink>>,
    surface: Mutex<Surface>,
}

impl Drop for BlockShared {
    fn drop(&mut self) {
        self.resize.close();
        self.placement.close();
        self.size_hint.close();
        if let Some(invalidations) = self.invalidations.get_mut().take() {
            invalidations.close();
        }
        if let Some(link) = self.parent.get_mut().take() {
            link.abort_relays();
        }
    }
}

/// Cloneable address of a block
#[derive(Clone)]
pub struct BlockHandle {
    pub(crate) shared: Arc<BlockShared>,
}

impl PartialEq for BlockHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for BlockHandle {}

impl std::fmt::Debug for BlockHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockHandle")
            .field("id", &self.id())
            .field("parent", &self.parent_id())
            .finish()
    }
}

impl BlockHandle {
    pub fn id(&self) -> BlockId {
        self.shared.id
    }

    /// Deliver an event with send-or-drop semantics
    pub fn send_event(&self, event: Event) -> bool {
        self.shared.events.send_or_drop(event)
    }

    pub fn sender(&self) -> EventSender {
        self.shared.events.clone()
    }

    /// Register a subscription on this block's inbound events
    pub fn subscribe_with(&self, subscription: Subscription) {
        if self.shared.subscribe.send(subscription).is_err() {
            tracing::trace!(block = %self.id(), "subscription queue closed");
        }
    }

    /// Tap the events accepted by `filter`
    pub fn subscribe<F>(&self, filter: F) -> mpsc::Receiver<Event>
    where
        F: FnMut(&Event) -> Verdict + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_CAPACITY);
        self.subscribe_with(Subscription::new(filter, tx));
        rx
    }

    /// Ask the block to take a new size
    pub fn resize(&self, size: Size) {
        self.shared.resize.stack(ResizeEvent { size });
    }

    /// Publish a new size hint to whatever parent the block has now or later
    pub fn set_size_hint(&self, hint: SizeHint) {
        self.shared.size_hint.stack(hint);
    }

    pub fn set_paint(&self, paint: PaintFn) {
        self.shared.surface.lock().paint = Some(paint);
    }

    /// Leave the block unpainted, so whatever is beneath shows through
    pub fn remove_paint(&self) {
        self.shared.surface.lock().paint = None;
    }

    pub fn set_drawer(&self, drawer: Box<dyn Drawer>) {
        self.shared.surface.lock().drawer = drawer;
    }

    pub fn parent_id(&self) -> Option<BlockId> {
        self.shared.parent.lock().as_ref().map(|link| link.id)
    }

    /// Damage this block in its own coordinate space
    pub fn invalidate(&self, rects: RectSet) {
        if rects.is_empty() {
            return;
        }
        if let Some(mailbox) = self.shared.invalidations.lock().as_ref() {
            mailbox.stack(Invalidation { bounds: rects });
        }
    }

    /// Install a fresh invalidation mailbox and return a receiving clone.
    ///
    /// Any previous mailbox is closed. Parents call this when adopting a
    /// block; a window root calls it on itself.
    pub fn attach_invalidation_mailbox(&self) -> Mailbox<Invalidation> {
        let mailbox = Mailbox::new();
        if let Some(old) = self.shared.invalidations.lock().replace(mailbox.clone()) {
            old.close();
        }
        mailbox
    }

    pub(crate) fn detach_invalidation_mailbox(&self) {
        if let Some(old) = self.shared.invalidations.lock().take() {
            old.close();
        }
    }

    pub(crate) fn notify_placement(&self, placement: Placement) {
        self.shared.placement.stack(placement);
    }

    /// Render into `buffer`, which is assumed to cover exactly this block
    pub fn draw(&self, buffer: &mut RgbaImage, invalid: &RectSet) {
        let mut surface = self.shared.surface.lock();
        let Surface { paint, drawer, .. } = &mut *surface;
        drawer.draw(DrawTarget {
            buffer,
            invalid,
            paint,
        });
    }

    /// Bring the cached buffer up to date for `bounds` and composite it into
    /// a parent buffer.
    ///
    /// The cache is redrawn only if it is missing, has the wrong size, or
    /// `invalid` (in parent space) overlaps `bounds`. A fresh cache is drawn
    /// in full; otherwise only the damaged sub-rectangles are zeroed and
    /// handed to the drawer.
    pub(crate) fn composite(
        &self,
        target: &mut RgbaImage,
        bounds: Rect,
        invalid: &RectSet,
        op: DrawOp,
    ) {
        let mut surface = self.shared.surface.lock();
        let Surface {
            paint,
            drawer,
            buffer,
        } = &mut *surface;

        let (w, h) = bounds.size().to_pixels();
        let stale = buffer.as_ref().map_or(true, |b| b.dimensions() != (w, h));

        if stale || invalid.intersects(&bounds) {
            let local = if stale {
                RectSet::from_rect(Rect::new(0.0, 0.0, w as f32, h as f32))
            } else {
                invalid.intersection(&bounds).translate(-bounds.min())
            };
            if stale {
                *buffer = Some(RgbaImage::new(w, h));
            }
            if let Some(cached) = buffer.as_mut() {
                if !stale {
                    for rect in &local {
                        zero_region(cached, rect);
                    }
                }
                drawer.draw(DrawTarget {
                    buffer: cached,
                    invalid: &local,
                    paint,
                });
            }
        }

        if let Some(cached) = buffer.as_ref() {
            if w > 0 && h > 0 {
                blit(target, cached, bounds.min(), op);
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Block
// ─────────────────────────────────────────────────────────────────────────────

/// What a plain block's loop waits on
#[derive(Debug)]
pub enum BlockMessage {
    Event(Event),
    Resize(ResizeEvent),
}

impl BlockMessage {
    /// Whether this is the close event that ends a block's loop
    pub fn is_close(&self) -> bool {
        matches!(self, BlockMessage::Event(Event::Close(_)))
    }
}

/// State owned by a block's own task.
///
/// Dropping it stops the block's event pump and size-hint relay; handles
/// that outlive it see a closed block.
pub struct Block {
    pub(crate) handle: BlockHandle,
    pub(crate) events: mpsc::Receiver<Event>,
    size: Size,
    has_key_focus: bool,
    config: RuntimeConfig,
    tasks: [AbortHandle; 2],
}

impl Drop for Block {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl std::fmt::Debug for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Block")
            .field("id", &self.id())
            .field("size", &self.size)
            .field("has_key_focus", &self.has_key_focus)
            .finish()
    }
}

impl Default for Block {
    fn default() -> Self {
        Self::new()
    }
}

impl Block {
    /// Create a block with the default runtime configuration.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new() -> Self {
        Self::with_config(&RuntimeConfig::default())
    }

    pub fn with_config(config: &RuntimeConfig) -> Self {
        let queue = subscription_queue(config.event_queue_capacity);
        let shared = Arc::new(BlockShared {
            id: BlockId::next(),
            events: queue.sender,
            subscribe: queue.subscribe,
            resize: Mailbox::new(),
            placement: Mailbox::new(),
            size_hint: Mailbox::new(),
            invalidations: Mutex::new(None),
            parent: Mutex::new(None),
            surface: Mutex::new(Surface {
                paint: Some(clear_paint(config.background)),
                drawer: Box::new(PaintDrawer),
                buffer: None,
            }),
        });

        let hints = tokio::spawn(relay_size_hints(
            shared.size_hint.clone(),
            shared.placement.clone(),
        ))
        .abort_handle();

        Self {
            handle: BlockHandle { shared },
            events: queue.events,
            size: Size::ZERO,
            has_key_focus: false,
            config: config.clone(),
            tasks: [queue.pump, hints],
        }
    }

    pub fn handle(&self) -> &BlockHandle {
        &self.handle
    }

    pub fn id(&self) -> BlockId {
        self.handle.id()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// The block's own rect: origin at zero, current size
    pub fn bounds(&self) -> Rect {
        self.size.to_rect()
    }

    pub fn has_key_focus(&self) -> bool {
        self.has_key_focus
    }

    pub(crate) fn set_has_key_focus(&mut self, focus: bool) {
        self.has_key_focus = focus;
    }

    /// Damage `areas`, or the whole block when `areas` is empty
    pub fn invalidate(&self, areas: &[Rect]) {
        let rects = if areas.is_empty() {
            RectSet::from_rect(self.bounds())
        } else {
            areas.iter().copied().collect()
        };
        self.handle.invalidate(rects);
    }

    pub fn set_size_hint(&self, hint: SizeHint) {
        self.handle.set_size_hint(hint);
    }

    pub fn set_paint(&self, paint: PaintFn) {
        self.handle.set_paint(paint);
    }

    /// Take the new size and repaint, unless the size is unchanged
    pub fn do_resize_event(&mut self, event: ResizeEvent) {
        if event.size == self.size {
            return;
        }
        self.size = event.size;
        self.invalidate(&[]);
    }

    /// Default handling: track focus changes and resizes, ignore the rest
    pub fn handle_event(&mut self, event: &Event) {
        match event {
            Event::KeyFocus(e) => self.has_key_focus = e.focus,
            Event::Resize(e) => self.do_resize_event(*e),
            _ => {}
        }
    }

    /// Ask the parent for keyboard focus
    pub fn request_key_focus(&self) {
        let parent = self.handle.shared.parent.lock();
        match parent.as_ref() {
            Some(link) => {
                link.events
                    .send_or_drop(Event::KeyFocusRequest(KeyFocusRequest {
                        block: self.handle.clone(),
                    }));
            }
            None => tracing::trace!(block = %self.id(), "focus request without a parent"),
        }
    }

    /// Wait for the next event or resize.
    ///
    /// Returns `None` once the event pump has stopped.
    pub async fn next_message(&mut self) -> Option<BlockMessage> {
        let resizes = &self.handle.shared.resize;
        tokio::select! {
            event = self.events.recv() => event.map(BlockMessage::Event),
            Some(resize) = resizes.recv() => Some(BlockMessage::Resize(resize)),
        }
    }

    pub fn dispatch(&mut self, message: BlockMessage) {
        match message {
            BlockMessage::Event(event) => self.handle_event(&event),
            BlockMessage::Resize(resize) => self.do_resize_event(resize),
        }
    }

    /// The default block loop. Ends on [`Event::Close`].
    pub async fn handle_events(mut self) {
        while let Some(message) = self.next_message().await {
            let close = message.is_close();
            self.dispatch(message);
            if close {
                break;
            }
        }
        tracing::trace!(block = %self.id(), "block loop ended");
    }

    /// Run the default loop on its own task
    pub fn spawn(self) -> BlockHandle {
        let handle = self.handle.clone();
        tokio::spawn(self.handle_events());
        handle
    }
}

/// Forward the block's latest size hint to its latest parent.
///
/// Waits for the first hint, then re-publishes whenever either the hint or
/// the destination changes, so a re-parented block keeps its hint.
async fn relay_size_hints(own: Mailbox<SizeHint>, placement: Mailbox<Placement>) {
    let Some(mut hint) = own.recv().await else {
        return;
    };
    let mut destination = placement.try_recv().map(|p| p.size_hints);
    loop {
        if let Some(destination) = destination.as_ref() {
            destination.stack(hint);
        }
        tokio::select! {
            next = own.recv() => match next {
                Some(next) => hint = next,
                None => return,
            },
            next = placement.recv() => match next {
                Some(next) => {
                    tracing::trace!(parent = %next.parent, "size hints follow new parent");
                    destination = Some(next.size_hints);
                }
                None => return,
            },
        }
    }
}
