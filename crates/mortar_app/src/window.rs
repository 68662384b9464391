//! Window roots
//!
//! A [`WindowFoundation`] is the foundation at the top of a block tree,
//! bound to a platform window. It runs as three tasks:
//!
//! - input: raw platform events become [`Event`]s and are sent, send-or-drop,
//!   into the root foundation
//! - root: the foundation loop, plus pane changes and window resizes. It
//!   stops on a close event or [`WindowHandle::close`], passing the close on
//!   to the pane.
//! - frames: collects damage and repaints at most once per frame delay,
//!   copying only the damaged rectangles to the screen
//!
//! The frame task is idle until damage arrives. The first damage of a burst
//! arms a timer; damage arriving before it fires joins the same frame.

use std::sync::Arc;
use std::time::Duration;

use image::{imageops, RgbaImage};
use mortar_core::{
    pixel_span, since_start, BlockHandle, CloseEvent, DrawOp, Event, EventSender, Foundation,
    FoundationHandle, FoundationMessage, Invalidation, KeyFocusEvent, Mailbox, Rect, RectSet,
    ResizeEvent, Size, Verdict,
};
use mortar_platform::{EventStream, Platform, Window};
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::AbortHandle;
use tokio::time::Instant;

use crate::config::AppConfig;
use crate::error::{AppError, Result};

/// The root foundation of a window and the pane it displays
pub struct WindowFoundation {
    root: Foundation,
    pane: Option<BlockHandle>,
    panes: mpsc::UnboundedReceiver<BlockHandle>,
    shutdown: Arc<Notify>,
}

impl WindowFoundation {
    /// Create a platform window and start its input, root and frame tasks.
    ///
    /// Must be called inside a tokio runtime.
    pub fn open<P: Platform>(
        platform: &P,
        parent: Option<&P::Window>,
        config: &AppConfig,
    ) -> Result<WindowHandle<P::Window>> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(AppError::NoRuntime);
        }
        let window = Arc::new(platform.create_window(parent, &config.window)?);
        let (width, height) = window.size();

        let mut root = Foundation::with_config(&config.runtime);
        root.set_draw_op(DrawOp::Src);
        let damage = root.block().handle().attach_invalidation_mailbox();
        // The window is where focus requests stop.
        root.handle_event(Event::KeyFocus(KeyFocusEvent { focus: true }));
        root.block_mut().do_resize_event(ResizeEvent {
            size: Size::new(width as f32, height as f32),
        });

        let foundation = root.handle();
        let (closing_tx, closing) = watch::channel(false);
        let closing_tx = Arc::new(closing_tx);
        let (panes_tx, panes) = mpsc::unbounded_channel();
        let shutdown = Arc::new(Notify::new());

        let mut tasks = Vec::with_capacity(2);
        match window.take_events() {
            Some(events) => {
                let input = pump_input(events, foundation.block().sender(), closing_tx.clone());
                tasks.push(tokio::spawn(input).abort_handle());
            }
            None => tracing::warn!(window = %foundation.id(), "window event stream already taken, input disabled"),
        }
        let wf = WindowFoundation {
            root,
            pane: None,
            panes,
            shutdown: Arc::clone(&shutdown),
        };
        tokio::spawn(wf.run());
        let frames = draw_frames(
            Arc::clone(&window),
            foundation.block().clone(),
            damage,
            config.frame_delay,
        );
        tasks.push(tokio::spawn(frames).abort_handle());

        tracing::info!(
            window = %foundation.id(),
            platform = platform.name(),
            width,
            height,
            "window opened"
        );
        Ok(WindowHandle {
            window,
            foundation,
            panes: panes_tx,
            closing,
            closing_tx,
            shutdown,
            tasks: Arc::new(tasks),
        })
    }

    async fn run(mut self) {
        let shutdown = Arc::clone(&self.shutdown);
        loop {
            tokio::select! {
                biased;
                Some(pane) = self.panes.recv() => self.set_pane(pane),
                () = shutdown.notified() => {
                    self.root.handle_event(Event::Close(CloseEvent { when: since_start() }));
                    break;
                }
                message = self.root.next_message() => match message {
                    Some(message) => {
                        let close = message.is_close();
                        self.dispatch(message);
                        if close {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
        tracing::debug!(window = %self.root.id(), "window root stopped");
    }

    fn dispatch(&mut self, message: FoundationMessage) {
        match message {
            FoundationMessage::Event(Event::Resize(e)) | FoundationMessage::Resize(e) => {
                self.do_resize(e)
            }
            other => self.root.dispatch(other),
        }
    }

    fn do_resize(&mut self, e: ResizeEvent) {
        self.root.block_mut().do_resize_event(e);
        if let Some(pane) = self.pane.clone() {
            self.root.place_block(&pane, e.size.to_rect());
        }
        self.root.block().invalidate(&[]);
    }

    fn set_pane(&mut self, pane: BlockHandle) {
        if let Some(old) = self.pane.take() {
            if old != pane {
                self.root.remove_block(&old);
            }
        }
        let bounds = self.root.block().bounds();
        self.root.place_block(&pane, bounds);
        tracing::debug!(window = %self.root.id(), pane = %pane.id(), "pane set");
        self.pane = Some(pane);
        self.root.block().invalidate(&[]);
    }
}

/// Cloneable control surface of an open window
pub struct WindowHandle<W: Window> {
    window: Arc<W>,
    foundation: FoundationHandle,
    panes: mpsc::UnboundedSender<BlockHandle>,
    closing: watch::Receiver<bool>,
    closing_tx: Arc<watch::Sender<bool>>,
    shutdown: Arc<Notify>,
    /// Input and frame tasks
    tasks: Arc<Vec<AbortHandle>>,
}

impl<W: Window> Clone for WindowHandle<W> {
    fn clone(&self) -> Self {
        Self {
            window: Arc::clone(&self.window),
            foundation: self.foundation.clone(),
            panes: self.panes.clone(),
            closing: self.closing.clone(),
            closing_tx: Arc::clone(&self.closing_tx),
            shutdown: Arc::clone(&self.shutdown),
            tasks: Arc::clone(&self.tasks),
        }
    }
}

impl<W: Window> WindowHandle<W> {
    /// Display `pane` filling the window, replacing any previous pane
    pub fn set_pane(&self, pane: &BlockHandle) {
        if self.panes.send(pane.clone()).is_err() {
            tracing::trace!(window = %self.foundation.id(), "pane set on a closed window");
        }
    }

    pub fn show(&self) {
        self.window.show();
        let (width, height) = self.window.size();
        self.foundation
            .block()
            .invalidate(RectSet::from_rect(Rect::new(0.0, 0.0, width as f32, height as f32)));
    }

    /// Stop the window's tasks and close the platform window.
    ///
    /// The root passes a close event to the pane before it stops, so a tree
    /// of default loops winds down with it.
    pub fn close(&self) {
        self.closing_tx.send_replace(true);
        self.shutdown.notify_one();
        for task in self.tasks.iter() {
            task.abort();
        }
        self.window.close();
        tracing::info!(window = %self.foundation.id(), "window closed");
    }

    /// Tap events arriving at the root, before routing
    pub fn subscribe<F>(&self, filter: F) -> mpsc::Receiver<Event>
    where
        F: FnMut(&Event) -> Verdict + Send + 'static,
    {
        self.foundation.block().subscribe(filter)
    }

    /// Resolve once the platform asks the window to close, the window is
    /// closed, or its event stream ends
    pub async fn wait_closed(&self) {
        let mut closing = self.closing.clone();
        if closing.wait_for(|closing| *closing).await.is_err() {
            tracing::trace!(window = %self.foundation.id(), "close signal dropped");
        }
    }

    pub fn is_closing(&self) -> bool {
        *self.closing.borrow()
    }

    pub fn foundation(&self) -> &FoundationHandle {
        &self.foundation
    }

    pub fn window(&self) -> &W {
        &self.window
    }
}

async fn pump_input(mut events: EventStream, root: EventSender, closing: Arc<watch::Sender<bool>>) {
    while let Some(raw) = events.recv().await {
        let event = Event::from_raw(raw);
        let close = matches!(event, Event::Close(_));
        root.send_or_drop(event);
        if close {
            closing.send_replace(true);
        }
    }
    tracing::debug!("window event stream ended");
    closing.send_replace(true);
}

async fn draw_frames<W: Window>(
    window: Arc<W>,
    root: BlockHandle,
    damage: Mailbox<Invalidation>,
    frame_delay: Duration,
) {
    let mut pending = RectSet::new();
    let mut backing: Option<RgbaImage> = None;
    let mut armed = false;
    let frame = tokio::time::sleep(frame_delay);
    tokio::pin!(frame);

    loop {
        tokio::select! {
            invalidation = damage.recv() => {
                let Some(invalidation) = invalidation else {
                    break;
                };
                pending.merge(invalidation.bounds);
                if !armed {
                    armed = true;
                    frame.as_mut().reset(Instant::now() + frame_delay);
                }
            }
            () = &mut frame, if armed => {
                armed = false;
                if pending.is_empty() {
                    continue;
                }
                paint_frame(window.as_ref(), &root, &mut backing, std::mem::take(&mut pending));
            }
        }
    }
}

/// Redraw `damage` into the backing buffer and copy just those rectangles
/// to the screen. A screen size change reallocates the backing buffer and
/// widens the damage to the whole window.
fn paint_frame<W: Window>(
    window: &W,
    root: &BlockHandle,
    backing: &mut Option<RgbaImage>,
    mut damage: RectSet,
) {
    let screen = window.screen();
    let (width, height) = screen.lock().dimensions();
    if backing.as_ref().map(RgbaImage::dimensions) != Some((width, height)) {
        *backing = Some(RgbaImage::new(width, height));
        damage = RectSet::from_rect(Rect::new(0.0, 0.0, width as f32, height as f32));
    }
    let Some(buffer) = backing.as_mut() else {
        return;
    };

    root.draw(buffer, &damage);
    {
        let mut screen = screen.lock();
        for rect in damage.iter() {
            let Some((x, y, w, h)) = pixel_span(rect, buffer.width(), buffer.height()) else {
                continue;
            };
            let tile = imageops::crop_imm(&*buffer, x, y, w, h).to_image();
            imageops::replace(&mut *screen, &tile, i64::from(x), i64::from(y));
        }
    }
    window.flush_image();
    tracing::trace!(window = %root.id(), rects = damage.len(), "frame flushed");
}
