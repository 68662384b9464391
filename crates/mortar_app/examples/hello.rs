//! A column of widgets in a headless window, driven by synthetic input.
//!
//! Run with `RUST_LOG=debug` to watch blocks being placed and frames flushed.

use std::time::Duration;

use anyhow::Context;
use mortar_app::{AppConfig, WindowConfig, WindowFoundation};
use mortar_core::{Point, Size};
use mortar_layout::{vbox, Layouter};
use mortar_platform::headless::HeadlessPlatform;
use mortar_platform::{MouseButton, PhysicalPosition, RawEvent};
use mortar_widgets::{Button, Checkbox, KeyGrab, Radio};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env().window(WindowConfig::new("hello").size(200, 200));
    let window = WindowFoundation::open(&HeadlessPlatform::new(), None, &config)
        .context("opening window")?;
    let controller = window.window().controller();

    let button = Button::new();
    let checkbox = Checkbox::new(Size::new(20.0, 20.0));
    let keygrab = KeyGrab::new(Size::new(30.0, 30.0));
    let radio = Radio::new(2);
    let column = vbox(&[
        button.block().handle().clone(),
        checkbox.block().handle().clone(),
        keygrab.block().handle().clone(),
        radio.foundation().block().handle().clone(),
    ]);
    let layout = Layouter::spawn(column);
    let button = button.spawn();
    let checkbox = checkbox.spawn();
    let keygrab = keygrab.spawn();
    let radio = radio.spawn();
    radio.set_selection(1);

    let (clicks_tx, mut clicks) = mpsc::channel(4);
    button.add_clicker(clicks_tx);
    window.set_pane(layout.block());
    window.show();
    sleep(Duration::from_millis(50)).await;

    let bounds = layout
        .foundation()
        .child_bounds(button.block().id())
        .context("button was never placed")?;
    let center = bounds.min() + Point::new(bounds.width() / 2.0, bounds.height() / 2.0);
    let at = PhysicalPosition::new(center.x as i32, center.y as i32);
    controller.send(RawEvent::MouseDown {
        at,
        button: MouseButton::Left,
    })?;
    controller.send(RawEvent::MouseUp {
        at,
        button: MouseButton::Left,
    })?;

    match timeout(Duration::from_millis(200), clicks.recv()).await {
        Ok(Some(which)) => tracing::info!(?which, "button clicked"),
        _ => tracing::warn!("no click arrived"),
    }
    tracing::info!(
        checked = checkbox.is_checked(),
        glyph = %keygrab.glyph(),
        choice = ?radio.selection(),
        "widget state"
    );

    controller.send(RawEvent::Close)?;
    window.wait_closed().await;
    window.close();
    tracing::info!(frames = controller.flush_count(), "bye");
    Ok(())
}
