//! Image display
//!
//! An [`Image`] prefers its picture's pixel size and stretches the picture
//! to whatever size it is given.

use std::sync::Arc;

use image::RgbaImage;
use mortar_core::{Block, BlockHandle, BlockMessage, Color, PaintFn, Point, Size, SizeHint};
use tokio::sync::mpsc;

/// The picture an [`Image`] shows. Configs compare equal when they share
/// the same picture.
#[derive(Clone, Debug)]
pub struct ImageConfig {
    pub image: Arc<RgbaImage>,
}

impl ImageConfig {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image: Arc::new(image),
        }
    }

    /// Pixel size of the picture
    pub fn image_size(&self) -> Size {
        let (w, h) = self.image.dimensions();
        Size::new(w as f32, h as f32)
    }
}

impl PartialEq for ImageConfig {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.image, &other.image)
    }
}

pub struct Image {
    block: Block,
    config: ImageConfig,
    commands: mpsc::UnboundedReceiver<ImageConfig>,
    commands_tx: mpsc::UnboundedSender<ImageConfig>,
}

#[derive(Clone, Debug)]
pub struct ImageHandle {
    block: BlockHandle,
    commands: mpsc::UnboundedSender<ImageConfig>,
}

impl ImageHandle {
    pub fn block(&self) -> &BlockHandle {
        &self.block
    }

    pub fn set_config(&self, config: ImageConfig) {
        if self.commands.send(config).is_err() {
            tracing::trace!(block = %self.block.id(), "image has stopped");
        }
    }
}

impl Image {
    pub fn new(config: ImageConfig) -> Self {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let mut image = Self {
            block: Block::new(),
            config: config.clone(),
            commands,
            commands_tx,
        };
        image.update_config(config);
        image
    }

    pub fn handle(&self) -> ImageHandle {
        ImageHandle {
            block: self.block.handle().clone(),
            commands: self.commands_tx.clone(),
        }
    }

    pub fn block(&self) -> &Block {
        &self.block
    }

    pub fn config(&self) -> &ImageConfig {
        &self.config
    }

    /// Show a different picture. Setting the current one again does nothing.
    pub fn set_config(&mut self, config: ImageConfig) {
        if config == self.config {
            return;
        }
        self.update_config(config);
    }

    fn update_config(&mut self, config: ImageConfig) {
        self.config = config;
        self.block.set_size_hint(SizeHint::new(
            Size::ZERO,
            self.config.image_size(),
            Size::new(f32::INFINITY, f32::INFINITY),
        ));
        self.block.set_paint(self.look());
        self.block.invalidate(&[]);
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                Some(config) = self.commands.recv() => self.set_config(config),
                message = self.block.next_message() => match message {
                    Some(message) if message.is_close() => break,
                    Some(BlockMessage::Event(event)) => self.block.handle_event(&event),
                    Some(other) => self.block.dispatch(other),
                    None => break,
                },
            }
        }
    }

    pub fn spawn(self) -> ImageHandle {
        let handle = self.handle();
        tokio::spawn(self.run());
        handle
    }

    fn look(&self) -> PaintFn {
        let picture = Arc::clone(&self.config.image);
        let natural = self.config.image_size();
        Box::new(move |canvas| {
            canvas.clear(Color::TRANSPARENT);
            if natural.width <= 0.0 || natural.height <= 0.0 {
                return;
            }
            let size = canvas.size();
            canvas.save();
            canvas.scale(size.width / natural.width, size.height / natural.height);
            canvas.draw_image(&picture, Point::ZERO);
            canvas.restore();
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use mortar_core::{Foundation, FoundationMessage, RectSet};
    use std::time::Duration;
    use tokio::time::timeout;

    const QUIET: Duration = Duration::from_millis(50);

    /// Two pixels wide: red on the left, blue on the right
    fn red_blue() -> ImageConfig {
        let mut picture = RgbaImage::new(2, 1);
        picture.put_pixel(0, 0, Color::RED.to_rgba8());
        picture.put_pixel(1, 0, Color::BLUE.to_rgba8());
        ImageConfig::new(picture)
    }

    #[tokio::test]
    async fn test_hint_prefers_picture_size() {
        let image = Image::new(ImageConfig::new(RgbaImage::new(4, 3)));
        let mut parent = Foundation::new();
        parent.add_block(image.block().handle());

        let hint = loop {
            match timeout(QUIET, parent.next_message()).await.unwrap() {
                Some(FoundationMessage::BlockSizeHint(h)) => break h.hint,
                Some(_) => continue,
                None => panic!("foundation stopped"),
            }
        };
        assert_eq!(hint.min, Size::ZERO);
        assert_eq!(hint.preferred, Size::new(4.0, 3.0));
        assert!(hint.max.width.is_infinite());
    }

    #[tokio::test]
    async fn test_picture_is_stretched_to_block() {
        let image = Image::new(red_blue());
        let mut buffer = RgbaImage::new(4, 2);
        image.block().handle().draw(&mut buffer, &RectSet::new());

        assert_eq!(buffer.get_pixel(0, 0), &Color::RED.to_rgba8());
        assert_eq!(buffer.get_pixel(1, 1), &Color::RED.to_rgba8());
        assert_eq!(buffer.get_pixel(2, 0), &Color::BLUE.to_rgba8());
        assert_eq!(buffer.get_pixel(3, 1), &Color::BLUE.to_rgba8());
    }

    #[tokio::test]
    async fn test_same_picture_is_not_redrawn() {
        let config = red_blue();
        let mut image = Image::new(config.clone());
        let damage = image.block().handle().attach_invalidation_mailbox();

        image.set_config(config);
        assert!(damage.try_recv().is_none());

        let mut other = RgbaImage::new(1, 1);
        other.put_pixel(0, 0, Rgba([0, 255, 0, 255]));
        image.set_config(ImageConfig::new(other));
        assert!(damage.try_recv().is_some());

        let mut buffer = RgbaImage::new(3, 3);
        image.block().handle().draw(&mut buffer, &RectSet::new());
        assert_eq!(buffer.get_pixel(2, 2), &Rgba([0, 255, 0, 255]));
    }

    #[tokio::test]
    async fn test_spawned_image_takes_config_through_handle() {
        let image = Image::new(red_blue());
        let block = image.block().handle().clone();
        let handle = image.spawn();
        let damage = block.attach_invalidation_mailbox();

        handle.set_config(ImageConfig::new(RgbaImage::new(1, 1)));
        timeout(QUIET, damage.recv()).await.unwrap().unwrap();
    }
}
