//! One-dimensional span solver behind the grid
//!
//! Each element occupies `extra + 1` consecutive slots starting at `index`
//! and asks for a min/preferred/max length. Slots are first sized to the
//! preferred lengths of the elements ending in them, then grown or shrunk
//! left to right until the total matches the available length.

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Elem {
    pub index: usize,
    pub extra: usize,
    pub min: f32,
    pub pref: f32,
    pub max: f32,
}

/// An element's remaining demand while walking the slots
#[derive(Clone, Copy, Debug)]
struct Item {
    extra: isize,
    min: f32,
    pref: f32,
    max: f32,
}

impl From<&Elem> for Item {
    fn from(e: &Elem) -> Self {
        Self {
            extra: e.extra as isize,
            min: e.min,
            pref: e.pref,
            max: e.max,
        }
    }
}

impl Item {
    fn consume(&mut self, width: f32) {
        self.extra -= 1;
        self.min -= width;
        self.pref -= width;
        self.max -= width;
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct Flex {
    slots: Vec<Vec<Elem>>,
}

impl Flex {
    pub fn add(&mut self, elem: Elem) {
        let needed = elem.index + elem.extra + 1;
        if self.slots.len() < needed {
            self.slots.resize_with(needed, Vec::new);
        }
        self.slots[elem.index].push(elem);
    }

    /// Slot widths for `length`, as cumulative `(start, end)` offsets
    pub fn constrain(&self, length: f32) -> Vec<(f32, f32)> {
        let mut widths = self.widths(|item| item.pref);
        let total: f32 = widths.iter().sum();
        let diff = length - total;
        if diff > 0.0 {
            self.distribute(&mut widths, diff, |w, item| w.min(item.max));
        } else if diff < 0.0 {
            self.distribute(&mut widths, diff, |w, item| w.max(item.min));
        }

        let mut offset = 0.0;
        widths
            .into_iter()
            .map(|w| {
                let span = (offset, offset + w);
                offset += w;
                span
            })
            .collect()
    }

    /// Total `(min, preferred, max)` length over all slots
    pub fn sizes(&self) -> (f32, f32, f32) {
        let total = |pick: fn(&Item) -> f32| self.widths(pick).into_iter().sum::<f32>();
        (
            total(|item| item.min),
            total(|item| item.pref),
            total(|item| item.max),
        )
    }

    fn widths(&self, pick: fn(&Item) -> f32) -> Vec<f32> {
        let mut items: Vec<Item> = Vec::new();
        let mut widths = Vec::with_capacity(self.slots.len());
        for elems in &self.slots {
            items.extend(elems.iter().map(Item::from));
            let width = items
                .iter()
                .filter(|item| item.extra == 0)
                .map(pick)
                .fold(0.0, f32::max);
            widths.push(width);
            for item in &mut items {
                item.consume(width);
            }
        }
        widths
    }

    fn distribute(&self, widths: &mut [f32], mut diff: f32, bound: fn(f32, &Item) -> f32) {
        let mut items: Vec<Item> = Vec::new();
        for (index, elems) in self.slots.iter().enumerate() {
            items.extend(elems.iter().map(Item::from));
            let mut width = widths[index] + diff;
            for item in items.iter().filter(|item| item.extra >= 0) {
                width = bound(width, item);
            }
            let width = width.max(0.0);
            diff -= width - widths[index];
            widths[index] = width;
            if diff.abs() <= f32::EPSILON {
                break;
            }
            for item in &mut items {
                item.consume(width);
            }
        }
    }
}
