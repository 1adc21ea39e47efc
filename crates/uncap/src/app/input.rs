pub const CONTROLLER_SLOTS: usize = 4;

/// Pressed-button bits per controller slot.
pub type ButtonMasks = [u32; CONTROLLER_SLOTS];

/// Collects press edges across render frames so a logic tick that runs
/// several frames later still sees every press exactly once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonQueue {
    pending: ButtonMasks,
}

impl ButtonQueue {
    pub fn push(&mut self, pressed: &ButtonMasks) {
        for (slot, bits) in self.pending.iter_mut().zip(pressed) {
            *slot |= bits;
        }
    }

    pub fn consume(&mut self) -> ButtonMasks {
        std::mem::take(&mut self.pending)
    }

    pub fn pending(&self) -> &ButtonMasks {
        &self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending.iter().all(|bits| *bits == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consume_yields_union_of_pushes() {
        let mut queue = ButtonQueue::default();
        queue.push(&[0b0001, 0, 0, 0x100]);
        queue.push(&[0b0100, 0b10, 0, 0]);
        queue.push(&[0b0001, 0, 0, 0]);

        assert_eq!(queue.consume(), [0b0101, 0b10, 0, 0x100]);
    }

    #[test]
    fn second_consume_without_push_is_empty() {
        let mut queue = ButtonQueue::default();
        queue.push(&[1, 2, 3, 4]);
        queue.consume();

        assert!(queue.is_empty());
        assert_eq!(queue.consume(), [0; CONTROLLER_SLOTS]);
    }

    #[test]
    fn press_between_ticks_is_visible_once() {
        let mut queue = ButtonQueue::default();
        queue.push(&[0x20, 0, 0, 0]);
        queue.push(&[0, 0, 0, 0]);

        assert_eq!(queue.consume()[0], 0x20);
        assert_eq!(queue.consume()[0], 0);
    }
}
