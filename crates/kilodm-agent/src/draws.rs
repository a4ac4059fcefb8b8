//! The agent's single source of randomness.
//!
//! Decision and communication logic only ever asks for two kinds of draws.
//! Any `rand::Rng` provides them; tests substitute a scripted sequence.

use rand::Rng;

pub trait Draws {
    /// Uniform index in `0..n`. `n` must be non-zero.
    fn index(&mut self, n: usize) -> usize;

    /// Uniform value on the 0..=255 pressure scale.
    fn scale(&mut self) -> u8;
}

impl<R: Rng + ?Sized> Draws for R {
    fn index(&mut self, n: usize) -> usize {
        self.gen_range(0..n)
    }

    fn scale(&mut self) -> u8 {
        self.gen()
    }
}

#[cfg(test)]
pub(crate) mod scripted {
    use std::collections::VecDeque;

    use super::Draws;

    /// Replays fixed draws in order.
    #[derive(Debug, Default)]
    pub struct Scripted {
        indices: VecDeque<usize>,
        scales: VecDeque<u8>,
    }

    impl Scripted {
        pub fn new(indices: &[usize], scales: &[u8]) -> Self {
            Self { indices: indices.iter().copied().collect(), scales: scales.iter().copied().collect() }
        }

        pub fn exhausted(&self) -> bool {
            self.indices.is_empty() && self.scales.is_empty()
        }
    }

    impl Draws for Scripted {
        fn index(&mut self, n: usize) -> usize {
            let i = self.indices.pop_front().expect("scripted index draw exhausted");
            assert!(i < n, "scripted index {i} out of 0..{n}");
            i
        }

        fn scale(&mut self) -> u8 {
            self.scales.pop_front().expect("scripted scale draw exhausted")
        }
    }
}
