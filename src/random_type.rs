use rand::Rng;

/// Where serving-order shuffles get their draws from.
///
/// Panels use `Uniform`; `Fixed` repeats one value in `[0, 1]` so a
/// shuffle can be reproduced exactly in tests.
#[derive(Debug, Clone, Copy)]
pub enum RandomType {
    Uniform,
    Fixed(f64),
}

impl RandomType {
    /// Next draw in `[0, 1]`.
    pub fn random(&self) -> f64 {
        match *self {
            RandomType::Uniform => rand::thread_rng().gen::<f64>(),
            RandomType::Fixed(draw) => draw,
        }
    }

    /// Position in `0..=upper` picked by scaling the next draw.
    fn pick(&self, upper: usize) -> usize {
        let scaled = ((upper + 1) as f64 * self.random()) as usize;
        scaled.min(upper)
    }
}

/// Shuffles `a` in place with Fike's method (Computer Journal 18(1), 1975).
///
/// Element `i` trades places with a position drawn from `0..=i`, working
/// left to right from the second element.
pub fn permute_b(a: &mut [usize], random_type: RandomType) {
    for i in 1..a.len() {
        let j = random_type.pick(i);
        a.swap(i, j);
    }
}
