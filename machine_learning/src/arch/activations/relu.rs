/// Rectified linear unit, optionally capped at `max_value`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Relu {
    max_value: Option<f32>,
}

impl Relu {
    pub fn new(max_value: Option<f32>) -> Self {
        Self { max_value }
    }

    pub fn max_value(&self) -> Option<f32> {
        self.max_value
    }

    pub fn f(&self, z: f32) -> f32 {
        let a = z.max(0.);

        match self.max_value {
            Some(cap) => a.min(cap),
            None => a,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_negatives() {
        let relu = Relu::new(None);

        assert_eq!(relu.f(-3.), 0.);
        assert_eq!(relu.f(0.), 0.);
        assert_eq!(relu.f(7.5), 7.5);
    }

    #[test]
    fn caps_at_max_value() {
        let relu6 = Relu::new(Some(6.));

        assert_eq!(relu6.f(-1.), 0.);
        assert_eq!(relu6.f(3.), 3.);
        assert_eq!(relu6.f(10.), 6.);
    }
}
