/// One stereo frame as produced by the decoder.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Sample {
    pub left: f64,
    pub right: f64,
}

impl Sample {
    pub const SILENCE: Sample = Sample { left: 0.0, right: 0.0 };

    pub const fn new(left: f64, right: f64) -> Self {
        Self { left, right }
    }

    /// Scale both channels by `gain`.
    pub fn scaled(self, gain: f64) -> Self {
        Self {
            left: self.left * gain,
            right: self.right * gain,
        }
    }
}
