pub mod gain_smoother;
pub mod peak;
pub mod rms;
pub mod utils;

pub use gain_smoother::{
    calculate_target_gain, calculate_target_gain_asymmetric, GainShared, GainSmoother, HoldGate,
    HoldState,
};
pub use peak::{PeakDetector, PeakShared};
pub use rms::{RmsDetector, RmsShared};
