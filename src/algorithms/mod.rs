//! Position estimators and the signal model feeding them

pub mod signal_model;
pub mod trilateration;
pub mod centroid;
pub mod fingerprint;

pub use signal_model::{clamp_rssi, distance, SignalModel};
pub use trilateration::trilaterate;
pub use centroid::weighted_centroid;
pub use fingerprint::{FingerprintDatabase, FingerprintSample};
