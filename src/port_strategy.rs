//! Decides the order in which port probes are handed to the dispatcher.
use crate::input::ScanOrder;
use rand::seq::SliceRandom;

/// Represents the order of port probing.
///
/// Results always come back in this order, so a random strategy yields a
/// random report order; callers sort before printing when they care.
#[derive(Debug)]
pub enum PortStrategy {
    Serial(Vec<u16>),
    Random(Vec<u16>),
}

impl PortStrategy {
    pub fn pick(ports: Vec<u16>, order: ScanOrder) -> Self {
        match order {
            ScanOrder::Serial => Self::Serial(ports),
            ScanOrder::Random => {
                let mut ports = ports;
                ports.shuffle(&mut rand::rng());
                Self::Random(ports)
            }
        }
    }

    pub fn order(&self) -> &[u16] {
        match self {
            Self::Serial(ports) | Self::Random(ports) => ports,
        }
    }
}
