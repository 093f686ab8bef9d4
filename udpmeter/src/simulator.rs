//! Deterministic network impairment for exercising the statistics engine.
//!
//! [`NetworkSimulator`] pushes a stream of datagrams through seeded random
//! loss, duplication and adjacent reordering, and keeps a ledger of what it
//! did so tests can compare the receiver's view with the ground truth.
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Impairment probabilities, each in `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationConfig {
    pub loss: f64,
    pub duplicate: f64,
    /// Probability that a datagram is held back and delivered after the next one.
    pub reorder: f64,
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            loss: 0.0,
            duplicate: 0.0,
            reorder: 0.0,
            seed: 0,
        }
    }
}

impl SimulationConfig {
    pub fn with_loss(mut self, loss: f64) -> Self {
        self.loss = loss.clamp(0.0, 1.0);
        self
    }

    pub fn with_duplicate(mut self, duplicate: f64) -> Self {
        self.duplicate = duplicate.clamp(0.0, 1.0);
        self
    }

    pub fn with_reorder(mut self, reorder: f64) -> Self {
        self.reorder = reorder.clamp(0.0, 1.0);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// What the simulator did to the stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulationLedger {
    pub offered: u64,
    pub dropped: u64,
    pub duplicated: u64,
    pub reordered: u64,
    pub delivered: u64,
}

pub struct NetworkSimulator {
    config: SimulationConfig,
    rng: StdRng,
    held: Option<Vec<u8>>,
    ledger: SimulationLedger,
}

impl NetworkSimulator {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            held: None,
            ledger: SimulationLedger::default(),
        }
    }

    fn roll(&mut self, probability: f64) -> bool {
        probability > 0.0 && self.rng.gen_bool(probability.min(1.0))
    }

    /// Offers one datagram; returns what the far end receives right now.
    pub fn transmit(&mut self, datagram: Vec<u8>) -> Vec<Vec<u8>> {
        self.ledger.offered += 1;
        if self.roll(self.config.loss) {
            self.ledger.dropped += 1;
            return Vec::new();
        }

        let mut out = Vec::with_capacity(3);
        if self.roll(self.config.duplicate) {
            self.ledger.duplicated += 1;
            out.push(datagram.clone());
        }

        if self.held.is_none() && self.roll(self.config.reorder) {
            self.held = Some(datagram);
            self.ledger.delivered += out.len() as u64;
            return out;
        }

        out.push(datagram);
        if let Some(held) = self.held.take() {
            self.ledger.reordered += 1;
            out.push(held);
        }
        self.ledger.delivered += out.len() as u64;
        out
    }

    /// Releases a datagram still held for reordering. Nothing overtook it,
    /// so it is not counted as reordered.
    pub fn flush(&mut self) -> Option<Vec<u8>> {
        let held = self.held.take();
        if held.is_some() {
            self.ledger.delivered += 1;
        }
        held
    }

    /// Runs a whole stream through the simulator.
    pub fn run<I>(&mut self, datagrams: I) -> Vec<Vec<u8>>
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        let mut out = Vec::new();
        for datagram in datagrams {
            out.extend(self.transmit(datagram));
        }
        out.extend(self.flush());
        out
    }

    pub fn ledger(&self) -> SimulationLedger {
        self.ledger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet;

    fn stream(n: u64) -> Vec<Vec<u8>> {
        (0..n).map(|seq| packet::encode(seq, 32).unwrap()).collect()
    }

    fn sequences(datagrams: &[Vec<u8>]) -> Vec<u64> {
        datagrams.iter().map(|d| packet::decode(d).unwrap()).collect()
    }

    #[test]
    fn test_passthrough_by_default() {
        let mut sim = NetworkSimulator::new(SimulationConfig::default());
        let out = sim.run(stream(100));
        assert_eq!(sequences(&out), (0..100).collect::<Vec<_>>());
        assert_eq!(sim.ledger().delivered, 100);
    }

    #[test]
    fn test_total_loss() {
        let mut sim = NetworkSimulator::new(SimulationConfig::default().with_loss(1.0));
        assert!(sim.run(stream(50)).is_empty());
        assert_eq!(sim.ledger().dropped, 50);
    }

    #[test]
    fn test_always_duplicate() {
        let mut sim = NetworkSimulator::new(SimulationConfig::default().with_duplicate(1.0));
        let out = sim.run(stream(3));
        assert_eq!(sequences(&out), vec![0, 0, 1, 1, 2, 2]);
    }

    #[test]
    fn test_always_reorder_swaps_pairs() {
        let mut sim = NetworkSimulator::new(SimulationConfig::default().with_reorder(1.0));
        let out = sim.run(stream(4));
        assert_eq!(sequences(&out), vec![1, 0, 3, 2]);
        assert_eq!(sim.ledger().reordered, 2);
    }

    #[test]
    fn test_held_datagram_flushed_at_end() {
        let mut sim = NetworkSimulator::new(SimulationConfig::default().with_reorder(1.0));
        let out = sim.run(stream(3));
        assert_eq!(sequences(&out), vec![1, 0, 2]);
    }

    #[test]
    fn test_same_seed_same_outcome() {
        let config = SimulationConfig::default()
            .with_loss(0.1)
            .with_duplicate(0.05)
            .with_reorder(0.05)
            .with_seed(42);
        let a = NetworkSimulator::new(config).run(stream(500));
        let b = NetworkSimulator::new(config).run(stream(500));
        assert_eq!(a, b);
    }

    #[test]
    fn test_ledger_balances() {
        let config = SimulationConfig::default()
            .with_loss(0.2)
            .with_duplicate(0.1)
            .with_reorder(0.1)
            .with_seed(7);
        let mut sim = NetworkSimulator::new(config);
        let out = sim.run(stream(1000));
        let ledger = sim.ledger();
        assert_eq!(ledger.offered, 1000);
        assert_eq!(ledger.delivered, out.len() as u64);
        assert_eq!(
            ledger.delivered,
            ledger.offered - ledger.dropped + ledger.duplicated
        );
    }
}
