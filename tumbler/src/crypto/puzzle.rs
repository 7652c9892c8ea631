//! # Blind-Puzzle Engine Boundary
//!
//! The voucher that carries value between cycles is blinded by a
//! cryptographic *puzzle*: the withdrawer-side session generates a puzzle
//! whose solution only the tumbler can compute, and the voucher signature
//! travels masked by that solution. The depositor recovers the solution
//! later through the atomic value-transfer exchange — which is how the
//! signature becomes usable without the tumbler ever seeing which deposit
//! redeemed it.
//!
//! The production engine (RSA blinding over big integers) is an external
//! collaborator. This module pins down the contract it must satisfy
//! ([`BlindPuzzleEngine`]) and ships [`KeyedPuzzleEngine`], a keyed-PRF
//! engine that fulfils the same contract with the server's own secret —
//! enough for self-contained deployments and for every test in this crate.
//! Swapping in the RSA engine changes the blinding math, not a line of the
//! session code.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length in bytes of puzzle identifiers and solutions.
pub const PUZZLE_VALUE_LENGTH: usize = 32;

/// An opaque puzzle value. Byte-string-convertible, comparable, safe to
/// show to anyone — the whole point is that it reveals nothing about its
/// solution.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Puzzle {
    bytes: [u8; PUZZLE_VALUE_LENGTH],
}

/// The solution to a [`Puzzle`]. Known to the engine (and eventually to
/// the depositor), hidden from everyone else until redemption.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuzzleSolution {
    bytes: [u8; PUZZLE_VALUE_LENGTH],
}

impl Puzzle {
    /// Wrap raw puzzle bytes.
    pub fn from_bytes(bytes: [u8; PUZZLE_VALUE_LENGTH]) -> Self {
        Self { bytes }
    }

    /// The raw puzzle bytes.
    pub fn as_bytes(&self) -> &[u8; PUZZLE_VALUE_LENGTH] {
        &self.bytes
    }
}

impl PuzzleSolution {
    /// Wrap raw solution bytes.
    pub fn from_bytes(bytes: [u8; PUZZLE_VALUE_LENGTH]) -> Self {
        Self { bytes }
    }

    /// The raw solution bytes.
    pub fn as_bytes(&self) -> &[u8; PUZZLE_VALUE_LENGTH] {
        &self.bytes
    }
}

impl fmt::Debug for Puzzle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Puzzles are public values; the full hex is fine.
        write!(f, "Puzzle({})", hex::encode(self.bytes))
    }
}

impl fmt::Debug for PuzzleSolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Solutions are secrets until redeemed; show a fingerprint only.
        write!(f, "PuzzleSolution({}..)", hex::encode(&self.bytes[..4]))
    }
}

/// The contract a blind-puzzle engine must satisfy.
///
/// The engine instance owns whatever private key material solving requires;
/// sessions hold a reference and never see the key.
pub trait BlindPuzzleEngine {
    /// Generate a fresh puzzle together with its solution.
    ///
    /// Called by the withdrawer-side session during voucher issuance. The
    /// solution is used once to mask the voucher signature and then
    /// discarded by the caller.
    fn generate_puzzle(&self) -> (Puzzle, PuzzleSolution);

    /// Solve a puzzle using the engine's private key.
    ///
    /// Called by the depositor-side session when issuing the signed voucher.
    /// Returns `None` if the puzzle is not solvable under this engine's key
    /// (wrong engine, corrupted value).
    fn solve(&self, puzzle: &Puzzle) -> Option<PuzzleSolution>;
}

/// A keyed-PRF puzzle engine.
///
/// `solution = BLAKE3_keyed(engine_key, puzzle)` — the puzzle is a random
/// 32-byte identifier and the solution is its PRF image. Anyone can mint a
/// puzzle; only the key holder can solve it; the puzzle reveals nothing
/// about the solution. That is exactly the interface the sessions need.
pub struct KeyedPuzzleEngine {
    key: [u8; 32],
}

impl KeyedPuzzleEngine {
    /// Build an engine from a 32-byte server secret.
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Build an engine with a random secret from the OS RNG.
    pub fn generate() -> Self {
        let mut key = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut key);
        Self { key }
    }

    fn derive(&self, puzzle: &Puzzle) -> PuzzleSolution {
        let digest = blake3::keyed_hash(&self.key, puzzle.as_bytes());
        PuzzleSolution::from_bytes(*digest.as_bytes())
    }
}

impl BlindPuzzleEngine for KeyedPuzzleEngine {
    fn generate_puzzle(&self) -> (Puzzle, PuzzleSolution) {
        let mut id = [0u8; PUZZLE_VALUE_LENGTH];
        rand::rngs::OsRng.fill_bytes(&mut id);
        let puzzle = Puzzle::from_bytes(id);
        let solution = self.derive(&puzzle);
        (puzzle, solution)
    }

    fn solve(&self, puzzle: &Puzzle) -> Option<PuzzleSolution> {
        Some(self.derive(puzzle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solve_recovers_generated_solution() {
        let engine = KeyedPuzzleEngine::generate();
        let (puzzle, solution) = engine.generate_puzzle();
        assert_eq!(engine.solve(&puzzle), Some(solution));
    }

    #[test]
    fn different_keys_solve_differently() {
        let a = KeyedPuzzleEngine::new([1u8; 32]);
        let b = KeyedPuzzleEngine::new([2u8; 32]);
        let (puzzle, solution) = a.generate_puzzle();
        assert_ne!(b.solve(&puzzle), Some(solution));
    }

    #[test]
    fn puzzles_are_unique() {
        let engine = KeyedPuzzleEngine::generate();
        let (p1, _) = engine.generate_puzzle();
        let (p2, _) = engine.generate_puzzle();
        assert_ne!(p1, p2);
    }

    #[test]
    fn puzzle_serde_roundtrip() {
        let engine = KeyedPuzzleEngine::generate();
        let (puzzle, _) = engine.generate_puzzle();
        let bytes = bincode::serialize(&puzzle).unwrap();
        let back: Puzzle = bincode::deserialize(&bytes).unwrap();
        assert_eq!(puzzle, back);
    }
}
