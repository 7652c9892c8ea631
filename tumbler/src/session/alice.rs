//! The depositor-facing negotiation.
//!
//! Protocol, from the tumbler's side:
//!
//! 1. The client sends [`ClientEscrowInfo`]: its cycle, its two public
//!    keys, and a blinded voucher. The tumbler answers with a fresh escrow
//!    key of its own.
//! 2. The client funds the 2-of-2 escrow on chain and presents the
//!    transaction. The tumbler verifies the output, solves the blinded
//!    voucher, and hands the solution back — the client unblinds it into a
//!    spendable voucher, and the tumbler gets a claim on the deposit.
//!
//! Each transition checks its precondition before touching any state, so a
//! rejected message leaves the session exactly where it was.

use serde::{Deserialize, Serialize};

use super::escrow::{find_escrow_output, validate_and_bind_escrow};
use super::voucher::ClientEscrowInfo;
use super::{TumblerParameters, ValueTransferConfig};
use crate::chain::{EscrowScript, EscrowedCoin, OutPoint, Transaction, TxOut};
use crate::crypto::{
    BlindPuzzleEngine, EscrowKeypair, EscrowPublicKey, Puzzle, PuzzleSolution, SessionSecret,
};
use crate::cycle::CycleParameters;
use crate::ProtocolError;

/// Where a depositor session stands.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum AliceStatus {
    /// Waiting for the client's keys and blinded voucher.
    WaitingClientEscrowInformation,
    /// Waiting for the client's funded escrow transaction.
    WaitingClientEscrow,
    /// Escrow confirmed, voucher solution released, secrets scrubbed.
    Completed,
}

impl AliceStatus {
    fn as_str(&self) -> &'static str {
        match self {
            AliceStatus::WaitingClientEscrowInformation => "waiting-client-escrow-information",
            AliceStatus::WaitingClientEscrow => "waiting-client-escrow",
            AliceStatus::Completed => "completed",
        }
    }
}

/// The serializable core of a depositor session. Snapshot this to survive
/// a restart; the advertised parameters and server keys are supplied again
/// on restore.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AliceSessionState {
    status: AliceStatus,
    cycle_start: Option<u64>,
    escrow_secret: Option<SessionSecret>,
    client_escrow_key: Option<EscrowPublicKey>,
    client_redeem_key: Option<EscrowPublicKey>,
    blinded_voucher: Option<Puzzle>,
}

impl AliceSessionState {
    fn empty() -> Self {
        Self {
            status: AliceStatus::WaitingClientEscrowInformation,
            cycle_start: None,
            escrow_secret: None,
            client_escrow_key: None,
            client_redeem_key: None,
            blinded_voucher: None,
        }
    }
}

/// A depositor-facing session.
pub struct AliceNegotiation {
    parameters: TumblerParameters,
    state: AliceSessionState,
}

impl AliceNegotiation {
    /// Open a fresh session against `parameters`. The supplied keypairs
    /// must be the ones the parameters advertise; a mismatch means the
    /// server is misconfigured and every client would reject its scripts.
    pub fn new(
        parameters: TumblerParameters,
        tumbler_key: &EscrowKeypair,
        voucher_key: &EscrowKeypair,
    ) -> Result<Self, ProtocolError> {
        Self::from_snapshot(parameters, tumbler_key, voucher_key, AliceSessionState::empty())
    }

    /// Rebuild a session from a snapshot.
    pub fn from_snapshot(
        parameters: TumblerParameters,
        tumbler_key: &EscrowKeypair,
        voucher_key: &EscrowKeypair,
        state: AliceSessionState,
    ) -> Result<Self, ProtocolError> {
        parameters.validate()?;
        if tumbler_key.public_key() != parameters.tumbler_key {
            return Err(ProtocolError::InvalidArgument(
                "tumbler key does not match advertised parameters",
            ));
        }
        if voucher_key.public_key() != parameters.voucher_key {
            return Err(ProtocolError::InvalidArgument(
                "voucher key does not match advertised parameters",
            ));
        }
        Ok(Self { parameters, state })
    }

    /// Current session phase.
    pub fn status(&self) -> AliceStatus {
        self.state.status
    }

    /// The cycle this session registered for, once known.
    pub fn cycle(&self) -> Option<CycleParameters> {
        self.state
            .cycle_start
            .and_then(|start| self.parameters.cycle_generator.get_cycle(start).ok())
    }

    /// Clone the serializable state for persistence.
    pub fn snapshot(&self) -> AliceSessionState {
        self.state.clone()
    }

    /// First transition: take the client's keys and blinded voucher,
    /// binding `escrow_key` — a fresh keypair supplied by the caller — as
    /// the tumbler's half of the escrow.
    ///
    /// The cycle must be on the generator's grid; a bad cycle start
    /// rejects the message without touching the session.
    pub fn receive_client_escrow_information(
        &mut self,
        info: &ClientEscrowInfo,
        escrow_key: &EscrowKeypair,
    ) -> Result<(), ProtocolError> {
        self.expect_status(AliceStatus::WaitingClientEscrowInformation)?;
        let cycle = self.parameters.cycle_generator.get_cycle(info.cycle_start)?;

        self.state.cycle_start = Some(cycle.start);
        self.state.escrow_secret = Some(SessionSecret::from_keypair(escrow_key));
        self.state.client_escrow_key = Some(info.escrow_key);
        self.state.client_redeem_key = Some(info.redeem_key);
        self.state.blinded_voucher = Some(info.unsigned_voucher.clone());
        self.state.status = AliceStatus::WaitingClientEscrow;

        tracing::debug!(cycle = cycle.start, "depositor escrow information accepted");
        Ok(())
    }

    /// The escrow script the client is expected to fund: the tumbler's
    /// escrow key first, then the client's, with the client's redeem key
    /// and the client-side lock time.
    ///
    /// A pure derivation from recorded state; errors only while the
    /// required keys have not been received (or have been scrubbed).
    pub fn expected_escrow_script(&self) -> Result<EscrowScript, ProtocolError> {
        let cycle = self.cycle().ok_or(ProtocolError::InvalidSchedule {
            reason: "session has no resolved cycle",
            height: self.state.cycle_start.unwrap_or(0),
        })?;
        Ok(EscrowScript::new(
            [
                self.escrow_keypair()?.public_key(),
                self.field(self.state.client_escrow_key)?,
            ],
            self.field(self.state.client_redeem_key)?,
            cycle.client_lock_time(),
        ))
    }

    /// The exact output the client must create: the expected script hash
    /// carrying denomination plus fee.
    pub fn expected_escrow_output(&self) -> Result<TxOut, ProtocolError> {
        Ok(TxOut {
            value: self.parameters.deposit_total()?,
            script_pubkey: self.expected_escrow_script()?.script_hash(),
        })
    }

    /// Second transition: confirm the client's funded escrow and release
    /// the voucher solution.
    ///
    /// On success the session is complete: the solution goes back to the
    /// client, the [`ValueTransferConfig`] goes to the payment layer, and
    /// the session scrubs its secrets.
    pub fn confirm_client_escrow(
        &mut self,
        engine: &dyn BlindPuzzleEngine,
        tx: &Transaction,
    ) -> Result<(PuzzleSolution, ValueTransferConfig), ProtocolError> {
        self.expect_status(AliceStatus::WaitingClientEscrow)?;
        let script = self.expected_escrow_script()?;
        let value = self.parameters.deposit_total()?;
        let (vout, txout) = find_escrow_output(tx, script.script_hash(), value).ok_or(
            ProtocolError::InvalidEscrow("transaction pays no matching escrow output"),
        )?;

        let puzzle = self.field(self.state.blinded_voucher.clone())?;
        let solution = engine.solve(&puzzle).ok_or(ProtocolError::InvalidVoucher)?;

        let escrow_key = self.escrow_keypair()?;
        let bound = validate_and_bind_escrow(
            EscrowedCoin {
                outpoint: OutPoint {
                    txid: tx.txid(),
                    vout,
                },
                txout: txout.clone(),
                redeem: script,
            },
            &escrow_key,
        )?;

        if let Some(secret) = self.state.escrow_secret.as_mut() {
            secret.scrub();
        }
        self.state.escrow_secret = None;
        self.state.blinded_voucher = None;
        self.state.status = AliceStatus::Completed;

        tracing::info!(
            cycle = self.state.cycle_start,
            coin = %bound.coin.outpoint.txid,
            "depositor escrow confirmed, voucher solution released"
        );
        Ok((
            solution,
            ValueTransferConfig {
                escrowed_coin: bound.coin,
                escrow_key,
                redeem_key: None,
            },
        ))
    }

    fn expect_status(&self, expected: AliceStatus) -> Result<(), ProtocolError> {
        if self.state.status == expected {
            Ok(())
        } else {
            Err(ProtocolError::ProtocolState {
                expected: expected.as_str(),
                actual: self.state.status.as_str(),
            })
        }
    }

    fn escrow_keypair(&self) -> Result<EscrowKeypair, ProtocolError> {
        self.state
            .escrow_secret
            .as_ref()
            .map(SessionSecret::keypair)
            .ok_or(ProtocolError::ProtocolState {
                expected: "escrow secret present",
                actual: "escrow secret scrubbed",
            })
    }

    fn field<T>(&self, value: Option<T>) -> Result<T, ProtocolError> {
        value.ok_or(ProtocolError::ProtocolState {
            expected: "session data present",
            actual: "session data missing",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Amount;
    use crate::crypto::KeyedPuzzleEngine;
    use crate::cycle::OverlappedCycleGenerator;
    use crate::session::TumblerParameters;

    struct Fixture {
        parameters: TumblerParameters,
        tumbler_key: EscrowKeypair,
        voucher_key: EscrowKeypair,
        engine: KeyedPuzzleEngine,
    }

    fn fixture() -> Fixture {
        let first_cycle = CycleParameters {
            start: 100,
            registration_duration: 50,
            client_channel_duration: 10,
            tumbler_channel_duration: 10,
            payment_duration: 20,
            tumbler_cashout_duration: 15,
            client_cashout_duration: 15,
            safety_duration: 5,
        };
        let tumbler_key = EscrowKeypair::generate();
        let voucher_key = EscrowKeypair::generate();
        let parameters = TumblerParameters {
            denomination: Amount(1_000_000),
            fee: Amount(10_000),
            cycle_generator: OverlappedCycleGenerator::new(first_cycle, 10).unwrap(),
            tumbler_key: tumbler_key.public_key(),
            voucher_key: voucher_key.public_key(),
        };
        Fixture {
            parameters,
            tumbler_key,
            voucher_key,
            engine: KeyedPuzzleEngine::generate(),
        }
    }

    fn client_info(fx: &Fixture, cycle_start: u64) -> (ClientEscrowInfo, EscrowKeypair) {
        let client_escrow = EscrowKeypair::generate();
        let client_redeem = EscrowKeypair::generate();
        let (puzzle, _) = fx.engine.generate_puzzle();
        (
            ClientEscrowInfo {
                cycle_start,
                escrow_key: client_escrow.public_key(),
                redeem_key: client_redeem.public_key(),
                unsigned_voucher: puzzle,
            },
            client_escrow,
        )
    }

    fn session(fx: &Fixture) -> AliceNegotiation {
        AliceNegotiation::new(fx.parameters.clone(), &fx.tumbler_key, &fx.voucher_key).unwrap()
    }

    #[test]
    fn mismatched_server_keys_rejected() {
        let fx = fixture();
        let wrong = EscrowKeypair::generate();
        assert!(AliceNegotiation::new(fx.parameters.clone(), &wrong, &fx.voucher_key).is_err());
        assert!(AliceNegotiation::new(fx.parameters.clone(), &fx.tumbler_key, &wrong).is_err());
    }

    #[test]
    fn happy_path_releases_solution_and_handoff() {
        let fx = fixture();
        let mut alice = session(&fx);
        let (info, _) = client_info(&fx, 140);
        let tumbler_escrow = EscrowKeypair::generate();

        alice
            .receive_client_escrow_information(&info, &tumbler_escrow)
            .unwrap();
        assert_eq!(alice.status(), AliceStatus::WaitingClientEscrow);

        let script = alice.expected_escrow_script().unwrap();
        assert!(script.contains_escrow_key(&tumbler_escrow.public_key()));
        assert!(script.contains_escrow_key(&info.escrow_key));
        assert_eq!(script.redeem_key, info.redeem_key);
        assert_eq!(script.lock_time, alice.cycle().unwrap().client_lock_time());

        let tx = Transaction {
            outputs: vec![alice.expected_escrow_output().unwrap()],
            lock_time: 0,
        };
        let (solution, config) = alice.confirm_client_escrow(&fx.engine, &tx).unwrap();
        assert_eq!(alice.status(), AliceStatus::Completed);

        assert_eq!(fx.engine.solve(&info.unsigned_voucher), Some(solution));
        assert_eq!(config.escrowed_coin.txout.value, Amount(1_010_000));
        assert_eq!(config.escrow_key.public_key(), tumbler_escrow.public_key());
        assert!(config.redeem_key.is_none());
    }

    #[test]
    fn off_grid_cycle_rejected_without_mutation() {
        let fx = fixture();
        let mut alice = session(&fx);
        let (info, _) = client_info(&fx, 133);

        assert!(matches!(
            alice.receive_client_escrow_information(&info, &EscrowKeypair::generate()),
            Err(ProtocolError::InvalidSchedule { .. })
        ));
        assert_eq!(alice.status(), AliceStatus::WaitingClientEscrowInformation);
        assert!(alice.cycle().is_none());
    }

    #[test]
    fn out_of_order_messages_rejected() {
        let fx = fixture();
        let mut alice = session(&fx);
        let tx = Transaction {
            outputs: vec![],
            lock_time: 0,
        };
        assert!(matches!(
            alice.confirm_client_escrow(&fx.engine, &tx),
            Err(ProtocolError::ProtocolState { .. })
        ));

        let (info, _) = client_info(&fx, 140);
        let escrow = EscrowKeypair::generate();
        alice.receive_client_escrow_information(&info, &escrow).unwrap();
        assert!(matches!(
            alice.receive_client_escrow_information(&info, &escrow),
            Err(ProtocolError::ProtocolState { .. })
        ));
    }

    #[test]
    fn wrong_value_escrow_rejected() {
        let fx = fixture();
        let mut alice = session(&fx);
        let (info, _) = client_info(&fx, 140);
        alice
            .receive_client_escrow_information(&info, &EscrowKeypair::generate())
            .unwrap();

        let mut txout = alice.expected_escrow_output().unwrap();
        txout.value = Amount(999);
        let tx = Transaction {
            outputs: vec![txout],
            lock_time: 0,
        };
        assert_eq!(
            alice.confirm_client_escrow(&fx.engine, &tx).unwrap_err(),
            ProtocolError::InvalidEscrow("transaction pays no matching escrow output"),
        );
        assert_eq!(alice.status(), AliceStatus::WaitingClientEscrow);
    }

    #[test]
    fn snapshot_restores_mid_protocol() {
        let fx = fixture();
        let mut alice = session(&fx);
        let (info, _) = client_info(&fx, 140);
        alice
            .receive_client_escrow_information(&info, &EscrowKeypair::generate())
            .unwrap();
        let expected_script = alice.expected_escrow_script().unwrap();

        let snapshot = bincode::serialize(&alice.snapshot()).unwrap();
        let restored_state: AliceSessionState = bincode::deserialize(&snapshot).unwrap();
        let mut restored = AliceNegotiation::from_snapshot(
            fx.parameters.clone(),
            &fx.tumbler_key,
            &fx.voucher_key,
            restored_state,
        )
        .unwrap();

        assert_eq!(restored.status(), AliceStatus::WaitingClientEscrow);
        assert_eq!(restored.expected_escrow_script().unwrap(), expected_script);

        let tx = Transaction {
            outputs: vec![restored.expected_escrow_output().unwrap()],
            lock_time: 0,
        };
        assert!(restored.confirm_client_escrow(&fx.engine, &tx).is_ok());
    }

    #[test]
    fn completed_session_holds_no_secrets() {
        let fx = fixture();
        let mut alice = session(&fx);
        let (info, _) = client_info(&fx, 140);
        alice
            .receive_client_escrow_information(&info, &EscrowKeypair::generate())
            .unwrap();
        let tx = Transaction {
            outputs: vec![alice.expected_escrow_output().unwrap()],
            lock_time: 0,
        };
        alice.confirm_client_escrow(&fx.engine, &tx).unwrap();

        let snapshot = alice.snapshot();
        assert!(snapshot.escrow_secret.is_none());
        assert!(snapshot.blinded_voucher.is_none());
    }
}
