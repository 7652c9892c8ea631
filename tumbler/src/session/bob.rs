//! The withdrawer-facing negotiation.
//!
//! Protocol, from the tumbler's side:
//!
//! 1. The client redeems a voucher with [`OpenChannelRequest`]: the cycle,
//!    the nonce, the unblinded signature, and its escrow key. A bad
//!    signature ends the conversation; a good one commits the tumbler to
//!    funding an escrow.
//! 2. The tumbler builds the escrow output (its own fresh escrow and
//!    redeem keys, the tumbler-side lock time) and broadcasts the funding
//!    transaction out of band. Presenting the signed transaction back to
//!    the session completes it and yields the payment-layer handoff.
//!
//! Sessions also mint the masked vouchers that depositors will later pay
//! for; issuance is phase-independent because it touches no per-client
//! state.

use serde::{Deserialize, Serialize};

use super::escrow::{find_escrow_output, validate_and_bind_escrow};
use super::voucher::{issue_unsigned_voucher, OpenChannelRequest, UnsignedVoucherInfo};
use super::{TumblerParameters, ValueTransferConfig};
use crate::chain::{EscrowScript, EscrowedCoin, OutPoint, Transaction, TxOut};
use crate::crypto::{
    verify_voucher, BlindPuzzleEngine, EscrowKeypair, EscrowPublicKey, SessionSecret,
};
use crate::cycle::CycleParameters;
use crate::ProtocolError;

/// Where a withdrawer session stands.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum BobStatus {
    /// Waiting for a voucher redemption and the client's escrow key.
    WaitingBobEscrowInformation,
    /// Voucher accepted; waiting for the tumbler-funded escrow transaction.
    WaitingSignedTransaction,
    /// Escrow funded and handed off, secrets scrubbed.
    Completed,
}

impl BobStatus {
    fn as_str(&self) -> &'static str {
        match self {
            BobStatus::WaitingBobEscrowInformation => "waiting-bob-escrow-information",
            BobStatus::WaitingSignedTransaction => "waiting-signed-transaction",
            BobStatus::Completed => "completed",
        }
    }
}

/// The serializable core of a withdrawer session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BobSessionState {
    status: BobStatus,
    cycle_start: u64,
    escrow_secret: Option<SessionSecret>,
    redeem_secret: Option<SessionSecret>,
    client_escrow_key: Option<EscrowPublicKey>,
}

/// A withdrawer-facing session, pinned to one cycle at construction.
pub struct BobNegotiation {
    parameters: TumblerParameters,
    voucher_key: EscrowKeypair,
    state: BobSessionState,
}

impl BobNegotiation {
    /// Open a fresh session for the cycle starting at `cycle_start`.
    pub fn new(
        parameters: TumblerParameters,
        tumbler_key: &EscrowKeypair,
        voucher_key: &EscrowKeypair,
        cycle_start: u64,
    ) -> Result<Self, ProtocolError> {
        let cycle = parameters.cycle_generator.get_cycle(cycle_start)?;
        Self::from_snapshot(
            parameters,
            tumbler_key,
            voucher_key,
            BobSessionState {
                status: BobStatus::WaitingBobEscrowInformation,
                cycle_start: cycle.start,
                escrow_secret: None,
                redeem_secret: None,
                client_escrow_key: None,
            },
        )
    }

    /// Rebuild a session from a snapshot.
    pub fn from_snapshot(
        parameters: TumblerParameters,
        tumbler_key: &EscrowKeypair,
        voucher_key: &EscrowKeypair,
        state: BobSessionState,
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
        Ok(Self {
            parameters,
            voucher_key: voucher_key.clone(),
            state,
        })
    }

    /// Current session phase.
    pub fn status(&self) -> BobStatus {
        self.state.status
    }

    /// The cycle this session serves.
    pub fn cycle(&self) -> Result<CycleParameters, ProtocolError> {
        self.parameters.cycle_generator.get_cycle(self.state.cycle_start)
    }

    /// Clone the serializable state for persistence.
    pub fn snapshot(&self) -> BobSessionState {
        self.state.clone()
    }

    /// Mint a masked voucher for this session's cycle.
    ///
    /// Phase-independent: issuance touches no per-client state, so a
    /// single session can mint vouchers for any number of future
    /// depositors.
    pub fn generate_unsigned_voucher(&self, engine: &dyn BlindPuzzleEngine) -> UnsignedVoucherInfo {
        issue_unsigned_voucher(engine, &self.voucher_key, self.state.cycle_start)
    }

    /// First transition: verify a voucher redemption and commit to funding
    /// an escrow for the client.
    ///
    /// A failed verification rejects the request and leaves the session
    /// untouched; nothing about the attempt is retained.
    pub fn receive_escrow_information(
        &mut self,
        request: &OpenChannelRequest,
    ) -> Result<(), ProtocolError> {
        self.expect_status(BobStatus::WaitingBobEscrowInformation)?;
        if request.cycle_start != self.state.cycle_start {
            return Err(ProtocolError::InvalidVoucher);
        }
        if !verify_voucher(
            &self.parameters.voucher_key,
            request.cycle_start,
            &request.nonce,
            &request.signature,
        ) {
            tracing::warn!(
                cycle = request.cycle_start,
                "rejected voucher with invalid signature"
            );
            return Err(ProtocolError::InvalidVoucher);
        }

        let escrow = EscrowKeypair::generate();
        let redeem = EscrowKeypair::generate();
        self.state.escrow_secret = Some(SessionSecret::from_keypair(&escrow));
        self.state.redeem_secret = Some(SessionSecret::from_keypair(&redeem));
        self.state.client_escrow_key = Some(request.escrow_key);
        self.state.status = BobStatus::WaitingSignedTransaction;

        tracing::debug!(cycle = self.state.cycle_start, "voucher redeemed, escrow committed");
        Ok(())
    }

    /// The escrow script the tumbler will fund: the tumbler's fresh key
    /// and the client's key cooperate, the tumbler's redeem key times out
    /// at the tumbler-side lock height.
    pub fn escrow_script(&self) -> Result<EscrowScript, ProtocolError> {
        self.expect_status(BobStatus::WaitingSignedTransaction)?;
        let cycle = self.cycle()?;
        Ok(EscrowScript::new(
            [
                self.keypair_from(&self.state.escrow_secret)?.public_key(),
                self.field(self.state.client_escrow_key)?,
            ],
            self.keypair_from(&self.state.redeem_secret)?.public_key(),
            cycle.tumbler_lock_time(),
        ))
    }

    /// The output the funding transaction must carry: the escrow script
    /// hash paying exactly the denomination. The withdrawer pays no fee;
    /// the tumbler already collected it on the deposit side.
    pub fn build_escrow_output(&self) -> Result<TxOut, ProtocolError> {
        Ok(TxOut {
            value: self.parameters.denomination,
            script_pubkey: self.escrow_script()?.script_hash(),
        })
    }

    /// Second transition: accept the signed funding transaction and hand
    /// the escrow to the payment layer.
    ///
    /// The handoff carries both the escrow key and the redeem key: the
    /// tumbler funded this escrow, so the timeout path belongs to it.
    pub fn set_signed_transaction(
        &mut self,
        tx: &Transaction,
    ) -> Result<ValueTransferConfig, ProtocolError> {
        self.expect_status(BobStatus::WaitingSignedTransaction)?;
        let script = self.escrow_script()?;
        let (vout, txout) = find_escrow_output(tx, script.script_hash(), self.parameters.denomination)
            .ok_or(ProtocolError::InvalidEscrow(
                "transaction pays no matching escrow output",
            ))?;

        let escrow_key = self.keypair_from(&self.state.escrow_secret)?;
        let redeem_key = self.keypair_from(&self.state.redeem_secret)?;
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

        for secret in [&mut self.state.escrow_secret, &mut self.state.redeem_secret] {
            if let Some(secret) = secret.as_mut() {
                secret.scrub();
            }
            *secret = None;
        }
        self.state.status = BobStatus::Completed;

        tracing::info!(
            cycle = self.state.cycle_start,
            coin = %bound.coin.outpoint.txid,
            "withdrawer escrow funded and handed off"
        );
        Ok(ValueTransferConfig {
            escrowed_coin: bound.coin,
            escrow_key,
            redeem_key: Some(redeem_key),
        })
    }

    fn expect_status(&self, expected: BobStatus) -> Result<(), ProtocolError> {
        if self.state.status == expected {
            Ok(())
        } else {
            Err(ProtocolError::ProtocolState {
                expected: expected.as_str(),
                actual: self.state.status.as_str(),
            })
        }
    }

    fn keypair_from(&self, secret: &Option<SessionSecret>) -> Result<EscrowKeypair, ProtocolError> {
        secret
            .as_ref()
            .map(SessionSecret::keypair)
            .ok_or(ProtocolError::ProtocolState {
                expected: "session secret present",
                actual: "session secret scrubbed",
            })
    }

    fn field<T>(&self, value: Option<T>) -> Result<T, ProtocolError> {
        value.ok_or(ProtocolError::ProtocolState {
            expected: "session data present",
            actual: "session data missing",
        })
    }
}
