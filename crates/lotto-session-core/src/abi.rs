//! Lottery contract bindings.

use alloy::primitives::{Address, Bytes};
use alloy::sol;
use alloy::sol_types::{Panic, Revert, SolError, SolEvent, SolInterface};

use crate::domain::ParticipationRecord;
use crate::error::{ContractRevert, WalletError};
use crate::wire::ReceiptView;

sol! {
    #[derive(Debug, PartialEq, Eq)]
    interface LottoClient {
        error AlreadyParticipated(uint256 drawNumber, address participant);
        error IncorrectNumbers();
        error IncorrectStatus(uint8 status);
        error DrawNotFound(uint256 drawNumber);

        event ParticipationRegistered(
            uint256 indexed drawNumber,
            uint256 indexed participationId,
            address indexed participant,
            uint8[] numbers
        );

        function participate(uint8[] calldata numbers) external;
        function getDrawNumber() external view returns (uint256);
        function getCurrentStatus() external view returns (uint8);
    }
}

pub use LottoClient::{getCurrentStatusCall, getDrawNumberCall, participateCall};

/// Decodes raw revert data: custom errors first, then `Error(string)` /
/// `Panic(uint256)`, then a generic reason carrying the raw hex.
pub fn decode_revert(data: &[u8]) -> ContractRevert {
    match LottoClient::LottoClientErrors::abi_decode(data, true) {
        Ok(LottoClient::LottoClientErrors::AlreadyParticipated(e)) => ContractRevert::custom(
            "AlreadyParticipated",
            vec![e.drawNumber.to_string(), e.participant.to_string()],
        ),
        Ok(LottoClient::LottoClientErrors::IncorrectNumbers(_)) => {
            ContractRevert::custom("IncorrectNumbers", Vec::new())
        }
        Ok(LottoClient::LottoClientErrors::IncorrectStatus(e)) => {
            ContractRevert::custom("IncorrectStatus", vec![e.status.to_string()])
        }
        Ok(LottoClient::LottoClientErrors::DrawNotFound(e)) => {
            ContractRevert::custom("DrawNotFound", vec![e.drawNumber.to_string()])
        }
        Err(_) => {
            if let Ok(revert) = Revert::abi_decode(data, true) {
                return ContractRevert::reason(revert.reason);
            }
            if let Ok(panic) = Panic::abi_decode(data, true) {
                return ContractRevert::reason(format!("panic code {:#x}", panic.code));
            }
            ContractRevert {
                name: None,
                args: Vec::new(),
                reason: Some("execution reverted".to_owned()),
                data: (!data.is_empty()).then(|| Bytes::copy_from_slice(data).to_string()),
            }
        }
    }
}

/// Replaces the undecoded revert payload left by [`crate::error::classify`]
/// with the contract-level error.
pub fn refine_revert(err: WalletError) -> WalletError {
    match err {
        WalletError::ContractCallReverted(ContractRevert {
            name: None,
            data: Some(raw),
            reason,
            ..
        }) => match raw.parse::<Bytes>() {
            Ok(bytes) => {
                let mut decoded = decode_revert(&bytes);
                if decoded.name.is_none() && decoded.reason.as_deref() == Some("execution reverted")
                {
                    decoded.reason = reason.or(decoded.reason);
                }
                WalletError::ContractCallReverted(decoded)
            }
            Err(_) => WalletError::ContractCallReverted(ContractRevert {
                name: None,
                args: Vec::new(),
                reason,
                data: Some(raw),
            }),
        },
        other => other,
    }
}

/// First `ParticipationRegistered` log emitted by `contract` in the receipt.
pub fn decode_participation(
    receipt: &ReceiptView,
    contract: Address,
) -> Option<ParticipationRecord> {
    receipt
        .logs
        .iter()
        .filter(|log| log.address == contract)
        .find_map(|log| {
            LottoClient::ParticipationRegistered::decode_raw_log(
                log.topics.iter().copied(),
                &log.data,
                true,
            )
            .ok()
        })
        .map(|event| ParticipationRecord {
            draw_id: event.drawNumber.saturating_to::<u64>(),
            ticket_id: event.participationId.saturating_to::<u64>(),
            participant: event.participant,
            numbers: event.numbers,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;

    #[test]
    fn custom_error_is_decoded_by_name() {
        let participant = Address::repeat_byte(0xaa);
        let data = LottoClient::AlreadyParticipated {
            drawNumber: U256::from(7),
            participant,
        }
        .abi_encode();
        let revert = decode_revert(&data);
        assert_eq!(revert.name.as_deref(), Some("AlreadyParticipated"));
        assert_eq!(revert.args[0], "7");
        assert_eq!(revert.label(), "AlreadyParticipated");
    }

    #[test]
    fn revert_string_falls_back_to_reason() {
        let data = Revert {
            reason: "draw closed".to_owned(),
        }
        .abi_encode();
        let revert = decode_revert(&data);
        assert!(revert.name.is_none());
        assert_eq!(revert.reason.as_deref(), Some("draw closed"));
    }

    #[test]
    fn unknown_payload_keeps_raw_hex() {
        let revert = decode_revert(&[0x12, 0x34, 0x56, 0x78, 0x00]);
        assert_eq!(revert.data.as_deref(), Some("0x1234567800"));
    }
}
