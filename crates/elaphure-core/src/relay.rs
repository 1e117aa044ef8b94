//! Mapping of decoded response batches onto the consumer page.
//!
//! Faults the probe reports are batch-level: they become the consumer status
//! and the session keeps relaying. A Transfer or TransferBlock whose executed
//! count differs from the producer's `command_count` aborts the batch with
//! FAULT, but likewise leaves the session alive.

use elaphure_proto::{DapResponse, DapStatus, ResponseBatch};

/// What the consumer page should carry after a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome<'a> {
    /// Value for `command_response`
    pub status: u32,
    /// Bytes for the consumer payload
    pub payload: &'a [u8],
}

impl BatchOutcome<'_> {
    fn fault() -> Self {
        Self { status: DapStatus::Fault.to_u32(), payload: &[] }
    }
}

/// Reduce a response batch to the consumer page contents.
pub fn settle<'a>(batch: &ResponseBatch<'a>, command_count: u32) -> BatchOutcome<'a> {
    let mut outcome = BatchOutcome { status: DapStatus::Ok.to_u32(), payload: &[] };

    for response in &batch.responses {
        match *response {
            DapResponse::Connect { .. }
            | DapResponse::SwjClock { .. }
            | DapResponse::SwjSequence { .. }
            | DapResponse::SwdConfigure { .. } => {},
            DapResponse::TransferConfigure { .. } => {
                outcome.status = DapStatus::Ok.to_u32();
            },
            DapResponse::WriteAbort { status } => {
                if status != 0 {
                    return BatchOutcome::fault();
                }
            },
            DapResponse::Transfer { count, status, data } => {
                if u32::from(count) != command_count {
                    return BatchOutcome::fault();
                }
                return BatchOutcome { status: status.to_u32(), payload: data };
            },
            DapResponse::TransferBlock { count, status, data } => {
                if u32::from(count) != command_count {
                    return BatchOutcome::fault();
                }
                return match status.ack() {
                    Some(DapStatus::Ok | DapStatus::Fault) => {
                        BatchOutcome { status: status.to_u32(), payload: data }
                    },
                    _ => BatchOutcome { status: status.to_u32(), payload: &[] },
                };
            },
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn settle_bytes(bytes: &[u8], command_count: u32) -> (u32, Vec<u8>) {
        let batch = ResponseBatch::decode(bytes).unwrap();
        let outcome = settle(&batch, command_count);
        (outcome.status, outcome.payload.to_vec())
    }

    #[test]
    fn transfer_ok_copies_words() {
        let (status, payload) = settle_bytes(&[0x05, 0x01, 0x01, 0xAA, 0xBB, 0xCC, 0xDD], 1);
        assert_eq!(status, 1);
        assert_eq!(payload, vec![0xAA, 0xBB, 0xCC, 0xDD]);
    }

    #[test]
    fn transfer_count_mismatch_is_fault() {
        let (status, payload) = settle_bytes(&[0x05, 0x01, 0x01, 0xAA, 0xBB, 0xCC, 0xDD], 2);
        assert_eq!(status, 4);
        assert!(payload.is_empty());
    }

    #[test]
    fn transfer_reports_peer_status() {
        let (status, _) = settle_bytes(&[0x05, 0x02, 0x02], 2);
        assert_eq!(status, DapStatus::Wait.to_u32());
    }

    #[test]
    fn transfer_block_wait_drops_payload() {
        let (status, payload) = settle_bytes(&[0x06, 0x01, 0x00, 0x02, 1, 2, 3, 4], 1);
        assert_eq!(status, 2);
        assert!(payload.is_empty());
    }

    #[test]
    fn transfer_block_fault_keeps_payload() {
        let (status, payload) = settle_bytes(&[0x06, 0x01, 0x00, 0x04, 1, 2, 3, 4], 1);
        assert_eq!(status, 4);
        assert_eq!(payload, vec![1, 2, 3, 4]);
    }

    #[test]
    fn configuration_only_batch_is_ok() {
        let (status, payload) = settle_bytes(&[0x7F, 0x03, 0x02, 0x01, 0x11, 0x00, 0x13, 0x00], 3);
        assert_eq!(status, 1);
        assert!(payload.is_empty());
    }

    #[test]
    fn write_abort_failure_is_fault() {
        assert_eq!(settle_bytes(&[0x08, 0xFF], 1).0, 4);
        assert_eq!(settle_bytes(&[0x08, 0x00], 1).0, 1);
    }

    proptest! {
        #[test]
        fn any_count_mismatch_faults(count in any::<u8>(), declared in any::<u32>()) {
            prop_assume!(u32::from(count) != declared);
            let bytes = [0x05, count, 0x01];
            let batch = ResponseBatch::decode(&bytes).unwrap();
            prop_assert_eq!(settle(&batch, declared).status, DapStatus::Fault.to_u32());
        }
    }
}
