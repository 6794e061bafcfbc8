// VRF Coordinator - Instructions
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
};

use crate::state::{find_authority_address, find_consumer_identity_address};

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub enum CoordinatorInstruction {
    /// Initialize the coordinator config
    ///
    /// Accounts expected:
    /// 0. `[signer]` Admin
    /// 1. `[writable]` Config account, pre-allocated and owned by this program
    Initialize {
        /// Flat premium per fulfilled request, in lamports
        base_fee: u64,
        /// Lamports charged per delivered word
        fee_per_word: u64,
    },

    /// Create a subscription. The assigned id is logged, set as return data
    /// and stored in the subscription account.
    ///
    /// Accounts expected:
    /// 0. `[signer]` Subscription owner
    /// 1. `[writable]` Config account
    /// 2. `[writable]` Subscription account, pre-allocated and owned by this program
    CreateSubscription,

    /// Fund a subscription with lamports
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` Funder
    /// 1. `[writable]` Subscription account
    /// 2. `[]` System program
    FundSubscription { amount: u64 },

    /// Allow a consumer program to request against the subscription
    ///
    /// Accounts expected:
    /// 0. `[signer]` Subscription owner
    /// 1. `[writable]` Subscription account
    AddConsumer { consumer: Pubkey },

    /// Revoke a consumer program
    ///
    /// Accounts expected:
    /// 0. `[signer]` Subscription owner
    /// 1. `[writable]` Subscription account
    RemoveConsumer { consumer: Pubkey },

    /// Request random words. Only callable through CPI by a registered
    /// consumer program signing with its consumer identity PDA.
    ///
    /// Accounts expected:
    /// 0. `[signer]` Consumer identity PDA
    /// 1. `[]` Consumer program
    /// 2. `[writable]` Config account
    /// 3. `[writable]` Subscription account
    /// 4. `[writable]` Request account, pre-allocated and owned by this program
    /// 5. `[signer]` Requester
    RequestRandomWords {
        key_hash: [u8; 32],
        subscription_id: u64,
        minimum_confirmations: u16,
        callback_gas_limit: u32,
        num_words: u32,
        /// Leading byte of the callback instruction sent to the consumer
        callback_tag: u8,
    },

    /// Deliver random words for a pending request to its consumer.
    /// Words are derived from the request id unless overridden.
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` Fulfiller, receives the request account rent
    /// 1. `[writable]` Config account
    /// 2. `[writable]` Request account
    /// 3. `[writable]` Subscription account
    /// 4. `[]` Coordinator authority PDA
    /// 5. `[]` Consumer program
    /// 6.. Accounts forwarded to the consumer callback
    FulfillRandomWords {
        request_id: u64,
        override_words: Option<Vec<u64>>,
    },
}

impl CoordinatorInstruction {
    /// Unpacks a byte buffer into a CoordinatorInstruction
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        Self::try_from_slice(input).map_err(|_| ProgramError::InvalidInstructionData)
    }

    /// Packs a CoordinatorInstruction into a byte buffer
    pub fn pack(&self) -> Result<Vec<u8>, ProgramError> {
        self.try_to_vec()
            .map_err(|_| ProgramError::InvalidInstructionData)
    }
}

/// Instruction data of the callback a consumer receives on fulfilment:
/// the consumer's tag followed by the borsh encoding of
/// `(request_id, random_words)`.
pub fn callback_data(
    callback_tag: u8,
    request_id: u64,
    random_words: &[u64],
) -> Result<Vec<u8>, ProgramError> {
    let payload = (request_id, random_words.to_vec())
        .try_to_vec()
        .map_err(|_| ProgramError::InvalidInstructionData)?;
    let mut data = Vec::with_capacity(1 + payload.len());
    data.push(callback_tag);
    data.extend_from_slice(&payload);
    Ok(data)
}

/// Create initialize instruction
pub fn initialize(
    program_id: &Pubkey,
    admin: &Pubkey,
    config: &Pubkey,
    base_fee: u64,
    fee_per_word: u64,
) -> Result<Instruction, ProgramError> {
    let data = CoordinatorInstruction::Initialize {
        base_fee,
        fee_per_word,
    }
    .pack()?;

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*admin, true),
            AccountMeta::new(*config, false),
        ],
        data,
    })
}

/// Create create_subscription instruction
pub fn create_subscription(
    program_id: &Pubkey,
    owner: &Pubkey,
    config: &Pubkey,
    subscription: &Pubkey,
) -> Result<Instruction, ProgramError> {
    let data = CoordinatorInstruction::CreateSubscription.pack()?;

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*owner, true),
            AccountMeta::new(*config, false),
            AccountMeta::new(*subscription, false),
        ],
        data,
    })
}

/// Create fund_subscription instruction
pub fn fund_subscription(
    program_id: &Pubkey,
    funder: &Pubkey,
    subscription: &Pubkey,
    amount: u64,
) -> Result<Instruction, ProgramError> {
    let data = CoordinatorInstruction::FundSubscription { amount }.pack()?;

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*funder, true),
            AccountMeta::new(*subscription, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data,
    })
}

/// Create add_consumer instruction
pub fn add_consumer(
    program_id: &Pubkey,
    owner: &Pubkey,
    subscription: &Pubkey,
    consumer: &Pubkey,
) -> Result<Instruction, ProgramError> {
    let data = CoordinatorInstruction::AddConsumer {
        consumer: *consumer,
    }
    .pack()?;

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*owner, true),
            AccountMeta::new(*subscription, false),
        ],
        data,
    })
}

/// Create remove_consumer instruction
pub fn remove_consumer(
    program_id: &Pubkey,
    owner: &Pubkey,
    subscription: &Pubkey,
    consumer: &Pubkey,
) -> Result<Instruction, ProgramError> {
    let data = CoordinatorInstruction::RemoveConsumer {
        consumer: *consumer,
    }
    .pack()?;

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*owner, true),
            AccountMeta::new(*subscription, false),
        ],
        data,
    })
}

/// Create request_random_words instruction, to be invoked by `consumer_program`
#[allow(clippy::too_many_arguments)]
pub fn request_random_words(
    program_id: &Pubkey,
    consumer_program: &Pubkey,
    config: &Pubkey,
    subscription: &Pubkey,
    request: &Pubkey,
    requester: &Pubkey,
    key_hash: [u8; 32],
    subscription_id: u64,
    minimum_confirmations: u16,
    callback_gas_limit: u32,
    num_words: u32,
    callback_tag: u8,
) -> Result<Instruction, ProgramError> {
    let data = CoordinatorInstruction::RequestRandomWords {
        key_hash,
        subscription_id,
        minimum_confirmations,
        callback_gas_limit,
        num_words,
        callback_tag,
    }
    .pack()?;
    let (consumer_identity, _) = find_consumer_identity_address(consumer_program);

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(consumer_identity, true),
            AccountMeta::new_readonly(*consumer_program, false),
            AccountMeta::new(*config, false),
            AccountMeta::new(*subscription, false),
            AccountMeta::new(*request, false),
            AccountMeta::new_readonly(*requester, true),
        ],
        data,
    })
}

/// Create fulfill_random_words instruction. `consumer_accounts` are forwarded
/// to the consumer callback after the coordinator authority.
#[allow(clippy::too_many_arguments)]
pub fn fulfill_random_words(
    program_id: &Pubkey,
    fulfiller: &Pubkey,
    config: &Pubkey,
    request: &Pubkey,
    subscription: &Pubkey,
    consumer_program: &Pubkey,
    request_id: u64,
    override_words: Option<Vec<u64>>,
    consumer_accounts: &[AccountMeta],
) -> Result<Instruction, ProgramError> {
    let data = CoordinatorInstruction::FulfillRandomWords {
        request_id,
        override_words,
    }
    .pack()?;
    let (authority, _) = find_authority_address(program_id);

    let mut accounts = vec![
        AccountMeta::new(*fulfiller, true),
        AccountMeta::new(*config, false),
        AccountMeta::new(*request, false),
        AccountMeta::new(*subscription, false),
        AccountMeta::new_readonly(authority, false),
        AccountMeta::new_readonly(*consumer_program, false),
    ];
    accounts.extend_from_slice(consumer_accounts);

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_data_leads_with_tag() {
        let data = callback_data(4, 9, &[7]).unwrap();
        assert_eq!(data[0], 4);
        assert_eq!(&data[1..9], &9u64.to_le_bytes());
        // vec length prefix, then the single word
        assert_eq!(&data[9..13], &1u32.to_le_bytes());
        assert_eq!(&data[13..], &7u64.to_le_bytes());
    }

    #[test]
    fn unpack_rejects_garbage() {
        assert_eq!(
            CoordinatorInstruction::unpack(&[42, 1, 2]),
            Err(ProgramError::InvalidInstructionData)
        );
        assert_eq!(
            CoordinatorInstruction::unpack(&[]),
            Err(ProgramError::InvalidInstructionData)
        );
    }
}
