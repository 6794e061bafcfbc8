// Raffle Program - Instructions
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
};
use vrf_coordinator::state::{find_authority_address, find_consumer_identity_address};

/// Tag of `FulfillRandomWords`, handed to the coordinator so its callback
/// data decodes as that instruction
pub const FULFILL_RANDOM_WORDS_TAG: u8 = 4;

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub enum RaffleInstruction {
    /// Initialize the raffle and open the first round
    ///
    /// Accounts expected:
    /// 0. `[signer]` The authority deploying the raffle
    /// 1. `[writable]` The raffle account, pre-allocated with `Raffle::LEN` bytes
    /// 2. `[]` The VRF coordinator program
    /// 3. `[]` The coordinator config account
    /// 4. `[]` The subscription account paying for randomness
    Initialize {
        /// Minimum payment to enter, in lamports
        entrance_fee: u64,
        /// Seconds a round stays open before a draw can be requested
        interval: i64,
        /// Coordinator key hash (gas lane)
        gas_lane: [u8; 32],
        subscription_id: u64,
        callback_gas_limit: u32,
    },

    /// Enter the current round
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The player, pays `payment`
    /// 1. `[writable]` The raffle account
    /// 2. `[]` The system program
    Enter { payment: u64 },

    /// Evaluate the upkeep predicate. Writes nothing; the result is logged
    /// and set as return data.
    ///
    /// Accounts expected:
    /// 0. `[]` The raffle account
    CheckUpkeep,

    /// Close the round and request randomness for the draw
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The keeper
    /// 1. `[writable]` The raffle account
    /// 2. `[]` The raffle's consumer identity PDA
    /// 3. `[]` The raffle program
    /// 4. `[]` The VRF coordinator program
    /// 5. `[writable]` The coordinator config account
    /// 6. `[writable]` The subscription account
    /// 7. `[writable]` The request account, pre-allocated and owned by the coordinator
    PerformUpkeep,

    /// Randomness callback from the coordinator
    ///
    /// Accounts expected:
    /// 0. `[signer]` The coordinator authority PDA
    /// 1. `[writable]` The raffle account
    /// 2. `[writable]` The winner, receives the held balance
    FulfillRandomWords {
        request_id: u64,
        random_words: Vec<u64>,
    },
}

impl RaffleInstruction {
    /// Unpacks a byte buffer into a RaffleInstruction
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        Self::try_from_slice(input).map_err(|_| ProgramError::InvalidInstructionData)
    }

    /// Packs a RaffleInstruction into a byte buffer
    pub fn pack(&self) -> Result<Vec<u8>, ProgramError> {
        self.try_to_vec()
            .map_err(|_| ProgramError::InvalidInstructionData)
    }
}

/// Create initialize instruction
#[allow(clippy::too_many_arguments)]
pub fn initialize(
    program_id: &Pubkey,
    authority: &Pubkey,
    raffle_account: &Pubkey,
    vrf_coordinator: &Pubkey,
    coordinator_config: &Pubkey,
    subscription: &Pubkey,
    entrance_fee: u64,
    interval: i64,
    gas_lane: [u8; 32],
    subscription_id: u64,
    callback_gas_limit: u32,
) -> Result<Instruction, ProgramError> {
    let data = RaffleInstruction::Initialize {
        entrance_fee,
        interval,
        gas_lane,
        subscription_id,
        callback_gas_limit,
    }
    .pack()?;

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*authority, true),
            AccountMeta::new(*raffle_account, false),
            AccountMeta::new_readonly(*vrf_coordinator, false),
            AccountMeta::new_readonly(*coordinator_config, false),
            AccountMeta::new_readonly(*subscription, false),
        ],
        data,
    })
}

/// Create enter instruction
pub fn enter(
    program_id: &Pubkey,
    player: &Pubkey,
    raffle_account: &Pubkey,
    payment: u64,
) -> Result<Instruction, ProgramError> {
    let data = RaffleInstruction::Enter { payment }.pack()?;

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*player, true),
            AccountMeta::new(*raffle_account, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data,
    })
}

/// Create check_upkeep instruction
pub fn check_upkeep(
    program_id: &Pubkey,
    raffle_account: &Pubkey,
) -> Result<Instruction, ProgramError> {
    let data = RaffleInstruction::CheckUpkeep.pack()?;

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![AccountMeta::new_readonly(*raffle_account, false)],
        data,
    })
}

/// Create perform_upkeep instruction
#[allow(clippy::too_many_arguments)]
pub fn perform_upkeep(
    program_id: &Pubkey,
    keeper: &Pubkey,
    raffle_account: &Pubkey,
    vrf_coordinator: &Pubkey,
    coordinator_config: &Pubkey,
    subscription: &Pubkey,
    request_account: &Pubkey,
) -> Result<Instruction, ProgramError> {
    let data = RaffleInstruction::PerformUpkeep.pack()?;
    let (consumer_identity, _) = find_consumer_identity_address(program_id);

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*keeper, true),
            AccountMeta::new(*raffle_account, false),
            AccountMeta::new_readonly(consumer_identity, false),
            AccountMeta::new_readonly(*program_id, false),
            AccountMeta::new_readonly(*vrf_coordinator, false),
            AccountMeta::new(*coordinator_config, false),
            AccountMeta::new(*subscription, false),
            AccountMeta::new(*request_account, false),
        ],
        data,
    })
}

/// Create fulfill_random_words instruction as the coordinator would send it.
/// Only succeeds when the coordinator authority actually signs, i.e. inside
/// the coordinator's callback.
pub fn fulfill_random_words(
    program_id: &Pubkey,
    vrf_coordinator: &Pubkey,
    raffle_account: &Pubkey,
    winner: &Pubkey,
    request_id: u64,
    random_words: Vec<u64>,
) -> Result<Instruction, ProgramError> {
    let data = RaffleInstruction::FulfillRandomWords {
        request_id,
        random_words,
    }
    .pack()?;
    let (authority, _) = find_authority_address(vrf_coordinator);

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(authority, true),
            AccountMeta::new(*raffle_account, false),
            AccountMeta::new(*winner, false),
        ],
        data,
    })
}

/// Accounts the coordinator forwards to the raffle's fulfilment callback,
/// after its own authority
pub fn callback_accounts(raffle_account: &Pubkey, winner: &Pubkey) -> Vec<AccountMeta> {
    vec![
        AccountMeta::new(*raffle_account, false),
        AccountMeta::new(*winner, false),
    ]
}
