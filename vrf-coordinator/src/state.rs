// VRF Coordinator - State
use arrayref::{array_mut_ref, array_ref, array_refs, mut_array_refs};
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    entrypoint::ProgramResult,
    keccak,
    program_error::ProgramError,
    program_pack::{IsInitialized, Pack, Sealed},
    pubkey::Pubkey,
};

/// Seed of the PDA that signs fulfilment callbacks into consumer programs
pub const AUTHORITY_SEED: &[u8] = b"authority";
/// Seed of the PDA a consumer program signs randomness requests with
pub const CONSUMER_SEED: &[u8] = b"vrf-consumer";

pub const MAX_CONSUMERS: usize = 8;
pub const MAX_NUM_WORDS: u32 = 500;
pub const MAX_REQUEST_CONFIRMATIONS: u16 = 200;
pub const MAX_CALLBACK_GAS_LIMIT: u32 = 2_500_000;

/// Address that signs callbacks on behalf of the coordinator at `program_id`
pub fn find_authority_address(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[AUTHORITY_SEED], program_id)
}

/// Identity a consumer program must sign requests with
pub fn find_consumer_identity_address(consumer_program: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[CONSUMER_SEED], consumer_program)
}

/// Deterministic random words for a request.
///
/// Word `i` is the first eight bytes (little endian) of
/// `keccak(request_id || request_slot || i)`. The request slot is only known
/// once the request exists. Off-chain fulfillers use the same function to
/// know the outcome before submitting the fulfilment.
pub fn derive_random_words(request_id: u64, request_slot: u64, num_words: u32) -> Vec<u64> {
    (0..u64::from(num_words))
        .map(|index| {
            let hash = keccak::hashv(&[
                &request_id.to_le_bytes(),
                &request_slot.to_le_bytes(),
                &index.to_le_bytes(),
            ]);
            let bytes = hash.to_bytes();
            u64::from_le_bytes(*array_ref![bytes, 0, 8])
        })
        .collect()
}

/// Coordinator-wide settings and counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    pub is_initialized: bool,
    /// Account that initialized the coordinator
    pub admin: Pubkey,
    /// Flat premium charged per fulfilled request, in lamports
    pub base_fee: u64,
    /// Additional lamports charged per random word delivered
    pub fee_per_word: u64,
    /// Identifier the next subscription will receive (starts at 1)
    pub next_subscription_id: u64,
    /// Identifier the next request will receive (starts at 1)
    pub next_request_id: u64,
    /// Total lamports charged to subscriptions so far
    pub fees_collected: u64,
}

impl CoordinatorConfig {
    pub fn new(admin: Pubkey, base_fee: u64, fee_per_word: u64) -> Self {
        Self {
            is_initialized: true,
            admin,
            base_fee,
            fee_per_word,
            next_subscription_id: 1,
            next_request_id: 1,
            fees_collected: 0,
        }
    }

    /// Price of fulfilling a request for `num_words` words
    pub fn request_payment(&self, num_words: u32) -> Option<u64> {
        self.fee_per_word
            .checked_mul(u64::from(num_words))?
            .checked_add(self.base_fee)
    }
}

impl Sealed for CoordinatorConfig {}

impl IsInitialized for CoordinatorConfig {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

impl Pack for CoordinatorConfig {
    const LEN: usize = 1 + 32 + 8 + 8 + 8 + 8 + 8;

    fn unpack_from_slice(src: &[u8]) -> Result<Self, ProgramError> {
        let src = array_ref![src, 0, CoordinatorConfig::LEN];
        let (
            is_initialized,
            admin,
            base_fee,
            fee_per_word,
            next_subscription_id,
            next_request_id,
            fees_collected,
        ) = array_refs![src, 1, 32, 8, 8, 8, 8, 8];

        Ok(CoordinatorConfig {
            is_initialized: is_initialized[0] != 0,
            admin: Pubkey::new_from_array(*admin),
            base_fee: u64::from_le_bytes(*base_fee),
            fee_per_word: u64::from_le_bytes(*fee_per_word),
            next_subscription_id: u64::from_le_bytes(*next_subscription_id),
            next_request_id: u64::from_le_bytes(*next_request_id),
            fees_collected: u64::from_le_bytes(*fees_collected),
        })
    }

    fn pack_into_slice(&self, dst: &mut [u8]) {
        let dst = array_mut_ref![dst, 0, CoordinatorConfig::LEN];
        let (
            is_initialized_dst,
            admin_dst,
            base_fee_dst,
            fee_per_word_dst,
            next_subscription_id_dst,
            next_request_id_dst,
            fees_collected_dst,
        ) = mut_array_refs![dst, 1, 32, 8, 8, 8, 8, 8];

        is_initialized_dst[0] = self.is_initialized as u8;
        admin_dst.copy_from_slice(self.admin.as_ref());
        *base_fee_dst = self.base_fee.to_le_bytes();
        *fee_per_word_dst = self.fee_per_word.to_le_bytes();
        *next_subscription_id_dst = self.next_subscription_id.to_le_bytes();
        *next_request_id_dst = self.next_request_id.to_le_bytes();
        *fees_collected_dst = self.fees_collected.to_le_bytes();
    }
}

/// A funded subscription that registered consumers draw randomness from
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub is_initialized: bool,
    pub id: u64,
    /// Coordinator config account this subscription belongs to
    pub coordinator: Pubkey,
    pub owner: Pubkey,
    /// Lamports available for request payments
    pub balance: u64,
    pub request_count: u64,
    /// Consumer programs allowed to request against this subscription
    pub consumers: Vec<Pubkey>,
}

impl Subscription {
    /// Account size with room for `MAX_CONSUMERS` consumers
    pub const LEN: usize = 1 + 8 + 32 + 32 + 8 + 8 + (4 + 32 * MAX_CONSUMERS);

    pub fn unpack(src: &[u8]) -> Result<Self, ProgramError> {
        let mut data = src;
        Self::deserialize(&mut data).map_err(|_| ProgramError::InvalidAccountData)
    }

    pub fn pack(&self, dst: &mut [u8]) -> ProgramResult {
        let mut data = dst;
        self.serialize(&mut data)
            .map_err(|_| ProgramError::AccountDataTooSmall)
    }

    pub fn is_consumer(&self, program: &Pubkey) -> bool {
        self.consumers.iter().any(|consumer| consumer == program)
    }
}

impl IsInitialized for Subscription {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

/// An outstanding randomness request, closed once fulfilled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RandomnessRequest {
    pub is_initialized: bool,
    pub request_id: u64,
    pub subscription_id: u64,
    /// Program that receives the fulfilment callback
    pub consumer_program: Pubkey,
    /// Signer that submitted the request
    pub requester: Pubkey,
    /// Gas lane the consumer asked for
    pub key_hash: [u8; 32],
    pub minimum_confirmations: u16,
    pub callback_gas_limit: u32,
    pub num_words: u32,
    /// First byte of the callback instruction data
    pub callback_tag: u8,
    pub request_slot: u64,
}

impl Sealed for RandomnessRequest {}

impl IsInitialized for RandomnessRequest {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

impl Pack for RandomnessRequest {
    const LEN: usize = 1 + 8 + 8 + 32 + 32 + 32 + 2 + 4 + 4 + 1 + 8;

    fn unpack_from_slice(src: &[u8]) -> Result<Self, ProgramError> {
        let src = array_ref![src, 0, RandomnessRequest::LEN];
        let (
            is_initialized,
            request_id,
            subscription_id,
            consumer_program,
            requester,
            key_hash,
            minimum_confirmations,
            callback_gas_limit,
            num_words,
            callback_tag,
            request_slot,
        ) = array_refs![src, 1, 8, 8, 32, 32, 32, 2, 4, 4, 1, 8];

        Ok(RandomnessRequest {
            is_initialized: is_initialized[0] != 0,
            request_id: u64::from_le_bytes(*request_id),
            subscription_id: u64::from_le_bytes(*subscription_id),
            consumer_program: Pubkey::new_from_array(*consumer_program),
            requester: Pubkey::new_from_array(*requester),
            key_hash: *key_hash,
            minimum_confirmations: u16::from_le_bytes(*minimum_confirmations),
            callback_gas_limit: u32::from_le_bytes(*callback_gas_limit),
            num_words: u32::from_le_bytes(*num_words),
            callback_tag: callback_tag[0],
            request_slot: u64::from_le_bytes(*request_slot),
        })
    }

    fn pack_into_slice(&self, dst: &mut [u8]) {
        let dst = array_mut_ref![dst, 0, RandomnessRequest::LEN];
        let (
            is_initialized_dst,
            request_id_dst,
            subscription_id_dst,
            consumer_program_dst,
            requester_dst,
            key_hash_dst,
            minimum_confirmations_dst,
            callback_gas_limit_dst,
            num_words_dst,
            callback_tag_dst,
            request_slot_dst,
        ) = mut_array_refs![dst, 1, 8, 8, 32, 32, 32, 2, 4, 4, 1, 8];

        is_initialized_dst[0] = self.is_initialized as u8;
        *request_id_dst = self.request_id.to_le_bytes();
        *subscription_id_dst = self.subscription_id.to_le_bytes();
        consumer_program_dst.copy_from_slice(self.consumer_program.as_ref());
        requester_dst.copy_from_slice(self.requester.as_ref());
        key_hash_dst.copy_from_slice(&self.key_hash);
        *minimum_confirmations_dst = self.minimum_confirmations.to_le_bytes();
        *callback_gas_limit_dst = self.callback_gas_limit.to_le_bytes();
        *num_words_dst = self.num_words.to_le_bytes();
        callback_tag_dst[0] = self.callback_tag;
        *request_slot_dst = self.request_slot.to_le_bytes();
    }
}
