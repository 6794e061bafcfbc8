// Raffle Program - Client helpers
//
// Builders for the off-chain participants: players entering, the keeper
// closing rounds and the oracle side delivering randomness.
use solana_program::{
    instruction::Instruction, program_error::ProgramError, program_pack::Pack, pubkey::Pubkey,
    rent::Rent, system_instruction,
};
use vrf_coordinator::{
    instruction as coordinator_instruction,
    state::{derive_random_words, RandomnessRequest},
};

use crate::{
    error::RaffleError,
    instruction,
    processor::NUM_WORDS,
    state::Raffle,
};

/// Outcome of fulfilling the raffle's pending request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Draw {
    pub request_id: u64,
    pub random_words: Vec<u64>,
    pub winner: Pubkey,
}

/// Enter `raffle` paying exactly its entrance fee
pub fn enter_raffle(
    program_id: &Pubkey,
    player: &Pubkey,
    raffle_account: &Pubkey,
    raffle: &Raffle,
) -> Result<Instruction, ProgramError> {
    instruction::enter(program_id, player, raffle_account, raffle.entrance_fee())
}

/// Allocate the request account and close the round
pub fn upkeep_instructions(
    program_id: &Pubkey,
    keeper: &Pubkey,
    raffle_account: &Pubkey,
    raffle: &Raffle,
    request_account: &Pubkey,
    rent: &Rent,
) -> Result<Vec<Instruction>, ProgramError> {
    Ok(vec![
        system_instruction::create_account(
            keeper,
            request_account,
            rent.minimum_balance(RandomnessRequest::LEN),
            RandomnessRequest::LEN as u64,
            &raffle.config.vrf_coordinator,
        ),
        instruction::perform_upkeep(
            program_id,
            keeper,
            raffle_account,
            &raffle.config.vrf_coordinator,
            &raffle.config.coordinator_state,
            &raffle.config.subscription,
            request_account,
        )?,
    ])
}

/// Words the coordinator delivers for `request` and the winner they select.
/// `override_words` replaces the derived words.
pub fn draw(
    raffle: &Raffle,
    request: &RandomnessRequest,
    override_words: Option<Vec<u64>>,
) -> Result<Draw, RaffleError> {
    let request_id = raffle
        .pending_request
        .as_ref()
        .map(|pending| pending.request_id)
        .filter(|request_id| *request_id == request.request_id)
        .ok_or(RaffleError::UnknownRequest)?;
    let random_words = override_words
        .unwrap_or_else(|| derive_random_words(request_id, request.request_slot, NUM_WORDS));
    let winner = raffle.pending_winner(request_id, &random_words)?;

    Ok(Draw {
        request_id,
        random_words,
        winner,
    })
}

/// Coordinator fulfilment of the raffle's pending request, forwarding the
/// raffle and the winner the words select. `fulfiller` must be the
/// coordinator admin.
#[allow(clippy::too_many_arguments)]
pub fn fulfill_instructions(
    program_id: &Pubkey,
    fulfiller: &Pubkey,
    raffle_account: &Pubkey,
    raffle: &Raffle,
    request_account: &Pubkey,
    request: &RandomnessRequest,
    override_words: Option<Vec<u64>>,
) -> Result<Vec<Instruction>, ProgramError> {
    let draw = draw(raffle, request, override_words.clone())?;

    Ok(vec![coordinator_instruction::fulfill_random_words(
        &raffle.config.vrf_coordinator,
        fulfiller,
        &raffle.config.coordinator_state,
        request_account,
        &raffle.config.subscription,
        program_id,
        draw.request_id,
        override_words,
        &instruction::callback_accounts(raffle_account, &draw.winner),
    )?])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::RaffleConfig;

    fn raffle_with_players(players: &[Pubkey]) -> Raffle {
        let config = RaffleConfig {
            entrance_fee: 10,
            interval: 0,
            gas_lane: [0; 32],
            subscription_id: 1,
            callback_gas_limit: 1,
            vrf_coordinator: Pubkey::new_unique(),
            coordinator_state: Pubkey::new_unique(),
            subscription: Pubkey::new_unique(),
        };
        let mut raffle = Raffle::new(Pubkey::new_unique(), config, 0);
        for player in players {
            raffle.enter(10, *player).unwrap();
        }
        raffle
    }

    #[test]
    fn enter_pays_the_entrance_fee() {
        let program_id = Pubkey::new_unique();
        let raffle = raffle_with_players(&[]);
        let ix = enter_raffle(&program_id, &Pubkey::new_unique(), &Pubkey::new_unique(), &raffle)
            .unwrap();
        assert_eq!(
            instruction::RaffleInstruction::unpack(&ix.data).unwrap(),
            instruction::RaffleInstruction::Enter { payment: 10 }
        );
    }

    fn request(request_id: u64, request_slot: u64) -> RandomnessRequest {
        RandomnessRequest {
            is_initialized: true,
            request_id,
            subscription_id: 1,
            consumer_program: Pubkey::new_unique(),
            requester: Pubkey::new_unique(),
            key_hash: [0; 32],
            minimum_confirmations: 3,
            callback_gas_limit: 1,
            num_words: NUM_WORDS,
            callback_tag: instruction::FULFILL_RANDOM_WORDS_TAG,
            request_slot,
        }
    }

    #[test]
    fn draw_uses_derived_words() {
        let players = [Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique()];
        let mut raffle = raffle_with_players(&players);
        raffle.begin_calculating(4, 0, 30).unwrap();

        let draw = draw(&raffle, &request(4, 12), None).unwrap();
        let words = derive_random_words(4, 12, NUM_WORDS);
        assert_eq!(draw.random_words, words);
        assert_eq!(draw.winner, players[(words[0] % 3) as usize]);

        let forced = super::draw(&raffle, &request(4, 12), Some(vec![2])).unwrap();
        assert_eq!(forced.winner, players[2]);
    }

    #[test]
    fn draw_requires_matching_pending_request() {
        let players = [Pubkey::new_unique()];
        let mut raffle = raffle_with_players(&players);
        assert_eq!(
            draw(&raffle, &request(4, 12), None),
            Err(RaffleError::UnknownRequest)
        );

        raffle.begin_calculating(4, 0, 30).unwrap();
        assert_eq!(
            draw(&raffle, &request(5, 12), None),
            Err(RaffleError::UnknownRequest)
        );
    }
}
