use crate::{
    card::{Card, Suit},
    game::{GameState, Phase},
    protocol::Action,
    room::Room,
    rules,
    types::team_of,
};
use rand::{seq::SliceRandom, Rng};
use self::{search::SearchState, void::VoidState};

pub mod search;
pub mod void;

/// Pick one action for the bot in `seat`, or None when the phase has
/// nothing for it to do (the scheduler handles hand-over separately).
pub fn decide<R: Rng>(room: &Room, seat: usize, rng: &mut R) -> Option<Action> {
    let game = room.game.as_ref()?;
    match game.phase {
        Phase::BiddingRound1 => Some(decide_round_one(room, game, seat, rng)),
        Phase::BiddingRound2 => Some(decide_round_two(room, game, seat, rng)),
        Phase::DealerDiscard => Some(decide_discard(room, game, seat)),
        Phase::Playing => Some(decide_play(room, game, seat, rng)),
        Phase::HandOver | Phase::GameOver => None,
    }
}

/// Deterministic stand-ins for a disconnected human: pass on bids, shed the
/// first card, play the first legal card.
pub fn fallback(room: &Room, seat: usize) -> Option<Action> {
    let game = room.game.as_ref()?;
    match game.phase {
        Phase::BiddingRound1 | Phase::BiddingRound2 => Some(Action::Pass),
        Phase::DealerDiscard => {
            let hand = &room.player_at(seat)?.hand;
            Some(Action::Discard {
                card_id: hand.first()?.id(),
            })
        }
        Phase::Playing => {
            let hand = &room.player_at(seat)?.hand;
            let trump = game.trump?;
            let legal = rules::legal_plays(hand, game.lead_card(), trump);
            Some(Action::PlayCard {
                card_id: legal.first()?.id(),
            })
        }
        Phase::HandOver | Phase::GameOver => None,
    }
}

const ALONE_MARGIN: f32 = 80.0;

fn decide_round_one<R: Rng>(room: &Room, game: &GameState, seat: usize, rng: &mut R) -> Action {
    let upcard = match game.upcard {
        Some(upcard) => upcard,
        None => return Action::Pass,
    };
    let threshold = room.bot_difficulty.bid_threshold();
    let score = evaluate_call(room, game, seat, upcard.suit, true, rng);
    if score >= threshold {
        Action::OrderUp {
            alone: score >= threshold + ALONE_MARGIN,
        }
    } else {
        Action::Pass
    }
}

fn decide_round_two<R: Rng>(room: &Room, game: &GameState, seat: usize, rng: &mut R) -> Action {
    let threshold = room.bot_difficulty.bid_threshold();
    let mut best: Option<(Suit, f32)> = None;
    for suit in Suit::VALUES {
        if game.blocked_suit == Some(suit) {
            continue;
        }
        let score = evaluate_call(room, game, seat, suit, false, rng);
        if best.map_or(true, |(_, high)| score > high) {
            best = Some((suit, score));
        }
    }
    match best {
        Some((suit, score)) if score >= threshold => Action::ChooseTrump {
            suit,
            alone: score >= threshold + ALONE_MARGIN,
        },
        _ => Action::Pass,
    }
}

fn decide_discard(room: &Room, game: &GameState, seat: usize) -> Action {
    let hand = &room
        .player_at(seat)
        .expect("the discarding dealer is seated")
        .hand;
    let trump = game.trump.expect("trump is set before the discard");
    Action::Discard {
        card_id: discard_choice(hand, trump).id(),
    }
}

fn decide_play<R: Rng>(room: &Room, game: &GameState, seat: usize, rng: &mut R) -> Action {
    let difficulty = room.bot_difficulty;
    let hand = &room.player_at(seat).expect("the turn seat is seated").hand;
    let trump = game.trump.expect("trump is set while playing");
    let legal = rules::legal_plays(hand, game.lead_card(), trump);
    if legal.len() > 1 && rng.gen_bool(difficulty.random_move_rate()) {
        return Action::PlayCard {
            card_id: legal.choose(rng).expect("legal plays are nonempty").id(),
        };
    }
    if legal.len() == 1 {
        return Action::PlayCard {
            card_id: legal[0].id(),
        };
    }
    let team = team_of(seat);
    let void = VoidState::observe(room, game);
    let mut totals: Vec<(Card, f32)> = legal.into_iter().map(|card| (card, 0.0)).collect();
    for _ in 0..difficulty.sample_count() {
        let hands = search::sample_hands(room, game, seat, void, rng);
        for (card, total) in totals.iter_mut() {
            let mut state = SearchState::from_game(room, game, hands.clone());
            state.play(*card);
            *total += search::minimax(
                &state,
                difficulty.search_depth(),
                f32::NEG_INFINITY,
                f32::INFINITY,
                team,
            );
        }
    }
    let (card, _) = totals
        .into_iter()
        .reduce(|best, candidate| if candidate.1 > best.1 { candidate } else { best })
        .expect("legal plays are nonempty");
    Action::PlayCard { card_id: card.id() }
}

/// Score a hypothetical trump call by searching the position the call would
/// produce, averaged over determinizations. Play searches look `searchDepth`
/// plays ahead; a bid is judged on whole tricks, so it searches twice as
/// far to let the trick term move.
fn evaluate_call<R: Rng>(
    room: &Room,
    game: &GameState,
    seat: usize,
    trump: Suit,
    picks_up: bool,
    rng: &mut R,
) -> f32 {
    let difficulty = room.bot_difficulty;
    let team = team_of(seat);
    let void = VoidState::observe(room, game);
    let depth = difficulty.search_depth() * 2;
    let mut total = 0.0;
    for _ in 0..difficulty.sample_count() {
        let mut hands = search::sample_hands(room, game, seat, void, rng);
        if picks_up {
            if let Some(upcard) = game.upcard {
                let dealer = &mut hands[game.dealer_seat];
                dealer.push(upcard);
                let discard = discard_choice(dealer, trump);
                let pos = dealer.iter().position(|&c| c == discard).unwrap();
                dealer.remove(pos);
            }
        }
        let state = SearchState {
            hands,
            trump,
            turn: (game.dealer_seat + 1) % 4,
            sitting_out: None,
            current_trick: Vec::new(),
            tricks: [0, 0],
            tricks_played: 0,
        };
        total += search::minimax(&state, depth, f32::NEG_INFINITY, f32::INFINITY, team);
    }
    total / difficulty.sample_count() as f32
}

/// The card a dealer sheds: weakest off-trump card when one exists, else
/// the weakest trump.
fn discard_choice(hand: &[Card], trump: Suit) -> Card {
    let weakest = |cards: &mut dyn Iterator<Item = Card>| {
        cards.min_by_key(|&card| rules::residual_strength(card, trump))
    };
    weakest(
        &mut hand
            .iter()
            .copied()
            .filter(|&card| rules::effective_suit(card, trump) != trump),
    )
    .or_else(|| weakest(&mut hand.iter().copied()))
    .expect("a discarding hand is nonempty")
}
