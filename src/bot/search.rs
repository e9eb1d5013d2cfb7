use crate::{
    bot::void::VoidState,
    card::{Card, Suit},
    game::GameState,
    room::Room,
    rules,
    types::team_of,
};
use rand::{seq::SliceRandom, Rng};

/// A fully-determinized hand: every card placed, every seat playable. The
/// search clones these freely; hands never exceed six cards.
#[derive(Clone, Debug)]
pub struct SearchState {
    pub hands: [Vec<Card>; 4],
    pub trump: Suit,
    pub turn: usize,
    pub sitting_out: Option<usize>,
    pub current_trick: Vec<(usize, Card)>,
    pub tricks: [i32; 2],
    pub tricks_played: usize,
}

impl SearchState {
    /// Lift the live game into a search position using sampled hands.
    pub fn from_game(room: &Room, game: &GameState, hands: [Vec<Card>; 4]) -> Self {
        let current_trick = game
            .current_trick
            .iter()
            .map(|play| {
                let seat = room
                    .player(play.player_id)
                    .expect("trick plays come from seated players")
                    .seat_index;
                (seat, play.card)
            })
            .collect();
        let mut tricks = [0, 0];
        for trick in &game.completed_tricks {
            tricks[team_of(trick.winner_seat)] += 1;
        }
        Self {
            hands,
            trump: game.trump.expect("searching requires trump"),
            turn: game.turn_seat,
            sitting_out: game.sitting_out_seat,
            current_trick,
            tricks,
            tricks_played: game.completed_tricks.len(),
        }
    }

    fn active_seat_count(&self) -> usize {
        if self.sitting_out.is_some() {
            3
        } else {
            4
        }
    }

    fn next_active_seat(&self, from: usize) -> usize {
        let mut seat = (from + 1) % 4;
        if self.sitting_out == Some(seat) {
            seat = (seat + 1) % 4;
        }
        seat
    }

    pub fn hand_over(&self) -> bool {
        self.tricks_played == 5
    }

    pub fn legal_moves(&self) -> Vec<Card> {
        rules::legal_plays(
            &self.hands[self.turn],
            self.current_trick.first().map(|&(_, card)| card),
            self.trump,
        )
    }

    pub fn play(&mut self, card: Card) {
        let hand = &mut self.hands[self.turn];
        let pos = hand
            .iter()
            .position(|&c| c == card)
            .expect("search plays come from the hand");
        hand.remove(pos);
        self.current_trick.push((self.turn, card));
        if self.current_trick.len() < self.active_seat_count() {
            self.turn = self.next_active_seat(self.turn);
            return;
        }
        let plays: Vec<Card> = self.current_trick.iter().map(|&(_, card)| card).collect();
        let (winner, _) = self.current_trick[rules::trick_winner(&plays, self.trump)];
        self.tricks[team_of(winner)] += 1;
        self.tricks_played += 1;
        self.current_trick.clear();
        self.turn = winner;
    }

    /// Score from `team`'s perspective: tricks dominate, residual card
    /// strength breaks ties toward keeping winners in hand.
    pub fn evaluate(&self, team: usize) -> f32 {
        let mut residual = [0i32; 2];
        for seat in 0..4 {
            if self.sitting_out == Some(seat) {
                continue;
            }
            residual[team_of(seat)] += self.hands[seat]
                .iter()
                .map(|&card| rules::residual_strength(card, self.trump))
                .sum::<i32>();
        }
        let tricks = 100.0 * (self.tricks[team] - self.tricks[1 - team]) as f32;
        tricks + 0.1 * (residual[team] - residual[1 - team]) as f32
    }
}

/// Plain alpha-beta over the determinized hand. Seats on `team` maximize,
/// the others minimize; depth is counted in plays.
pub fn minimax(state: &SearchState, depth: u32, mut alpha: f32, mut beta: f32, team: usize) -> f32 {
    if depth == 0 || state.hand_over() {
        return state.evaluate(team);
    }
    let moves = state.legal_moves();
    if team_of(state.turn) == team {
        let mut best = f32::NEG_INFINITY;
        for card in moves {
            let mut next = state.clone();
            next.play(card);
            let value = minimax(&next, depth - 1, alpha, beta, team);
            best = best.max(value);
            alpha = alpha.max(value);
            if beta <= alpha {
                break;
            }
        }
        best
    } else {
        let mut best = f32::INFINITY;
        for card in moves {
            let mut next = state.clone();
            next.play(card);
            let value = minimax(&next, depth - 1, alpha, beta, team);
            best = best.min(value);
            beta = beta.min(value);
            if beta <= alpha {
                break;
            }
        }
        best
    }
}

/// Deal the cards this seat cannot see into the other three hands: respect
/// known hand sizes and observed voids, largest holes first, and relax the
/// void constraint rather than fail when a sample paints itself into a
/// corner. The face-up upcard is never in a hidden hand; a picked-up upcard
/// that has not hit the table yet stays with the dealer.
pub fn sample_hands<R: Rng>(
    room: &Room,
    game: &GameState,
    seat: usize,
    void: VoidState,
    rng: &mut R,
) -> [Vec<Card>; 4] {
    let mut hands: [Vec<Card>; 4] = Default::default();
    let mut seen: Vec<Card> = Vec::with_capacity(24);
    for player in &room.players {
        if player.seat_index == seat {
            hands[seat] = player.hand.clone();
            seen.extend(&player.hand);
        }
    }
    for trick in &game.completed_tricks {
        seen.extend(trick.cards.iter().map(|play| play.card));
    }
    seen.extend(game.current_trick.iter().map(|play| play.card));
    if let Some(upcard) = game.upcard {
        if game.upcard_picked_up() {
            let dealer = game.dealer_seat;
            if dealer != seat && !seen.contains(&upcard) {
                hands[dealer].push(upcard);
                seen.push(upcard);
            } else if dealer == seat && !seen.contains(&upcard) {
                // We picked it up and discarded it ourselves.
                seen.push(upcard);
            }
        } else {
            seen.push(upcard);
        }
    }
    let mut pool: Vec<Card> = rules::deck()
        .into_iter()
        .filter(|card| !seen.contains(card))
        .collect();
    pool.shuffle(rng);
    let mut sizes = [0usize; 4];
    for (s, size) in sizes.iter_mut().enumerate() {
        *size = room.player_at(s).map_or(0, |p| p.hand.len());
    }
    let mut order: Vec<usize> = (0..4).filter(|&s| s != seat).collect();
    order.sort_by_key(|&s| std::cmp::Reverse(sizes[s].saturating_sub(hands[s].len())));
    let trump = game.trump;
    for s in order {
        while hands[s].len() < sizes[s] && !pool.is_empty() {
            let pick = pool
                .iter()
                .position(|&card| {
                    let suit = match trump {
                        Some(trump) => rules::effective_suit(card, trump),
                        None => card.suit,
                    };
                    !void.is_void(s, suit)
                })
                .unwrap_or(0);
            hands[s].push(pool.remove(pick));
        }
    }
    hands
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        game::{Phase, TrickPlay},
        types::Difficulty,
    };
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn c(id: &str) -> Card {
        id.parse().unwrap()
    }

    fn cards(ids: &[&str]) -> Vec<Card> {
        ids.iter().map(|id| id.parse().unwrap()).collect()
    }

    fn fixed_room(hands: [&[&str]; 4]) -> Room {
        let mut room = Room::new("r".to_string(), None, Difficulty::Medium);
        for name in ["a", "b", "c", "d"] {
            room.join(name).unwrap();
        }
        for (seat, hand) in hands.iter().enumerate() {
            let id = room.player_at(seat).unwrap().id;
            room.player_mut(id).unwrap().hand = cards(hand);
        }
        room
    }

    fn playing_state(room: &Room, trump: Suit, turn: usize) -> GameState {
        GameState {
            phase: Phase::Playing,
            dealer_seat: 3,
            turn_seat: turn,
            upcard: None,
            kitty: vec![],
            blocked_suit: Some(trump.same_color()),
            trump: Some(trump),
            maker_team: Some(0),
            called_by_player_id: room.player_at(0).map(|p| p.id),
            going_alone_player_id: None,
            sitting_out_seat: None,
            current_trick: vec![],
            completed_tricks: vec![],
            trick_index: 0,
            hand_summary: None,
            hand_number: 1,
        }
    }

    #[test]
    fn test_play_resolves_tricks() {
        let mut state = SearchState {
            hands: [
                cards(&["hearts-9"]),
                cards(&["hearts-K"]),
                cards(&["spades-9"]),
                cards(&["hearts-A"]),
            ],
            trump: Suit::Spades,
            turn: 0,
            sitting_out: None,
            current_trick: vec![],
            tricks: [2, 2],
            tricks_played: 4,
        };
        state.play(c("hearts-9"));
        state.play(c("hearts-K"));
        state.play(c("spades-9"));
        state.play(c("hearts-A"));
        assert!(state.hand_over());
        assert_eq!(state.tricks, [3, 2]);
        assert_eq!(state.turn, 2);
    }

    #[test]
    fn test_loner_trick_completes_at_three() {
        let mut state = SearchState {
            hands: [
                cards(&["hearts-9"]),
                cards(&["hearts-K"]),
                cards(&["clubs-9"]),
                cards(&["hearts-A"]),
            ],
            trump: Suit::Spades,
            turn: 3,
            sitting_out: Some(2),
            current_trick: vec![],
            tricks: [0, 0],
            tricks_played: 0,
        };
        state.play(c("hearts-A"));
        assert_eq!(state.turn, 0);
        state.play(c("hearts-9"));
        // Seat 2 sits out; the trick closes after seat 1.
        state.play(c("hearts-K"));
        assert_eq!(state.tricks, [0, 1]);
        assert_eq!(state.turn, 3);
    }

    #[test]
    fn test_minimax_takes_the_winning_card() {
        // Seat 0 closes the trick and can win it with the trump nine or
        // throw the club. Winning is a whole trick; any depth finds it.
        let state = SearchState {
            hands: [
                cards(&["spades-9", "clubs-10"]),
                cards(&["hearts-10", "diamonds-9"]),
                cards(&["hearts-Q", "diamonds-10"]),
                cards(&["hearts-K", "diamonds-Q"]),
            ],
            trump: Suit::Spades,
            turn: 0,
            sitting_out: None,
            current_trick: vec![(1, c("hearts-9")), (2, c("hearts-J")), (3, c("hearts-A"))],
            tricks: [1, 2],
            tricks_played: 3,
        };
        let mut best = None;
        let mut best_value = f32::NEG_INFINITY;
        for card in state.legal_moves() {
            let mut next = state.clone();
            next.play(card);
            let value = minimax(&next, 4, f32::NEG_INFINITY, f32::INFINITY, 0);
            if value > best_value {
                best_value = value;
                best = Some(card);
            }
        }
        assert_eq!(best, Some(c("spades-9")));
    }

    #[test]
    fn test_evaluate_counts_tricks_and_residuals() {
        let state = SearchState {
            hands: [vec![], vec![], vec![], vec![]],
            trump: Suit::Spades,
            turn: 0,
            sitting_out: None,
            current_trick: vec![],
            tricks: [4, 1],
            tricks_played: 5,
        };
        assert_eq!(state.evaluate(0), 300.0);
        assert_eq!(state.evaluate(1), -300.0);
        let state = SearchState {
            hands: [
                cards(&["spades-J"]), // 100
                vec![],
                vec![],
                cards(&["hearts-9"]), // 55
            ],
            trump: Suit::Spades,
            turn: 0,
            sitting_out: None,
            current_trick: vec![],
            tricks: [0, 0],
            tricks_played: 0,
        };
        assert!((state.evaluate(0) - 4.5).abs() < 1e-6);
    }

    #[test]
    fn test_sample_hands_sizes_and_disjointness() {
        let room = fixed_room([
            &["hearts-9", "hearts-10", "hearts-J", "hearts-Q", "hearts-K"],
            &["clubs-9", "clubs-10", "clubs-J", "clubs-Q", "clubs-K"],
            &["spades-9", "spades-10", "spades-J", "spades-Q", "spades-K"],
            &["diamonds-9", "diamonds-10", "diamonds-J", "diamonds-Q", "diamonds-K"],
        ]);
        let mut game = playing_state(&room, Suit::Hearts, 0);
        game.upcard = Some(c("hearts-A"));
        game.blocked_suit = None; // ordered up: the dealer holds the ace
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let hands = sample_hands(&room, &game, 0, VoidState::new(), &mut rng);
        assert_eq!(
            hands[0],
            cards(&["hearts-9", "hearts-10", "hearts-J", "hearts-Q", "hearts-K"])
        );
        let mut all: Vec<Card> = hands.iter().flatten().copied().collect();
        assert_eq!(all.len(), 20);
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 20, "sampled hands must be disjoint");
        for hand in &hands {
            assert_eq!(hand.len(), 5);
        }
        // The picked-up upcard is pinned to the dealer.
        assert!(hands[3].contains(&c("hearts-A")));
        // The bot's own cards never leak into other hands.
        for seat in 1..4 {
            for card in &hands[seat] {
                assert!(!hands[0].contains(card));
            }
        }
    }

    #[test]
    fn test_sample_hands_respect_voids() {
        let room = fixed_room([
            &["hearts-9", "hearts-10", "hearts-J", "hearts-Q", "hearts-K"],
            &["clubs-9", "clubs-10", "clubs-J", "clubs-Q", "clubs-K"],
            &["spades-9", "spades-10", "spades-J", "spades-Q", "spades-K"],
            &["diamonds-9", "diamonds-10", "diamonds-J", "diamonds-Q", "diamonds-K"],
        ]);
        let game = playing_state(&room, Suit::Hearts, 0);
        let mut void = VoidState::new();
        void.mark(1, Suit::Spades);
        void.mark(1, Suit::Clubs);
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        for _ in 0..16 {
            let hands = sample_hands(&room, &game, 0, void, &mut rng);
            for card in &hands[1] {
                let suit = rules::effective_suit(*card, Suit::Hearts);
                assert_ne!(suit, Suit::Spades);
                assert_ne!(suit, Suit::Clubs);
            }
        }
    }

    #[test]
    fn test_sample_hands_relax_on_conflict() {
        // Every unseen card is a club, but seat 1 is "void" in clubs: the
        // sampler must fill the hand anyway.
        let room = fixed_room([
            &["hearts-A", "hearts-10", "hearts-J", "hearts-Q", "hearts-K"],
            &["clubs-9"],
            &[],
            &[],
        ]);
        let mut game = playing_state(&room, Suit::Hearts, 0);
        // Pretend everything but clubs is gone from the deck by marking the
        // rest seen via completed tricks.
        let ids: Vec<_> = (0..4).map(|s| room.player_at(s).unwrap().id).collect();
        let own = room.player_at(0).unwrap().hand.clone();
        let gone: Vec<Card> = rules::deck()
            .into_iter()
            .filter(|card| card.suit != Suit::Clubs && !own.contains(card))
            .collect();
        for chunk in gone.chunks(4) {
            game.completed_tricks.push(crate::game::CompletedTrick {
                index: game.completed_tricks.len(),
                winner_seat: 0,
                cards: chunk
                    .iter()
                    .enumerate()
                    .map(|(i, &card)| TrickPlay {
                        player_id: ids[i],
                        card,
                    })
                    .collect(),
            });
        }
        let mut void = VoidState::new();
        void.mark(1, Suit::Clubs);
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let hands = sample_hands(&room, &game, 0, void, &mut rng);
        assert_eq!(hands[1].len(), 1);
        assert_eq!(hands[1][0].suit, Suit::Clubs);
    }
}
