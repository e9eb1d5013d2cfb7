use crate::{card::Suit, game::GameState, room::Room, rules};

/// Which seats have shown they are out of which effective suits. Sixteen
/// seat/suit pairs pack into one word, as good for cloning into samples as
/// it is for testing.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct VoidState {
    state: u16,
}

impl VoidState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_void(&self, seat: usize, suit: Suit) -> bool {
        self.state & (1 << (4 * seat + suit as usize)) != 0
    }

    pub fn mark(&mut self, seat: usize, suit: Suit) {
        self.state |= 1 << (4 * seat + suit as usize);
    }

    /// Rebuild the record from the hand's tricks: a player who did not
    /// follow the led effective suit cannot hold it. The left bower counts
    /// as trump on both sides of the comparison.
    pub fn observe(room: &Room, game: &GameState) -> Self {
        let mut void = VoidState::new();
        let trump = match game.trump {
            Some(trump) => trump,
            None => return void,
        };
        let tricks = game
            .completed_tricks
            .iter()
            .map(|trick| trick.cards.as_slice())
            .chain(std::iter::once(game.current_trick.as_slice()));
        for plays in tricks {
            let lead = match plays.first() {
                Some(play) => rules::effective_suit(play.card, trump),
                None => continue,
            };
            for play in &plays[1..] {
                if rules::effective_suit(play.card, trump) != lead {
                    if let Some(player) = room.player(play.player_id) {
                        void.mark(player.seat_index, lead);
                    }
                }
            }
        }
        void
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        card::Card,
        game::{CompletedTrick, Phase, TrickPlay},
        room::Room,
        types::Difficulty,
    };

    fn c(id: &str) -> Card {
        id.parse().unwrap()
    }

    #[test]
    fn test_mark_and_query() {
        let mut void = VoidState::new();
        assert!(!void.is_void(2, Suit::Hearts));
        void.mark(2, Suit::Hearts);
        assert!(void.is_void(2, Suit::Hearts));
        assert!(!void.is_void(2, Suit::Spades));
        assert!(!void.is_void(1, Suit::Hearts));
    }

    #[test]
    fn test_observe_marks_failure_to_follow() {
        let mut room = Room::new("r".to_string(), None, Difficulty::Medium);
        for name in ["a", "b", "c", "d"] {
            room.join(name).unwrap();
        }
        let ids: Vec<_> = (0..4)
            .map(|seat| room.player_at(seat).unwrap().id)
            .collect();
        room.status = crate::types::RoomStatus::Playing;
        let mut game = crate::game::GameState {
            phase: Phase::Playing,
            dealer_seat: 3,
            turn_seat: 0,
            upcard: None,
            kitty: vec![],
            blocked_suit: Some(Suit::Clubs),
            trump: Some(Suit::Hearts),
            maker_team: Some(0),
            called_by_player_id: Some(ids[0]),
            going_alone_player_id: None,
            sitting_out_seat: None,
            current_trick: vec![
                TrickPlay {
                    player_id: ids[1],
                    card: c("spades-A"),
                },
                // Seat 2 sloughs a club on a spade lead.
                TrickPlay {
                    player_id: ids[2],
                    card: c("clubs-9"),
                },
            ],
            completed_tricks: vec![CompletedTrick {
                index: 0,
                winner_seat: 1,
                cards: vec![
                    // Seat 0 leads the left bower: an effective heart.
                    TrickPlay {
                        player_id: ids[0],
                        card: c("diamonds-J"),
                    },
                    TrickPlay {
                        player_id: ids[1],
                        card: c("hearts-K"),
                    },
                    // Seat 2 cannot follow hearts.
                    TrickPlay {
                        player_id: ids[2],
                        card: c("diamonds-9"),
                    },
                    // Seat 3 plays the trump jack: still a heart.
                    TrickPlay {
                        player_id: ids[3],
                        card: c("hearts-J"),
                    },
                ],
            }],
            trick_index: 1,
            hand_summary: None,
            hand_number: 1,
        };
        let void = VoidState::observe(&room, &game);
        assert!(void.is_void(2, Suit::Hearts));
        assert!(void.is_void(2, Suit::Spades));
        assert!(!void.is_void(3, Suit::Hearts));
        assert!(!void.is_void(1, Suit::Hearts));
        // A fresh hand clears the slate.
        game.completed_tricks.clear();
        game.current_trick.clear();
        assert_eq!(VoidState::observe(&room, &game), VoidState::new());
    }
}
