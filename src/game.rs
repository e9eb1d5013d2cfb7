use crate::{
    card::{Card, Suit},
    error::EuchreError,
    protocol::Action,
    room::Room,
    rules,
    types::{partner_of, team_of, now_millis, PlayerId, RoomStatus},
};
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const TARGET_SCORE: i32 = 10;
pub const TRICKS_PER_HAND: usize = 5;
/// Seat 3 deals the first hand so seat 0 opens the bidding.
pub const FIRST_DEALER_SEAT: usize = 3;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Phase {
    #[serde(rename = "bidding-round-1")]
    BiddingRound1,
    #[serde(rename = "bidding-round-2")]
    BiddingRound2,
    #[serde(rename = "dealer-discard")]
    DealerDiscard,
    #[serde(rename = "playing")]
    Playing,
    #[serde(rename = "hand-over")]
    HandOver,
    #[serde(rename = "game-over")]
    GameOver,
}

impl Phase {
    pub fn str(self) -> &'static str {
        match self {
            Phase::BiddingRound1 => "bidding-round-1",
            Phase::BiddingRound2 => "bidding-round-2",
            Phase::DealerDiscard => "dealer-discard",
            Phase::Playing => "playing",
            Phase::HandOver => "hand-over",
            Phase::GameOver => "game-over",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrickPlay {
    pub player_id: PlayerId,
    pub card: Card,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedTrick {
    pub index: usize,
    pub winner_seat: usize,
    pub cards: Vec<TrickPlay>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandSummary {
    pub maker_team: usize,
    pub maker_tricks: u32,
    pub defender_tricks: u32,
    pub points_awarded: i32,
    pub awarded_to: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub phase: Phase,
    pub dealer_seat: usize,
    pub turn_seat: usize,
    pub upcard: Option<Card>,
    pub kitty: Vec<Card>,
    pub blocked_suit: Option<Suit>,
    pub trump: Option<Suit>,
    pub maker_team: Option<usize>,
    pub called_by_player_id: Option<PlayerId>,
    pub going_alone_player_id: Option<PlayerId>,
    pub sitting_out_seat: Option<usize>,
    pub current_trick: Vec<TrickPlay>,
    pub completed_tricks: Vec<CompletedTrick>,
    pub trick_index: usize,
    pub hand_summary: Option<HandSummary>,
    pub hand_number: u32,
}

impl GameState {
    pub fn active_seat_count(&self) -> usize {
        if self.sitting_out_seat.is_some() {
            3
        } else {
            4
        }
    }

    /// The next seat clockwise from `from` that is still in the hand.
    pub fn next_active_seat(&self, from: usize) -> usize {
        let mut seat = (from + 1) % 4;
        if self.sitting_out_seat == Some(seat) {
            seat = (seat + 1) % 4;
        }
        seat
    }

    pub fn lead_card(&self) -> Option<Card> {
        self.current_trick.first().map(|play| play.card)
    }

    /// Whether the trump call was a round-1 order-up, in which case the
    /// upcard is in the dealer's hand rather than turned down.
    pub fn upcard_picked_up(&self) -> bool {
        self.trump.is_some() && self.blocked_suit.is_none()
    }
}

impl Room {
    /// Apply one client or scheduler action for `player_id`. On success the
    /// returned strings are broadcast as info events; on failure nothing has
    /// been mutated.
    pub fn apply_action<R: Rng>(
        &mut self,
        player_id: PlayerId,
        action: &Action,
        rng: &mut R,
    ) -> Result<Vec<String>, EuchreError> {
        let actor = self.player(player_id).ok_or(EuchreError::UnknownPlayer)?;
        let seat = actor.seat_index;
        let name = actor.name.clone();
        let infos = match action {
            Action::AddBot => {
                self.require_creator(player_id)?;
                self.require_waiting()?;
                let bot = self.add_bot(rng)?;
                vec![format!("{} sat down", bot.name)]
            }
            Action::RemoveBot => {
                self.require_creator(player_id)?;
                self.require_waiting()?;
                let bot = self.remove_last_bot()?;
                vec![format!("{} left", bot.name)]
            }
            Action::SetSeat {
                target_player_id,
                seat_index,
            } => {
                self.require_creator(player_id)?;
                self.require_waiting()?;
                self.move_seat(*target_player_id, *seat_index)?;
                let target = self.player(*target_player_id).unwrap();
                vec![format!("{} moved to seat {}", target.name, seat_index)]
            }
            Action::SetBotDifficulty { bot_difficulty } => {
                self.require_creator(player_id)?;
                self.bot_difficulty = *bot_difficulty;
                vec![format!("bots play {} now", bot_difficulty)]
            }
            Action::StartRoom => {
                self.require_creator(player_id)?;
                self.require_waiting()?;
                if self.players.len() < self.max_players {
                    return Err(EuchreError::NotEnoughPlayers);
                }
                self.status = RoomStatus::Playing;
                let mut infos = vec![format!("{} started the game", name)];
                infos.extend(self.deal_hand(FIRST_DEALER_SEAT));
                infos
            }
            Action::Chat { message } => vec![format!("{}: {}", name, message)],
            Action::Pass => self.pass(seat, &name)?,
            Action::OrderUp { alone } => self.order_up(seat, player_id, &name, *alone)?,
            Action::ChooseTrump { suit, alone } => {
                self.choose_trump(seat, player_id, &name, *suit, *alone)?
            }
            Action::Discard { card_id } => self.discard(seat, &name, card_id)?,
            Action::PlayCard { card_id } => self.play_card(seat, player_id, &name, card_id)?,
            Action::StartNextHand => self.start_next_hand()?,
            Action::RestartMatch => self.restart_match()?,
        };
        self.updated_at = now_millis();
        Ok(infos)
    }

    fn require_creator(&self, player_id: PlayerId) -> Result<(), EuchreError> {
        if self.is_creator(player_id) {
            Ok(())
        } else {
            Err(EuchreError::CreatorOnly)
        }
    }

    fn require_waiting(&self) -> Result<(), EuchreError> {
        if self.status == RoomStatus::Waiting {
            Ok(())
        } else {
            Err(EuchreError::RoomStarted)
        }
    }

    // Takes the game field rather than self so callers can keep touching
    // players and score while the game is borrowed.
    fn checked_game<'a>(
        game: &'a mut Option<GameState>,
        phases: &[Phase],
        seat: Option<usize>,
    ) -> Result<&'a mut GameState, EuchreError> {
        let game = game.as_mut().ok_or(EuchreError::RoomNotStarted)?;
        if !phases.contains(&game.phase) {
            return Err(EuchreError::IllegalPhase(game.phase.str()));
        }
        if let Some(seat) = seat {
            if game.turn_seat != seat {
                return Err(EuchreError::NotYourTurn);
            }
        }
        Ok(game)
    }

    /// Deal the next hand with `dealer` in the box. Replaces the game state
    /// and every hand; callers decide who deals.
    fn deal_hand(&mut self, dealer: usize) -> Vec<String> {
        let deal = rules::deal(&self.seed, self.deals_dealt);
        self.deals_dealt += 1;
        let hand_number = self.game.as_ref().map_or(1, |g| g.hand_number + 1);
        for player in &mut self.players {
            player.hand = deal.hands[player.seat_index].clone();
        }
        let upcard = deal.upcard;
        self.game = Some(GameState {
            phase: Phase::BiddingRound1,
            dealer_seat: dealer,
            turn_seat: (dealer + 1) % 4,
            upcard: Some(upcard),
            kitty: deal.kitty,
            blocked_suit: None,
            trump: None,
            maker_team: None,
            called_by_player_id: None,
            going_alone_player_id: None,
            sitting_out_seat: None,
            current_trick: Vec::new(),
            completed_tricks: Vec::new(),
            trick_index: 0,
            hand_summary: None,
            hand_number,
        });
        let dealer_name = self.player_at(dealer).map_or_else(String::new, |p| p.name.clone());
        vec![format!(
            "hand {}: {} deals, {} is up",
            hand_number, dealer_name, upcard
        )]
    }

    fn pass(&mut self, seat: usize, name: &str) -> Result<Vec<String>, EuchreError> {
        let game =
            Self::checked_game(&mut self.game, &[Phase::BiddingRound1, Phase::BiddingRound2], Some(seat))?;
        let dealer = game.dealer_seat;
        match game.phase {
            Phase::BiddingRound1 => {
                if seat == dealer {
                    game.blocked_suit = game.upcard.map(|card| card.suit);
                    game.phase = Phase::BiddingRound2;
                    game.turn_seat = (dealer + 1) % 4;
                    Ok(vec![format!("{} turns it down", name)])
                } else {
                    game.turn_seat = (seat + 1) % 4;
                    Ok(vec![format!("{} passes", name)])
                }
            }
            Phase::BiddingRound2 => {
                if seat == dealer {
                    // All four passed twice: throw the hand in and redeal
                    // with the next dealer.
                    let mut infos = vec![format!("{} passes, the hand is dead", name)];
                    infos.extend(self.deal_hand((dealer + 1) % 4));
                    Ok(infos)
                } else {
                    game.turn_seat = (seat + 1) % 4;
                    Ok(vec![format!("{} passes", name)])
                }
            }
            _ => unreachable!(),
        }
    }

    fn order_up(
        &mut self,
        seat: usize,
        player_id: PlayerId,
        name: &str,
        alone: bool,
    ) -> Result<Vec<String>, EuchreError> {
        let game = Self::checked_game(&mut self.game, &[Phase::BiddingRound1], Some(seat))?;
        let upcard = game.upcard.ok_or(EuchreError::IllegalPhase("playing"))?;
        let dealer = game.dealer_seat;
        game.trump = Some(upcard.suit);
        game.maker_team = Some(team_of(seat));
        game.called_by_player_id = Some(player_id);
        if alone {
            game.going_alone_player_id = Some(player_id);
            game.sitting_out_seat = Some(partner_of(seat));
        }
        game.turn_seat = dealer;
        game.phase = Phase::DealerDiscard;
        self.players
            .iter_mut()
            .find(|p| p.seat_index == dealer)
            .expect("four seated players while bidding")
            .hand
            .push(upcard);
        Ok(vec![if alone {
            format!("{} orders up {} and goes alone", name, upcard.suit)
        } else {
            format!("{} orders up {}", name, upcard.suit)
        }])
    }

    fn choose_trump(
        &mut self,
        seat: usize,
        player_id: PlayerId,
        name: &str,
        suit: Suit,
        alone: bool,
    ) -> Result<Vec<String>, EuchreError> {
        let game = Self::checked_game(&mut self.game, &[Phase::BiddingRound2], Some(seat))?;
        if game.blocked_suit == Some(suit) {
            return Err(EuchreError::BlockedSuit(suit));
        }
        game.trump = Some(suit);
        game.maker_team = Some(team_of(seat));
        game.called_by_player_id = Some(player_id);
        if alone {
            game.going_alone_player_id = Some(player_id);
            game.sitting_out_seat = Some(partner_of(seat));
        }
        game.phase = Phase::Playing;
        game.turn_seat = game.next_active_seat(game.dealer_seat);
        Ok(vec![if alone {
            format!("{} calls {} alone", name, suit)
        } else {
            format!("{} calls {}", name, suit)
        }])
    }

    fn discard(
        &mut self,
        seat: usize,
        name: &str,
        card_id: &str,
    ) -> Result<Vec<String>, EuchreError> {
        let card: Card = card_id.parse()?;
        let game = Self::checked_game(&mut self.game, &[Phase::DealerDiscard], Some(seat))?;
        let dealer = game.dealer_seat;
        let hand = &mut self
            .players
            .iter_mut()
            .find(|p| p.seat_index == dealer)
            .expect("dealer is seated")
            .hand;
        let pos = hand
            .iter()
            .position(|&c| c == card)
            .ok_or_else(|| EuchreError::NotYourCard(card_id.to_string()))?;
        hand.remove(pos);
        game.phase = Phase::Playing;
        game.turn_seat = game.next_active_seat(dealer);
        Ok(vec![format!("{} discards", name)])
    }

    fn play_card(
        &mut self,
        seat: usize,
        player_id: PlayerId,
        name: &str,
        card_id: &str,
    ) -> Result<Vec<String>, EuchreError> {
        let card: Card = card_id.parse()?;
        let game = Self::checked_game(&mut self.game, &[Phase::Playing], Some(seat))?;
        let trump = game.trump.expect("trump is set while playing");
        let player = self
            .players
            .iter_mut()
            .find(|p| p.seat_index == seat)
            .expect("the turn seat is seated");
        let pos = player
            .hand
            .iter()
            .position(|&c| c == card)
            .ok_or_else(|| EuchreError::NotYourCard(card_id.to_string()))?;
        if !rules::legal_plays(&player.hand, game.lead_card(), trump).contains(&card) {
            return Err(EuchreError::MustFollowSuit);
        }
        player.hand.remove(pos);
        game.current_trick.push(TrickPlay { player_id, card });
        let mut infos = vec![format!("{} plays {}", name, card)];
        if game.current_trick.len() < game.active_seat_count() {
            game.turn_seat = game.next_active_seat(seat);
            return Ok(infos);
        }
        // Trick complete: resolve the winner, bank the trick, winner leads.
        let plays: Vec<Card> = game.current_trick.iter().map(|play| play.card).collect();
        let winner_id = game.current_trick[rules::trick_winner(&plays, trump)].player_id;
        let winner = self
            .players
            .iter()
            .find(|p| p.id == winner_id)
            .expect("the winner is seated");
        let winner_seat = winner.seat_index;
        infos.push(format!("{} takes trick {}", winner.name, game.trick_index + 1));
        let cards = std::mem::take(&mut game.current_trick);
        game.completed_tricks.push(CompletedTrick {
            index: game.trick_index,
            winner_seat,
            cards,
        });
        game.trick_index += 1;
        game.turn_seat = winner_seat;
        if game.trick_index == TRICKS_PER_HAND {
            infos.extend(self.finalize_hand());
        }
        Ok(infos)
    }

    fn finalize_hand(&mut self) -> Vec<String> {
        let game = self.game.as_mut().expect("a hand is in progress");
        let maker_team = game.maker_team.expect("a hand has a maker");
        let defender_team = 1 - maker_team;
        let maker_tricks = game
            .completed_tricks
            .iter()
            .filter(|trick| team_of(trick.winner_seat) == maker_team)
            .count() as u32;
        let defender_tricks = TRICKS_PER_HAND as u32 - maker_tricks;
        let alone = game.going_alone_player_id.is_some();
        let (points_awarded, awarded_to) = if maker_tricks == 5 {
            (if alone { 4 } else { 2 }, maker_team)
        } else if maker_tricks >= 3 {
            (1, maker_team)
        } else {
            (2, defender_team)
        };
        self.score.add(awarded_to, points_awarded);
        game.hand_summary = Some(HandSummary {
            maker_team,
            maker_tricks,
            defender_tricks,
            points_awarded,
            awarded_to,
        });
        let mut infos = vec![if awarded_to == maker_team {
            format!(
                "makers take {} tricks and score {}",
                maker_tricks, points_awarded
            )
        } else {
            format!("euchred! defenders score {}", points_awarded)
        }];
        infos.push(format!(
            "score: {} to {}",
            self.score.team0, self.score.team1
        ));
        game.phase = if self.score.team0 >= TARGET_SCORE || self.score.team1 >= TARGET_SCORE {
            let winners = if self.score.team0 >= TARGET_SCORE { 0 } else { 1 };
            infos.push(format!("team {} wins the match", winners));
            Phase::GameOver
        } else {
            Phase::HandOver
        };
        infos
    }

    fn start_next_hand(&mut self) -> Result<Vec<String>, EuchreError> {
        let game = self.game.as_ref().ok_or(EuchreError::RoomNotStarted)?;
        if game.phase != Phase::HandOver {
            return Err(EuchreError::IllegalPhase(game.phase.str()));
        }
        let dealer = (game.dealer_seat + 1) % 4;
        Ok(self.deal_hand(dealer))
    }

    fn restart_match(&mut self) -> Result<Vec<String>, EuchreError> {
        let game = self.game.as_ref().ok_or(EuchreError::RoomNotStarted)?;
        if game.phase != Phase::GameOver {
            return Err(EuchreError::IllegalPhase(game.phase.str()));
        }
        let dealer = (game.dealer_seat + 1) % 4;
        self.score = Default::default();
        let mut infos = vec!["starting a fresh match".to_string()];
        infos.extend(self.deal_hand(dealer));
        Ok(infos)
    }
}
