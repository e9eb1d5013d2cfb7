use crate::card::{Card, Rank, Suit};
use rand::{seq::SliceRandom, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sha2::{Digest, Sha256};

/// The 24-card euchre deck, nine through ace in each suit.
pub fn deck() -> Vec<Card> {
    let mut cards = Vec::with_capacity(24);
    for suit in Suit::VALUES {
        for rank in Rank::VALUES {
            cards.push(Card::new(suit, rank));
        }
    }
    cards
}

#[derive(Debug, Clone)]
pub struct Deal {
    pub hands: [Vec<Card>; 4],
    pub upcard: Card,
    pub kitty: Vec<Card>,
}

/// Shuffle and deal reproducibly: the room seed hashes to a ChaCha key and
/// the per-room deal counter selects the stream, so a restored room replays
/// the same deals it would have seen.
pub fn deal(seed: &str, stream: u64) -> Deal {
    let hash: [u8; 32] = Sha256::digest(seed.as_bytes()).into();
    let mut rng = ChaCha20Rng::from_seed(hash);
    rng.set_stream(stream);
    let mut deck = deck();
    deck.shuffle(&mut rng);
    let hands = [
        deck[0..5].to_vec(),
        deck[5..10].to_vec(),
        deck[10..15].to_vec(),
        deck[15..20].to_vec(),
    ];
    Deal {
        hands,
        upcard: deck[20],
        kitty: deck[21..24].to_vec(),
    }
}

pub fn is_right_bower(card: Card, trump: Suit) -> bool {
    card.rank == Rank::Jack && card.suit == trump
}

pub fn is_left_bower(card: Card, trump: Suit) -> bool {
    card.rank == Rank::Jack && card.suit == trump.same_color()
}

/// The suit a card follows and wins as: the left bower plays as trump, every
/// other card as printed.
pub fn effective_suit(card: Card, trump: Suit) -> Suit {
    if is_left_bower(card, trump) {
        trump
    } else {
        card.suit
    }
}

/// Absolute strength of a card under the given trump and led effective suit.
/// Off-suit cards score zero and can never take the trick.
pub fn rank_strength(card: Card, trump: Suit, lead: Suit) -> i32 {
    if is_right_bower(card, trump) {
        return 100;
    }
    if is_left_bower(card, trump) {
        return 99;
    }
    if card.suit == trump {
        return match card.rank {
            Rank::Nine => 94,
            Rank::Ten => 95,
            Rank::Queen => 96,
            Rank::King => 97,
            Rank::Ace => 98,
            Rank::Jack => unreachable!("jack of trump is the right bower"),
        };
    }
    if card.suit == lead {
        55 + card.rank as i32
    } else {
        0
    }
}

/// A card's standing strength with no trick context, scored as if it led its
/// own suit. Trump cards keep their trump strength.
pub fn residual_strength(card: Card, trump: Suit) -> i32 {
    rank_strength(card, trump, effective_suit(card, trump))
}

/// Cards the holder may play: follow the led effective suit when possible,
/// otherwise anything. An empty lead means the whole hand.
pub fn legal_plays(hand: &[Card], lead: Option<Card>, trump: Suit) -> Vec<Card> {
    if let Some(lead) = lead {
        let suit = effective_suit(lead, trump);
        let follows: Vec<Card> = hand
            .iter()
            .copied()
            .filter(|&card| effective_suit(card, trump) == suit)
            .collect();
        if !follows.is_empty() {
            return follows;
        }
    }
    hand.to_vec()
}

/// Index into `plays` of the winning card; `plays[0]` led the trick.
pub fn trick_winner(plays: &[Card], trump: Suit) -> usize {
    let lead = effective_suit(plays[0], trump);
    plays
        .iter()
        .enumerate()
        .max_by_key(|(_, &card)| rank_strength(card, trump, lead))
        .map(|(idx, _)| idx)
        .expect("a trick has at least one play")
}

#[cfg(test)]
mod test {
    use super::*;

    fn c(id: &str) -> Card {
        id.parse().unwrap()
    }

    #[test]
    fn test_deck_is_24_unique_cards() {
        let mut cards = deck();
        assert_eq!(cards.len(), 24);
        cards.sort();
        cards.dedup();
        assert_eq!(cards.len(), 24);
    }

    #[test]
    fn test_deal_partitions_the_deck() {
        let deal = deal("r1", 0);
        let mut cards: Vec<Card> = deal.hands.iter().flatten().copied().collect();
        cards.push(deal.upcard);
        cards.extend(&deal.kitty);
        assert_eq!(cards.len(), 24);
        let mut sorted = cards.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), 24);
        for hand in &deal.hands {
            assert_eq!(hand.len(), 5);
        }
        assert_eq!(deal.kitty.len(), 3);
    }

    #[test]
    fn test_deal_is_reproducible() {
        let first = deal("same-seed", 7);
        let second = deal("same-seed", 7);
        assert_eq!(first.hands, second.hands);
        assert_eq!(first.upcard, second.upcard);
        assert_eq!(first.kitty, second.kitty);
        assert_ne!(deal("same-seed", 8).hands, first.hands);
    }

    #[test]
    fn test_bowers() {
        assert!(is_right_bower(c("hearts-J"), Suit::Hearts));
        assert!(is_left_bower(c("diamonds-J"), Suit::Hearts));
        assert!(is_left_bower(c("clubs-J"), Suit::Spades));
        assert!(!is_left_bower(c("clubs-J"), Suit::Hearts));
        assert_eq!(effective_suit(c("diamonds-J"), Suit::Hearts), Suit::Hearts);
        assert_eq!(effective_suit(c("diamonds-J"), Suit::Clubs), Suit::Diamonds);
        assert_eq!(effective_suit(c("diamonds-A"), Suit::Hearts), Suit::Diamonds);
    }

    #[test]
    fn test_rank_strength_table() {
        let trump = Suit::Spades;
        assert_eq!(rank_strength(c("spades-J"), trump, Suit::Spades), 100);
        assert_eq!(rank_strength(c("clubs-J"), trump, Suit::Spades), 99);
        assert_eq!(rank_strength(c("spades-A"), trump, Suit::Hearts), 98);
        assert_eq!(rank_strength(c("spades-K"), trump, Suit::Hearts), 97);
        assert_eq!(rank_strength(c("spades-Q"), trump, Suit::Hearts), 96);
        assert_eq!(rank_strength(c("spades-10"), trump, Suit::Hearts), 95);
        assert_eq!(rank_strength(c("spades-9"), trump, Suit::Hearts), 94);
        assert_eq!(rank_strength(c("hearts-A"), trump, Suit::Hearts), 60);
        assert_eq!(rank_strength(c("hearts-K"), trump, Suit::Hearts), 59);
        assert_eq!(rank_strength(c("hearts-Q"), trump, Suit::Hearts), 58);
        assert_eq!(rank_strength(c("hearts-J"), trump, Suit::Hearts), 57);
        assert_eq!(rank_strength(c("hearts-10"), trump, Suit::Hearts), 56);
        assert_eq!(rank_strength(c("hearts-9"), trump, Suit::Hearts), 55);
        assert_eq!(rank_strength(c("diamonds-A"), trump, Suit::Hearts), 0);
    }

    #[test]
    fn test_legal_plays_follow_effective_suit() {
        let trump = Suit::Hearts;
        let hand = vec![c("diamonds-J"), c("clubs-10"), c("clubs-A")];
        // A heart lead must be followed by the left bower, the only
        // effective heart in the hand.
        assert_eq!(
            legal_plays(&hand, Some(c("hearts-K")), trump),
            vec![c("diamonds-J")]
        );
        // A diamond lead cannot be followed with the left bower.
        assert_eq!(legal_plays(&hand, Some(c("diamonds-9")), trump), hand);
        assert_eq!(
            legal_plays(&hand, Some(c("clubs-9")), trump),
            vec![c("clubs-10"), c("clubs-A")]
        );
        assert_eq!(legal_plays(&hand, None, trump), hand);
    }

    #[test]
    fn test_trick_winner() {
        let trump = Suit::Spades;
        // Low trump beats an off-suit ace on lead.
        assert_eq!(trick_winner(&[c("hearts-A"), c("spades-9")], trump), 1);
        // Right bower beats left bower beats trump ace.
        assert_eq!(
            trick_winner(&[c("spades-A"), c("clubs-J"), c("spades-J")], trump),
            2
        );
        assert_eq!(trick_winner(&[c("spades-A"), c("clubs-J")], trump), 1);
        // Off-suit cards never win.
        assert_eq!(
            trick_winner(
                &[c("hearts-9"), c("diamonds-A"), c("clubs-A"), c("hearts-K")],
                trump
            ),
            3
        );
        // Highest of the led suit wins without trump in the trick.
        assert_eq!(
            trick_winner(&[c("hearts-Q"), c("hearts-A"), c("diamonds-K")], trump),
            1
        );
    }
}
