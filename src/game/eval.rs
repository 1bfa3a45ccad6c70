//! Hand strength evaluation.
//!
//! The engine only depends on the [`HandEvaluator`] contract: given a
//! player's hole cards plus the board, produce an orderable
//! [`HandRanking`]. [`SevenCardEvaluator`] is the stock implementation;
//! callers with their own evaluator plug it in through the trait.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::entities::{Card, Suit, Value};

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Rank {
    HighCard,
    OnePair,
    TwoPair,
    ThreeOfAKind,
    Straight,
    Flush,
    FullHouse,
    FourOfAKind,
    StraightFlush,
}

/// A ranked five-card hand. Ordering is rank first, then the values
/// vector lexicographically (group values before kickers, descending),
/// so `>` means "beats".
#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct HandRanking {
    pub rank: Rank,
    pub values: Vec<Value>,
}

fn value_name(value: Value) -> &'static str {
    match value {
        14 => "ace",
        13 => "king",
        12 => "queen",
        11 => "jack",
        10 => "ten",
        9 => "nine",
        8 => "eight",
        7 => "seven",
        6 => "six",
        5 => "five",
        4 => "four",
        3 => "three",
        _ => "two",
    }
}

impl fmt::Display for HandRanking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let top = self.values.first().copied().unwrap_or(2);
        let repr = match self.rank {
            Rank::HighCard => format!("{} high", value_name(top)),
            Rank::OnePair => format!("pair of {}s", value_name(top)),
            Rank::TwoPair => {
                let low = self.values.get(1).copied().unwrap_or(2);
                format!("two pair, {}s and {}s", value_name(top), value_name(low))
            }
            Rank::ThreeOfAKind => format!("three of a kind, {}s", value_name(top)),
            Rank::Straight => format!("straight, {} high", value_name(top)),
            Rank::Flush => format!("flush, {} high", value_name(top)),
            Rank::FullHouse => {
                let pair = self.values.get(1).copied().unwrap_or(2);
                format!("full house, {}s over {}s", value_name(top), value_name(pair))
            }
            Rank::FourOfAKind => format!("four of a kind, {}s", value_name(top)),
            Rank::StraightFlush if top == 14 => "royal flush".to_string(),
            Rank::StraightFlush => format!("straight flush, {} high", value_name(top)),
        };
        write!(f, "{repr}")
    }
}

/// Ranks a player's best five-card hand out of 5-7 candidate cards.
pub trait HandEvaluator {
    fn evaluate(&self, cards: &[Card]) -> HandRanking;
}

/// Straightforward best-5-of-7 evaluation: straight-flush and flush by
/// suit scan, straights over distinct values (wheel included), the rest
/// from value-group counts.
#[derive(Clone, Copy, Debug, Default)]
pub struct SevenCardEvaluator;

/// Highest straight formed by `values`, which must be sorted descending
/// and distinct. The wheel (A-5) counts with the five high.
fn best_straight(values: &[Value]) -> Option<Value> {
    for window in values.windows(5) {
        if window[0] - window[4] == 4 {
            return Some(window[0]);
        }
    }
    // Ace plays low in the wheel.
    if values.contains(&14)
        && [5, 4, 3, 2].iter().all(|v| values.contains(v))
    {
        return Some(5);
    }
    None
}

impl HandEvaluator for SevenCardEvaluator {
    fn evaluate(&self, cards: &[Card]) -> HandRanking {
        let mut values: Vec<Value> = cards.iter().map(|c| c.0).collect();
        values.sort_unstable_by(|a, b| b.cmp(a));

        // Short inputs only happen outside a normal showdown; rank what
        // is there as a high card.
        if cards.len() < 5 {
            return HandRanking {
                rank: Rank::HighCard,
                values,
            };
        }

        let flush_values: Option<Vec<Value>> = Suit::ALL.iter().find_map(|&suit| {
            let mut suited: Vec<Value> = cards
                .iter()
                .filter(|c| c.1 == suit)
                .map(|c| c.0)
                .collect();
            if suited.len() >= 5 {
                suited.sort_unstable_by(|a, b| b.cmp(a));
                Some(suited)
            } else {
                None
            }
        });

        if let Some(suited) = &flush_values
            && let Some(high) = best_straight(suited)
        {
            return HandRanking {
                rank: Rank::StraightFlush,
                values: vec![high],
            };
        }

        let mut counts: HashMap<Value, usize> = HashMap::new();
        for &value in &values {
            *counts.entry(value).or_default() += 1;
        }
        // Biggest group first, ties broken by value.
        let mut groups: Vec<(usize, Value)> =
            counts.into_iter().map(|(v, n)| (n, v)).collect();
        groups.sort_unstable_by(|a, b| b.cmp(a));

        let kickers = |exclude: &[Value], take: usize| -> Vec<Value> {
            values
                .iter()
                .filter(|v| !exclude.contains(v))
                .take(take)
                .copied()
                .collect()
        };

        if groups[0].0 == 4 {
            let quad = groups[0].1;
            let mut vals = vec![quad];
            vals.extend(kickers(&[quad], 1));
            return HandRanking {
                rank: Rank::FourOfAKind,
                values: vals,
            };
        }

        if groups[0].0 == 3 && groups.len() > 1 && groups[1].0 >= 2 {
            return HandRanking {
                rank: Rank::FullHouse,
                values: vec![groups[0].1, groups[1].1],
            };
        }

        if let Some(suited) = flush_values {
            return HandRanking {
                rank: Rank::Flush,
                values: suited.into_iter().take(5).collect(),
            };
        }

        let mut distinct = values.clone();
        distinct.dedup();
        if let Some(high) = best_straight(&distinct) {
            return HandRanking {
                rank: Rank::Straight,
                values: vec![high],
            };
        }

        if groups[0].0 == 3 {
            let trips = groups[0].1;
            let mut vals = vec![trips];
            vals.extend(kickers(&[trips], 2));
            return HandRanking {
                rank: Rank::ThreeOfAKind,
                values: vals,
            };
        }

        if groups[0].0 == 2 && groups.len() > 1 && groups[1].0 == 2 {
            let (high, low) = (groups[0].1, groups[1].1);
            let mut vals = vec![high, low];
            vals.extend(kickers(&[high, low], 1));
            return HandRanking {
                rank: Rank::TwoPair,
                values: vals,
            };
        }

        if groups[0].0 == 2 {
            let pair = groups[0].1;
            let mut vals = vec![pair];
            vals.extend(kickers(&[pair], 3));
            return HandRanking {
                rank: Rank::OnePair,
                values: vals,
            };
        }

        HandRanking {
            rank: Rank::HighCard,
            values: values.into_iter().take(5).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::Suit::{Club, Diamond, Heart, Spade};

    fn eval(cards: &[Card]) -> HandRanking {
        SevenCardEvaluator.evaluate(cards)
    }

    #[test]
    fn straight_flush_beats_quads() {
        let sf = eval(&[
            Card(9, Spade),
            Card(10, Spade),
            Card(11, Spade),
            Card(12, Spade),
            Card(13, Spade),
            Card(2, Heart),
            Card(2, Club),
        ]);
        assert_eq!(sf.rank, Rank::StraightFlush);
        assert_eq!(sf.values, vec![13]);

        let quads = eval(&[
            Card(14, Spade),
            Card(14, Heart),
            Card(14, Diamond),
            Card(14, Club),
            Card(13, Heart),
            Card(3, Club),
            Card(4, Club),
        ]);
        assert_eq!(quads.rank, Rank::FourOfAKind);
        assert!(sf > quads);
    }

    #[test]
    fn wheel_straight_is_five_high() {
        let hand = eval(&[
            Card(14, Spade),
            Card(2, Heart),
            Card(3, Club),
            Card(4, Diamond),
            Card(5, Spade),
            Card(9, Heart),
            Card(12, Club),
        ]);
        assert_eq!(hand.rank, Rank::Straight);
        assert_eq!(hand.values, vec![5]);

        let six_high = eval(&[
            Card(2, Heart),
            Card(3, Club),
            Card(4, Diamond),
            Card(5, Spade),
            Card(6, Spade),
            Card(13, Heart),
            Card(12, Club),
        ]);
        assert!(six_high > hand);
    }

    #[test]
    fn full_house_picks_best_trip_and_pair() {
        let hand = eval(&[
            Card(10, Spade),
            Card(10, Heart),
            Card(10, Club),
            Card(8, Diamond),
            Card(8, Spade),
            Card(14, Heart),
            Card(2, Club),
        ]);
        assert_eq!(hand.rank, Rank::FullHouse);
        assert_eq!(hand.values, vec![10, 8]);
        assert_eq!(hand.to_string(), "full house, tens over eights");
    }

    #[test]
    fn two_pair_keeps_best_kicker() {
        let hand = eval(&[
            Card(11, Spade),
            Card(11, Heart),
            Card(4, Club),
            Card(4, Diamond),
            Card(14, Spade),
            Card(9, Heart),
            Card(2, Club),
        ]);
        assert_eq!(hand.rank, Rank::TwoPair);
        assert_eq!(hand.values, vec![11, 4, 14]);
    }

    #[test]
    fn kickers_break_pair_ties() {
        let better = eval(&[
            Card(13, Spade),
            Card(13, Heart),
            Card(14, Club),
            Card(9, Diamond),
            Card(7, Spade),
            Card(3, Heart),
            Card(2, Club),
        ]);
        let worse = eval(&[
            Card(13, Club),
            Card(13, Diamond),
            Card(12, Club),
            Card(9, Heart),
            Card(7, Club),
            Card(3, Spade),
            Card(2, Heart),
        ]);
        assert_eq!(better.rank, Rank::OnePair);
        assert_eq!(worse.rank, Rank::OnePair);
        assert!(better > worse);
    }

    #[test]
    fn identical_boards_tie() {
        let board = [
            Card(14, Spade),
            Card(13, Spade),
            Card(12, Diamond),
            Card(11, Club),
            Card(10, Heart),
        ];
        let a = eval(&[[Card(2, Heart), Card(3, Club)].as_slice(), &board].concat());
        let b = eval(&[[Card(4, Diamond), Card(5, Spade)].as_slice(), &board].concat());
        assert_eq!(a, b);
        assert_eq!(a.rank, Rank::Straight);
    }

    #[test]
    fn royal_flush_description() {
        let hand = eval(&[
            Card(14, Heart),
            Card(13, Heart),
            Card(12, Heart),
            Card(11, Heart),
            Card(10, Heart),
            Card(2, Club),
            Card(3, Club),
        ]);
        assert_eq!(hand.rank, Rank::StraightFlush);
        assert_eq!(hand.to_string(), "royal flush");
    }

    #[test]
    fn flush_outranks_straight() {
        let flush = eval(&[
            Card(2, Club),
            Card(6, Club),
            Card(9, Club),
            Card(11, Club),
            Card(13, Club),
            Card(10, Heart),
            Card(12, Spade),
        ]);
        assert_eq!(flush.rank, Rank::Flush);
        let straight = eval(&[
            Card(5, Club),
            Card(6, Heart),
            Card(7, Spade),
            Card(8, Diamond),
            Card(9, Spade),
            Card(13, Heart),
            Card(2, Diamond),
        ]);
        assert_eq!(straight.rank, Rank::Straight);
        assert!(flush > straight);
    }
}
