//! Synthetic fallback quotes.
//!
//! When a venue cannot be reached the scanner still publishes a structurally
//! valid snapshot built from a small fixed catalog, so downstream stages keep
//! running (and demos work offline). Prices are anchored per title, shifted by
//! the venue's configured bias, and jittered.

use rand::Rng;

use crate::types::{MarketQuote, VenueSnapshot};

/// Titles every synthetic snapshot lists, in order.
pub const CATALOG: [&str; 3] = [
    "Will India win the cricket match?",
    "Will BTC close above 100k this week?",
    "Will Team A win IPL finals?",
];

const PRICE_FLOOR: f64 = 5.0;
const PRICE_CEIL: f64 = 95.0;
const JITTER: f64 = 4.0;

/// Build a fallback snapshot using the thread-local RNG.
pub fn fallback_snapshot(venue_id: &str, price_bias: f64) -> VenueSnapshot {
    snapshot_with_rng(venue_id, price_bias, &mut rand::thread_rng())
}

/// Build a fallback snapshot from an explicit RNG.
pub fn snapshot_with_rng<R: Rng + ?Sized>(
    venue_id: &str,
    price_bias: f64,
    rng: &mut R,
) -> VenueSnapshot {
    let markets = CATALOG
        .iter()
        .enumerate()
        .map(|(i, title)| {
            let idx = i as u32 + 1;
            let anchor = 48.0 + f64::from(idx) * 5.0;
            let jitter = rng.gen_range(-JITTER..=JITTER);
            let yes = (anchor + price_bias + jitter).clamp(PRICE_FLOOR, PRICE_CEIL);
            let no = (100.0 - yes).clamp(PRICE_FLOOR, PRICE_CEIL);

            MarketQuote {
                market_id: idx.to_string(),
                title: (*title).to_string(),
                yes_price: round2(yes),
                no_price: round2(no),
                liquidity: f64::from(rng.gen_range(30_000u32..=200_000)),
                volume_24h: f64::from(rng.gen_range(10_000u32..=500_000)),
                active: true,
            }
        })
        .collect();

    VenueSnapshot::new(venue_id, markets)
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_shape() {
        let snap = fallback_snapshot("opinion_bsc", 3.5);
        assert_eq!(snap.venue_id, "opinion_bsc");
        assert_eq!(snap.markets.len(), CATALOG.len());
        for (i, q) in snap.markets.iter().enumerate() {
            assert_eq!(q.market_id, (i + 1).to_string());
            assert_eq!(q.title, CATALOG[i]);
            assert!(q.active);
            assert!((PRICE_FLOOR..=PRICE_CEIL).contains(&q.yes_price));
            assert!((PRICE_FLOOR..=PRICE_CEIL).contains(&q.no_price));
            assert!((30_000.0..=200_000.0).contains(&q.liquidity));
            assert!((10_000.0..=500_000.0).contains(&q.volume_24h));
        }
    }

    #[test]
    fn test_prices_stay_near_anchor() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let snap = snapshot_with_rng("predict_fun", -4.5, &mut rng);
            for (i, q) in snap.markets.iter().enumerate() {
                let anchor = 48.0 + (i as f64 + 1.0) * 5.0 - 4.5;
                assert!((q.yes_price - anchor).abs() <= JITTER + 0.01);
            }
        }
    }

    #[test]
    fn test_extreme_bias_is_clamped() {
        let snap = fallback_snapshot("v", 80.0);
        assert!(snap.markets.iter().all(|q| q.yes_price == PRICE_CEIL));
        assert!(snap.markets.iter().all(|q| q.no_price == PRICE_FLOOR));
    }

    #[test]
    fn test_seeded_rng_is_deterministic() {
        let a = snapshot_with_rng("v", 0.0, &mut StdRng::seed_from_u64(42));
        let b = snapshot_with_rng("v", 0.0, &mut StdRng::seed_from_u64(42));
        assert_eq!(a.markets, b.markets);
    }
}
