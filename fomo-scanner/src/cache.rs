//! Ranked opportunity cache.
//!
//! Holds the latest published generation and hands entries out round-robin.
//! The list and the cursor sit behind one lock, so a reader never pairs a
//! cursor from one generation with the list of another.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::scoring::{signal, ScoredOpportunity};

/// One complete, atomically swapped snapshot.
#[derive(Debug, Clone, Default)]
pub struct CacheGeneration {
    pub ranked: Vec<ScoredOpportunity>,
    /// Always `< ranked.len()` when the list is non-empty
    pub cursor: usize,
    pub last_refresh: Option<DateTime<Utc>>,
    pub generation_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub count: usize,
    pub cursor: usize,
    pub last_update: Option<DateTime<Utc>>,
    pub is_fresh: bool,
    pub generation_id: u64,
}

pub struct RankedCache {
    inner: Mutex<CacheGeneration>,
    clock: Arc<dyn Clock>,
    refresh_interval: Duration,
    max_results: usize,
}

impl RankedCache {
    pub fn new(clock: Arc<dyn Clock>, refresh_interval: Duration, max_results: usize) -> Self {
        Self {
            inner: Mutex::new(CacheGeneration::default()),
            clock,
            refresh_interval,
            max_results: max_results.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheGeneration> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Publish a new generation.
    ///
    /// Sorts by score descending (ties by id), keeps the top entries, and
    /// resets the cursor. An empty list leaves the current generation in place
    /// and returns `false`.
    pub fn publish(&self, mut list: Vec<ScoredOpportunity>) -> bool {
        if list.is_empty() {
            debug!("Empty result, keeping current generation");
            return false;
        }

        list.sort_by(|a, b| b.fomo_score.cmp(&a.fomo_score).then_with(|| a.id.cmp(&b.id)));
        list.truncate(self.max_results);
        let count = list.len();
        let now = self.clock.now();

        let mut generation = self.lock();
        generation.ranked = list;
        generation.cursor = 0;
        generation.last_refresh = Some(now);
        generation.generation_id += 1;

        info!(
            count,
            generation_id = generation.generation_id,
            "Published ranked generation"
        );
        true
    }

    /// Next entry in round-robin order, or `None` when nothing is cached.
    pub fn get_next(&self) -> Option<ScoredOpportunity> {
        self.get_next_tagged().map(|(_, opp)| opp)
    }

    /// Like [`get_next`](Self::get_next), with the generation the entry came from.
    pub fn get_next_tagged(&self) -> Option<(u64, ScoredOpportunity)> {
        let mut generation = self.lock();
        let len = generation.ranked.len();
        if len == 0 {
            return None;
        }

        let index = generation.cursor;
        let opp = generation.ranked[index].clone();
        generation.cursor = (index + 1) % len;
        Some((generation.generation_id, opp))
    }

    /// Copy of the ranked list.
    pub fn snapshot(&self) -> Vec<ScoredOpportunity> {
        self.lock().ranked.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().ranked.is_empty()
    }

    fn fresh_at(&self, last_refresh: Option<DateTime<Utc>>) -> bool {
        let Some(last) = last_refresh else {
            return false;
        };
        let window_ms = (self.refresh_interval.as_millis() * 2).min(i64::MAX as u128) as i64;
        let window = chrono::Duration::milliseconds(window_ms);
        self.clock.now() - last < window
    }

    /// True when the last publish was within two refresh intervals.
    pub fn is_fresh(&self) -> bool {
        let last = self.lock().last_refresh;
        self.fresh_at(last)
    }

    pub fn stats(&self) -> CacheStats {
        let (count, cursor, last_update, generation_id) = {
            let g = self.lock();
            (g.ranked.len(), g.cursor, g.last_refresh, g.generation_id)
        };

        CacheStats {
            count,
            cursor,
            last_update,
            is_fresh: self.fresh_at(last_update),
            generation_id,
        }
    }
}

// ============================================================================
// Fallback Set
// ============================================================================

struct FallbackAsset {
    id: &'static str,
    name: &'static str,
    symbol: &'static str,
    score: u8,
    spike: f64,
    price: f64,
    change_1h: f64,
    change_24h: f64,
    volume: f64,
    market_cap: f64,
    rank: u32,
    image: &'static str,
}

const FALLBACK_ASSETS: [FallbackAsset; 10] = [
    FallbackAsset {
        id: "bitcoin",
        name: "Bitcoin",
        symbol: "btc",
        score: 88,
        spike: 2.5,
        price: 98_000.0,
        change_1h: 1.2,
        change_24h: 5.2,
        volume: 25e9,
        market_cap: 1_950e9,
        rank: 1,
        image: "1/large/bitcoin.png",
    },
    FallbackAsset {
        id: "ethereum",
        name: "Ethereum",
        symbol: "eth",
        score: 82,
        spike: 2.1,
        price: 3_500.0,
        change_1h: 0.8,
        change_24h: 3.1,
        volume: 15e9,
        market_cap: 420e9,
        rank: 2,
        image: "279/large/ethereum.png",
    },
    FallbackAsset {
        id: "solana",
        name: "Solana",
        symbol: "sol",
        score: 86,
        spike: 3.2,
        price: 240.0,
        change_1h: 2.3,
        change_24h: 8.7,
        volume: 3e9,
        market_cap: 115e9,
        rank: 5,
        image: "4128/large/solana.png",
    },
    FallbackAsset {
        id: "chainlink",
        name: "Chainlink",
        symbol: "link",
        score: 79,
        spike: 1.8,
        price: 28.0,
        change_1h: 0.5,
        change_24h: 4.2,
        volume: 800e6,
        market_cap: 17e9,
        rank: 15,
        image: "877/large/chainlink-new-logo.png",
    },
    FallbackAsset {
        id: "avalanche-2",
        name: "Avalanche",
        symbol: "avax",
        score: 76,
        spike: 2.0,
        price: 45.0,
        change_1h: 1.1,
        change_24h: 6.8,
        volume: 900e6,
        market_cap: 18e9,
        rank: 12,
        image: "12559/large/avalanche-avax-logo.png",
    },
    FallbackAsset {
        id: "cardano",
        name: "Cardano",
        symbol: "ada",
        score: 74,
        spike: 1.5,
        price: 1.2,
        change_1h: 0.3,
        change_24h: 2.8,
        volume: 600e6,
        market_cap: 42e9,
        rank: 8,
        image: "975/large/cardano.png",
    },
    FallbackAsset {
        id: "polkadot",
        name: "Polkadot",
        symbol: "dot",
        score: 72,
        spike: 2.2,
        price: 8.5,
        change_1h: 0.8,
        change_24h: 3.5,
        volume: 400e6,
        market_cap: 12e9,
        rank: 18,
        image: "12171/large/polkadot.png",
    },
    FallbackAsset {
        id: "polygon",
        name: "Polygon",
        symbol: "matic",
        score: 70,
        spike: 1.9,
        price: 0.85,
        change_1h: 0.6,
        change_24h: 4.1,
        volume: 350e6,
        market_cap: 8.5e9,
        rank: 22,
        image: "4713/large/matic-token-icon.png",
    },
    FallbackAsset {
        id: "uniswap",
        name: "Uniswap",
        symbol: "uni",
        score: 68,
        spike: 1.7,
        price: 12.0,
        change_1h: 0.4,
        change_24h: 3.8,
        volume: 250e6,
        market_cap: 7.2e9,
        rank: 25,
        image: "12504/large/uniswap-uni.png",
    },
    FallbackAsset {
        id: "aave",
        name: "Aave",
        symbol: "aave",
        score: 66,
        spike: 1.6,
        price: 320.0,
        change_1h: 0.2,
        change_24h: 2.9,
        volume: 180e6,
        market_cap: 4.8e9,
        rank: 28,
        image: "12645/large/aave-token-round.png",
    },
];

/// Well-known assets served while the first refresh is still running.
pub fn fallback_opportunities() -> Vec<ScoredOpportunity> {
    FALLBACK_ASSETS
        .iter()
        .map(|a| ScoredOpportunity {
            id: a.id.to_string(),
            symbol: a.symbol.to_string(),
            name: a.name.to_string(),
            price: a.price,
            volume: a.volume,
            market_cap: Some(a.market_cap),
            market_cap_rank: a.rank,
            pct_change_1h: a.change_1h,
            pct_change_24h: a.change_24h,
            volume_spike: a.spike,
            fomo_score: a.score,
            signal_label: signal::base_label(a.score, a.change_24h).to_string(),
            trend_status: "Data Unavailable".to_string(),
            distribution_status: "No Exchange Data".to_string(),
            probability_profile: None,
            predictive: None,
            breakdown: Vec::new(),
            logo_url: Some(format!(
                "https://coin-images.coingecko.com/coins/images/{}",
                a.image
            )),
            source_url: format!("https://www.coingecko.com/en/coins/{}", a.id),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn opp(id: &str, score: u8) -> ScoredOpportunity {
        let mut o = fallback_opportunities().remove(0);
        o.id = id.to_string();
        o.fomo_score = score;
        o
    }

    fn cache() -> (Arc<ManualClock>, RankedCache) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
        ));
        let cache = RankedCache::new(clock.clone(), Duration::from_secs(180), 100);
        (clock, cache)
    }

    #[test]
    fn test_empty_cache_returns_sentinel() {
        let (_, cache) = cache();
        assert!(cache.get_next().is_none());
        assert!(!cache.is_fresh());
        assert_eq!(cache.stats().generation_id, 0);
    }

    #[test]
    fn test_publish_sorts_with_id_tiebreak() {
        let (_, cache) = cache();
        assert!(cache.publish(vec![opp("b", 50), opp("c", 90), opp("a", 50)]));

        let ids: Vec<_> = cache.snapshot().into_iter().map(|o| o.id).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_round_robin_wraps() {
        let (_, cache) = cache();
        cache.publish(vec![opp("A", 90), opp("B", 80), opp("C", 70)]);

        let served: Vec<_> = (0..4).filter_map(|_| cache.get_next()).map(|o| o.id).collect();
        assert_eq!(served, vec!["A", "B", "C", "A"]);
        assert_eq!(cache.stats().cursor, 1);
    }

    #[test]
    fn test_publish_caps_results() {
        let clock = Arc::new(ManualClock::default());
        let cache = RankedCache::new(clock, Duration::from_secs(180), 2);
        cache.publish(vec![opp("a", 10), opp("b", 20), opp("c", 30)]);

        let ids: Vec<_> = cache.snapshot().into_iter().map(|o| o.id).collect();
        assert_eq!(ids, vec!["c", "b"]);
    }

    #[test]
    fn test_empty_publish_preserves_generation() {
        let (_, cache) = cache();
        cache.publish(vec![opp("A", 90), opp("B", 80)]);
        cache.get_next();
        let before = cache.stats();

        assert!(!cache.publish(Vec::new()));
        assert_eq!(cache.stats(), before);
        assert_eq!(cache.get_next().map(|o| o.id).as_deref(), Some("B"));
    }

    #[test]
    fn test_publish_resets_cursor_and_bumps_generation() {
        let (_, cache) = cache();
        cache.publish(vec![opp("A", 90), opp("B", 80)]);
        cache.get_next();
        cache.publish(vec![opp("X", 10)]);

        let stats = cache.stats();
        assert_eq!(stats.generation_id, 2);
        assert_eq!(stats.cursor, 0);
        assert_eq!(cache.get_next_tagged().map(|(g, o)| (g, o.id)), Some((2, "X".into())));
    }

    #[test]
    fn test_freshness_window() {
        let (clock, cache) = cache();
        cache.publish(vec![opp("A", 90)]);
        assert!(cache.is_fresh());

        clock.advance(chrono::Duration::seconds(359));
        assert!(cache.is_fresh());

        clock.advance(chrono::Duration::seconds(1));
        assert!(!cache.is_fresh());
        assert!(!cache.stats().is_fresh);
    }

    #[test]
    fn test_fallback_set() {
        let fallback = fallback_opportunities();
        assert_eq!(fallback.len(), 10);
        assert_eq!(fallback[0].id, "bitcoin");
        assert_eq!(fallback[9].id, "aave");
        assert_eq!(fallback[4].source_url, "https://www.coingecko.com/en/coins/avalanche-2");
        assert!(fallback.iter().all(|o| o.logo_url.is_some()));
    }
}
