use serde::Serialize;

/// How the grid should load data, chosen from the total row count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LoadingStrategy {
    /// Everything fits in one page; sort and filter in the browser.
    Client,
    ServerPaged,
    /// Windowed infinite scroll using start/end rows.
    Infinite,
}

#[derive(Debug, Clone, Copy)]
pub struct StrategyThresholds {
    pub client_side_max_rows: i64,
    pub server_paged_max_rows: i64,
}

impl Default for StrategyThresholds {
    fn default() -> Self {
        Self {
            client_side_max_rows: 1_000,
            server_paged_max_rows: 100_000,
        }
    }
}

impl StrategyThresholds {
    pub fn choose(&self, total_count: i64) -> LoadingStrategy {
        if total_count <= self.client_side_max_rows {
            LoadingStrategy::Client
        } else if total_count <= self.server_paged_max_rows {
            LoadingStrategy::ServerPaged
        } else {
            LoadingStrategy::Infinite
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_strategy_by_row_count() {
        let thresholds = StrategyThresholds::default();
        assert_eq!(thresholds.choose(0), LoadingStrategy::Client);
        assert_eq!(thresholds.choose(1_000), LoadingStrategy::Client);
        assert_eq!(thresholds.choose(1_001), LoadingStrategy::ServerPaged);
        assert_eq!(thresholds.choose(100_000), LoadingStrategy::ServerPaged);
        assert_eq!(thresholds.choose(100_001), LoadingStrategy::Infinite);
    }
}
