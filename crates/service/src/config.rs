use stockroom_inventory::SearchLimits;

pub const MAX_COMBINATION_SIZE_VAR: &str = "STOCKROOM_MAX_COMBINATION_SIZE";
pub const MAX_SOLUTIONS_VAR: &str = "STOCKROOM_MAX_SOLUTIONS";
pub const CHECK_ALERTS_VAR: &str = "STOCKROOM_CHECK_ALERTS";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockroomConfig {
    /// Bounds for the breakdown search.
    pub search: SearchLimits,
    /// Run the low/out-of-stock check after every mutation.
    pub check_alerts: bool,
}

impl Default for StockroomConfig {
    fn default() -> Self {
        Self {
            search: SearchLimits::default(),
            check_alerts: true,
        }
    }
}

impl StockroomConfig {
    /// Read overrides from the process environment. Missing or unparsable values keep
    /// their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|raw| raw.trim().parse().ok());

        Self {
            search: SearchLimits {
                max_combination_size: parsed(MAX_COMBINATION_SIZE_VAR)
                    .unwrap_or(defaults.search.max_combination_size),
                max_solutions: parsed(MAX_SOLUTIONS_VAR).unwrap_or(defaults.search.max_solutions),
            },
            check_alerts: lookup(CHECK_ALERTS_VAR)
                .and_then(|raw| raw.trim().parse::<bool>().ok())
                .unwrap_or(defaults.check_alerts),
        }
    }
}
