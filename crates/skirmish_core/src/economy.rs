//! Per-player resources and tick-driven income.
//!
//! Income is a pure function of the tick number and territory ownership:
//! every `income_interval_ticks` ticks each player earns a flat amount plus
//! a bonus per band their team holds. All amounts are integers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::components::{PlayerId, Team};
use crate::config::{EconomyConfig, PlayerSlot};
use crate::error::CommandError;
use crate::territory::TerritoryMap;

/// One income payout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Income {
    /// Receiving player.
    pub player: PlayerId,
    /// Amount credited.
    pub amount: u32,
}

/// Resource balances of every seated player, keyed in player-ID order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLedger {
    balances: BTreeMap<PlayerId, u32>,
    teams: BTreeMap<PlayerId, Team>,
    /// Last tick income was settled for.
    #[serde(default)]
    settled_tick: u64,
}

impl ResourceLedger {
    /// Give every player the starting amount.
    #[must_use]
    pub fn new(players: &[PlayerSlot], starting: u32) -> Self {
        Self {
            balances: players.iter().map(|p| (p.id.clone(), starting)).collect(),
            teams: players.iter().map(|p| (p.id.clone(), p.team)).collect(),
            settled_tick: 0,
        }
    }

    /// Current balance; zero for unknown players.
    #[must_use]
    pub fn balance(&self, player: &PlayerId) -> u32 {
        self.balances.get(player).copied().unwrap_or(0)
    }

    /// Whether the player can pay `cost`.
    #[must_use]
    pub fn can_afford(&self, player: &PlayerId, cost: u32) -> bool {
        self.balance(player) >= cost
    }

    /// Deduct `cost`, failing without change if the player cannot pay.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::UnknownPlayer`] or
    /// [`CommandError::InsufficientResources`].
    pub fn spend(&mut self, player: &PlayerId, cost: u32) -> Result<(), CommandError> {
        let balance = self
            .balances
            .get_mut(player)
            .ok_or_else(|| CommandError::UnknownPlayer(player.to_string()))?;
        if *balance < cost {
            return Err(CommandError::InsufficientResources {
                required: cost,
                available: *balance,
            });
        }
        *balance -= cost;
        Ok(())
    }

    /// Credit `amount` (refunds and income). Unknown players are ignored.
    pub fn deposit(&mut self, player: &PlayerId, amount: u32) {
        if let Some(balance) = self.balances.get_mut(player) {
            *balance = balance.saturating_add(amount);
        }
    }

    /// Pay every income interval completed since the last settled tick.
    ///
    /// Normally that is one payout on each multiple of the interval; a tick
    /// arriving after a gap also settles the boundaries it skipped, at the
    /// current territory rate.
    pub fn tick(
        &mut self,
        tick: u64,
        config: &EconomyConfig,
        territory: &TerritoryMap,
    ) -> Vec<Income> {
        let interval = config.income_interval_ticks;
        if interval == 0 || tick <= self.settled_tick {
            return Vec::new();
        }
        let due = tick / interval - self.settled_tick / interval;
        self.settled_tick = tick;
        if due == 0 {
            return Vec::new();
        }
        let due = u32::try_from(due).unwrap_or(u32::MAX);
        let mut payouts = Vec::with_capacity(self.balances.len());
        for (player, balance) in &mut self.balances {
            let bands = self
                .teams
                .get(player)
                .map_or(0, |&team| territory.bands_owned(team));
            let amount = config
                .base_income
                .saturating_add(config.income_per_band.saturating_mul(bands))
                .saturating_mul(due);
            *balance = balance.saturating_add(amount);
            payouts.push(Income {
                player: player.clone(),
                amount,
            });
        }
        payouts
    }

    /// Balances in player-ID order.
    pub fn iter(&self) -> impl Iterator<Item = (&PlayerId, u32)> {
        self.balances.iter().map(|(player, &amount)| (player, amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MatchConfig, TerritoryConfig};

    fn ledger() -> ResourceLedger {
        let config = MatchConfig::two_player("red", "blue");
        ResourceLedger::new(&config.players, 100)
    }

    #[test]
    fn test_spend_and_refund() {
        let mut ledger = ledger();
        let red = PlayerId::new("red");
        ledger.spend(&red, 60).unwrap();
        assert_eq!(
            ledger.spend(&red, 60),
            Err(CommandError::InsufficientResources {
                required: 60,
                available: 40
            })
        );
        ledger.deposit(&red, 60);
        assert_eq!(ledger.balance(&red), 100);
        assert!(matches!(
            ledger.spend(&PlayerId::new("ghost"), 1),
            Err(CommandError::UnknownPlayer(_))
        ));
    }

    #[test]
    fn test_income_follows_interval_and_territory() {
        let mut ledger = ledger();
        let config = EconomyConfig::default();
        let territory = TerritoryMap::new(&TerritoryConfig::default());

        assert!(ledger.tick(0, &config, &territory).is_empty());
        assert!(ledger.tick(19, &config, &territory).is_empty());

        let payouts = ledger.tick(20, &config, &territory);
        // 10 base + 2 per band, four bands each.
        assert_eq!(payouts.len(), 2);
        assert!(payouts.iter().all(|income| income.amount == 18));
        assert_eq!(ledger.balance(&PlayerId::new("blue")), 118);
    }

    #[test]
    fn test_income_settles_skipped_intervals() {
        let mut ledger = ledger();
        let config = EconomyConfig::default();
        let territory = TerritoryMap::new(&TerritoryConfig::default());
        let red = PlayerId::new("red");

        assert!(ledger.tick(5, &config, &territory).is_empty());
        // Ticks 20 and 40 were never processed.
        let payouts = ledger.tick(41, &config, &territory);
        assert!(payouts.iter().all(|income| income.amount == 36));
        assert_eq!(ledger.balance(&red), 136);

        assert!(ledger.tick(59, &config, &territory).is_empty());
        ledger.tick(60, &config, &territory);
        assert_eq!(ledger.balance(&red), 154);
        // Replaying a settled tick pays nothing.
        assert!(ledger.tick(60, &config, &territory).is_empty());
    }
}
